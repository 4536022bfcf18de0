use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Data-driven rules for a grid match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameRules {
    /// Simulation tick length (ms).
    pub tick_ms: u64,
    /// Bomb fuse (ms).
    pub fuse_ms: u32,
    /// How long a blast cell burns (ms).
    pub explosion_ms: u64,
    /// Base delay between two moves of one player (ms), divided by speed.
    pub move_cooldown_ms: u64,
    /// Probability that an eligible cell starts as destructible.
    pub brick_density: f64,
    /// Probability that a destroyed cell drops a power-up.
    pub powerup_chance: f64,
    /// Speed gained per speed power-up.
    pub speed_step: f32,
    /// Speed multiplier cap.
    pub max_speed: f32,
    pub starting_bombs: u32,
    pub starting_flame: u32,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            fuse_ms: 2000,
            explosion_ms: 400,
            move_cooldown_ms: 150,
            brick_density: 0.65,
            powerup_chance: 0.3,
            speed_step: 0.3,
            max_speed: 2.0,
            starting_bombs: 1,
            starting_flame: 2,
        }
    }
}

impl GameRules {
    /// Load rules from `BLASTGRID_RULES` or `config/rules.toml`, falling back
    /// to defaults.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("BLASTGRID_RULES")
            && let Ok(contents) = std::fs::read_to_string(&path)
        {
            match toml::from_str::<Self>(&contents) {
                Ok(rules) => return rules.sanitized(),
                Err(e) => tracing::warn!(path = %path, error = %e, "Invalid rules file, ignoring"),
            }
        }
        if let Ok(contents) = std::fs::read_to_string("config/rules.toml")
            && let Ok(rules) = toml::from_str::<Self>(&contents)
        {
            return rules.sanitized();
        }
        Self::default()
    }

    /// Clamp values that would stall or break the simulation.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        self.tick_ms = self.tick_ms.max(1);
        self.brick_density = probability(self.brick_density, defaults.brick_density);
        self.powerup_chance = probability(self.powerup_chance, defaults.powerup_chance);
        // f32::max discards NaN, so both land on a usable floor.
        self.speed_step = self.speed_step.max(0.0);
        self.max_speed = self.max_speed.max(STARTING_SPEED);
        self.starting_bombs = self.starting_bombs.max(1);
        self
    }

    /// Whether a player moving at `speed` may step again `elapsed` after its
    /// previous move. The boundary itself counts as elapsed.
    pub fn move_ready(&self, elapsed: Duration, speed: f32) -> bool {
        let scaled = elapsed.as_micros() as f64 * f64::from(speed);
        scaled >= (self.move_cooldown_ms as f64) * 1000.0
    }
}

/// Speed multiplier every player starts a match with.
pub const STARTING_SPEED: f32 = 1.0;

fn probability(value: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_classic_rules() {
        let rules = GameRules::default();
        assert_eq!(rules.tick_ms, 100);
        assert_eq!(rules.fuse_ms, 2000);
        assert_eq!(rules.explosion_ms, 400);
        assert!((rules.max_speed - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let rules: GameRules = toml::from_str("fuse_ms = 3000\npowerup_chance = 1.0").unwrap();
        assert_eq!(rules.fuse_ms, 3000);
        assert_eq!(rules.tick_ms, 100);
        assert!((rules.powerup_chance - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sanitized_clamps_probabilities() {
        let rules = GameRules {
            tick_ms: 0,
            brick_density: 3.0,
            powerup_chance: -1.0,
            ..GameRules::default()
        }
        .sanitized();
        assert_eq!(rules.tick_ms, 1);
        assert!((rules.brick_density - 1.0).abs() < f64::EPSILON);
        assert!(rules.powerup_chance.abs() < f64::EPSILON);
    }

    #[test]
    fn sanitized_rejects_nan_and_shrinking_speed() {
        let rules = GameRules {
            brick_density: f64::NAN,
            powerup_chance: f64::NAN,
            speed_step: -0.5,
            max_speed: f32::NAN,
            ..GameRules::default()
        }
        .sanitized();
        assert!((rules.brick_density - 0.65).abs() < f64::EPSILON);
        assert!((rules.powerup_chance - 0.3).abs() < f64::EPSILON);
        assert!(rules.speed_step.abs() < f32::EPSILON);
        assert!((rules.max_speed - STARTING_SPEED).abs() < f32::EPSILON);
    }

    #[test]
    fn move_ready_at_exact_cooldown() {
        let rules = GameRules::default();
        assert!(!rules.move_ready(Duration::from_millis(149), 1.0));
        assert!(rules.move_ready(Duration::from_millis(150), 1.0));
        assert!(rules.move_ready(Duration::from_millis(75), 2.0));
        assert!(!rules.move_ready(Duration::from_millis(74), 2.0));
        // 150 / 1.3 is about 115.4ms.
        assert!(!rules.move_ready(Duration::from_millis(115), 1.3));
        assert!(rules.move_ready(Duration::from_millis(116), 1.3));
    }
}
