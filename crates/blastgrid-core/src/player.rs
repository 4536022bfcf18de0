use serde::{Deserialize, Serialize};

/// Server-wide unique player identifier.
pub type PlayerId = u64;

/// Maximum display-name length, in characters.
pub const MAX_NAME_LEN: usize = 20;

/// Player display color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Default for PlayerColor {
    fn default() -> Self {
        Self::PALETTE[0]
    }
}

impl PlayerColor {
    /// One color per spawn corner.
    pub const PALETTE: &[PlayerColor] = &[
        PlayerColor {
            r: 231,
            g: 76,
            b: 60,
        }, // Red
        PlayerColor {
            r: 52,
            g: 152,
            b: 219,
        }, // Blue
        PlayerColor {
            r: 46,
            g: 204,
            b: 113,
        }, // Green
        PlayerColor {
            r: 243,
            g: 156,
            b: 18,
        }, // Orange
    ];

    /// Palette color for the `index`-th player, wrapping around.
    pub fn for_index(index: usize) -> Self {
        Self::PALETTE[index % Self::PALETTE.len()]
    }
}

/// Trim and truncate a requested display name, falling back when it is
/// missing or blank.
pub fn sanitize_display_name(requested: Option<&str>, fallback: impl FnOnce() -> String) -> String {
    let trimmed: String = requested
        .map(str::trim)
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NAME_LEN)
        .collect();
    let trimmed = trimmed.trim_end();
    if trimmed.is_empty() {
        fallback()
    } else {
        trimmed.to_string()
    }
}
