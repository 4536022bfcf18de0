use std::collections::HashMap;

use blastgrid_core::tournament::{Tournament, TournamentMode, generate_join_code};

/// In-memory store of tournaments, addressable by id or join code.
#[derive(Default)]
pub struct TournamentRegistry {
    tournaments: HashMap<String, Tournament>,
    /// join code -> tournament id
    codes: HashMap<String, String>,
}

impl TournamentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tournament with a join code unique within this registry.
    pub fn create(&mut self, mode: TournamentMode, max_participants: usize) -> &Tournament {
        let join_code = loop {
            let code = generate_join_code();
            if !self.codes.contains_key(&code) {
                break code;
            }
        };
        let tournament = Tournament::new(mode, max_participants, join_code.clone());
        let id = tournament.id.clone();
        tracing::info!(
            tournament_id = %id,
            join_code = %join_code,
            mode = ?mode,
            max_participants = tournament.max_participants,
            "Tournament created"
        );
        self.codes.insert(join_code, id.clone());
        self.tournaments.entry(id).or_insert(tournament)
    }

    fn resolve<'a>(&'a self, id_or_code: &'a str) -> Option<&'a str> {
        if self.tournaments.contains_key(id_or_code) {
            return Some(id_or_code);
        }
        self.codes
            .get(&id_or_code.trim().to_ascii_uppercase())
            .map(String::as_str)
    }

    pub fn get(&self, id_or_code: &str) -> Option<&Tournament> {
        let id = self.resolve(id_or_code)?;
        self.tournaments.get(id)
    }

    pub fn get_mut(&mut self, id_or_code: &str) -> Option<&mut Tournament> {
        let id = self.resolve(id_or_code)?.to_string();
        self.tournaments.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.tournaments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tournaments.is_empty()
    }
}
