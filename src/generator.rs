//! Synthetic test users for load runs.

use crate::types::{ObjectIdentity, UserRecord};
use rand::prelude::*;

const GIVEN_NAMES: &[&str] = &[
    "Ada", "Alan", "Barbara", "Claude", "Donald", "Edsger", "Frances", "Grace", "Hedy", "John",
    "Katherine", "Ken", "Leslie", "Linus", "Margaret", "Niklaus", "Radia", "Robin", "Sophie",
    "Tim",
];

const SURNAMES: &[&str] = &[
    "Allen", "Backus", "Cerf", "Dijkstra", "Engelbart", "Hamilton", "Hopper", "Johnson", "Kay",
    "Knuth", "Lamport", "Liskov", "Lovelace", "McCarthy", "Milner", "Perlman", "Ritchie",
    "Shannon", "Thompson", "Wirth",
];

const HOST_LEN: usize = 10;

pub const DEFAULT_PASSWORD: &str = "Pass!w0rd";

/// Produces random local-account users tagged `[TEST]`.
#[derive(Debug, Clone)]
pub struct RecordGenerator {
    rng: StdRng,
    password: String,
}

impl Default for RecordGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordGenerator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            password: DEFAULT_PASSWORD.to_string(),
        }
    }

    /// Reproducible output for a given seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn generate(&mut self, count: usize) -> Vec<UserRecord> {
        (0..count).map(|_| self.one()).collect()
    }

    /// One user with an email sign-in at a random ten-letter host.
    pub fn one(&mut self) -> UserRecord {
        let given = GIVEN_NAMES.choose(&mut self.rng).copied().unwrap_or("Test");
        let surname = SURNAMES.choose(&mut self.rng).copied().unwrap_or("User");
        let host: String = (0..HOST_LEN)
            .map(|_| self.rng.gen_range(b'a'..=b'z') as char)
            .collect();
        let email = format!("{}.{}@{}.com", given, surname, host);

        UserRecord {
            given_name: Some(given.to_string()),
            surname: Some(surname.to_string()),
            display_name: format!("[TEST] {} {} (Local account)", given, surname),
            identities: vec![ObjectIdentity::email(email)],
            password: Some(self.password.clone()),
            ..Default::default()
        }
    }
}
