//! Shared-secret generation for the cross-account trust condition.

use std::fmt;

use rand::Rng;

pub const EXTERNAL_ID_LEN: usize = 7;
pub const EXTERNAL_ID_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Seven characters drawn uniformly, with replacement, from `A-Z0-9`.
///
/// A fresh value is minted for every Create/Update; nothing here persists it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternalId(String);

impl ExternalId {
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let value = (0..EXTERNAL_ID_LEN)
            .map(|_| EXTERNAL_ID_ALPHABET[rng.gen_range(0..EXTERNAL_ID_ALPHABET.len())] as char)
            .collect();
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
