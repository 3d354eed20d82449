//! # Deterministic Id Generation
//!
//! Duplicating a subtree mints new ids. Those ids must come out the same
//! every time the same event is replayed, so generation is driven by a
//! seed carried on the event:
//!
//! ```text
//! seed ──sha256──▶ 32-byte key ──ChaCha8──▶ byte stream ──▶ alphabet
//! ```
//!
//! Tests swap in [`SequenceIdGenerator`] to get ids they can spell out.

use rand_chacha::ChaCha8Rng;
use rand_core::{RngCore, SeedableRng};
use sha2::{Digest, Sha256};

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// Length of ids produced by [`SeededIdGenerator`]
pub const ID_LENGTH: usize = 12;

/// Source of fresh item ids
pub trait IdGenerator {
    fn next_id(&mut self) -> String;
}

/// Seed-derived generator: equal seeds yield equal id sequences
#[derive(Debug, Clone)]
pub struct SeededIdGenerator {
    rng: ChaCha8Rng,
}

impl SeededIdGenerator {
    pub fn new(seed: &str) -> Self {
        let digest = Sha256::digest(seed.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self {
            rng: ChaCha8Rng::from_seed(key),
        }
    }
}

impl IdGenerator for SeededIdGenerator {
    fn next_id(&mut self) -> String {
        let mut bytes = [0u8; ID_LENGTH];
        self.rng.fill_bytes(&mut bytes);
        // 64 symbols, so the low six bits pick one without bias
        bytes
            .iter()
            .map(|b| ALPHABET[(b & 0x3f) as usize] as char)
            .collect()
    }
}

/// Hands out a fixed list of ids, then numbered fallbacks
#[derive(Debug, Clone, Default)]
pub struct SequenceIdGenerator {
    ids: std::collections::VecDeque<String>,
    issued: usize,
}

impl SequenceIdGenerator {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            issued: 0,
        }
    }
}

impl IdGenerator for SequenceIdGenerator {
    fn next_id(&mut self) -> String {
        self.issued += 1;
        self.ids
            .pop_front()
            .unwrap_or_else(|| format!("id-{}", self.issued))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_generator_is_deterministic() {
        let mut a = SeededIdGenerator::new("s1");
        let mut b = SeededIdGenerator::new("s1");
        let first: Vec<String> = (0..5).map(|_| a.next_id()).collect();
        let second: Vec<String> = (0..5).map(|_| b.next_id()).collect();
        assert_eq!(first, second);
        assert!(first.iter().all(|id| id.len() == ID_LENGTH));
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = SeededIdGenerator::new("s1");
        let mut b = SeededIdGenerator::new("s2");
        assert_ne!(a.next_id(), b.next_id());
    }

    #[test]
    fn test_sequence_generator() {
        let mut ids = SequenceIdGenerator::new(["x", "y"]);
        assert_eq!(ids.next_id(), "x");
        assert_eq!(ids.next_id(), "y");
        assert_eq!(ids.next_id(), "id-3");
    }
}
