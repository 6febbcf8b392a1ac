//! Ticket id generation.
//!
//! Ids look like `ST-42-<random>-<node>`: type prefix, per-process counter,
//! alphanumeric randomness from a CSPRNG and an optional node suffix.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rand::distr::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sso_sdk::{TicketId, TicketType};

use crate::config::TicketIdConfig;

pub trait TicketIdGenerator: Send + Sync {
    fn generate(&self, ticket_type: TicketType) -> TicketId;
}

fn compose(ticket_type: TicketType, sequence: u64, random: &str, suffix: Option<&str>) -> TicketId {
    let body = match suffix {
        Some(node) => format!("{sequence}-{random}-{node}"),
        None => format!("{sequence}-{random}"),
    };
    TicketId::new(ticket_type, &body)
}

/// Production generator backed by the thread-local CSPRNG.
#[derive(Debug)]
pub struct RandomTicketIdGenerator {
    counter: AtomicU64,
    random_length: usize,
    suffix: Option<String>,
}

impl RandomTicketIdGenerator {
    #[must_use]
    pub fn new(config: &TicketIdConfig) -> Self {
        Self {
            counter: AtomicU64::new(1),
            random_length: config.random_length.max(16),
            suffix: config.node_suffix.clone().filter(|s| !s.is_empty()),
        }
    }
}

impl TicketIdGenerator for RandomTicketIdGenerator {
    fn generate(&self, ticket_type: TicketType) -> TicketId {
        let sequence = self.counter.fetch_add(1, Ordering::Relaxed);
        let random: String = rand::rng()
            .sample_iter(Alphanumeric)
            .take(self.random_length)
            .map(char::from)
            .collect();
        compose(ticket_type, sequence, &random, self.suffix.as_deref())
    }
}

/// Deterministic generator for tests.
#[derive(Debug)]
pub struct SeededTicketIdGenerator {
    counter: AtomicU64,
    rng: Mutex<StdRng>,
}

impl SeededTicketIdGenerator {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            counter: AtomicU64::new(1),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl TicketIdGenerator for SeededTicketIdGenerator {
    fn generate(&self, ticket_type: TicketType) -> TicketId {
        let sequence = self.counter.fetch_add(1, Ordering::Relaxed);
        let random: String = {
            let mut rng = self.rng.lock();
            (&mut *rng)
                .sample_iter(Alphanumeric)
                .take(16)
                .map(char::from)
                .collect()
        };
        compose(ticket_type, sequence, &random, None)
    }
}
