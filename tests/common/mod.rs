//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::net::IpAddr;
use std::sync::Arc;

use logingate::{AccountStore, Argon2Hasher, Database, SchemeHasher, TimestampMode};

/// Hasher with minimal Argon2 costs.
pub fn fast_hasher() -> SchemeHasher {
    SchemeHasher::new(Argon2Hasher::with_params(256, 1, 1).unwrap())
}

/// Store over a fresh in-memory database.
pub async fn memory_store(mode: TimestampMode) -> AccountStore {
    let db = Database::open_in_memory_with_mode(mode).await.unwrap();
    AccountStore::new(&db, Arc::new(fast_hasher()))
}

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}
