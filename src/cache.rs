// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the oidc_token_core project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! SingleUseCache (C4): the TTL store backing authorization codes.
//!
//! spec.md I4 requires that a code be redeemable at most once across
//! concurrent receivers; §4.3 calls for an atomic `take` (get-and-remove)
//! rather than a `get` followed by a `remove`. `dashmap::DashMap` gives
//! per-shard locking with an atomic `remove`, the same role it plays for
//! session/registration maps in the gateway-shaped examples this crate's
//! dependency stack is drawn from.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

#[derive(Debug, Clone)]
struct CodeEntry {
    blob: Vec<u8>,
    expires_at: DateTime<Utc>,
}

/// `handle -> (blob, absolute_expiry)` map with atomic take semantics
/// (spec.md §4.3).
pub trait SingleUseCache: Send + Sync {
    /// Overwrite-allowed insert; any prior entry for `handle` is discarded.
    fn put(&self, handle: String, blob: Vec<u8>, expires_at: DateTime<Utc>);

    /// Atomic get-and-remove. Must not distinguish "never existed" from
    /// "expired" in its return value — both are `None` (spec.md §7
    /// `SingleUseViolation`).
    fn take(&self, handle: &str) -> Option<Vec<u8>>;

    /// Idempotent removal without reading the value.
    fn remove(&self, handle: &str);
}

/// Default in-memory `SingleUseCache`.
#[derive(Default)]
pub struct InMemorySingleUseCache {
    entries: DashMap<String, CodeEntry>,
}

impl InMemorySingleUseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry whose expiry has passed. Not required for
    /// correctness (expired entries are already treated as absent by
    /// `take`), but bounds memory for long-running hosts.
    pub fn sweep_expired(&self) {
        let now = Utc::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SingleUseCache for InMemorySingleUseCache {
    fn put(&self, handle: String, blob: Vec<u8>, expires_at: DateTime<Utc>) {
        self.entries.insert(handle, CodeEntry { blob, expires_at });
    }

    fn take(&self, handle: &str) -> Option<Vec<u8>> {
        let (_, entry) = self.entries.remove(handle)?;
        if entry.expires_at <= Utc::now() {
            return None;
        }
        Some(entry.blob)
    }

    fn remove(&self, handle: &str) {
        self.entries.remove(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn take_removes_entry_after_first_read() {
        let cache = InMemorySingleUseCache::new();
        cache.put("h1".into(), b"blob".to_vec(), Utc::now() + chrono::Duration::minutes(5));

        assert_eq!(cache.take("h1"), Some(b"blob".to_vec()));
        assert_eq!(cache.take("h1"), None);
    }

    #[test]
    fn take_on_expired_entry_returns_none() {
        let cache = InMemorySingleUseCache::new();
        cache.put(
            "h1".into(),
            b"blob".to_vec(),
            Utc::now() - chrono::Duration::seconds(1),
        );
        assert_eq!(cache.take("h1"), None);
    }

    #[test]
    fn remove_is_idempotent() {
        let cache = InMemorySingleUseCache::new();
        cache.remove("missing");
        cache.remove("missing");
    }

    #[test]
    fn concurrent_take_yields_exactly_one_winner() {
        let cache = Arc::new(InMemorySingleUseCache::new());
        cache.put(
            "code".into(),
            b"ticket".to_vec(),
            Utc::now() + chrono::Duration::minutes(5),
        );

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.take("code").is_some())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
    }
}
