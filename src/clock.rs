// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the oidc_token_core project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! System clock abstraction.
//!
//! spec.md §6 lists `system_clock` as a recognized configuration option "for
//! test injection". The teacher's own token code (`JwtIssuer`, `TokenEntry`)
//! calls `chrono::Utc::now()` directly; this crate keeps the same `chrono`
//! vocabulary but routes every "now" read through a trait so tests can pin
//! time without sleeping.

use chrono::{DateTime, Utc};

/// Source of the current time for lifetime stamping (§4.6 step 1).
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Default clock backed by the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct UtcClock;

impl Clock for UtcClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_returns_pinned_instant() {
        let instant = Utc::now();
        let clock = FixedClock(instant);
        assert_eq!(clock.now(), instant);
    }

    #[test]
    fn utc_clock_advances() {
        let clock = UtcClock;
        let a = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let b = clock.now();
        assert!(b >= a);
    }
}
