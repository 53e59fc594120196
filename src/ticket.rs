// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the oidc_token_core project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Ticket (C2): the immutable `(Identity, AuthProperties)` bundle that flows
//! through every issue/receive pipeline.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::claims::Identity;

/// Recognized and opaque properties carried alongside an `Identity`
/// (spec.md §3 "AuthProperties").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthProperties {
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Flows through the authorization code so the id token minted on
    /// redemption can restore it (invariant I6).
    pub nonce: Option<String>,
    /// Ordered list of audience URIs requested at issuance.
    pub resources: Vec<String>,
    /// Ordered list populated on receive from the token's `aud` claim(s).
    pub audiences: Vec<String>,
    /// Opaque user-defined entries, preserved verbatim across issue/receive.
    pub extra: HashMap<String, Value>,
}

impl AuthProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resources(mut self, resources: Vec<String>) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }
}

/// Immutable `(Identity, AuthProperties)` handle (spec.md §3 "Ticket").
/// Stages that need to mutate a ticket must deep-copy it first — see
/// `Ticket::with_identity` / `Ticket::with_properties`.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    identity: Identity,
    properties: AuthProperties,
}

impl Ticket {
    pub fn new(identity: Identity, properties: AuthProperties) -> Self {
        Self {
            identity,
            properties,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn properties(&self) -> &AuthProperties {
        &self.properties
    }

    /// Deep copy with a replaced identity (stage-boundary mutation, never
    /// in-place — spec.md §9 "Build a new immutable filtered identity rather
    /// than mutating in place").
    pub fn with_identity(&self, identity: Identity) -> Ticket {
        Ticket {
            identity,
            properties: self.properties.clone(),
        }
    }

    pub fn with_properties(&self, properties: AuthProperties) -> Ticket {
        Ticket {
            identity: self.identity.clone(),
            properties,
        }
    }
}

/// On-wire JSON shape of a `Ticket`, used by `DataFormat::protect` (opaque
/// handles) and by the authorization-code cache entry (spec.md §3
/// "CodeEntry").
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireTicket {
    identity: Identity,
    properties: AuthProperties,
}

impl Ticket {
    /// Serialize to the bytes a `DataFormat` or `SingleUseCache` stores.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&WireTicket {
            identity: self.identity.clone(),
            properties: self.properties.clone(),
        })
    }

    /// Inverse of `to_bytes`. Returns `None` on any malformed input, the
    /// same "never throws in normal flow" contract as `DataFormat::unprotect`.
    pub fn from_bytes(bytes: &[u8]) -> Option<Ticket> {
        let wire: WireTicket = serde_json::from_slice(bytes).ok()?;
        Some(Ticket {
            identity: wire.identity,
            properties: wire.properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::Claim;

    #[test]
    fn round_trips_through_bytes() {
        let identity = Identity::new(vec![Claim::new("sub", "alice")]);
        let properties = AuthProperties::new().with_nonce("n1");
        let ticket = Ticket::new(identity, properties);

        let bytes = ticket.to_bytes().unwrap();
        let restored = Ticket::from_bytes(&bytes).unwrap();

        assert_eq!(restored, ticket);
    }

    #[test]
    fn from_bytes_rejects_garbage() {
        assert!(Ticket::from_bytes(b"not json").is_none());
    }
}
