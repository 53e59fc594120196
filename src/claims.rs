// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the oidc_token_core project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Claims & Destinations (C1).
//!
//! A claim carries a destination set naming which credential kinds may
//! include it (spec.md §3, §4.1). `NameIdentifier` and `sub` are exempt from
//! filtering — they survive every filter regardless of destination.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Well-known claim type naming the end-user subject. Exempt from filtering
/// (spec.md §3 "NameIdentifier and sub are exempt").
pub const NAME_IDENTIFIER: &str = "NameIdentifier";
/// Standard OIDC/JWT subject claim. Also exempt.
pub const SUB: &str = "sub";

/// The four credential kinds a claim's destination set may name.
pub const DEST_TOKEN: &str = "token";
pub const DEST_ID_TOKEN: &str = "id_token";

/// A single claim: a typed value with an optional destination restriction.
///
/// A claim without a destination set is "unscoped" and is excluded from
/// every self-contained (JWS) credential unless it is `NameIdentifier`/`sub`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub claim_type: String,
    pub value: String,
    pub destinations: HashSet<String>,
}

impl Claim {
    /// Construct an unscoped claim (no destinations).
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
            destinations: HashSet::new(),
        }
    }

    /// Construct a claim restricted to the given destinations.
    pub fn with_destinations<I, S>(
        claim_type: impl Into<String>,
        value: impl Into<String>,
        destinations: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
            destinations: destinations.into_iter().map(Into::into).collect(),
        }
    }

    /// `has_destination(claim, tag)` from spec.md §4.1.
    pub fn has_destination(&self, tag: &str) -> bool {
        self.destinations.contains(tag)
    }

    fn is_exempt(&self) -> bool {
        self.claim_type == NAME_IDENTIFIER || self.claim_type == SUB
    }
}

/// The four credential kinds that drive the filter policy of §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    Code,
    Token,
    IdToken,
    Refresh,
}

impl CredentialKind {
    /// Filter predicate for this kind, spec.md §4.1:
    /// - `Code`/`Refresh`: identity function (opaque credentials carry the
    ///   full identity).
    /// - `Token`: keep iff exempt, or `has_destination(claim, "token")`.
    /// - `IdToken`: keep iff exempt, or `has_destination(claim, "id_token")`.
    pub fn keep(&self, claim: &Claim) -> bool {
        match self {
            CredentialKind::Code | CredentialKind::Refresh => true,
            CredentialKind::Token => claim.is_exempt() || claim.has_destination(DEST_TOKEN),
            CredentialKind::IdToken => claim.is_exempt() || claim.has_destination(DEST_ID_TOKEN),
        }
    }
}

/// Ordered multiset of claims plus an optional actor chain for delegated
/// identities (spec.md §3 "Identity").
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Identity {
    pub claims: Vec<Claim>,
    pub actor: Option<Box<Identity>>,
}

impl Identity {
    pub fn new(claims: Vec<Claim>) -> Self {
        Self {
            claims,
            actor: None,
        }
    }

    pub fn with_actor(mut self, actor: Identity) -> Self {
        self.actor = Some(Box::new(actor));
        self
    }

    /// First claim of the given type, if any.
    pub fn find(&self, claim_type: &str) -> Option<&Claim> {
        self.claims.iter().find(|c| c.claim_type == claim_type)
    }

    pub fn has(&self, claim_type: &str) -> bool {
        self.find(claim_type).is_some()
    }

    /// Deep clone that applies `predicate` to each claim in this identity
    /// *and* recursively to every actor in its delegation chain (spec.md §3
    /// "Must support clone-with-filter").
    pub fn clone_with_filter(&self, predicate: &impl Fn(&Claim) -> bool) -> Identity {
        Identity {
            claims: self
                .claims
                .iter()
                .filter(|c| predicate(c))
                .cloned()
                .collect(),
            actor: self
                .actor
                .as_ref()
                .map(|a| Box::new(a.clone_with_filter(predicate))),
        }
    }

    /// Apply a `CredentialKind`'s filter policy (§4.1), recursing into the
    /// actor chain.
    pub fn filtered_for(&self, kind: CredentialKind) -> Identity {
        self.clone_with_filter(&|claim| kind.keep(claim))
    }

    /// Remove every `NameIdentifier` claim after the first (invariant I3:
    /// "Filtered identities contain no duplicate NameIdentifier claims").
    /// Applied *after* `sub` substitution, never before.
    pub fn dedupe_name_identifier(&mut self) {
        let mut seen = false;
        self.claims.retain(|c| {
            if c.claim_type == NAME_IDENTIFIER {
                if seen {
                    return false;
                }
                seen = true;
            }
            true
        });
        if let Some(actor) = self.actor.as_mut() {
            actor.dedupe_name_identifier();
        }
    }

    /// Invariant I2: ensure `sub` is present, substituting from
    /// `NameIdentifier` if missing. Returns `false` if neither is present.
    pub fn ensure_sub(&mut self) -> bool {
        if self.has(SUB) {
            return true;
        }
        if let Some(name_id) = self.find(NAME_IDENTIFIER).map(|c| c.value.clone()) {
            self.claims.push(Claim::new(SUB, name_id));
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_identity() -> Identity {
        Identity::new(vec![
            Claim::new(SUB, "bob"),
            Claim::with_destinations("email", "b@x", ["id_token"]),
            Claim::with_destinations("role", "admin", ["token"]),
        ])
    }

    #[test]
    fn token_filter_keeps_sub_and_token_scoped_claims() {
        let identity = sample_identity();
        let filtered = identity.filtered_for(CredentialKind::Token);
        assert!(filtered.has(SUB));
        assert!(filtered.has("role"));
        assert!(!filtered.has("email"));
    }

    #[test]
    fn id_token_filter_keeps_sub_and_id_token_scoped_claims() {
        let identity = sample_identity();
        let filtered = identity.filtered_for(CredentialKind::IdToken);
        assert!(filtered.has(SUB));
        assert!(filtered.has("email"));
        assert!(!filtered.has("role"));
    }

    #[test]
    fn code_and_refresh_are_identity_functions() {
        let identity = sample_identity();
        let code = identity.filtered_for(CredentialKind::Code);
        let refresh = identity.filtered_for(CredentialKind::Refresh);
        assert_eq!(code.claims.len(), identity.claims.len());
        assert_eq!(refresh.claims.len(), identity.claims.len());
    }

    #[test]
    fn filter_recurses_into_actor_chain() {
        let delegate = Identity::new(vec![
            Claim::new(SUB, "delegate"),
            Claim::with_destinations("secret", "x", ["token"]),
        ]);
        let identity = sample_identity().with_actor(delegate);
        let filtered = identity.filtered_for(CredentialKind::IdToken);
        let actor = filtered.actor.expect("actor preserved");
        assert!(actor.has(SUB));
        assert!(!actor.has("secret"));
    }

    #[test]
    fn dedupe_keeps_first_name_identifier_only() {
        let mut identity = Identity::new(vec![
            Claim::new(NAME_IDENTIFIER, "first"),
            Claim::new(NAME_IDENTIFIER, "second"),
        ]);
        identity.dedupe_name_identifier();
        let remaining: Vec<_> = identity
            .claims
            .iter()
            .filter(|c| c.claim_type == NAME_IDENTIFIER)
            .collect();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].value, "first");
    }

    #[test]
    fn ensure_sub_substitutes_from_name_identifier() {
        let mut identity = Identity::new(vec![Claim::new(NAME_IDENTIFIER, "alice")]);
        assert!(identity.ensure_sub());
        assert_eq!(identity.find(SUB).unwrap().value, "alice");
    }

    #[test]
    fn ensure_sub_fails_when_neither_claim_present() {
        let mut identity = Identity::new(vec![Claim::new("role", "admin")]);
        assert!(!identity.ensure_sub());
    }
}
