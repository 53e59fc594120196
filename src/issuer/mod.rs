// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the oidc_token_core project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Issuer (C7): the four issue pipelines sharing the common stage template
//! of spec.md §4.6.
//!
//! Grounded in `JwtIssuer::issue`/`refresh` (the teacher wraps the same
//! "stamp lifetime, filter claims, sign" sequence for every credential kind
//! behind one `Issuer` trait impl); this module generalizes that to four
//! explicit methods sharing private helpers, since this crate's kinds differ
//! in filter policy and serializer (opaque vs JWS) rather than only in
//! lifetime.

pub mod hash;

use std::collections::HashMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Duration;
use log::warn;
use rand::RngCore;
use serde_json::Value;

use crate::claims::CredentialKind;
use crate::config::{Config, LOG_TARGET};
use crate::error::{CoreError, CoreResult};
use crate::hooks::{IssueContext, Outcome, Provider};
use crate::signing::SignRequest;
use crate::ticket::Ticket;

/// Result of minting one or more credentials from the same `Ticket` in a
/// single token-endpoint turn, assembled by `Issuer::issue_token_response`.
/// Mirrors the teacher's `TokenEntry` (access_token, id_token, refresh_token)
/// but expressed in this crate's own opaque-or-JWS credential strings instead
/// of `oxide_auth::Grant`; not itself subject to any invariant beyond what
/// each constituent `issue_*` call already enforces.
#[derive(Debug, Clone, Default)]
pub struct IssuedCredentialSet {
    pub authorization_code: Option<String>,
    pub access_token: Option<String>,
    pub identity_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// Which credential kinds a single token-endpoint turn should mint, driving
/// `Issuer::issue_token_response` (spec.md §8 scenario 2 "Id token with
/// code").
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenResponseRequest {
    pub authorization_code: bool,
    pub access_token: bool,
    pub identity_token: bool,
    pub refresh_token: bool,
}

/// Extra parameters an issue call needs beyond the `Ticket` itself —
/// request-scoped values the common template threads into context
/// construction, hash-claim derivation, and audience shaping.
#[derive(Debug, Clone, Default)]
pub struct IssueParams<'a> {
    pub client_id: &'a str,
    pub grant_type: &'a str,
    pub request_resources: &'a [String],
    pub request_nonce: Option<&'a str>,
    pub response_code: Option<&'a str>,
    pub response_access_token: Option<&'a str>,
}

pub struct Issuer<P: Provider> {
    config: Config,
    provider: P,
}

impl<P: Provider> Issuer<P> {
    pub fn new(config: Config, provider: P) -> Self {
        Self { config, provider }
    }

    fn stamp_lifetimes(&self, ticket: &Ticket, default_lifetime: Duration) -> Ticket {
        let mut properties = ticket.properties().clone();
        let issued_at = properties.issued_at.unwrap_or_else(|| self.config.clock.now());
        properties.issued_at = Some(issued_at);
        properties.expires_at = Some(properties.expires_at.unwrap_or(issued_at + default_lifetime));
        ticket.with_properties(properties)
    }

    /// Filter the identity per `kind` (§4.1), normalize `sub` (I2), and drop
    /// duplicate `NameIdentifier` claims after substitution (I3). Id-token
    /// issuance hard-fails when neither `sub` nor `NameIdentifier` survives
    /// filtering; other kinds proceed with whatever `ensure_sub` managed.
    fn filter_identity(&self, ticket: &Ticket, kind: CredentialKind) -> CoreResult<Ticket> {
        let mut filtered = ticket.identity().filtered_for(kind);
        let has_subject = filtered.ensure_sub();
        if matches!(kind, CredentialKind::IdToken) && !has_subject {
            return Err(CoreError::MissingSubject);
        }
        filtered.dedupe_name_identifier();
        Ok(ticket.with_identity(filtered))
    }

    fn random_opaque_key(&self) -> String {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// *Code*: opaque, serializer uses `DataFormat`, result written to the
    /// `SingleUseCache` (§4.6 step 6) unless the hook produced its own
    /// handle.
    pub async fn issue_authorization_code(
        &self,
        ticket: &Ticket,
        params: &IssueParams<'_>,
    ) -> CoreResult<Option<String>> {
        let ticket = self.stamp_lifetimes(ticket, self.config.lifetimes.authorization_code);
        let ticket = self.filter_identity(&ticket, CredentialKind::Code)?;

        let default_fn = || -> CoreResult<Option<String>> {
            let handle = self.random_opaque_key();
            let Some(serialized) = serialize_opaque(&ticket) else {
                return Ok(None);
            };
            let expires_at = ticket
                .properties()
                .expires_at
                .expect("stamp_lifetimes always sets expires_at");
            self.config.cache.put(handle.clone(), serialized, expires_at);
            Ok(Some(handle))
        };

        let ctx = IssueContext {
            client_id: params.client_id,
            grant_type: params.grant_type,
            ticket: &ticket,
            response_code: None,
            response_access_token: None,
            request_nonce: None,
            default: &default_fn,
        };

        match self.provider.create_authorization_code(&ctx).await {
            Outcome::Handled(handle) => {
                if handle.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(handle))
                }
            }
            Outcome::Skipped => Ok(None),
            Outcome::Rejected(err) => Err(err),
            Outcome::Default => default_fn(),
        }
    }

    /// *Access token*: filter policy `token`; audience =
    /// `request_resources ∪ properties.resources`; JWS if a signer resolves
    /// (`config.signature_provider` or `config.jws_handlers.access_token`),
    /// else opaque.
    pub async fn issue_access_token(
        &self,
        ticket: &Ticket,
        params: &IssueParams<'_>,
    ) -> CoreResult<Option<String>> {
        let ticket = self.stamp_lifetimes(ticket, self.config.lifetimes.access_token);
        let ticket = self.filter_identity(&ticket, CredentialKind::Token)?;

        let default_fn = || -> CoreResult<Option<String>> {
            let audiences = union_audiences(params.request_resources, &ticket);
            if let Some(signer) = self.config.resolve_signer(&self.config.jws_handlers.access_token) {
                let issued_at = ticket
                    .properties()
                    .issued_at
                    .expect("stamp_lifetimes always sets issued_at");
                let expires_at = ticket
                    .properties()
                    .expires_at
                    .expect("stamp_lifetimes always sets expires_at");
                match signer.sign(SignRequest {
                    issuer: &self.config.issuer,
                    identity: ticket.identity(),
                    audiences: &audiences,
                    issued_at,
                    expires_at,
                    extra_claims: HashMap::new(),
                }) {
                    Ok(jws) => Ok(Some(jws)),
                    Err(err) => {
                        warn!(target: LOG_TARGET, "access token signing failed: {err}");
                        Ok(None)
                    }
                }
            } else {
                Ok(serialize_opaque(&ticket)
                    .map(|bytes| self.config.data_formats.access_token.protect(&bytes)))
            }
        };

        let ctx = IssueContext {
            client_id: params.client_id,
            grant_type: params.grant_type,
            ticket: &ticket,
            response_code: None,
            response_access_token: None,
            request_nonce: None,
            default: &default_fn,
        };

        match self.provider.create_access_token(&ctx).await {
            Outcome::Handled(handle) => Ok(non_empty(handle)),
            Outcome::Skipped => Ok(None),
            Outcome::Rejected(err) => Err(err),
            Outcome::Default => default_fn(),
        }
    }

    /// *Id token*: filter policy `id_token`; audience = `[client_id]`;
    /// always JWS. Adds `c_hash`/`at_hash`/`nonce` per I5/I6 before signing.
    pub async fn issue_identity_token(
        &self,
        ticket: &Ticket,
        params: &IssueParams<'_>,
    ) -> CoreResult<Option<String>> {
        let ticket = self.stamp_lifetimes(ticket, self.config.lifetimes.identity_token);
        let ticket = self.filter_identity(&ticket, CredentialKind::IdToken)?;

        let default_fn = || -> CoreResult<Option<String>> {
            let signer = self
                .config
                .resolve_signer(&self.config.jws_handlers.identity_token)
                .ok_or_else(|| {
                    CoreError::KeyConfig("identity_token JWS handler is not configured".into())
                })?;

            let mut extra_claims: HashMap<String, Value> = HashMap::new();
            if let Some(code) = params.response_code {
                extra_claims.insert(
                    "c_hash".into(),
                    Value::String(hash::left_half_hash(code, signer.active_algorithm())),
                );
            }
            if let Some(access_token) = params.response_access_token {
                extra_claims.insert(
                    "at_hash".into(),
                    Value::String(hash::left_half_hash(access_token, signer.active_algorithm())),
                );
            }
            let nonce = if params.grant_type == "authorization_code" {
                ticket.properties().nonce.clone()
            } else {
                params.request_nonce.map(str::to_string)
            };
            if let Some(nonce) = nonce {
                extra_claims.insert("nonce".into(), Value::String(nonce));
            }

            let issued_at = ticket
                .properties()
                .issued_at
                .expect("stamp_lifetimes always sets issued_at");
            let expires_at = ticket
                .properties()
                .expires_at
                .expect("stamp_lifetimes always sets expires_at");
            match signer.sign(SignRequest {
                issuer: &self.config.issuer,
                identity: ticket.identity(),
                audiences: &[params.client_id.to_string()],
                issued_at,
                expires_at,
                extra_claims,
            }) {
                Ok(jws) => Ok(Some(jws)),
                Err(err) => {
                    warn!(target: LOG_TARGET, "identity token signing failed: {err}");
                    Ok(None)
                }
            }
        };

        let ctx = IssueContext {
            client_id: params.client_id,
            grant_type: params.grant_type,
            ticket: &ticket,
            response_code: params.response_code,
            response_access_token: params.response_access_token,
            request_nonce: params.request_nonce,
            default: &default_fn,
        };

        match self.provider.create_identity_token(&ctx).await {
            Outcome::Handled(handle) => Ok(non_empty(handle)),
            Outcome::Skipped => Ok(None),
            Outcome::Rejected(err) => Err(err),
            Outcome::Default => default_fn(),
        }
    }

    /// *Refresh token*: opaque, same shape as a code, but never stored in
    /// the `SingleUseCache`.
    pub async fn issue_refresh_token(
        &self,
        ticket: &Ticket,
        params: &IssueParams<'_>,
    ) -> CoreResult<Option<String>> {
        let ticket = self.stamp_lifetimes(ticket, self.config.lifetimes.refresh_token);
        let ticket = self.filter_identity(&ticket, CredentialKind::Refresh)?;

        let default_fn = || -> CoreResult<Option<String>> {
            Ok(serialize_opaque(&ticket)
                .map(|bytes| self.config.data_formats.refresh_token.protect(&bytes)))
        };

        let ctx = IssueContext {
            client_id: params.client_id,
            grant_type: params.grant_type,
            ticket: &ticket,
            response_code: None,
            response_access_token: None,
            request_nonce: None,
            default: &default_fn,
        };

        match self.provider.create_refresh_token(&ctx).await {
            Outcome::Handled(handle) => Ok(non_empty(handle)),
            Outcome::Skipped => Ok(None),
            Outcome::Rejected(err) => Err(err),
            Outcome::Default => default_fn(),
        }
    }

    /// Drives some or all of the four issue pipelines against the same
    /// `Ticket` in a single token-endpoint turn and assembles the results
    /// into one `IssuedCredentialSet` (spec.md §8 scenario 2 "Id token with
    /// code"). When both an authorization code and/or an access token are
    /// requested alongside an id token, the freshly minted values are
    /// threaded into the id-token stage so its `c_hash`/`at_hash` claims
    /// (I5) are derived from what this same turn actually issued, not from
    /// whatever `params.response_code`/`response_access_token` already held.
    pub async fn issue_token_response(
        &self,
        ticket: &Ticket,
        params: &IssueParams<'_>,
        request: TokenResponseRequest,
    ) -> CoreResult<IssuedCredentialSet> {
        let mut result = IssuedCredentialSet::default();

        if request.authorization_code {
            result.authorization_code = self.issue_authorization_code(ticket, params).await?;
        }
        if request.access_token {
            result.access_token = self.issue_access_token(ticket, params).await?;
        }
        if request.identity_token {
            let mut id_token_params = params.clone();
            id_token_params.response_code = params.response_code.or(result.authorization_code.as_deref());
            id_token_params.response_access_token =
                params.response_access_token.or(result.access_token.as_deref());
            result.identity_token = self.issue_identity_token(ticket, &id_token_params).await?;
        }
        if request.refresh_token {
            result.refresh_token = self.issue_refresh_token(ticket, params).await?;
        }

        Ok(result)
    }
}

fn non_empty(handle: String) -> Option<String> {
    if handle.is_empty() {
        None
    } else {
        Some(handle)
    }
}

fn union_audiences(request_resources: &[String], ticket: &Ticket) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut audiences = Vec::new();
    for resource in request_resources.iter().chain(ticket.properties().resources.iter()) {
        if seen.insert(resource.clone()) {
            audiences.push(resource.clone());
        }
    }
    audiences
}

fn serialize_opaque(ticket: &Ticket) -> Option<Vec<u8>> {
    match ticket.to_bytes() {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            warn!(target: LOG_TARGET, "ticket serialization failed: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{Claim, Identity};
    use crate::clock::FixedClock;
    use crate::config::{Config, JwsHandlers};
    use crate::hooks::DefaultProvider;
    use crate::signing::{Signer, SigningCredential};
    use crate::ticket::AuthProperties;
    use chrono::Utc;
    use std::sync::Arc;

    fn issuer_with_signers() -> Issuer<DefaultProvider> {
        let clock = Arc::new(FixedClock(Utc::now()));
        let mut config = Config::opaque_only("https://issuer.example", &[3u8; 32]);
        config.clock = clock;
        let credential =
            SigningCredential::symmetric(b"0123456789abcdef0123456789abcdef", jsonwebtoken::Algorithm::HS256)
                .unwrap();
        let signer = Arc::new(Signer::new(vec![credential]).unwrap());
        config = config.with_jws_handlers(JwsHandlers {
            access_token: Some(Arc::clone(&signer)),
            identity_token: Some(signer),
        });
        Issuer::new(config, DefaultProvider)
    }

    fn alice_ticket() -> Ticket {
        Ticket::new(
            Identity::new(vec![Claim::new("sub", "alice")]),
            AuthProperties::new(),
        )
    }

    #[tokio::test]
    async fn issues_authorization_code_and_stores_in_cache() {
        let issuer = issuer_with_signers();
        let params = IssueParams {
            client_id: "client-1",
            grant_type: "authorization_code",
            ..Default::default()
        };
        let code = issuer
            .issue_authorization_code(&alice_ticket(), &params)
            .await
            .unwrap()
            .expect("code issued");
        assert!(!code.is_empty());
    }

    #[tokio::test]
    async fn id_token_without_subject_fails() {
        let issuer = issuer_with_signers();
        let ticket = Ticket::new(Identity::new(vec![]), AuthProperties::new());
        let params = IssueParams {
            client_id: "client-1",
            grant_type: "authorization_code",
            ..Default::default()
        };
        let err = issuer.issue_identity_token(&ticket, &params).await.unwrap_err();
        assert!(matches!(err, CoreError::MissingSubject));
    }

    #[tokio::test]
    async fn id_token_carries_c_hash_and_nonce() {
        let issuer = issuer_with_signers();
        let mut properties = AuthProperties::new();
        properties.nonce = Some("n1".into());
        let ticket = Ticket::new(Identity::new(vec![Claim::new("sub", "alice")]), properties);
        let params = IssueParams {
            client_id: "client-1",
            grant_type: "authorization_code",
            response_code: Some("the-code"),
            ..Default::default()
        };
        let jws = issuer
            .issue_identity_token(&ticket, &params)
            .await
            .unwrap()
            .expect("id token issued");

        let signer = issuer.config.jws_handlers.identity_token.clone().unwrap();
        let claims = signer.validate(&jws, "https://issuer.example").unwrap();
        assert!(claims.contains_key("c_hash"));
        assert_eq!(claims.get("nonce").unwrap(), "n1");
    }

    #[tokio::test]
    async fn access_token_audience_unions_request_and_property_resources() {
        let issuer = issuer_with_signers();
        let mut properties = AuthProperties::new();
        properties.resources = vec!["urn:resource:a".into()];
        let ticket = Ticket::new(Identity::new(vec![Claim::new("sub", "alice")]), properties);
        let request_resources = vec!["urn:resource:b".into()];
        let params = IssueParams {
            client_id: "client-1",
            grant_type: "authorization_code",
            request_resources: &request_resources,
            ..Default::default()
        };
        let jws = issuer
            .issue_access_token(&ticket, &params)
            .await
            .unwrap()
            .expect("access token issued");

        let signer = issuer.config.jws_handlers.access_token.clone().unwrap();
        let claims = signer.validate(&jws, "https://issuer.example").unwrap();
        assert_eq!(
            claims.get("aud").unwrap(),
            &serde_json::json!(["urn:resource:b", "urn:resource:a"])
        );
    }

    #[tokio::test]
    async fn token_response_threads_minted_code_and_access_token_into_id_token_hashes() {
        let issuer = issuer_with_signers();
        let params = IssueParams {
            client_id: "client-1",
            grant_type: "authorization_code",
            ..Default::default()
        };
        let request = TokenResponseRequest {
            authorization_code: true,
            access_token: true,
            identity_token: true,
            refresh_token: true,
        };
        let set = issuer
            .issue_token_response(&alice_ticket(), &params, request)
            .await
            .unwrap();

        let code = set.authorization_code.expect("code minted");
        let access_token = set.access_token.expect("access token minted");
        let id_token = set.identity_token.expect("id token minted");
        assert!(set.refresh_token.is_some());

        let signer = issuer.config.jws_handlers.identity_token.clone().unwrap();
        let claims = signer.validate(&id_token, "https://issuer.example").unwrap();
        assert_eq!(
            claims.get("c_hash").unwrap(),
            &serde_json::json!(hash::left_half_hash(&code, signer.active_algorithm()))
        );
        assert_eq!(
            claims.get("at_hash").unwrap(),
            &serde_json::json!(hash::left_half_hash(&access_token, signer.active_algorithm()))
        );
    }

    #[tokio::test]
    async fn token_response_skips_kinds_not_requested() {
        let issuer = issuer_with_signers();
        let params = IssueParams {
            client_id: "client-1",
            grant_type: "authorization_code",
            ..Default::default()
        };
        let request = TokenResponseRequest {
            authorization_code: true,
            ..Default::default()
        };
        let set = issuer
            .issue_token_response(&alice_ticket(), &params, request)
            .await
            .unwrap();
        assert!(set.authorization_code.is_some());
        assert!(set.access_token.is_none());
        assert!(set.identity_token.is_none());
        assert!(set.refresh_token.is_none());
    }
}
