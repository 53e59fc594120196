// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the oidc_token_core project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Receiver (C8): the four redeem pipelines, mirror of C7 (spec.md §4.8).

use chrono::{DateTime, Utc};
use log::warn;
use serde_json::Value;

use crate::claims::{Claim, Identity};
use crate::config::{Config, LOG_TARGET};
use crate::error::CoreResult;
use crate::hooks::{Outcome, Provider, ReceiveContext};
use crate::ticket::{AuthProperties, Ticket};

/// Claim keys `aud`/`nbf`/`exp`/`iat`/`iss` are restored into
/// `AuthProperties`/request metadata rather than the identity's claim list —
/// they are protocol scaffolding, not user claims.
const RESERVED_CLAIMS: &[&str] = &["iss", "aud", "nbf", "exp", "iat"];

pub struct Receiver<P: Provider> {
    config: Config,
    provider: P,
}

impl<P: Provider> Receiver<P> {
    pub fn new(config: Config, provider: P) -> Self {
        Self { config, provider }
    }

    /// *Code*: look up in the `SingleUseCache`; absent → null. Present →
    /// atomic `take` (I4) then deserialize.
    pub async fn receive_authorization_code(
        &self,
        client_id: &str,
        code: &str,
    ) -> CoreResult<Option<Ticket>> {
        let default_fn = || -> CoreResult<Option<Ticket>> {
            let Some(blob) = self.config.cache.take(code) else {
                return Ok(None);
            };
            Ok(deserialize_opaque(&blob))
        };
        let ctx = ReceiveContext {
            client_id,
            handle: code,
            identity_hint: None,
            default: &default_fn,
        };
        match self.provider.receive_authorization_code(&ctx).await {
            Outcome::Handled(ticket) => Ok(Some(ticket)),
            Outcome::Skipped => Ok(None),
            Outcome::Rejected(err) => Err(err),
            Outcome::Default => default_fn(),
        }
    }

    /// *Access token*: JWS if a signer resolves (`config.signature_provider`
    /// or `config.jws_handlers.access_token`), else opaque.
    pub async fn receive_access_token(
        &self,
        client_id: &str,
        token: &str,
    ) -> CoreResult<Option<Ticket>> {
        let default_fn = || -> CoreResult<Option<Ticket>> {
            if let Some(signer) = self.config.resolve_signer(&self.config.jws_handlers.access_token) {
                Ok(deserialize_jws(&signer, &self.config.issuer, token))
            } else {
                Ok(self
                    .config
                    .data_formats
                    .access_token
                    .unprotect(token)
                    .and_then(|bytes| deserialize_opaque(&bytes)))
            }
        };
        let ctx = ReceiveContext {
            client_id,
            handle: token,
            identity_hint: None,
            default: &default_fn,
        };
        match self.provider.receive_access_token(&ctx).await {
            Outcome::Handled(ticket) => Ok(Some(ticket)),
            Outcome::Skipped => Ok(None),
            Outcome::Rejected(err) => Err(err),
            Outcome::Default => default_fn(),
        }
    }

    /// *Id token*: always JWS.
    pub async fn receive_identity_token(
        &self,
        client_id: &str,
        token: &str,
    ) -> CoreResult<Option<Ticket>> {
        let default_fn = || -> CoreResult<Option<Ticket>> {
            let Some(signer) = self.config.resolve_signer(&self.config.jws_handlers.identity_token) else {
                warn!(target: LOG_TARGET, "identity_token JWS handler is not configured");
                return Ok(None);
            };
            Ok(deserialize_jws(&signer, &self.config.issuer, token))
        };
        let ctx = ReceiveContext {
            client_id,
            handle: token,
            identity_hint: None,
            default: &default_fn,
        };
        match self.provider.receive_identity_token(&ctx).await {
            Outcome::Handled(ticket) => Ok(Some(ticket)),
            Outcome::Skipped => Ok(None),
            Outcome::Rejected(err) => Err(err),
            Outcome::Default => default_fn(),
        }
    }

    /// *Refresh token*: opaque, never touches the `SingleUseCache`.
    pub async fn receive_refresh_token(
        &self,
        client_id: &str,
        token: &str,
    ) -> CoreResult<Option<Ticket>> {
        let default_fn = || -> CoreResult<Option<Ticket>> {
            Ok(self
                .config
                .data_formats
                .refresh_token
                .unprotect(token)
                .and_then(|bytes| deserialize_opaque(&bytes)))
        };
        let ctx = ReceiveContext {
            client_id,
            handle: token,
            identity_hint: None,
            default: &default_fn,
        };
        match self.provider.receive_refresh_token(&ctx).await {
            Outcome::Handled(ticket) => Ok(Some(ticket)),
            Outcome::Skipped => Ok(None),
            Outcome::Rejected(err) => Err(err),
            Outcome::Default => default_fn(),
        }
    }
}

fn deserialize_opaque(blob: &[u8]) -> Option<Ticket> {
    Ticket::from_bytes(blob)
}

/// Validate a JWS and reconstruct a fresh `Ticket`: identity claims become
/// `Claim`s, `aud` populates `properties.audiences`, `nbf`/`exp` populate
/// `issued_at`/`expires_at` (spec.md §4.8 step 1 "JWS kinds"). Audience and
/// expiry are not *enforced* here — that is the caller's responsibility
/// (§4.8 step 4).
fn deserialize_jws(
    signer: &crate::signing::Signer,
    issuer: &str,
    token: &str,
) -> Option<Ticket> {
    let claims = match signer.validate(token, issuer) {
        Ok(claims) => claims,
        Err(err) => {
            warn!(target: LOG_TARGET, "token validation failed: {err}");
            return None;
        }
    };

    let mut properties = AuthProperties::new();
    let mut identity_claims = Vec::new();

    for (key, value) in claims {
        match key.as_str() {
            "aud" => properties.audiences = audiences_from_value(&value),
            "nbf" => properties.issued_at = timestamp_from_value(&value),
            "exp" => properties.expires_at = timestamp_from_value(&value),
            "iat" => {}
            "nonce" => {
                if let Value::String(s) = &value {
                    properties.nonce = Some(s.clone());
                }
            }
            _ if RESERVED_CLAIMS.contains(&key.as_str()) => {}
            _ => match value {
                Value::String(s) => identity_claims.push(Claim::new(key, s)),
                other => {
                    properties.extra.insert(key, other);
                }
            },
        }
    }

    Some(Ticket::new(Identity::new(identity_claims), properties))
}

fn audiences_from_value(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn timestamp_from_value(value: &Value) -> Option<DateTime<Utc>> {
    value.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0))
}
