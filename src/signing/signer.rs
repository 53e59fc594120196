// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the oidc_token_core project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Signer (C5): issues and validates self-contained (JWS) credentials.
//!
//! Grounded in `JwtIssuer` (`visualization::auth::jwt::issuer`), which wraps
//! an ordered notion of "the" signing key and exposes `with_algorithm`,
//! `with_issuer`, `valid_for` builder methods. This crate generalizes that
//! single-key model to the ordered `Vec<SigningCredential>` spec.md §4.4
//! asks for: the first entry signs, and any entry may validate (so key
//! rotation can accept tokens signed under a credential that is no longer
//! primary).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Header, Validation};
use serde_json::{Map, Value};

use crate::claims::Identity;
use crate::error::{CoreError, CoreResult};
use crate::signing::keys::{derive_kid, derive_x5t, SigningCredential};

/// Inputs to a single JWS issuance (spec.md §4.4 "build claims map").
pub struct SignRequest<'a> {
    pub issuer: &'a str,
    pub identity: &'a Identity,
    pub audiences: &'a [String],
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Extra top-level claims to merge in verbatim (e.g. `c_hash`, `at_hash`,
    /// `nonce`) — spec.md §4.6 hash-linking claims.
    pub extra_claims: HashMap<String, Value>,
}

/// Ordered collection of signing credentials. `credentials()[0]` is active
/// for issuance (spec.md §4.4 "the first credential is the active signer");
/// `validate` tries every credential whose `kid`/algorithm could plausibly
/// match, so a token signed under a rotated-out key remains verifiable.
pub struct Signer {
    credentials: Vec<SigningCredential>,
}

impl Signer {
    pub fn new(credentials: Vec<SigningCredential>) -> CoreResult<Self> {
        if credentials.is_empty() {
            return Err(CoreError::KeyConfig(
                "a Signer requires at least one SigningCredential".into(),
            ));
        }
        Ok(Self { credentials })
    }

    fn active(&self) -> &SigningCredential {
        &self.credentials[0]
    }

    /// Algorithm of the active (first) signing credential, needed by
    /// callers that must match a hash function to the JWS alg before
    /// signing (spec.md §4.6 "Hash claim derivation").
    pub fn active_algorithm(&self) -> jsonwebtoken::Algorithm {
        self.active().algorithm
    }

    /// Build and sign a JWS for the given request. Audience shaping follows
    /// spec.md §4.4: a single audience is emitted as a bare string, more
    /// than one as a JSON array — mirroring how most `aud` consumers expect
    /// the common case to look, while `jsonwebtoken`'s own `Claims` struct
    /// only has a fixed-shape serializer for this field.
    pub fn sign(&self, request: SignRequest<'_>) -> CoreResult<String> {
        let credential = self.active();

        let mut header = Header::new(credential.algorithm);
        header.kid = derive_kid(credential);
        header.x5t = derive_x5t(credential);

        let mut claims = Map::new();
        claims.insert("iss".into(), Value::String(request.issuer.to_string()));
        claims.insert(
            "nbf".into(),
            Value::Number(request.issued_at.timestamp().into()),
        );
        claims.insert(
            "iat".into(),
            Value::Number(request.issued_at.timestamp().into()),
        );
        claims.insert(
            "exp".into(),
            Value::Number(request.expires_at.timestamp().into()),
        );
        claims.insert("aud".into(), shape_audience(request.audiences));

        for claim in &request.identity.claims {
            claims.insert(claim.claim_type.clone(), Value::String(claim.value.clone()));
        }
        for (key, value) in request.extra_claims {
            claims.insert(key, value);
        }

        Ok(encode(&header, &Value::Object(claims), &credential.encoding_key)?)
    }

    /// Verify a JWS and return its claim map. Checks signature and `iss`
    /// only; audience and lifetime (`exp`/`nbf`) are deliberately left
    /// unenforced here — `receive_*` pipelines extract `ValidFrom`/`ValidTo`
    /// from the claim map and leave enforcement to the caller (spec.md
    /// §4.4: "checks issuer match, skips audience and lifetime checks —
    /// those are the caller's responsibility").
    pub fn validate(&self, token: &str, expected_issuer: &str) -> CoreResult<Map<String, Value>> {
        let mut validation = Validation::new(self.active().algorithm);
        validation.validate_aud = false;
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.set_issuer(&[expected_issuer]);

        let mut last_err: Option<jsonwebtoken::errors::Error> = None;
        for credential in &self.credentials {
            if credential.algorithm != self.active().algorithm {
                continue;
            }
            match decode::<Map<String, Value>>(token, &credential.decoding_key, &validation) {
                Ok(data) => return Ok(data.claims),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err
            .map(CoreError::from)
            .unwrap_or_else(|| CoreError::KeyConfig("no signing credential configured".into())))
    }
}

fn shape_audience(audiences: &[String]) -> Value {
    match audiences {
        [] => Value::Array(vec![]),
        [single] => Value::String(single.clone()),
        many => Value::Array(many.iter().cloned().map(Value::String).collect()),
    }
}
