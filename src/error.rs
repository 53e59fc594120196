// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the oidc_token_core project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Error taxonomy for the token lifecycle core.
//!
//! Mirrors the error-handling discipline of spec.md §7: hook-originated
//! failures (`Rejected`, `InvalidRequest`) propagate to the caller as a hard
//! error, `MissingSubject` is the one default-path failure that is also a
//! hard error, and every other default-path failure (`SerializationFailed`)
//! is swallowed at the call site into a `None` result and only logged here.

use thiserror::Error;

/// Errors that can terminate a pipeline stage instead of producing a
/// credential, ticket, or logout response.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The id token pipeline could not find a `sub` or `NameIdentifier`
    /// claim after filtering. Raised as a hard failure per spec.md I2/§7:
    /// this is a programmer error, not a recoverable condition.
    #[error("id token issuance requires a `sub` or `NameIdentifier` claim")]
    MissingSubject,

    /// The logout pipeline's `Parse` stage rejected the HTTP shape of the
    /// request (wrong method, missing/invalid content-type).
    #[error("invalid logout request: {0}")]
    InvalidRequest(String),

    /// A hook (`Provider` method) rejected the operation. Carries the
    /// OAuth-style `error`/`error_description`/`error_uri` triple so the
    /// caller can surface it on the wire verbatim.
    #[error("rejected: {error}{}", description.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    Rejected {
        error: String,
        description: Option<String>,
        uri: Option<String>,
    },

    /// A `Provider` hook implementation itself returned an error (as
    /// opposed to classifying the context as `Rejected`). spec.md §7:
    /// "Hook exceptions propagate out (they indicate programmer error)."
    #[error("hook failed: {0}")]
    HookFailure(String),

    /// A signing credential's algorithm is incompatible with its key
    /// material, mirroring `JwtKeyConfig`'s algorithm/key-type checks.
    #[error("key configuration error: {0}")]
    KeyConfig(String),

    /// The underlying JWS library failed to sign or validate a token.
    #[error("JWS error: {0}")]
    Jws(#[from] jsonwebtoken::errors::Error),
}

impl CoreError {
    /// Build a `Rejected` error the way a `Provider` hook would populate an
    /// OAuth-style error context.
    pub fn rejected(error: impl Into<String>) -> Self {
        CoreError::Rejected {
            error: error.into(),
            description: None,
            uri: None,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
