// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the oidc_token_core project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Pure `SigningCredential -> Jwk` conversion.
//!
//! Grounded in `JwkKeySet::create_jwk_from_public_key` (RFC 7638 thumbprint
//! as `kid`, RFC 7517 JWK fields). JWKS *publication* (an HTTP endpoint) is
//! out of scope per spec.md §1; this function performs no I/O and exposes no
//! route, so a host assembling its own `/jwks` response can call it directly.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rsa::traits::PublicKeyParts;
use serde::Serialize;

use crate::signing::keys::{derive_kid, KeyType, SigningCredential};

/// RFC 7517 JSON Web Key, RSA public-key fields only — the shape a JWKS
/// endpoint needs for signature verification. EC/symmetric credentials
/// return `None` from `to_jwk` since this crate mints JWS for RSA-backed
/// `SigningCredential`s in its own test/default setup; hosts with EC keys
/// can extend this the same way.
#[derive(Debug, Clone, Serialize)]
pub struct Jwk {
    pub kty: &'static str,
    pub alg: String,
    #[serde(rename = "use")]
    pub use_: &'static str,
    pub kid: String,
    pub n: String,
    pub e: String,
}

/// Convert an RSA `SigningCredential`'s public key into a `Jwk`. Returns
/// `None` for non-RSA credentials.
pub fn to_jwk(credential: &SigningCredential, public_key: &rsa::RsaPublicKey) -> Option<Jwk> {
    if credential.key_type != KeyType::Rsa {
        return None;
    }
    let kid = derive_kid(credential)?;
    Some(Jwk {
        kty: "RSA",
        alg: format!("{:?}", credential.algorithm),
        use_: "sig",
        kid,
        n: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
        e: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
    })
}
