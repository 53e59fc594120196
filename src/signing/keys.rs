// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the oidc_token_core project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Signing credential configuration and pure `kid`/`x5t` derivation.
//!
//! Grounded in `visualization::auth::jwt::keys::JwtKeyConfig` (symmetric/RSA/EC
//! key loading with algorithm validation) and `JwkKeySet::create_jwk_from_public_key`
//! (RFC 7638 JWK thumbprint as `kid`). spec.md §9 calls out key-identity
//! derivation as "not cryptography" and asks for it to live in a pure
//! function over `SigningCredentials` — that's `derive_kid`/`derive_x5t`
//! below, independent of `Signer`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use sha1::{Digest as Sha1Digest, Sha1};

use crate::error::{CoreError, CoreResult};

/// Which family of key material backs a `SigningCredential`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Symmetric,
    Rsa,
    Ec,
}

/// One signing credential: algorithm, key material, and optional identity
/// metadata (explicit `kid`, X.509 certificate DER for `x5t`).
///
/// `Signer` holds these in priority order; the RSA modulus is kept alongside
/// the opaque `jsonwebtoken` keys because `kid` derivation (priority 3,
/// spec.md §4.4) needs to read it back out, which `EncodingKey`/`DecodingKey`
/// do not expose.
pub struct SigningCredential {
    pub algorithm: Algorithm,
    pub key_type: KeyType,
    pub encoding_key: EncodingKey,
    pub decoding_key: DecodingKey,
    /// Explicit `kid`, highest priority per spec.md §4.4 step 3.1.
    pub explicit_kid: Option<String>,
    /// DER-encoded X.509 certificate, if this credential is cert-bound.
    pub certificate_der: Option<Vec<u8>>,
    /// RSA public modulus, needed for priority-3 `kid` derivation. `None`
    /// for symmetric/EC credentials.
    rsa_modulus: Option<Vec<u8>>,
}

impl SigningCredential {
    pub fn symmetric(secret: &[u8], algorithm: Algorithm) -> CoreResult<Self> {
        match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {}
            other => {
                return Err(CoreError::KeyConfig(format!(
                    "{other:?} is not valid for a symmetric key"
                )))
            }
        }
        Ok(Self {
            algorithm,
            key_type: KeyType::Symmetric,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            explicit_kid: None,
            certificate_der: None,
            rsa_modulus: None,
        })
    }

    pub fn rsa_from_pem(
        private_key_pem: &[u8],
        public_key_pem: &[u8],
        algorithm: Algorithm,
    ) -> CoreResult<Self> {
        match algorithm {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => {}
            other => {
                return Err(CoreError::KeyConfig(format!(
                    "{other:?} is not valid for an RSA key"
                )))
            }
        }
        let public_key = RsaPublicKey::from_public_key_pem_lenient(public_key_pem)?;
        Ok(Self {
            algorithm,
            key_type: KeyType::Rsa,
            encoding_key: EncodingKey::from_rsa_pem(private_key_pem)?,
            decoding_key: DecodingKey::from_rsa_pem(public_key_pem)?,
            explicit_kid: None,
            certificate_der: None,
            rsa_modulus: Some(public_key.n().to_bytes_be()),
        })
    }

    pub fn ec_from_pem(
        private_key_pem: &[u8],
        public_key_pem: &[u8],
        algorithm: Algorithm,
    ) -> CoreResult<Self> {
        match algorithm {
            Algorithm::ES256 | Algorithm::ES384 => {}
            other => {
                return Err(CoreError::KeyConfig(format!(
                    "{other:?} is not valid for an EC key"
                )))
            }
        }
        Ok(Self {
            algorithm,
            key_type: KeyType::Ec,
            encoding_key: EncodingKey::from_ec_pem(private_key_pem)?,
            decoding_key: DecodingKey::from_ec_pem(public_key_pem)?,
            explicit_kid: None,
            certificate_der: None,
            rsa_modulus: None,
        })
    }

    pub fn with_explicit_kid(mut self, kid: impl Into<String>) -> Self {
        self.explicit_kid = Some(kid.into());
        self
    }

    pub fn with_certificate_der(mut self, der: Vec<u8>) -> Self {
        self.certificate_der = Some(der);
        self
    }
}

// `rsa`'s PEM decoding lives behind a couple of equivalent entry points
// across key encodings (PKCS#1 vs SPKI); try both so callers can hand us
// either common RSA public key PEM shape, mirroring the leniency
// `JwkKeySet::create_jwk_from_pem` already assumes of its inputs.
trait FromPublicKeyPemLenient: Sized {
    fn from_public_key_pem_lenient(pem: &[u8]) -> CoreResult<Self>;
}

impl FromPublicKeyPemLenient for RsaPublicKey {
    fn from_public_key_pem_lenient(pem: &[u8]) -> CoreResult<Self> {
        use rsa::pkcs1::DecodeRsaPublicKey;
        use rsa::pkcs8::DecodePublicKey;

        let text =
            std::str::from_utf8(pem).map_err(|e| CoreError::KeyConfig(e.to_string()))?;
        DecodeRsaPublicKey::from_pkcs1_pem(text)
            .or_else(|_| DecodePublicKey::from_public_key_pem(text))
            .map_err(|e| CoreError::KeyConfig(format!("invalid RSA public key PEM: {e}")))
    }
}

/// `x5t = base64url(sha1(cert_der))`, spec.md §4.4 step 3 / invariant P6.
pub fn derive_x5t(credential: &SigningCredential) -> Option<String> {
    let der = credential.certificate_der.as_ref()?;
    let mut hasher = Sha1::new();
    hasher.update(der);
    Some(URL_SAFE_NO_PAD.encode(hasher.finalize()))
}

/// `kid` priority chain (spec.md §4.4 step 3):
/// 1. explicit header value,
/// 2. certificate thumbprint (hex, uppercase) if a certificate is present,
/// 3. RSA modulus fingerprint: `base64url(modulus)` truncated to the first
///    40 characters, uppercased.
///
/// Returns `None` only when none of the three sources apply (symmetric or
/// EC key with no explicit kid and no certificate) — such a JWS is issued
/// without a `kid` header, which is valid per RFC 7515.
pub fn derive_kid(credential: &SigningCredential) -> Option<String> {
    if let Some(explicit) = &credential.explicit_kid {
        return Some(explicit.clone());
    }
    if let Some(der) = &credential.certificate_der {
        let mut hasher = Sha1::new();
        hasher.update(der);
        let hex: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect();
        return Some(hex);
    }
    if let Some(modulus) = &credential.rsa_modulus {
        let encoded = URL_SAFE_NO_PAD.encode(modulus);
        let truncated: String = encoded.chars().take(40).collect();
        return Some(truncated.to_uppercase());
    }
    None
}
