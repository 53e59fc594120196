// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the oidc_token_core project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! DataFormat (C3): the symmetric opaque-blob codec behind authorization
//! codes, opaque access tokens, and refresh tokens.
//!
//! spec.md §1 treats the concrete content-protection primitive as an
//! external collaborator; §4.2 still asks for a pluggable default so the
//! crate builds end to end. The default here follows the same crate choice
//! as the gateway-shaped sibling in this codebase's dependency pack
//! (`chacha20poly1305`), the way `visualization::auth::jwt::keys` follows
//! `jsonwebtoken`/`rsa` for its concerns.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use log::warn;

/// `protect(bytes) -> string` / `unprotect(string) -> bytes | None`
/// (spec.md §4.2). `unprotect` must never throw in normal flow — any
/// failure (MAC mismatch, bad framing, wrong version) returns `None`.
pub trait DataFormat: Send + Sync {
    fn protect(&self, payload: &[u8]) -> String;
    fn unprotect(&self, blob: &str) -> Option<Vec<u8>>;
}

const FORMAT_VERSION: u8 = 1;

/// Default `DataFormat`: AEAD (ChaCha20-Poly1305) keyed from a server
/// secret, with a random 96-bit nonce per call, framed as
/// `version || nonce || ciphertext` and base64url-encoded.
pub struct AeadDataFormat {
    cipher: ChaCha20Poly1305,
}

impl AeadDataFormat {
    /// `key` must be exactly 32 bytes; derive it from server secrets
    /// (spec.md §4.2 "keyed from server secrets") before construction.
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
        }
    }

    /// Convenience constructor that stretches an arbitrary-length secret
    /// into a 32-byte key via SHA-256, for hosts that configure a single
    /// passphrase rather than raw key bytes.
    pub fn from_secret(secret: &[u8]) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(secret);
        let key: [u8; 32] = hasher.finalize().into();
        Self::new(&key)
    }
}

impl DataFormat for AeadDataFormat {
    fn protect(&self, payload: &[u8]) -> String {
        let nonce = ChaCha20Poly1305::generate_nonce(OsRng);
        // encrypt() only fails on buffer-length overflow, never on valid
        // inputs of the sizes this crate produces.
        let ciphertext = self
            .cipher
            .encrypt(&nonce, payload)
            .expect("AEAD encryption of a bounded ticket payload cannot fail");

        let mut framed = Vec::with_capacity(1 + nonce.len() + ciphertext.len());
        framed.push(FORMAT_VERSION);
        framed.extend_from_slice(&nonce);
        framed.extend_from_slice(&ciphertext);
        URL_SAFE_NO_PAD.encode(framed)
    }

    fn unprotect(&self, blob: &str) -> Option<Vec<u8>> {
        let framed = URL_SAFE_NO_PAD.decode(blob).ok()?;
        if framed.is_empty() || framed[0] != FORMAT_VERSION {
            warn!("opaque token has unsupported framing version or is malformed");
            return None;
        }
        let body = &framed[1..];
        if body.len() < 12 {
            return None;
        }
        let (nonce_bytes, ciphertext) = body.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);
        match self.cipher.decrypt(nonce, ciphertext) {
            Ok(plaintext) => Some(plaintext),
            Err(_) => {
                warn!("opaque token failed AEAD authentication");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format() -> AeadDataFormat {
        AeadDataFormat::new(&[7u8; 32])
    }

    #[test]
    fn round_trips_payload() {
        let format = format();
        let protected = format.protect(b"hello ticket");
        let recovered = format.unprotect(&protected).unwrap();
        assert_eq!(recovered, b"hello ticket");
    }

    #[test]
    fn rejects_tampered_blob() {
        let format = format();
        let mut protected = format.protect(b"hello ticket").into_bytes();
        // Flip a byte inside the base64url body; still decodes as base64,
        // but the ciphertext no longer authenticates.
        let last = protected.len() - 1;
        protected[last] = if protected[last] == b'A' { b'B' } else { b'A' };
        let protected = String::from_utf8(protected).unwrap();
        assert!(format.unprotect(&protected).is_none());
    }

    #[test]
    fn rejects_garbage() {
        let format = format();
        assert!(format.unprotect("not-base64url!!!").is_none());
    }

    #[test]
    fn different_keys_cannot_cross_read() {
        let a = AeadDataFormat::new(&[1u8; 32]);
        let b = AeadDataFormat::new(&[2u8; 32]);
        let protected = a.protect(b"secret");
        assert!(b.unprotect(&protected).is_none());
    }

    #[test]
    fn from_secret_derives_stable_key() {
        let a = AeadDataFormat::from_secret(b"a shared passphrase");
        let protected = a.protect(b"payload");
        assert_eq!(a.unprotect(&protected).unwrap(), b"payload");
    }
}
