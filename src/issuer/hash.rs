// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the oidc_token_core project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! `c_hash`/`at_hash` derivation (spec.md I5, §4.6 "Hash claim derivation",
//! OIDC Core §3.1.3.6).
//!
//! Kept as a pure function over a value and a JWS algorithm, the same
//! "identity-of-key decisions, not cryptography, belong in a pure function"
//! principle spec.md §9 applies to `kid`/`x5t` derivation in
//! `signing::keys`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::Algorithm;
use sha2::{Digest, Sha256, Sha384, Sha512};

/// `base64url(left_half(H(ascii(value))))` where `H` is the hash matched to
/// `alg` (SHA-256 for RS256/ES256/HS256; SHA-384/512 for the larger
/// variants). "Left half" is the first `len(H)/2` bytes.
pub fn left_half_hash(value: &str, alg: Algorithm) -> String {
    let digest: Vec<u8> = match alg {
        Algorithm::RS384 | Algorithm::ES384 | Algorithm::HS384 | Algorithm::PS384 => {
            Sha384::digest(value.as_bytes()).to_vec()
        }
        Algorithm::RS512 | Algorithm::ES512 | Algorithm::HS512 | Algorithm::PS512 => {
            Sha512::digest(value.as_bytes()).to_vec()
        }
        _ => Sha256::digest(value.as_bytes()).to_vec(),
    };
    let half = &digest[..digest.len() / 2];
    URL_SAFE_NO_PAD.encode(half)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_left_half_is_16_bytes_encoded() {
        let hash = left_half_hash("Mtr90mb20VpXcVFDDoBNSQ", Algorithm::RS256);
        let decoded = URL_SAFE_NO_PAD.decode(&hash).unwrap();
        assert_eq!(decoded.len(), 16);
    }

    #[test]
    fn same_input_same_algorithm_is_deterministic() {
        let a = left_half_hash("code-value", Algorithm::RS256);
        let b = left_half_hash("code-value", Algorithm::RS256);
        assert_eq!(a, b);
    }

    #[test]
    fn different_algorithms_yield_different_lengths() {
        let sha256 = left_half_hash("value", Algorithm::HS256);
        let sha512 = left_half_hash("value", Algorithm::HS512);
        let decoded_256 = URL_SAFE_NO_PAD.decode(&sha256).unwrap();
        let decoded_512 = URL_SAFE_NO_PAD.decode(&sha512).unwrap();
        assert_eq!(decoded_256.len(), 16);
        assert_eq!(decoded_512.len(), 32);
    }
}
