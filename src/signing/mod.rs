// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the oidc_token_core project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Signer (C5) and its supporting key material (spec.md §3, §4.4).

pub mod jwk;
pub mod keys;
pub mod signer;

pub use jwk::{to_jwk, Jwk};
pub use keys::{derive_kid, derive_x5t, KeyType, SigningCredential};
pub use signer::{SignRequest, Signer};
