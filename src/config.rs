// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the oidc_token_core project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Config (C10): aggregates the configuration surface of spec.md §6 into one
//! struct, the way `OxideState::from_config(&Config)` aggregates OAuth/JWT
//! settings into a single ready-to-use server state in the teacher project.

use std::sync::Arc;

use chrono::Duration;

use crate::cache::{InMemorySingleUseCache, SingleUseCache};
use crate::clock::{Clock, UtcClock};
use crate::data_format::{AeadDataFormat, DataFormat};
use crate::signing::Signer;

/// Per-kind credential lifetimes (spec.md §4.7).
#[derive(Clone)]
pub struct Lifetimes {
    pub authorization_code: Duration,
    pub access_token: Duration,
    pub identity_token: Duration,
    pub refresh_token: Duration,
}

impl Default for Lifetimes {
    fn default() -> Self {
        Self {
            authorization_code: Duration::minutes(5),
            access_token: Duration::hours(1),
            identity_token: Duration::hours(1),
            refresh_token: Duration::days(30),
        }
    }
}

/// The three opaque `DataFormat` slots a host can configure independently
/// (spec.md §6 "Configuration surface"). Id tokens have no slot here — they
/// are always JWS per §4.6.
pub struct DataFormats {
    pub authorization_code: Arc<dyn DataFormat>,
    pub access_token: Arc<dyn DataFormat>,
    pub refresh_token: Arc<dyn DataFormat>,
}

impl DataFormats {
    /// All three kinds keyed from the same 32-byte secret, for hosts that
    /// don't need per-kind key separation.
    pub fn shared_secret(key: &[u8; 32]) -> Self {
        let format: Arc<dyn DataFormat> = Arc::new(AeadDataFormat::new(key));
        Self {
            authorization_code: Arc::clone(&format),
            access_token: Arc::clone(&format),
            refresh_token: format,
        }
    }
}

/// Whether a self-contained credential kind is minted as a JWS or left
/// opaque. `None` means "opaque" (spec.md §6 "null = opaque / disabled").
#[derive(Default)]
pub struct JwsHandlers {
    pub access_token: Option<Arc<Signer>>,
    pub identity_token: Option<Arc<Signer>>,
}

/// spec.md §6 "signature_provider": a pluggable resolver for "the current
/// signer", re-invoked on every sign/validate call instead of being fixed at
/// `Config` construction the way `jws_handlers` is. This is the dynamic
/// counterpart to the static `signing_credentials` list — spec.md §5 notes
/// that key rotation, if wanted, is "implemented by replacing the list
/// atomically"; a `SignatureProvider` is how a host performs that swap
/// transparently to `Issuer`/`Receiver`, mirroring the way
/// `OxideState::from_config` lets the teacher project take its JWT key
/// material from more than one source.
pub trait SignatureProvider: Send + Sync {
    fn current_signer(&self) -> Arc<Signer>;
}

/// `SignatureProvider` that always answers the same `Signer`. Lets a host (or
/// a test) go through the dynamic resolution path without implementing real
/// rotation.
pub struct FixedSignatureProvider(pub Arc<Signer>);

impl SignatureProvider for FixedSignatureProvider {
    fn current_signer(&self) -> Arc<Signer> {
        Arc::clone(&self.0)
    }
}

/// Aggregate configuration handed to `Issuer`, `Receiver`, and
/// `LogoutPipeline` at construction (spec.md §4.10/§6).
pub struct Config {
    pub issuer: String,
    pub lifetimes: Lifetimes,
    pub data_formats: DataFormats,
    pub jws_handlers: JwsHandlers,
    /// When set, takes priority over `jws_handlers` for both access and id
    /// token sign/validate calls (spec.md §6 `signature_provider`). `None`
    /// (the default) means "use the static signer(s) in `jws_handlers`".
    pub signature_provider: Option<Arc<dyn SignatureProvider>>,
    pub clock: Arc<dyn Clock>,
    pub cache: Arc<dyn SingleUseCache>,
    pub application_can_display_errors: bool,
}

/// Logging target every call site in this crate uses, so hosts can
/// filter/route this crate's messages independently of their own.
pub const LOG_TARGET: &str = "oidc_token_core";

impl Config {
    /// Minimal config: opaque code/access/refresh tokens keyed from
    /// `shared_secret`, no JWS handlers, in-memory cache, system clock.
    /// Hosts that want id/access tokens as JWS must set `jws_handlers`
    /// after construction.
    pub fn opaque_only(issuer: impl Into<String>, shared_secret: &[u8; 32]) -> Self {
        Self {
            issuer: issuer.into(),
            lifetimes: Lifetimes::default(),
            data_formats: DataFormats::shared_secret(shared_secret),
            jws_handlers: JwsHandlers::default(),
            signature_provider: None,
            clock: Arc::new(UtcClock),
            cache: Arc::new(InMemorySingleUseCache::new()),
            application_can_display_errors: false,
        }
    }

    pub fn with_jws_handlers(mut self, handlers: JwsHandlers) -> Self {
        self.jws_handlers = handlers;
        self
    }

    pub fn with_signature_provider(mut self, provider: Arc<dyn SignatureProvider>) -> Self {
        self.signature_provider = Some(provider);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn SingleUseCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Resolve "the" signer for a stage: `signature_provider` wins when set
    /// (re-invoked every call, spec.md §6 `signature_provider`), otherwise
    /// the static handler configured on `jws_handlers`.
    pub fn resolve_signer(&self, static_handler: &Option<Arc<Signer>>) -> Option<Arc<Signer>> {
        match &self.signature_provider {
            Some(provider) => Some(provider.current_signer()),
            None => static_handler.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_only_config_has_no_jws_handlers() {
        let config = Config::opaque_only("https://issuer.example", &[9u8; 32]);
        assert!(config.jws_handlers.access_token.is_none());
        assert!(config.jws_handlers.identity_token.is_none());
        assert_eq!(config.lifetimes.access_token, Duration::hours(1));
    }

    #[test]
    fn signature_provider_overrides_static_jws_handler() {
        use crate::signing::SigningCredential;

        let static_signer = Arc::new(
            Signer::new(vec![SigningCredential::symmetric(
                b"static-secret-aaaaaaaaaaaaaaaaaa",
                jsonwebtoken::Algorithm::HS256,
            )
            .unwrap()])
            .unwrap(),
        );
        let dynamic_signer = Arc::new(
            Signer::new(vec![SigningCredential::symmetric(
                b"dynamic-secret-bbbbbbbbbbbbbbbbb",
                jsonwebtoken::Algorithm::HS256,
            )
            .unwrap()])
            .unwrap(),
        );

        let config = Config::opaque_only("https://issuer.example", &[9u8; 32])
            .with_signature_provider(Arc::new(FixedSignatureProvider(Arc::clone(&dynamic_signer))));

        let resolved = config
            .resolve_signer(&Some(static_signer))
            .expect("signature_provider always resolves");
        assert!(std::ptr::eq(resolved.as_ref(), dynamic_signer.as_ref()));
    }

    #[test]
    fn no_signature_provider_falls_back_to_static_handler() {
        use crate::signing::SigningCredential;

        let static_signer = Arc::new(
            Signer::new(vec![SigningCredential::symmetric(
                b"static-secret-aaaaaaaaaaaaaaaaaa",
                jsonwebtoken::Algorithm::HS256,
            )
            .unwrap()])
            .unwrap(),
        );
        let config = Config::opaque_only("https://issuer.example", &[9u8; 32]);
        let resolved = config.resolve_signer(&Some(Arc::clone(&static_signer)));
        assert!(std::ptr::eq(
            resolved.unwrap().as_ref(),
            static_signer.as_ref()
        ));
    }
}
