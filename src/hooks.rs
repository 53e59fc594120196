// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the oidc_token_core project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! HookBus (C6): the Provider extension point and its outcome classification.
//!
//! spec.md §9 calls out the source's "boolean soup"
//! (`HandledResponse`/`Skipped`/`IsRejected` flags on a mutable context) and
//! asks for a single tagged enum instead. `Outcome<T>` is that enum; every
//! pipeline stage in `issuer`, `receiver`, and `logout` dispatches through
//! `Provider` and matches on it the same way.

use async_trait::async_trait;

use crate::claims::Identity;
use crate::error::{CoreError, CoreResult};
use crate::ticket::Ticket;

/// Four-way classification of a hook's effect on a pipeline stage (spec.md
/// §4.5). `T` is the default value the `Default` stage would have produced
/// (a credential string, a `Ticket`, or `()` for the logout stages that only
/// signal progression).
#[derive(Debug)]
pub enum Outcome<T> {
    /// Stage returns immediately with this caller-supplied value. No further
    /// stages run.
    Handled(T),
    /// Pipeline abandons; caller receives no result.
    Skipped,
    /// Synthesize an error response (logout) or propagate failure
    /// (issuance).
    Rejected(CoreError),
    /// None of the above; run default behavior.
    Default,
}

impl<T> Outcome<T> {
    pub fn is_default(&self) -> bool {
        matches!(self, Outcome::Default)
    }
}

/// Signature of the closure a hook can call to run this crate's own default
/// behavior for the stage it was invoked in (spec.md §6 "Provider interface":
/// "the default serializer/deserializer closure"). `IssueContext`'s default
/// mints a credential string; `ReceiveContext`'s default re-hydrates a
/// `Ticket`. Bounded `Sync` (not just `Send`) because `#[async_trait]` boxes
/// the `Provider` futures as `Send`, and any value borrowed across the
/// `.await` point — including this closure, reached through `&IssueContext` —
/// must itself be `Sync` for the future to remain `Send`.
pub type IssueDefault<'a> = dyn Fn() -> CoreResult<Option<String>> + Sync + 'a;
pub type ReceiveDefault<'a> = dyn Fn() -> CoreResult<Option<Ticket>> + Sync + 'a;

/// Context passed to `Create*` hooks (spec.md §4.6 step 3/4). `request_*`
/// fields mirror what the token endpoint would have parsed; `ticket` is the
/// already-lifetime-stamped, already-filtered identity/properties pair the
/// default serializer would consume.
///
/// `default` runs the exact pipeline `Outcome::Default` would have run,
/// including its side effects (e.g. the authorization-code cache write) — a
/// hook that wants to wrap, log, or augment the default credential calls
/// `(ctx.default)()` and returns `Outcome::Handled` with the (possibly
/// modified) result, rather than reimplementing serialization itself.
pub struct IssueContext<'a> {
    pub client_id: &'a str,
    pub grant_type: &'a str,
    pub ticket: &'a Ticket,
    /// Present only for the id-token stage once an authorization code and/or
    /// access token have been minted in the same turn (spec.md I5).
    pub response_code: Option<&'a str>,
    pub response_access_token: Option<&'a str>,
    pub request_nonce: Option<&'a str>,
    pub default: &'a IssueDefault<'a>,
}

/// Context passed to `Receive*` hooks (spec.md §4.8 step 1/2). `default`
/// mirrors `IssueContext::default`: it runs the same lookup/validate/
/// deserialize pipeline `Outcome::Default` would, cache `take` included for
/// authorization codes.
pub struct ReceiveContext<'a> {
    pub client_id: &'a str,
    pub handle: &'a str,
    pub identity_hint: Option<&'a Identity>,
    pub default: &'a ReceiveDefault<'a>,
}

/// Context passed to the four logout-pipeline hooks (spec.md §4.9).
#[derive(Debug, Clone, Default)]
pub struct LogoutContext {
    pub method: String,
    pub query: Vec<(String, String)>,
    pub form_body: Option<String>,
    pub id_token_hint: Option<String>,
    pub post_logout_redirect_uri: Option<String>,
    pub state: Option<String>,
    pub response_params: Vec<(String, String)>,
}

/// Host-supplied extension point, one method per pipeline stage (spec.md §6
/// "Provider interface"). Every method defaults to `Outcome::Default` so a
/// host can override only the stages it cares about.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn create_authorization_code(&self, _ctx: &IssueContext<'_>) -> Outcome<String> {
        Outcome::Default
    }
    async fn create_access_token(&self, _ctx: &IssueContext<'_>) -> Outcome<String> {
        Outcome::Default
    }
    async fn create_identity_token(&self, _ctx: &IssueContext<'_>) -> Outcome<String> {
        Outcome::Default
    }
    async fn create_refresh_token(&self, _ctx: &IssueContext<'_>) -> Outcome<String> {
        Outcome::Default
    }

    async fn receive_authorization_code(&self, _ctx: &ReceiveContext<'_>) -> Outcome<Ticket> {
        Outcome::Default
    }
    async fn receive_access_token(&self, _ctx: &ReceiveContext<'_>) -> Outcome<Ticket> {
        Outcome::Default
    }
    async fn receive_identity_token(&self, _ctx: &ReceiveContext<'_>) -> Outcome<Ticket> {
        Outcome::Default
    }
    async fn receive_refresh_token(&self, _ctx: &ReceiveContext<'_>) -> Outcome<Ticket> {
        Outcome::Default
    }

    async fn extract_logout_request(&self, _ctx: &mut LogoutContext) -> Outcome<()> {
        Outcome::Default
    }
    async fn validate_logout_request(&self, _ctx: &mut LogoutContext) -> Outcome<()> {
        Outcome::Default
    }
    async fn handle_logout_request(&self, _ctx: &mut LogoutContext) -> Outcome<()> {
        Outcome::Default
    }
    async fn apply_logout_response(&self, _ctx: &mut LogoutContext) -> Outcome<()> {
        Outcome::Default
    }
}

/// `Provider` that never overrides anything; every stage runs its default
/// behavior. Useful as a baseline for hosts and for this crate's own tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultProvider;

#[async_trait]
impl Provider for DefaultProvider {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_is_default_matches_only_default_variant() {
        assert!(Outcome::<String>::Default.is_default());
        assert!(!Outcome::<String>::Skipped.is_default());
        assert!(!Outcome::Handled(String::new()).is_default());
        assert!(!Outcome::<String>::Rejected(CoreError::rejected("x")).is_default());
    }

    #[tokio::test]
    async fn default_provider_returns_default_for_every_stage() {
        let provider = DefaultProvider;
        let identity = Identity::new(vec![]);
        let properties = crate::ticket::AuthProperties::new();
        let ticket = Ticket::new(identity, properties);
        let default: &IssueDefault = &|| Ok(None);
        let ctx = IssueContext {
            client_id: "c1",
            grant_type: "authorization_code",
            ticket: &ticket,
            response_code: None,
            response_access_token: None,
            request_nonce: None,
            default,
        };
        assert!(provider.create_access_token(&ctx).await.is_default());

        let mut logout_ctx = LogoutContext::default();
        assert!(provider
            .extract_logout_request(&mut logout_ctx)
            .await
            .is_default());
    }
}
