// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the oidc_token_core project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! LogoutPipeline (C9): `Parse -> Extract -> Validate -> Handle -> Apply`
//! (spec.md §4.9).
//!
//! Grounded in the same hook-dispatch discipline as `issuer`/`receiver`, plus
//! the teacher's `oidc_auth::consent` request/response shape for query and
//! form-encoded parsing.

use url::form_urlencoded;

use crate::error::{CoreError, CoreResult};
use crate::hooks::{LogoutContext, Outcome, Provider};

/// Final disposition of a logout pipeline run. `redirect_to` is set only
/// when `post_logout_redirect_uri` was non-empty and no error preempted the
/// response (spec.md §4.9 `Apply`).
#[derive(Debug)]
pub struct LogoutResult {
    pub handled: bool,
    pub status: Option<u16>,
    pub redirect_to: Option<String>,
    pub error: Option<CoreError>,
}

impl LogoutResult {
    fn ok(handled: bool) -> Self {
        Self {
            handled,
            status: None,
            redirect_to: None,
            error: None,
        }
    }
}

pub struct LogoutPipeline<P: Provider> {
    provider: P,
    application_can_display_errors: bool,
}

impl<P: Provider> LogoutPipeline<P> {
    pub fn new(provider: P, application_can_display_errors: bool) -> Self {
        Self {
            provider,
            application_can_display_errors,
        }
    }

    /// Run the full state machine for one logout request.
    ///
    /// `method` is the HTTP method; `query` is the parsed query string for
    /// GET; `form_body` is the raw request body for POST along with its
    /// `content_type` header value.
    pub async fn run(
        &self,
        method: &str,
        query: Vec<(String, String)>,
        form_body: Option<(&str, String)>,
    ) -> CoreResult<LogoutResult> {
        let mut ctx = LogoutContext {
            method: method.to_string(),
            query,
            form_body: None,
            id_token_hint: None,
            post_logout_redirect_uri: None,
            state: None,
            response_params: Vec::new(),
        };

        match self.parse(method, &mut ctx, form_body) {
            Ok(()) => {}
            Err(err) => return self.apply(&mut ctx, Some(err)).await,
        }

        for stage in [Stage::Extract, Stage::Validate, Stage::Handle] {
            match self.dispatch_stage(stage, &mut ctx).await {
                Outcome::Handled(()) => return Ok(LogoutResult::ok(true)),
                Outcome::Skipped => return Ok(LogoutResult::ok(false)),
                Outcome::Rejected(err) => return self.apply(&mut ctx, Some(err)).await,
                Outcome::Default => continue,
            }
        }

        self.apply(&mut ctx, None).await
    }

    fn parse(
        &self,
        method: &str,
        ctx: &mut LogoutContext,
        form_body: Option<(&str, String)>,
    ) -> CoreResult<()> {
        match method.to_ascii_uppercase().as_str() {
            "GET" => {
                ctx.id_token_hint = find(&ctx.query, "id_token_hint");
                ctx.post_logout_redirect_uri = find(&ctx.query, "post_logout_redirect_uri");
                ctx.state = find(&ctx.query, "state");
                Ok(())
            }
            "POST" => {
                let (content_type, body) = form_body
                    .ok_or_else(|| CoreError::InvalidRequest("missing request body".into()))?;
                if !is_form_urlencoded(content_type) {
                    return Err(CoreError::InvalidRequest(format!(
                        "unsupported content-type: {content_type}"
                    )));
                }
                let parsed: Vec<(String, String)> = form_urlencoded::parse(body.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect();
                ctx.id_token_hint = find(&parsed, "id_token_hint");
                ctx.post_logout_redirect_uri = find(&parsed, "post_logout_redirect_uri");
                ctx.state = find(&parsed, "state");
                ctx.form_body = Some(body);
                Ok(())
            }
            other => Err(CoreError::InvalidRequest(format!(
                "unsupported HTTP method: {other}"
            ))),
        }
    }

    async fn dispatch_stage(&self, stage: Stage, ctx: &mut LogoutContext) -> Outcome<()> {
        match stage {
            Stage::Extract => self.provider.extract_logout_request(ctx).await,
            Stage::Validate => self.provider.validate_logout_request(ctx).await,
            Stage::Handle => self.provider.handle_logout_request(ctx).await,
        }
    }

    async fn apply(
        &self,
        ctx: &mut LogoutContext,
        error: Option<CoreError>,
    ) -> CoreResult<LogoutResult> {
        match self.provider.apply_logout_response(ctx).await {
            Outcome::Handled(()) => return Ok(LogoutResult::ok(true)),
            Outcome::Skipped => return Ok(LogoutResult::ok(false)),
            Outcome::Rejected(err) => {
                return Ok(LogoutResult {
                    handled: true,
                    status: Some(400),
                    redirect_to: None,
                    error: Some(err),
                })
            }
            Outcome::Default => {}
        }

        if let Some(error) = error {
            return Ok(LogoutResult {
                handled: !self.application_can_display_errors,
                status: Some(400),
                redirect_to: None,
                error: Some(error),
            });
        }

        let Some(redirect_base) = ctx.post_logout_redirect_uri.clone() else {
            return Ok(LogoutResult::ok(true));
        };

        let query: String = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(
                ctx.response_params
                    .iter()
                    .filter(|(key, _)| key != "post_logout_redirect_uri"),
            )
            .finish();

        let redirect_to = if query.is_empty() {
            redirect_base
        } else {
            let separator = if redirect_base.contains('?') { '&' } else { '?' };
            format!("{redirect_base}{separator}{query}")
        };

        Ok(LogoutResult {
            handled: true,
            status: None,
            redirect_to: Some(redirect_to),
            error: None,
        })
    }
}

enum Stage {
    Extract,
    Validate,
    Handle,
}

fn find(params: &[(String, String)], key: &str) -> Option<String> {
    params.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
}

/// `application/x-www-form-urlencoded`, case-insensitive, charset suffix
/// permitted (spec.md §4.9 `Parse`).
fn is_form_urlencoded(content_type: &str) -> bool {
    content_type
        .to_ascii_lowercase()
        .starts_with("application/x-www-form-urlencoded")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::DefaultProvider;

    #[tokio::test]
    async fn unknown_method_yields_invalid_request_and_no_redirect() {
        let pipeline = LogoutPipeline::new(DefaultProvider, false);
        let result = pipeline.run("PUT", vec![], None).await.unwrap();
        assert_eq!(result.status, Some(400));
        assert!(result.redirect_to.is_none());
        assert!(matches!(result.error, Some(CoreError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn get_without_redirect_uri_completes_without_redirect() {
        let pipeline = LogoutPipeline::new(DefaultProvider, false);
        let result = pipeline.run("GET", vec![], None).await.unwrap();
        assert!(result.handled);
        assert!(result.redirect_to.is_none());
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn get_with_redirect_uri_builds_query_without_redirect_param() {
        let pipeline = LogoutPipeline::new(DefaultProvider, false);
        let query = vec![(
            "post_logout_redirect_uri".to_string(),
            "https://client.example/logged-out".to_string(),
        )];
        let result = pipeline.run("GET", query, None).await.unwrap();
        assert_eq!(
            result.redirect_to.as_deref(),
            Some("https://client.example/logged-out")
        );
    }

    #[tokio::test]
    async fn post_requires_form_urlencoded_content_type() {
        let pipeline = LogoutPipeline::new(DefaultProvider, false);
        let result = pipeline
            .run("POST", vec![], Some(("application/json", "{}".into())))
            .await
            .unwrap();
        assert_eq!(result.status, Some(400));
        assert!(matches!(result.error, Some(CoreError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn post_form_urlencoded_with_charset_is_accepted() {
        let pipeline = LogoutPipeline::new(DefaultProvider, false);
        let body = "state=xyz".to_string();
        let result = pipeline
            .run(
                "POST",
                vec![],
                Some(("application/x-www-form-urlencoded; charset=utf-8", body)),
            )
            .await
            .unwrap();
        assert!(result.error.is_none());
    }
}
