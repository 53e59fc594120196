// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the oidc_token_core project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Token lifecycle core for an OpenID Connect / OAuth 2.0 authorization
//! server.
//!
//! This crate mints and re-hydrates the four credential kinds exchanged
//! between an authorization server and its relying parties — authorization
//! codes, access tokens, id tokens, and refresh tokens — plus the
//! logout-request pipeline that shares the same extension-point discipline.
//!
//! Out of scope: HTTP dispatch, discovery, JWKS publication, login UI,
//! client authentication, consent, and revocation. Those are external
//! collaborators; a host wires this crate's [`Issuer`](issuer::Issuer),
//! [`Receiver`](receiver::Receiver), and [`logout::LogoutPipeline`] behind
//! its own transport.
//!
//! Construction starts from [`config::Config`]; pipeline behavior is
//! customized by implementing [`hooks::Provider`].

pub mod cache;
pub mod claims;
pub mod clock;
pub mod config;
pub mod data_format;
pub mod error;
pub mod hooks;
pub mod issuer;
pub mod logout;
pub mod receiver;
pub mod signing;
pub mod ticket;

pub use cache::{InMemorySingleUseCache, SingleUseCache};
pub use claims::{Claim, CredentialKind, Identity};
pub use clock::{Clock, FixedClock, UtcClock};
pub use config::{Config, FixedSignatureProvider, SignatureProvider};
pub use data_format::{AeadDataFormat, DataFormat};
pub use error::{CoreError, CoreResult};
pub use hooks::{DefaultProvider, Outcome, Provider};
pub use issuer::{IssueParams, IssuedCredentialSet, Issuer, TokenResponseRequest};
pub use logout::{LogoutPipeline, LogoutResult};
pub use receiver::Receiver;
pub use signing::{SignRequest, Signer, SigningCredential};
pub use ticket::{AuthProperties, Ticket};
