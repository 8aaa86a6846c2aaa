// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Clerk session-token authentication for the SSO gateway.
//!
//! ## Auth Flow
//!
//! 1. The browser signs in on the `/sso/login` virtual page; Clerk's SDK
//!    sets the `__session` cookie
//! 2. On the next request the SSO middleware extracts the cookie and runs
//!    one authentication attempt:
//!    - the key set is obtained through the TTL cache (`jwks`)
//!    - the token's signature, expiry, and not-before are verified
//!      (`verifier`)
//!    - on success the identity is synced into the local user directory and
//!      a local session is opened; on a signature mismatch the key cache is
//!      invalidated and verification retried exactly once (`session`)
//! 3. The outcome becomes a redirect: to the destination on success, to the
//!    fallback login page (with the Clerk cookie cleared) on failure
//!
//! ## Security
//!
//! - Signing algorithm pinned to RS256
//! - Zero clock-skew leeway on temporal claims
//! - Fail-closed key-set caching: stale keys are never used as a fallback

pub mod claims;
pub mod error;
pub mod jwks;
pub mod middleware;
pub mod session;
pub mod verifier;

pub use claims::SessionClaims;
pub use error::{AuthFailure, KeySetError, VerificationError};
pub use jwks::KeySetCache;
pub use middleware::CurrentUser;
pub use session::{AuthOutcome, AuthRequest, SessionAuthenticator};
pub use verifier::TokenVerifier;
