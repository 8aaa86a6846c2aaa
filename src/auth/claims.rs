// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verified claims extracted from a Clerk session token.

use serde::Deserialize;

/// Claims asserted by a verified session token.
///
/// Clerk session JWTs carry standard OIDC claims plus a session id.
/// Instances are produced only by successful verification; they are never
/// constructed from unverified input.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionClaims {
    /// Subject: the canonical Clerk user identifier.
    pub sub: String,

    /// Issued-at timestamp (seconds since epoch).
    #[serde(default)]
    pub iat: i64,

    /// Expiration timestamp (seconds since epoch).
    #[serde(default)]
    pub exp: i64,

    /// Not-before timestamp, if the token carries one.
    #[serde(default)]
    pub nbf: Option<i64>,

    /// Issuer (the Clerk instance URL).
    #[serde(default)]
    pub iss: String,

    /// Clerk session id.
    #[serde(default)]
    pub sid: Option<String>,

    /// Authorized party.
    #[serde(default)]
    pub azp: Option<String>,
}
