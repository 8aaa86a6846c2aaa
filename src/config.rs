// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! All configuration is loaded from the environment once at startup into
//! [`SsoOptions`]; the options struct is read-only for the lifetime of a
//! request.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SSO_ENABLED` | Delegate login to Clerk (`true`/`false`/`1`/`0`) | `true` |
//! | `CLERK_FRONTEND_API` | Clerk frontend API base URL (JWKS lives under it) | Required for SSO |
//! | `CLERK_PUBLISHABLE_KEY` | Clerk publishable key (browser SDK) | Required for SSO |
//! | `CLERK_SECRET_KEY` | Clerk secret key (Backend API) | Required for SSO |
//! | `CLERK_API_BASE_URL` | Clerk Backend API base URL | `https://api.clerk.com` |
//! | `LOGIN_REDIRECT_PATH` | Post-login destination when the request names none | homepage |
//! | `JWKS_CACHE_TTL_SECS` | Key-set cache TTL in seconds | `3600` |
//! | `JWKS_CACHE_FILE` | Persist the key-set cache to this JSON file | in-memory |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::auth::jwks::DEFAULT_CACHE_TTL;

pub const SSO_ENABLED_ENV: &str = "SSO_ENABLED";
pub const FRONTEND_API_ENV: &str = "CLERK_FRONTEND_API";
pub const PUBLISHABLE_KEY_ENV: &str = "CLERK_PUBLISHABLE_KEY";
pub const SECRET_KEY_ENV: &str = "CLERK_SECRET_KEY";
pub const API_BASE_URL_ENV: &str = "CLERK_API_BASE_URL";
pub const LOGIN_REDIRECT_PATH_ENV: &str = "LOGIN_REDIRECT_PATH";
pub const JWKS_CACHE_TTL_ENV: &str = "JWKS_CACHE_TTL_SECS";
pub const JWKS_CACHE_FILE_ENV: &str = "JWKS_CACHE_FILE";

/// Process-wide SSO options.
#[derive(Debug, Clone)]
pub struct SsoOptions {
    /// Whether login is delegated to Clerk at all.
    pub sso_enabled: bool,
    /// Clerk frontend API base URL, e.g. `https://your-app.clerk.accounts.dev`.
    pub frontend_api: String,
    /// Publishable key handed to the browser SDK.
    pub publishable_key: String,
    /// Secret key for Backend API calls.
    pub secret_key: String,
    /// Clerk Backend API base URL.
    pub api_base_url: String,
    /// Configured post-login destination (second priority after the
    /// request's own `redirect_to`).
    pub login_redirect_path: Option<String>,
    /// Key-set cache TTL.
    pub jwks_cache_ttl: Duration,
    /// Persist the key-set cache to this file instead of memory.
    pub jwks_cache_file: Option<PathBuf>,
}

impl SsoOptions {
    /// Load options from the environment.
    pub fn from_env() -> Self {
        let ttl_secs = env::var(JWKS_CACHE_TTL_ENV)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CACHE_TTL);

        Self {
            sso_enabled: flag_from(env::var(SSO_ENABLED_ENV).ok(), true),
            frontend_api: env_or_default(FRONTEND_API_ENV, ""),
            publishable_key: env_or_default(PUBLISHABLE_KEY_ENV, ""),
            secret_key: env_or_default(SECRET_KEY_ENV, ""),
            api_base_url: env_or_default(API_BASE_URL_ENV, ""),
            login_redirect_path: env::var(LOGIN_REDIRECT_PATH_ENV)
                .ok()
                .filter(|v| !v.is_empty()),
            jwks_cache_ttl: ttl_secs,
            jwks_cache_file: env::var(JWKS_CACHE_FILE_ENV).ok().map(PathBuf::from),
        }
    }

    /// The JWKS endpoint derived from the frontend API base URL, or `None`
    /// when the base URL is unset or unparsable.
    pub fn jwks_url(&self) -> Option<String> {
        let base = Url::parse(self.frontend_api.trim_end_matches('/')).ok()?;
        base.join("/.well-known/jwks.json")
            .ok()
            .map(|u| u.to_string())
    }

    /// Whether the provider credentials are complete enough to attempt SSO.
    pub fn is_configured(&self) -> bool {
        !self.secret_key.is_empty() && self.jwks_url().is_some()
    }
}

fn env_or_default(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Parse a boolean flag value; unset or unrecognized falls back to the default.
fn flag_from(value: Option<String>, default: bool) -> bool {
    match value.as_deref().map(str::trim) {
        Some("1") | Some("true") | Some("yes") | Some("on") => true,
        Some("0") | Some("false") | Some("no") | Some("off") => false,
        _ => default,
    }
}
