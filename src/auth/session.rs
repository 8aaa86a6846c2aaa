// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-request SSO orchestration.
//!
//! One authentication attempt per inbound request, as a linear state
//! machine: skip, verify, a single conditional retry to absorb a
//! key-rotation race, then either sync-and-login or a classified failure.
//! The web layer (`auth::middleware`) translates the outcome into
//! redirects and cookie changes; this module performs no I/O of its own
//! beyond the verifier, the provider client, and the directory.

use std::sync::Arc;

use crate::clerk::{ClerkClient, ClerkError};
use crate::config::SsoOptions;
use crate::directory::{NewUser, UserDirectory};

use super::error::{AuthFailure, VerificationError};
use super::verifier::TokenVerifier;

/// Request-scoped inputs to one authentication attempt.
///
/// Extracted from the inbound request by the web layer so the state
/// machine itself stays framework-agnostic.
#[derive(Debug, Clone, Default)]
pub struct AuthRequest {
    /// Session token from the Clerk `__session` cookie, if present.
    pub session_token: Option<String>,
    /// `redirect_to` query parameter, if present (sanitized before use).
    pub redirect_to: Option<String>,
    /// Whether a live local session already exists for this client.
    pub has_local_session: bool,
}

/// Why an attempt ended without touching the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    SsoDisabled,
    NotConfigured,
    AlreadyLoggedIn,
    NoSessionToken,
}

/// Terminal outcome of one authentication attempt.
#[derive(Debug)]
pub enum AuthOutcome {
    /// Nothing to do; the request proceeds unauthenticated (or already
    /// authenticated locally).
    Skipped(SkipReason),
    /// Identity synced and a local session opened; redirect the client.
    Authenticated {
        user_id: String,
        session_id: String,
        destination: String,
    },
    /// The attempt failed; clear the session cookie and fall back.
    Failed(AuthFailure),
}

/// Orchestrates one authentication attempt per incoming request.
pub struct SessionAuthenticator {
    options: Arc<SsoOptions>,
    verifier: TokenVerifier,
    clerk: Arc<ClerkClient>,
    directory: Arc<dyn UserDirectory>,
}

impl SessionAuthenticator {
    pub fn new(
        options: Arc<SsoOptions>,
        verifier: TokenVerifier,
        clerk: Arc<ClerkClient>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            options,
            verifier,
            clerk,
            directory,
        }
    }

    /// Access the verifier's key-set cache (health checks).
    pub fn key_cache(&self) -> &super::jwks::KeySetCache {
        self.verifier.key_cache()
    }

    /// Run one authentication attempt.
    ///
    /// Retries are bounded to exactly one extra verification, and only for
    /// `SignatureInvalid`: a signature mismatch may mean the provider
    /// rotated its signing keys since the set was cached, so the cache is
    /// invalidated and the token checked once more against fresh keys.
    /// Every other failure is terminal for the request.
    pub async fn authenticate(&self, request: &AuthRequest) -> AuthOutcome {
        if !self.options.sso_enabled {
            return AuthOutcome::Skipped(SkipReason::SsoDisabled);
        }
        if !self.options.is_configured() {
            return AuthOutcome::Skipped(SkipReason::NotConfigured);
        }
        if request.has_local_session {
            return AuthOutcome::Skipped(SkipReason::AlreadyLoggedIn);
        }
        let Some(token) = request.session_token.as_deref() else {
            return AuthOutcome::Skipped(SkipReason::NoSessionToken);
        };

        let claims = match self.verifier.verify(token).await {
            Ok(claims) => claims,
            Err(VerificationError::SignatureInvalid) => {
                tracing::debug!("Signature mismatch; invalidating key set and retrying once");
                self.verifier.key_cache().invalidate();
                match self.verifier.verify(token).await {
                    Ok(claims) => claims,
                    Err(e) => return AuthOutcome::Failed(e.into()),
                }
            }
            Err(e) => return AuthOutcome::Failed(e.into()),
        };

        match self.sync_and_login(&claims.sub).await {
            Ok((user_id, session_id)) => AuthOutcome::Authenticated {
                user_id,
                session_id,
                destination: self.destination(request),
            },
            Err(failure) => AuthOutcome::Failed(failure),
        }
    }

    /// Sync the verified identity into the local directory and open a
    /// session, returning the local user id and session id.
    async fn sync_and_login(&self, clerk_user_id: &str) -> Result<(String, String), AuthFailure> {
        let user = self.clerk.get_user(clerk_user_id).await?;
        let email = user
            .primary_email()
            .ok_or(ClerkError::MissingPrimaryEmail)?
            .to_string();

        let record = self.directory.create_or_update(NewUser {
            external_id: user.id,
            email,
            first_name: user.first_name.unwrap_or_default(),
            last_name: user.last_name.unwrap_or_default(),
        })?;
        let session_id = self.directory.set_current_session(&record.id);

        Ok((record.id, session_id))
    }

    /// Post-login destination, by priority: the request's own sanitized
    /// `redirect_to`, then the configured redirect path, then the homepage.
    fn destination(&self, request: &AuthRequest) -> String {
        if let Some(path) = request
            .redirect_to
            .as_deref()
            .and_then(safe_redirect_path)
        {
            return path;
        }
        if let Some(path) = &self.options.login_redirect_path {
            return path.clone();
        }
        "/".to_string()
    }
}

/// Accept only same-site relative paths as redirect destinations.
///
/// `//host` and `/\host` are scheme-relative in browsers and would allow an
/// open redirect, so only a single leading slash passes.
pub fn safe_redirect_path(raw: &str) -> Option<String> {
    if raw.starts_with('/') && !raw.starts_with("//") && !raw.starts_with("/\\") {
        Some(raw.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use serde_json::json;

    use super::*;
    use crate::auth::error::KeySetError;
    use crate::auth::jwks::{KeySetCache, KeySetStore, MemoryKeySetStore};
    use crate::auth::verifier::test_keys::{jwks_with_kid, now, sign_token};
    use crate::directory::InMemoryDirectory;

    fn test_options() -> SsoOptions {
        SsoOptions {
            sso_enabled: true,
            frontend_api: "https://example.clerk.accounts.dev".to_string(),
            publishable_key: "pk_test".to_string(),
            secret_key: "sk_test_secret".to_string(),
            api_base_url: String::new(),
            login_redirect_path: None,
            jwks_cache_ttl: Duration::from_secs(3600),
            jwks_cache_file: None,
        }
    }

    /// Serve the Clerk user-detail endpoint for `user_123`.
    async fn spawn_clerk_stub() -> String {
        async fn serve_user(Path(id): Path<String>) -> (StatusCode, String) {
            if id != "user_123" {
                return (StatusCode::NOT_FOUND, String::new());
            }
            let body = json!({
                "id": "user_123",
                "first_name": "Ada",
                "last_name": "Lovelace",
                "primary_email_address_id": "idn_1",
                "email_addresses": [
                    {"id": "idn_1", "email_address": "ada@example.com"}
                ]
            });
            (StatusCode::OK, body.to_string())
        }

        let app = Router::new().route("/v1/users/{id}", get(serve_user));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// Serve a JWKS document and count fetches.
    async fn spawn_jwks_stub(status: StatusCode, body: String) -> (String, Arc<AtomicUsize>) {
        #[derive(Clone)]
        struct Stub {
            hits: Arc<AtomicUsize>,
            status: StatusCode,
            body: String,
        }
        async fn serve(State(stub): State<Stub>) -> (StatusCode, String) {
            stub.hits.fetch_add(1, Ordering::SeqCst);
            (stub.status, stub.body.clone())
        }

        let hits = Arc::new(AtomicUsize::new(0));
        let stub = Stub {
            hits: hits.clone(),
            status,
            body,
        };
        let app = Router::new()
            .route("/.well-known/jwks.json", get(serve))
            .with_state(stub);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/.well-known/jwks.json"), hits)
    }

    struct Harness {
        authenticator: SessionAuthenticator,
        directory: Arc<InMemoryDirectory>,
    }

    async fn harness_with_cache(options: SsoOptions, cache: KeySetCache) -> Harness {
        let clerk_base = spawn_clerk_stub().await;
        let directory = Arc::new(InMemoryDirectory::new());
        let clerk = Arc::new(
            ClerkClient::new(&options.secret_key).with_api_base_url(clerk_base),
        );
        let authenticator = SessionAuthenticator::new(
            Arc::new(options),
            TokenVerifier::new(cache),
            clerk,
            directory.clone() as Arc<dyn UserDirectory>,
        );
        Harness {
            authenticator,
            directory,
        }
    }

    /// Harness whose key cache is pre-seeded with the test key under `kid`.
    async fn harness(options: SsoOptions) -> Harness {
        let store = Arc::new(MemoryKeySetStore::new());
        store.save(&jwks_with_kid("abc"));
        let cache = KeySetCache::new("http://127.0.0.1:9/.well-known/jwks.json")
            .with_store(store);
        harness_with_cache(options, cache).await
    }

    fn token_request(token: String) -> AuthRequest {
        AuthRequest {
            session_token: Some(token),
            redirect_to: None,
            has_local_session: false,
        }
    }

    #[tokio::test]
    async fn skips_when_sso_disabled() {
        let mut options = test_options();
        options.sso_enabled = false;
        let h = harness(options).await;

        let outcome = h
            .authenticator
            .authenticate(&token_request("whatever".into()))
            .await;
        assert!(matches!(
            outcome,
            AuthOutcome::Skipped(SkipReason::SsoDisabled)
        ));
    }

    #[tokio::test]
    async fn skips_when_provider_unconfigured() {
        let mut options = test_options();
        options.secret_key.clear();
        let h = harness(options).await;

        let outcome = h
            .authenticator
            .authenticate(&token_request("whatever".into()))
            .await;
        assert!(matches!(
            outcome,
            AuthOutcome::Skipped(SkipReason::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn skips_when_already_logged_in() {
        let h = harness(test_options()).await;
        let request = AuthRequest {
            session_token: Some("whatever".into()),
            redirect_to: None,
            has_local_session: true,
        };

        let outcome = h.authenticator.authenticate(&request).await;
        assert!(matches!(
            outcome,
            AuthOutcome::Skipped(SkipReason::AlreadyLoggedIn)
        ));
    }

    #[tokio::test]
    async fn skips_without_a_session_token() {
        let h = harness(test_options()).await;

        let outcome = h.authenticator.authenticate(&AuthRequest::default()).await;
        assert!(matches!(
            outcome,
            AuthOutcome::Skipped(SkipReason::NoSessionToken)
        ));
    }

    // Scenario: valid token for kid "abc" syncs user_123 and opens a session.
    #[tokio::test]
    async fn valid_token_syncs_and_opens_session() {
        let h = harness(test_options()).await;
        let token = sign_token("abc", &json!({"sub": "user_123", "exp": now() + 600}));

        let outcome = h.authenticator.authenticate(&token_request(token)).await;

        let AuthOutcome::Authenticated {
            user_id,
            session_id,
            destination,
        } = outcome
        else {
            panic!("expected Authenticated, got {outcome:?}");
        };
        assert_eq!(destination, "/");

        let record = h.directory.find_by_external_id("user_123").unwrap();
        assert_eq!(record.id, user_id);
        assert_eq!(record.email, "ada@example.com");
        assert_eq!(
            h.directory.user_for_session(&session_id).map(|u| u.id),
            Some(user_id)
        );
    }

    // Scenario: expired token fails without any retry or sync.
    #[tokio::test]
    async fn expired_token_fails_without_retry() {
        let h = harness(test_options()).await;
        let token = sign_token("abc", &json!({"sub": "user_123", "exp": now() - 10}));

        let outcome = h.authenticator.authenticate(&token_request(token)).await;

        let AuthOutcome::Failed(failure) = outcome else {
            panic!("expected Failed, got {outcome:?}");
        };
        assert_eq!(failure.kind(), "expired");
        assert!(h.directory.find_by_external_id("user_123").is_none());
    }

    // Scenario: unknown key id invalidates the cache, refetches exactly
    // once, and fails when the fresh set still lacks the key.
    #[tokio::test]
    async fn rotation_retry_is_bounded_to_one_refetch() {
        let (jwks_url, hits) = spawn_jwks_stub(
            StatusCode::OK,
            serde_json::to_string(&jwks_with_kid("abc")).unwrap(),
        )
        .await;
        let h = harness_with_cache(test_options(), KeySetCache::new(jwks_url)).await;
        let token = sign_token("zzz", &json!({"sub": "user_123", "exp": now() + 600}));

        let outcome = h.authenticator.authenticate(&token_request(token)).await;

        let AuthOutcome::Failed(failure) = outcome else {
            panic!("expected Failed, got {outcome:?}");
        };
        assert_eq!(failure.kind(), "signature_invalid");
        // Initial fetch plus exactly one rotation-recovery refetch.
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    // Scenario: the retry succeeds when the refetched set carries the new key.
    #[tokio::test]
    async fn rotation_retry_succeeds_against_fresh_keys() {
        // Cache pre-seeded with a set that lacks "abc"; the endpoint serves
        // the rotated set that includes it.
        let (jwks_url, hits) = spawn_jwks_stub(
            StatusCode::OK,
            serde_json::to_string(&jwks_with_kid("abc")).unwrap(),
        )
        .await;
        let store = Arc::new(MemoryKeySetStore::new());
        store.save(&jwks_with_kid("old-kid"));
        let cache = KeySetCache::new(jwks_url).with_store(store);
        let h = harness_with_cache(test_options(), cache).await;

        let token = sign_token("abc", &json!({"sub": "user_123", "exp": now() + 600}));
        let outcome = h.authenticator.authenticate(&token_request(token)).await;

        assert!(matches!(outcome, AuthOutcome::Authenticated { .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    // Scenario: key-set endpoint down and no cache fails closed.
    #[tokio::test]
    async fn keyset_fetch_failure_fails_closed() {
        let (jwks_url, _hits) =
            spawn_jwks_stub(StatusCode::INTERNAL_SERVER_ERROR, "oops".into()).await;
        let h = harness_with_cache(test_options(), KeySetCache::new(jwks_url)).await;
        let token = sign_token("abc", &json!({"sub": "user_123", "exp": now() + 600}));

        let outcome = h.authenticator.authenticate(&token_request(token)).await;

        let AuthOutcome::Failed(failure) = outcome else {
            panic!("expected Failed, got {outcome:?}");
        };
        assert!(matches!(
            failure,
            AuthFailure::Verification(VerificationError::KeySet(KeySetError::Fetch(_)))
        ));
    }

    #[tokio::test]
    async fn unknown_subject_fails_after_verification() {
        let h = harness(test_options()).await;
        // Valid signature, but the provider has no such user.
        let token = sign_token("abc", &json!({"sub": "user_999", "exp": now() + 600}));

        let outcome = h.authenticator.authenticate(&token_request(token)).await;

        let AuthOutcome::Failed(failure) = outcome else {
            panic!("expected Failed, got {outcome:?}");
        };
        assert_eq!(failure.kind(), "provider_error");
    }

    #[tokio::test]
    async fn destination_prefers_request_then_config_then_home() {
        let mut options = test_options();
        options.login_redirect_path = Some("/dashboard".to_string());
        let h = harness(options).await;

        let from_request = AuthRequest {
            redirect_to: Some("/orders/42".to_string()),
            ..AuthRequest::default()
        };
        assert_eq!(h.authenticator.destination(&from_request), "/orders/42");

        let unsafe_request = AuthRequest {
            redirect_to: Some("https://evil.example.com/".to_string()),
            ..AuthRequest::default()
        };
        assert_eq!(h.authenticator.destination(&unsafe_request), "/dashboard");

        let none = harness(test_options()).await;
        assert_eq!(none.authenticator.destination(&AuthRequest::default()), "/");
    }

    #[test]
    fn safe_redirect_rejects_offsite_targets() {
        assert_eq!(safe_redirect_path("/account"), Some("/account".to_string()));
        assert!(safe_redirect_path("//evil.example.com").is_none());
        assert!(safe_redirect_path("/\\evil.example.com").is_none());
        assert!(safe_redirect_path("https://evil.example.com").is_none());
        assert!(safe_redirect_path("relative/path").is_none());
    }
}
