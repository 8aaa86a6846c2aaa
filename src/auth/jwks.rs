// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Security
//!
//! - The key set is fetched via HTTPS with a bounded timeout
//! - Keys are cached with a configurable TTL (default one hour)
//! - Fail-closed: an expired cache plus a failed refetch is an error;
//!   stale keys are never used as a fallback, since possibly-rotated key
//!   material must not silently authenticate anyone
//! - `invalidate` clears the cache after a signature mismatch so the next
//!   verification refetches (key-rotation recovery)
//!
//! ## Storage
//!
//! The cached set lives behind the [`KeySetStore`] trait: in-memory by
//! default, or a single JSON file whose modification time drives the TTL
//! check. Concurrent requests may race on a cache miss and each perform a
//! fetch; the document is replaced wholesale, so the last writer wins and
//! no locking is required for correctness.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use jsonwebtoken::jwk::JwkSet;

use super::error::KeySetError;

/// Default key-set cache TTL (1 hour).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// HTTP timeout for key-set fetches.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// A fetched key set together with its fetch timestamp.
#[derive(Debug, Clone)]
pub struct CachedKeySet {
    pub keys: JwkSet,
    pub fetched_at: SystemTime,
}

/// Storage backend for the cached key set.
///
/// Implementations must be safe to call from concurrent requests. `save`
/// and `clear` are best-effort; correctness comes from the fail-closed
/// behavior of [`KeySetCache::get_keyset`], not from the store.
pub trait KeySetStore: Send + Sync {
    /// Return the cached set and its fetch timestamp, if any.
    fn load(&self) -> Option<CachedKeySet>;

    /// Replace the cached set wholesale, stamping it with the current time.
    fn save(&self, keys: &JwkSet);

    /// Drop any cached set.
    fn clear(&self);
}

/// In-memory key-set store (per-process, the default).
#[derive(Default)]
pub struct MemoryKeySetStore {
    entry: RwLock<Option<CachedKeySet>>,
}

impl MemoryKeySetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeySetStore for MemoryKeySetStore {
    fn load(&self) -> Option<CachedKeySet> {
        self.entry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn save(&self, keys: &JwkSet) {
        let mut entry = self.entry.write().unwrap_or_else(|e| e.into_inner());
        *entry = Some(CachedKeySet {
            keys: keys.clone(),
            fetched_at: SystemTime::now(),
        });
    }

    fn clear(&self) {
        let mut entry = self.entry.write().unwrap_or_else(|e| e.into_inner());
        *entry = None;
    }
}

/// Single-file JSON key-set store.
///
/// The file's modification time serves as the fetch timestamp. An absent or
/// corrupt file is treated as a cache miss and is re-created on the next
/// successful fetch.
pub struct FileKeySetStore {
    path: PathBuf,
}

impl FileKeySetStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl KeySetStore for FileKeySetStore {
    fn load(&self) -> Option<CachedKeySet> {
        let bytes = fs::read(&self.path).ok()?;
        let keys: JwkSet = serde_json::from_slice(&bytes).ok()?;
        let fetched_at = fs::metadata(&self.path).ok()?.modified().ok()?;
        Some(CachedKeySet { keys, fetched_at })
    }

    fn save(&self, keys: &JwkSet) {
        let result = serde_json::to_vec(keys)
            .map_err(|e| e.to_string())
            .and_then(|bytes| fs::write(&self.path, bytes).map_err(|e| e.to_string()));
        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to persist key-set cache");
        }
    }

    fn clear(&self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to clear key-set cache");
            }
        }
    }
}

/// TTL-cached provider of the identity provider's public-key set.
#[derive(Clone)]
pub struct KeySetCache {
    /// JWKS endpoint URL (Clerk frontend API, `/.well-known/jwks.json`).
    jwks_url: String,
    /// Maximum cached-set age before a refetch.
    cache_ttl: Duration,
    /// Storage backend.
    store: Arc<dyn KeySetStore>,
    /// HTTP client.
    client: reqwest::Client,
}

impl KeySetCache {
    /// Create a cache for the given JWKS endpoint with in-memory storage.
    pub fn new(jwks_url: impl Into<String>) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            cache_ttl: DEFAULT_CACHE_TTL,
            store: Arc::new(MemoryKeySetStore::new()),
            client: reqwest::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    /// Use a custom cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Use a custom storage backend.
    pub fn with_store(mut self, store: Arc<dyn KeySetStore>) -> Self {
        self.store = store;
        self
    }

    /// Get the JWKS endpoint URL.
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Return a recent key set, fetching only when the cache is cold or
    /// older than the TTL.
    pub async fn get_keyset(&self) -> Result<JwkSet, KeySetError> {
        if let Some(entry) = self.store.load() {
            let fresh = entry
                .fetched_at
                .elapsed()
                .map(|age| age < self.cache_ttl)
                .unwrap_or(false);
            if fresh {
                return Ok(entry.keys);
            }
        }

        let keys = self.fetch_keyset().await?;
        self.store.save(&keys);
        Ok(keys)
    }

    /// Clear the cached set so the next `get_keyset` refetches.
    ///
    /// Called after a signature mismatch, which may indicate the provider
    /// rotated its signing keys.
    pub fn invalidate(&self) {
        self.store.clear();
    }

    /// Whether a key set is currently cached and within its TTL.
    pub fn is_cached(&self) -> bool {
        self.store
            .load()
            .and_then(|entry| entry.fetched_at.elapsed().ok())
            .map(|age| age < self.cache_ttl)
            .unwrap_or(false)
    }

    /// Fetch the key set from the endpoint.
    async fn fetch_keyset(&self) -> Result<JwkSet, KeySetError> {
        tracing::debug!(url = %self.jwks_url, "Fetching key set");

        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| KeySetError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(KeySetError::Fetch(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        let keys: JwkSet = response
            .json()
            .await
            .map_err(|_| KeySetError::InvalidKeySet)?;

        if keys.keys.is_empty() {
            return Err(KeySetError::InvalidKeySet);
        }

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;

    use super::*;

    const TEST_JWKS: &str = r#"{"keys":[{"kty":"RSA","alg":"RS256","use":"sig","kid":"abc",
        "n":"4OttQJJ7wYBhW9mbKOBMG6uNCQlSTUPA2sQ27dOUFyegZbGtJnUpYSt0Uy6F4Dw9GOXDSUMfkW5HKmKTnAlzQR8hlsuOkMHbl8vnEOWK8ehH2ziMac2iK6blmzEG1CSmHNm9449qpbRm8etbNLv7sbZ_a2dEXGEY0n2ei43OiDqqyHm4YYjf6f1LkeAZO6ricqns0OjogM1Bn6HvhicgDsfDnI_5CXIl5FMPbwwWd5V-JoQbF_Vboj6XrNXz0dnTFy4oyDj8Dr7AOfnk8NI6VmhddoLrDbjpf-QP42aaMSDK_X9ukVUR0R488SXfNA0wgUDvKnRK8Jqi2wJ65i8QOw",
        "e":"AQAB"}]}"#;

    #[derive(Clone)]
    struct StubEndpoint {
        hits: Arc<AtomicUsize>,
        status: StatusCode,
        body: String,
    }

    async fn serve_jwks(State(stub): State<StubEndpoint>) -> (StatusCode, String) {
        stub.hits.fetch_add(1, Ordering::SeqCst);
        (stub.status, stub.body.clone())
    }

    /// Spawn a local HTTP endpoint that serves `body` with `status`.
    async fn spawn_endpoint(status: StatusCode, body: &str) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let stub = StubEndpoint {
            hits: hits.clone(),
            status,
            body: body.to_string(),
        };
        let app = Router::new()
            .route("/.well-known/jwks.json", get(serve_jwks))
            .with_state(stub);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/.well-known/jwks.json"), hits)
    }

    #[test]
    fn cache_creation() {
        let cache = KeySetCache::new("https://example.clerk.accounts.dev/.well-known/jwks.json");
        assert_eq!(
            cache.jwks_url(),
            "https://example.clerk.accounts.dev/.well-known/jwks.json"
        );
        assert_eq!(cache.cache_ttl, DEFAULT_CACHE_TTL);
        assert!(!cache.is_cached());
    }

    #[tokio::test]
    async fn second_lookup_within_ttl_is_a_cache_hit() {
        let (url, hits) = spawn_endpoint(StatusCode::OK, TEST_JWKS).await;
        let cache = KeySetCache::new(url);

        let first = cache.get_keyset().await.unwrap();
        let second = cache.get_keyset().await.unwrap();

        assert_eq!(first.keys.len(), 1);
        assert_eq!(second.keys.len(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(cache.is_cached());
    }

    #[tokio::test]
    async fn invalidate_forces_refetch_with_fresh_timestamp() {
        let (url, hits) = spawn_endpoint(StatusCode::OK, TEST_JWKS).await;
        let store = Arc::new(MemoryKeySetStore::new());
        let cache = KeySetCache::new(url).with_store(store.clone());

        cache.get_keyset().await.unwrap();
        let first_fetch = store.load().unwrap().fetched_at;

        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.invalidate();
        assert!(store.load().is_none());

        cache.get_keyset().await.unwrap();
        let second_fetch = store.load().unwrap().fetched_at;

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(second_fetch > first_fetch);
    }

    #[tokio::test]
    async fn expired_ttl_triggers_refetch() {
        let (url, hits) = spawn_endpoint(StatusCode::OK, TEST_JWKS).await;
        let cache = KeySetCache::new(url).with_cache_ttl(Duration::from_millis(10));

        cache.get_keyset().await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        cache.get_keyset().await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn server_error_is_fetch_error() {
        let (url, _hits) = spawn_endpoint(StatusCode::INTERNAL_SERVER_ERROR, "oops").await;
        let cache = KeySetCache::new(url);

        let err = cache.get_keyset().await.unwrap_err();
        assert!(matches!(err, KeySetError::Fetch(_)));
        assert!(!cache.is_cached());
    }

    #[tokio::test]
    async fn empty_key_list_is_invalid() {
        let (url, _hits) = spawn_endpoint(StatusCode::OK, r#"{"keys":[]}"#).await;
        let cache = KeySetCache::new(url);

        let err = cache.get_keyset().await.unwrap_err();
        assert_eq!(err, KeySetError::InvalidKeySet);
    }

    #[tokio::test]
    async fn unparsable_document_is_invalid() {
        let (url, _hits) = spawn_endpoint(StatusCode::OK, "not json at all").await;
        let cache = KeySetCache::new(url);

        let err = cache.get_keyset().await.unwrap_err();
        assert_eq!(err, KeySetError::InvalidKeySet);
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileKeySetStore::new(dir.path().join("jwks_cache.json"));

        assert!(store.load().is_none());

        let keys: JwkSet = serde_json::from_str(TEST_JWKS).unwrap();
        store.save(&keys);

        let entry = store.load().unwrap();
        assert_eq!(entry.keys.keys.len(), 1);

        store.clear();
        assert!(store.load().is_none());
        // Clearing an already-absent file must not log spuriously or panic.
        store.clear();
    }

    #[test]
    fn file_store_treats_corrupt_file_as_miss() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("jwks_cache.json");
        fs::write(&path, "{{{ corrupt").unwrap();

        let store = FileKeySetStore::new(&path);
        assert!(store.load().is_none());

        // A later save re-creates the file.
        let keys: JwkSet = serde_json::from_str(TEST_JWKS).unwrap();
        store.save(&keys);
        assert!(store.load().is_some());
    }
}
