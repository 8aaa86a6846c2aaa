// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::jwks::FileKeySetStore;
use crate::auth::{KeySetCache, SessionAuthenticator, TokenVerifier};
use crate::clerk::ClerkClient;
use crate::config::SsoOptions;
use crate::directory::{InMemoryDirectory, UserDirectory};

#[derive(Clone)]
pub struct AppState {
    pub options: Arc<SsoOptions>,
    pub authenticator: Arc<SessionAuthenticator>,
    pub clerk: Arc<ClerkClient>,
    pub directory: Arc<dyn UserDirectory>,
}

impl AppState {
    /// Wire up the default state: in-memory directory, key-set cache backed
    /// by a file when configured, Clerk client from the options.
    pub fn new(options: SsoOptions) -> Self {
        let mut cache = KeySetCache::new(options.jwks_url().unwrap_or_default())
            .with_cache_ttl(options.jwks_cache_ttl);
        if let Some(path) = &options.jwks_cache_file {
            cache = cache.with_store(Arc::new(FileKeySetStore::new(path)));
        }

        let clerk = ClerkClient::new(&options.secret_key).with_api_base_url(&options.api_base_url);
        let directory: Arc<dyn UserDirectory> = Arc::new(InMemoryDirectory::new());

        Self::with_parts(options, TokenVerifier::new(cache), clerk, directory)
    }

    /// Wire up state from pre-built parts (bespoke stores and clients).
    pub fn with_parts(
        options: SsoOptions,
        verifier: TokenVerifier,
        clerk: ClerkClient,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        let options = Arc::new(options);
        let clerk = Arc::new(clerk);
        let authenticator = Arc::new(SessionAuthenticator::new(
            options.clone(),
            verifier,
            clerk.clone(),
            directory.clone(),
        ));
        Self {
            options,
            authenticator,
            clerk,
            directory,
        }
    }
}
