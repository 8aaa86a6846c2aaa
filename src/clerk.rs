// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Clerk Backend API client.
//!
//! Server-to-server calls authenticated with the Clerk secret key. Only the
//! user-detail lookup is needed: the session token carries just the user id,
//! and names plus the primary email come from the REST API.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

const DEFAULT_API_BASE_URL: &str = "https://api.clerk.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ClerkError {
    #[error("Clerk API request failed: {0}")]
    Request(String),

    #[error("Clerk API returned HTTP {0}")]
    Status(u16),

    #[error("Clerk API response was invalid: {0}")]
    InvalidResponse(String),

    #[error("Clerk user has no primary email address")]
    MissingPrimaryEmail,
}

/// A user object from the Clerk Backend API.
#[derive(Debug, Clone, Deserialize)]
pub struct ClerkUser {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    pub primary_email_address_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailAddress {
    pub id: String,
    pub email_address: String,
}

impl ClerkUser {
    /// The address designated primary, if the user has one.
    pub fn primary_email(&self) -> Option<&str> {
        let primary_id = self.primary_email_address_id.as_deref()?;
        self.email_addresses
            .iter()
            .find(|e| e.id == primary_id)
            .map(|e| e.email_address.as_str())
    }
}

/// HTTP client for the Clerk Backend API.
#[derive(Debug, Clone)]
pub struct ClerkClient {
    api_base_url: String,
    secret_key: String,
    http: Client,
}

impl ClerkClient {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            secret_key: secret_key.into(),
            http: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    /// Point the client at a different API base URL.
    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        let base = api_base_url.into();
        if !base.is_empty() {
            self.api_base_url = base;
        }
        self
    }

    /// Fetch a user's details by Clerk user id.
    pub async fn get_user(&self, user_id: &str) -> Result<ClerkUser, ClerkError> {
        let url = format!(
            "{}/v1/users/{user_id}",
            self.api_base_url.trim_end_matches('/')
        );

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| ClerkError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClerkError::Status(response.status().as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| ClerkError::InvalidResponse(e.to_string()))
    }
}
