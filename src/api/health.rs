// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// Key-set cache state: `ok` (cached and fresh) or `cold`.
    pub keyset: String,
}

/// Liveness probe. Reports whether the key-set cache is warm, but is never
/// unhealthy because of it; a cold cache just means the next login fetches.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let keyset = if state.authenticator.key_cache().is_cached() {
        "ok"
    } else {
        "cold"
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        keyset: keyset.to_string(),
    })
}
