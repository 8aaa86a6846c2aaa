// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::auth::middleware::sso_middleware;
use crate::state::AppState;

pub mod account;
pub mod health;
pub mod login;
pub mod pages;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::home))
        .route("/healthz", get(health::health))
        .route("/login", get(login::login))
        .route("/sso/login", get(pages::sso_login))
        .route("/sso/logout", get(pages::sso_logout))
        .route("/account/details", get(account::details))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            sso_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
