// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! SSO middleware for Axum.
//!
//! Every inbound request passes through [`sso_middleware`], which runs one
//! authentication attempt against the Clerk session cookie and translates
//! the outcome into web behavior:
//!
//! - `Skipped`: the request proceeds; an existing local session is resolved
//!   and made available to handlers via request extensions
//! - `Authenticated`: the local session cookie is set and the client is
//!   redirected to its destination
//! - `Failed`: the Clerk session cookie is cleared (to prevent redirect
//!   loops) and the client is redirected to the fallback login page; the
//!   failure kind is logged but never exposed to the client

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{
        header::{HeaderMap, HeaderValue, COOKIE, SET_COOKIE},
        request::Parts,
        Uri,
    },
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::directory::UserRecord;
use crate::state::AppState;

use super::session::{AuthOutcome, AuthRequest};

/// Clerk's session cookie, set client-side by the browser SDK.
pub const SESSION_COOKIE: &str = "__session";

/// The gateway's own session cookie.
pub const LOCAL_SESSION_COOKIE: &str = "gateway_session";

/// The authenticated local user, inserted into request extensions by the
/// middleware and extractable in handlers.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRecord);

/// The live local session id, for handlers that terminate it.
#[derive(Debug, Clone)]
pub struct LocalSessionId(pub String);

/// Read a cookie value from the request headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
        .next()
}

/// Read a query parameter from the request URI.
pub fn query_param(uri: &Uri, name: &str) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// `Set-Cookie` value opening the local session.
fn local_session_cookie(session_id: &str) -> String {
    format!("{LOCAL_SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax")
}

/// `Set-Cookie` value clearing a cookie (empty, expired in the past).
pub fn clear_cookie(name: &str) -> String {
    format!("{name}=; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0")
}

/// Redirect response carrying extra `Set-Cookie` headers.
pub fn redirect_with_cookies(destination: &str, cookies: &[String]) -> Response {
    let mut response = Redirect::to(destination).into_response();
    for cookie in cookies {
        if let Ok(value) = HeaderValue::from_str(cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
    response
}

/// Run one SSO authentication attempt for the request.
pub async fn sso_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let headers = request.headers();
    let local_session = cookie_value(headers, LOCAL_SESSION_COOKIE);
    let current_user = local_session
        .as_deref()
        .and_then(|sid| state.directory.user_for_session(sid));

    let auth_request = AuthRequest {
        session_token: cookie_value(headers, SESSION_COOKIE),
        redirect_to: query_param(request.uri(), "redirect_to"),
        has_local_session: current_user.is_some(),
    };

    match state.authenticator.authenticate(&auth_request).await {
        AuthOutcome::Skipped(_) => {
            if let (Some(user), Some(sid)) = (current_user, local_session) {
                request.extensions_mut().insert(CurrentUser(user));
                request.extensions_mut().insert(LocalSessionId(sid));
            }
            next.run(request).await
        }
        AuthOutcome::Authenticated {
            user_id,
            session_id,
            destination,
        } => {
            tracing::info!(user_id = %user_id, "SSO login completed");
            redirect_with_cookies(&destination, &[local_session_cookie(&session_id)])
        }
        AuthOutcome::Failed(failure) => {
            tracing::warn!(kind = failure.kind(), error = %failure, "SSO authentication failed");
            redirect_with_cookies(
                "/login?sso_fallback=true",
                &[clear_cookie(SESSION_COOKIE)],
            )
        }
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Redirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // The middleware resolves the session on every request; fall back to
        // the cookie for handlers mounted outside it.
        if let Some(user) = parts.extensions.get::<CurrentUser>().cloned() {
            return Ok(user);
        }

        cookie_value(&parts.headers, LOCAL_SESSION_COOKIE)
            .and_then(|sid| state.directory.user_for_session(&sid))
            .map(CurrentUser)
            .ok_or_else(|| Redirect::to("/login"))
    }
}
