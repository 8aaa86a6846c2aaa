// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The standard login entry point.
//!
//! `/login` plays three roles, mirroring the conditions the SSO flow needs:
//!
//! - with SSO enabled it redirects to the `/sso/login` virtual page,
//!   preserving the caller's `redirect_to` destination
//! - with `?sso_fallback=true` (set after a failed SSO attempt) it stays
//!   put and renders the fallback page with an error banner, breaking the
//!   redirect loop
//! - with `?action=clerk_logout` (the hop from the logout page, after the
//!   browser SDK has signed out of Clerk) it clears the local session and
//!   sends the client home

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;

use crate::auth::middleware::{clear_cookie, cookie_value, redirect_with_cookies, LOCAL_SESSION_COOKIE};
use crate::auth::session::safe_redirect_path;
use crate::state::AppState;

use super::pages::render_page;

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub redirect_to: Option<String>,
    #[serde(default)]
    pub sso_fallback: Option<String>,
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LoginQuery>,
) -> Response {
    if query.action.as_deref() == Some("clerk_logout") {
        return complete_logout(&state, &headers);
    }

    let logged_in = cookie_value(&headers, LOCAL_SESSION_COOKIE)
        .and_then(|sid| state.directory.user_for_session(&sid))
        .is_some();
    let action = query.action.as_deref().unwrap_or("login");

    if state.options.sso_enabled
        && action == "login"
        && !logged_in
        && query.sso_fallback.is_none()
    {
        let target = match query.redirect_to.as_deref().and_then(safe_redirect_path) {
            Some(destination) => {
                let params = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("redirect_to", &destination)
                    .finish();
                format!("/sso/login?{params}")
            }
            None => "/sso/login".to_string(),
        };
        return Redirect::to(&target).into_response();
    }

    render_fallback_page(query.sso_fallback.is_some())
}

/// Clear the local session after the browser SDK has signed out of Clerk.
fn complete_logout(state: &AppState, headers: &HeaderMap) -> Response {
    if let Some(sid) = cookie_value(headers, LOCAL_SESSION_COOKIE) {
        state.directory.clear_session(&sid);
    }
    redirect_with_cookies("/", &[clear_cookie(LOCAL_SESSION_COOKIE)])
}

fn render_fallback_page(sso_failed: bool) -> Response {
    let banner = if sso_failed {
        r#"<div id="login_error">Single Sign-On failed. Please try again or contact your administrator.</div>"#
    } else {
        ""
    };
    let body = format!(
        r#"{banner}
<h3>Log in</h3>
<p><a href="/sso/login">Try single sign-on</a></p>"#
    );
    Html(render_page("Log In", &body)).into_response()
}
