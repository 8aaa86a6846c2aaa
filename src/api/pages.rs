// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Virtual SSO pages.
//!
//! `/sso/login` and `/sso/logout` are rendered by the gateway itself; the
//! heavy lifting happens client-side in Clerk's browser SDK, which sets and
//! clears the `__session` cookie. The server only decides which state of
//! the page to show.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Html;

use crate::auth::middleware::{cookie_value, LOCAL_SESSION_COOKIE, SESSION_COOKIE};
use crate::state::AppState;

/// Basic HTML shell shared by the gateway's pages.
pub fn render_page(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
</head>
<body class="sso-virtual-page">
<div class="sso-container" style="width: 100%; max-width: 400px; margin: 5% auto;">
{content}
</div>
</body>
</html>
"#,
        title = escape_html(title),
    )
}

/// Escape a value for interpolation into HTML text or attributes.
pub fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn clerk_js_tag(options: &crate::config::SsoOptions) -> String {
    let base = options.frontend_api.trim_end_matches('/');
    format!(
        r#"<script async crossorigin="anonymous" data-clerk-publishable-key="{key}" src="{base}/npm/@clerk/clerk-js@5/dist/clerk.browser.js" type="text/javascript"></script>"#,
        key = escape_html(&options.publishable_key),
    )
}

/// Mounts the Clerk sign-in component; the redirect destination is read
/// client-side from the query string so it survives the SSO round trip.
const SIGN_IN_SCRIPT: &str = r#"<div id="clerk-sign-in"></div>
<script>
window.addEventListener("load", async function () {
    await Clerk.load();
    const urlParams = new URLSearchParams(window.location.search);
    const redirectUrl = urlParams.get("redirect_to") || window.location.href;
    const signInDiv = document.getElementById("clerk-sign-in");
    if (signInDiv) {
        Clerk.mountSignIn(signInDiv, { forceRedirectUrl: redirectUrl });
    }
});
</script>"#;

/// Signs out of Clerk client-side, then hops to the gateway's logout
/// completion action so the local session is cleared too.
const SIGN_OUT_SCRIPT: &str = r#"<p>You are being logged out. Please wait...</p>
<script>
window.addEventListener("load", async function () {
    await Clerk.load();
    await Clerk.signOut(() => {
        window.location.href = "/login?action=clerk_logout";
    });
});
</script>"#;

/// Virtual login page.
pub async fn sso_login(State(state): State<AppState>, headers: HeaderMap) -> Html<String> {
    if state.options.publishable_key.is_empty() || state.options.frontend_api.is_empty() {
        return Html(render_page(
            "Log In",
            "<p>Single sign-on is not configured correctly. Missing publishable key.</p>",
        ));
    }

    // Clerk has set its cookie but no local session exists yet: the login
    // is in its final processing stage, so don't re-mount the sign-in form.
    let completing = cookie_value(&headers, SESSION_COOKIE).is_some()
        && cookie_value(&headers, LOCAL_SESSION_COOKIE)
            .and_then(|sid| state.directory.user_for_session(&sid))
            .is_none();

    let body = if completing {
        format!(
            "{}\n<p>Completing login, please wait...</p>",
            clerk_js_tag(&state.options)
        )
    } else {
        format!("{}\n{}", clerk_js_tag(&state.options), SIGN_IN_SCRIPT)
    };

    Html(render_page("Log In", &body))
}

/// Virtual logout page.
pub async fn sso_logout(State(state): State<AppState>) -> Html<String> {
    if state.options.publishable_key.is_empty() || state.options.frontend_api.is_empty() {
        return Html(render_page(
            "Log Out",
            "<p>Single sign-on is not configured correctly.</p>",
        ));
    }

    let body = format!("{}\n{}", clerk_js_tag(&state.options), SIGN_OUT_SCRIPT);
    Html(render_page("Log Out", &body))
}

/// Homepage: the default post-login destination.
pub async fn home(user: Option<axum::Extension<crate::auth::CurrentUser>>) -> Html<String> {
    let body = match user {
        Some(axum::Extension(crate::auth::CurrentUser(record))) => format!(
            r#"<p>Signed in as {}.</p>
<p><a href="/account/details">Your details</a> &middot; <a href="/sso/logout">Log out</a></p>"#,
            escape_html(&record.display_name)
        ),
        None => r#"<p>Welcome.</p><p><a href="/login">Log in</a></p>"#.to_string(),
    };
    Html(render_page("Home", &body))
}
