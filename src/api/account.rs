// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account details view, backed by the Clerk Backend API.

use axum::extract::State;
use axum::response::Html;

use crate::auth::CurrentUser;
use crate::state::AppState;

use super::pages::{escape_html, render_page};

/// Render the logged-in user's provider profile.
///
/// A remote-API failure degrades to an inline message rather than failing
/// the whole page.
pub async fn details(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Html<String> {
    let body = match state.clerk.get_user(&user.external_id).await {
        Ok(profile) => {
            let name = escape_html(&format!(
                "{} {}",
                profile.first_name.as_deref().unwrap_or_default(),
                profile.last_name.as_deref().unwrap_or_default(),
            ));
            let emails = profile
                .email_addresses
                .iter()
                .map(|e| format!("<li>{}</li>", escape_html(&e.email_address)))
                .collect::<String>();
            format!(
                r#"<h3>Your account</h3>
<p>Name: {}</p>
<p>Provider id: {}</p>
<ul>{emails}</ul>"#,
                name.trim(),
                escape_html(&profile.id),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, user_id = %user.id, "Failed to fetch account details");
            "<p>Your details could not be retrieved at this time.</p>".to_string()
        }
    };

    Html(render_page("Your account", &body))
}
