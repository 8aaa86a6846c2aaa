// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Local user directory and session registry.
//!
//! The gateway does not own user identity; Clerk does. This module keeps
//! the local shadow records that SSO logins are synced into, plus the
//! local sessions that the gateway's own cookie refers to.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("user record update failed: {0}")]
    Update(String),
}

/// A locally stored user record linked to a Clerk identity.
#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    /// Local user id.
    pub id: String,
    /// Clerk user id (the primary link; always re-synced on login).
    pub external_id: String,
    /// Primary email address, also used as the login name.
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields synced from the identity provider on each login.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub external_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// User-directory collaborator contract.
///
/// `create_or_update` matches by external id first and falls back to email,
/// so a pre-existing local account gets linked on first SSO login instead
/// of duplicated. `set_current_session` returns the created session id so
/// the web layer can hand it to the client as a cookie.
pub trait UserDirectory: Send + Sync {
    fn find_by_external_id(&self, external_id: &str) -> Option<UserRecord>;

    fn find_by_email(&self, email: &str) -> Option<UserRecord>;

    fn create_or_update(&self, user: NewUser) -> Result<UserRecord, DirectoryError>;

    /// Open a session for the user, returning its id.
    fn set_current_session(&self, user_id: &str) -> String;

    /// Resolve a session id back to its user, if the session is live.
    fn user_for_session(&self, session_id: &str) -> Option<UserRecord>;

    /// Terminate a session.
    fn clear_session(&self, session_id: &str);
}

#[derive(Default)]
struct DirectoryInner {
    /// Local user id -> record.
    users: HashMap<String, UserRecord>,
    /// Session id -> local user id.
    sessions: HashMap<String, String>,
}

/// In-memory directory backend.
#[derive(Default)]
pub struct InMemoryDirectory {
    inner: RwLock<DirectoryInner>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, DirectoryInner> {
        // Lock poisoning is recoverable here; records are always written whole.
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, DirectoryInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn display_name(first_name: &str, last_name: &str) -> String {
    format!("{first_name} {last_name}").trim().to_string()
}

impl UserDirectory for InMemoryDirectory {
    fn find_by_external_id(&self, external_id: &str) -> Option<UserRecord> {
        self.read()
            .users
            .values()
            .find(|u| u.external_id == external_id)
            .cloned()
    }

    fn find_by_email(&self, email: &str) -> Option<UserRecord> {
        self.read()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
    }

    fn create_or_update(&self, user: NewUser) -> Result<UserRecord, DirectoryError> {
        let mut inner = self.write();
        let now = Utc::now();

        let existing_id = inner
            .users
            .values()
            .find(|u| u.external_id == user.external_id)
            .or_else(|| inner.users.values().find(|u| u.email == user.email))
            .map(|u| u.id.clone());

        let record = match existing_id {
            Some(id) => {
                let existing = inner
                    .users
                    .get_mut(&id)
                    .ok_or_else(|| DirectoryError::Update("record vanished mid-update".into()))?;
                // Always relink the Clerk id; the email fallback path may
                // have matched an account that predates SSO.
                existing.external_id = user.external_id;
                existing.email = user.email;
                existing.display_name = display_name(&user.first_name, &user.last_name);
                existing.first_name = user.first_name;
                existing.last_name = user.last_name;
                existing.updated_at = now;
                existing.clone()
            }
            None => {
                let record = UserRecord {
                    id: Uuid::new_v4().to_string(),
                    external_id: user.external_id,
                    email: user.email,
                    display_name: display_name(&user.first_name, &user.last_name),
                    first_name: user.first_name,
                    last_name: user.last_name,
                    created_at: now,
                    updated_at: now,
                };
                inner.users.insert(record.id.clone(), record.clone());
                record
            }
        };

        Ok(record)
    }

    fn set_current_session(&self, user_id: &str) -> String {
        let session_id = Uuid::new_v4().to_string();
        self.write()
            .sessions
            .insert(session_id.clone(), user_id.to_string());
        session_id
    }

    fn user_for_session(&self, session_id: &str) -> Option<UserRecord> {
        let inner = self.read();
        let user_id = inner.sessions.get(session_id)?;
        inner.users.get(user_id).cloned()
    }

    fn clear_session(&self, session_id: &str) {
        self.write().sessions.remove(session_id);
    }
}
