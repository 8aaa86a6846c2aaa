// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Clerk SSO Gateway
//!
//! This crate provides a small HTTP gateway that delegates login to
//! Clerk-hosted single sign-on: it verifies Clerk session tokens against the
//! instance JWKS, mirrors provider users into a local directory, and manages
//! the local session around the browser-side handshake.
//!
//! ## Modules
//!
//! - `api` - HTTP handlers and router (Axum)
//! - `auth` - Token verification, key-set cache, session authentication
//! - `clerk` - Clerk Backend API client
//! - `config` - Environment-driven options
//! - `directory` - Local user directory and sessions
//! - `state` - Shared application state

pub mod api;
pub mod auth;
pub mod clerk;
pub mod config;
pub mod directory;
pub mod state;
