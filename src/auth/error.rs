// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication error types.
//!
//! Verification outcomes are returned as values, never thrown: every
//! authentication attempt produces either claims or exactly one of the
//! variants below, and the caller handles each variant explicitly.

use crate::clerk::ClerkError;
use crate::directory::DirectoryError;

/// Failure while obtaining the provider's public-key set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeySetError {
    /// Network-level failure: transport error, timeout, or non-200 response.
    #[error("failed to fetch key set: {0}")]
    Fetch(String),

    /// The provider response was not a usable key-set document.
    #[error("key set document is invalid or contains no keys")]
    InvalidKeySet,
}

/// Classified outcome of a failed token verification.
///
/// Exactly one of these (or verified claims) results from any verification
/// attempt. `SignatureInvalid` covers both a bad signature and a key id
/// absent from the current key set; callers cannot distinguish the two, but
/// `SignatureInvalid` is the only variant that triggers the one-shot
/// rotation-recovery retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    /// The `exp` claim is in the past.
    #[error("session token has expired")]
    Expired,

    /// The `nbf` claim is in the future.
    #[error("session token is not yet valid")]
    NotYetValid,

    /// Signature mismatch, or no key in the set matches the token's key id.
    #[error("session token signature is invalid")]
    SignatureInvalid,

    /// Structural problem: bad encoding, missing required claims, or a
    /// disallowed algorithm.
    #[error("session token is malformed")]
    Malformed,

    /// The key set could not be obtained at all.
    #[error(transparent)]
    KeySet(#[from] KeySetError),
}

impl VerificationError {
    /// Stable identifier for diagnostic logs.
    pub fn kind(&self) -> &'static str {
        match self {
            VerificationError::Expired => "expired",
            VerificationError::NotYetValid => "not_yet_valid",
            VerificationError::SignatureInvalid => "signature_invalid",
            VerificationError::Malformed => "malformed",
            VerificationError::KeySet(KeySetError::Fetch(_)) => "keyset_fetch_error",
            VerificationError::KeySet(KeySetError::InvalidKeySet) => "keyset_invalid",
        }
    }
}

/// Terminal failure of one authentication attempt.
///
/// Produced by the session authenticator after local recovery (the rotation
/// retry) is exhausted. The web layer translates any of these into the same
/// user-visible behavior: cleared session cookie plus a fallback redirect.
#[derive(Debug, thiserror::Error)]
pub enum AuthFailure {
    #[error("token verification failed: {0}")]
    Verification(#[from] VerificationError),

    #[error("fetching user details failed: {0}")]
    Provider(#[from] ClerkError),

    #[error("user directory rejected the login: {0}")]
    Directory(#[from] DirectoryError),
}

impl AuthFailure {
    /// Stable identifier for diagnostic logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthFailure::Verification(e) => e.kind(),
            AuthFailure::Provider(_) => "provider_error",
            AuthFailure::Directory(_) => "directory_error",
        }
    }
}
