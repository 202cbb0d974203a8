//! Error types for the platform-access crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `SessionError`: Session token signing and verification failures
//! - `IdentityProviderError`: OAuth server and identity backend failures
//! - `StoreError`: User store failures
//! - `AuthenticationError`: Why a request was denied an identity

use std::fmt;

/// Errors from the session codec.
///
/// All verification failures deny authentication the same way, but the
/// variants stay distinct so logs can tell them apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The signature does not validate under the configured secret.
    InvalidSignature,
    /// The token's embedded expiry is in the past.
    Expired,
    /// A required claim is missing or not a non-empty string.
    MalformedClaims { reason: String },
    /// The token could not be produced.
    Signing { reason: String },
    /// No signing secret is configured.
    MissingSecret,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSignature => write!(f, "session signature is invalid"),
            Self::Expired => write!(f, "session has expired"),
            Self::MalformedClaims { reason } => {
                write!(f, "session claims are malformed: {reason}")
            }
            Self::Signing { reason } => write!(f, "failed to sign session: {reason}"),
            Self::MissingSecret => write!(f, "session secret is not configured"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Errors from talking to the OAuth server or the bearer identity backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityProviderError {
    /// The OAuth `state` parameter could not be decoded into a redirect URI.
    InvalidState { reason: String },
    /// The request never produced a response (network, timeout).
    Request { provider: String, details: String },
    /// The provider answered with a non-success status.
    Rejected { provider: String, status: u16 },
    /// The provider's response body could not be understood.
    InvalidResponse { provider: String, details: String },
}

impl fmt::Display for IdentityProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidState { reason } => write!(f, "invalid OAuth state: {reason}"),
            Self::Request { provider, details } => {
                write!(f, "request to '{provider}' failed: {details}")
            }
            Self::Rejected { provider, status } => {
                write!(f, "'{provider}' rejected the request with status {status}")
            }
            Self::InvalidResponse { provider, details } => {
                write!(f, "invalid response from '{provider}': {details}")
            }
        }
    }
}

impl std::error::Error for IdentityProviderError {}

/// Errors from the user store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing database failed.
    Database { details: String },
    /// A stored row could not be turned into a `User`.
    InvalidRecord { id: String, details: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database { details } => write!(f, "user store error: {details}"),
            Self::InvalidRecord { id, details } => {
                write!(f, "invalid user record '{id}': {details}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Reasons a request was denied an authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    /// No session cookie was sent.
    MissingSession,
    /// The session cookie failed verification.
    InvalidSession(SessionError),
    /// Session signing is not configured, so no cookie can be trusted.
    SessionsDisabled,
    /// The identity backend rejected the bearer token or could not be reached.
    BackendRejected { reason: String },
    /// The provider returned a user without a stable identifier.
    MalformedIdentity,
    /// Re-resolving an unknown session user from the provider failed.
    SyncFailure { reason: String },
    /// The user is still absent after a successful re-resolve.
    UserNotFound { open_id: String },
    /// The user store failed while resolving the session.
    Store { reason: String },
}

impl AuthenticationError {
    /// Message safe to show to the caller.
    ///
    /// Every session verification failure collapses to the same message.
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::MissingSession | Self::InvalidSession(_) | Self::SessionsDisabled => {
                "Invalid session cookie"
            }
            Self::BackendRejected { .. } => "Invalid bearer token",
            Self::MalformedIdentity => "openId missing from user info",
            Self::SyncFailure { .. } => "Failed to sync user info",
            Self::UserNotFound { .. } => "User not found",
            Self::Store { .. } => "Failed to load user",
        }
    }
}

impl fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSession => write!(f, "missing session cookie"),
            Self::InvalidSession(err) => write!(f, "invalid session: {err}"),
            Self::SessionsDisabled => write!(f, "session secret is not configured"),
            Self::BackendRejected { reason } => {
                write!(f, "identity backend rejected bearer token: {reason}")
            }
            Self::MalformedIdentity => write!(f, "provider returned no openId"),
            Self::SyncFailure { reason } => write!(f, "failed to sync user info: {reason}"),
            Self::UserNotFound { open_id } => write!(f, "user not found: {open_id}"),
            Self::Store { reason } => write!(f, "user store failure: {reason}"),
        }
    }
}

impl std::error::Error for AuthenticationError {}
