//! Identity types shared by the authentication strategies.
//!
//! - `UserInfo`: a user as described by the OAuth server
//! - `BackendUser`: a user as described by the bearer identity backend
//! - `Identity`: what the rest of the request pipeline sees
//! - `AuthOutcome`: the terminal state of authenticating one request

use atelier_core::OpenId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthenticationError;
use crate::login_method::derive_login_method;
use crate::role::Role;
use crate::user::{User, UserUpsert};

/// User information returned by the OAuth server, normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    /// Stable identity. The provider may omit it, which aborts the flow.
    pub open_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub login_method: Option<String>,
}

impl UserInfo {
    /// Normalizes the provider's raw fields.
    #[must_use]
    pub fn from_provider<S: AsRef<str>>(
        open_id: Option<String>,
        name: Option<String>,
        email: Option<String>,
        platform: Option<&str>,
        platforms: &[S],
    ) -> Self {
        Self {
            open_id,
            name: name.filter(|n| !n.is_empty()),
            email,
            login_method: derive_login_method(platform, platforms),
        }
    }

    /// Returns the stable identity, or `MalformedIdentity` if absent.
    pub fn require_open_id(&self) -> Result<OpenId, AuthenticationError> {
        self.open_id
            .as_deref()
            .and_then(|id| OpenId::new(id).ok())
            .ok_or(AuthenticationError::MalformedIdentity)
    }

    /// Builds the upsert recording a successful sign-in.
    #[must_use]
    pub fn to_upsert(&self, open_id: OpenId, role: Role, now: DateTime<Utc>) -> UserUpsert {
        UserUpsert::new(open_id)
            .with_name(self.name.clone())
            .with_email(self.email.clone())
            .with_login_method(self.login_method.clone())
            .with_role(role)
            .signed_in_at(now)
    }

    /// Name to embed in a session token.
    ///
    /// Session verification requires a non-empty name, so fall back to the
    /// email and then the identity itself.
    #[must_use]
    pub fn session_name(&self, open_id: &OpenId) -> String {
        self.name
            .clone()
            .or_else(|| self.email.clone().filter(|e| !e.is_empty()))
            .unwrap_or_else(|| open_id.to_string())
    }
}

/// User returned by the bearer identity backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendUser {
    pub id: OpenId,
    pub email: Option<String>,
}

/// Which strategy resolved (or denied) a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStrategy {
    /// `Authorization: Bearer` validated by the identity backend.
    Bearer,
    /// Session cookie verified locally.
    SessionCookie,
}

/// The authenticated identity exposed to request handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: OpenId,
    pub email: Option<String>,
    pub role: Role,
}

impl Identity {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Represents an authenticated caller.
///
/// The session strategy also carries the synchronized user record.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    identity: Identity,
    strategy: AuthStrategy,
    user: Option<User>,
}

impl AuthenticatedUser {
    /// Creates a caller resolved from a bearer token.
    #[must_use]
    pub fn from_bearer(identity: Identity) -> Self {
        Self {
            identity,
            strategy: AuthStrategy::Bearer,
            user: None,
        }
    }

    /// Creates a caller resolved from a session cookie.
    #[must_use]
    pub fn from_session(user: User, role: Role) -> Self {
        let identity = Identity {
            id: user.id().clone(),
            email: user.email().map(str::to_string),
            role,
        };
        Self {
            identity,
            strategy: AuthStrategy::SessionCookie,
            user: Some(user),
        }
    }

    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    #[must_use]
    pub fn strategy(&self) -> AuthStrategy {
        self.strategy
    }

    /// Returns the stored user record, when the session strategy loaded one.
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.identity.is_admin()
    }

    /// Consumes the caller, returning its identity.
    #[must_use]
    pub fn into_identity(self) -> Identity {
        self.identity
    }
}

/// Terminal state of authenticating one request.
#[derive(Debug)]
pub enum AuthOutcome {
    /// No usable credential was presented.
    Anonymous,
    /// A strategy resolved the caller.
    Authenticated(Box<AuthenticatedUser>),
    /// A credential was presented and rejected.
    Denied {
        strategy: AuthStrategy,
        error: AuthenticationError,
    },
}

impl AuthOutcome {
    /// Returns the caller if authenticated; denial degrades to anonymous.
    #[must_use]
    pub fn into_user(self) -> Option<AuthenticatedUser> {
        match self {
            Self::Authenticated(user) => Some(*user),
            Self::Anonymous | Self::Denied { .. } => None,
        }
    }
}
