//! User domain type and the partial record used for upserts.
//!
//! A user is keyed by the stable `OpenId` issued by the identity backend.
//! Records are created on first successful authentication and refreshed on
//! every subsequent one. This crate never deletes them.

use atelier_core::OpenId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::role::Role;

/// Represents a user who has authenticated at least once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Stable external identity, the primary key.
    id: OpenId,
    /// Display name from the provider.
    name: Option<String>,
    /// Email address from the provider.
    email: Option<String>,
    /// Normalized login method tag (e.g. "google", "email").
    login_method: Option<String>,
    /// Last resolved role. Informational; access checks use the allowlist.
    role: Role,
    /// When the record was first inserted.
    created_at: DateTime<Utc>,
    /// When the user last completed authentication.
    last_signed_in: DateTime<Utc>,
}

impl User {
    /// Creates the record inserted for a first-time user.
    ///
    /// Fields absent from the upsert take their column defaults.
    #[must_use]
    pub fn from_upsert(upsert: UserUpsert, now: DateTime<Utc>) -> Self {
        Self {
            id: upsert.id,
            name: upsert.name,
            email: upsert.email,
            login_method: upsert.login_method,
            role: upsert.role.unwrap_or_default(),
            created_at: now,
            last_signed_in: upsert.last_signed_in.unwrap_or(now),
        }
    }

    /// Creates a user with all fields specified.
    ///
    /// Use this when reconstituting a user from storage.
    #[must_use]
    pub fn with_all_fields(
        id: OpenId,
        name: Option<String>,
        email: Option<String>,
        login_method: Option<String>,
        role: Role,
        created_at: DateTime<Utc>,
        last_signed_in: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            email,
            login_method,
            role,
            created_at,
            last_signed_in,
        }
    }

    /// Merges the fields present in `upsert`; the id never changes.
    pub fn merge(&mut self, upsert: UserUpsert) {
        if let Some(name) = upsert.name {
            self.name = Some(name);
        }
        if let Some(email) = upsert.email {
            self.email = Some(email);
        }
        if let Some(login_method) = upsert.login_method {
            self.login_method = Some(login_method);
        }
        if let Some(role) = upsert.role {
            self.role = role;
        }
        if let Some(last_signed_in) = upsert.last_signed_in {
            self.last_signed_in = last_signed_in;
        }
    }

    #[must_use]
    pub fn id(&self) -> &OpenId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    #[must_use]
    pub fn login_method(&self) -> Option<&str> {
        self.login_method.as_deref()
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn last_signed_in(&self) -> DateTime<Utc> {
        self.last_signed_in
    }
}

/// Partial user record for insert-or-merge writes.
///
/// `None` means "leave the stored value alone" on merge and "use the
/// column default" on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserUpsert {
    pub id: OpenId,
    pub name: Option<String>,
    pub email: Option<String>,
    pub login_method: Option<String>,
    pub role: Option<Role>,
    pub last_signed_in: Option<DateTime<Utc>>,
}

impl UserUpsert {
    /// Creates an upsert that only names the user.
    #[must_use]
    pub fn new(id: OpenId) -> Self {
        Self {
            id,
            name: None,
            email: None,
            login_method: None,
            role: None,
            last_signed_in: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    #[must_use]
    pub fn with_login_method(mut self, login_method: Option<String>) -> Self {
        self.login_method = login_method;
        self
    }

    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    #[must_use]
    pub fn signed_in_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_signed_in = Some(at);
        self
    }
}
