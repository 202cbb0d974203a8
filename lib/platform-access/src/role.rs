//! Role resolution for platform access control.
//!
//! Administrative access is granted by a statically configured email
//! allowlist. The allowlist is loaded once at startup and never mutated,
//! and the role is recomputed from it on every request.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Platform access role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Standard visitor.
    #[default]
    User,
    /// Studio administrator.
    Admin,
}

impl Role {
    /// Returns true if this role has admin privileges.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Returns the stored representation of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Set of lower-cased email addresses granted the admin role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminAllowlist {
    emails: HashSet<String>,
}

impl AdminAllowlist {
    /// Creates an empty allowlist. Nobody is admin.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses a comma-separated list of emails.
    ///
    /// Entries are trimmed and lower-cased; blank entries are dropped.
    #[must_use]
    pub fn from_comma_list(raw: &str) -> Self {
        Self::from_emails(raw.split(','))
    }

    /// Builds an allowlist from individual email strings.
    #[must_use]
    pub fn from_emails<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let emails = emails
            .into_iter()
            .map(|e| e.as_ref().trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { emails }
    }

    /// Returns true if no email is allowlisted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    /// Number of allowlisted emails.
    #[must_use]
    pub fn len(&self) -> usize {
        self.emails.len()
    }

    /// Returns true if the email (compared case-insensitively) is allowlisted.
    #[must_use]
    pub fn contains(&self, email: &str) -> bool {
        !self.emails.is_empty() && self.emails.contains(&email.trim().to_lowercase())
    }

    /// Resolves the role for an authenticated email.
    ///
    /// A missing email is never admin.
    #[must_use]
    pub fn resolve(&self, email: Option<&str>) -> Role {
        match email {
            Some(email) if self.contains(email) => Role::Admin,
            _ => Role::User,
        }
    }
}
