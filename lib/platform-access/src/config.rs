//! Identity configuration.
//!
//! Every field is optional. A missing piece disables the strategy that
//! depends on it instead of failing start-up:
//! - no `oauth_server_url`/`app_id`: the OAuth callback cannot complete
//! - no `session_secret`: session cookies are never issued nor trusted
//! - no `auth_backend_url`/`auth_backend_key`: bearer tokens resolve to anonymous

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::SessionError;
use crate::role::AdminAllowlist;
use crate::session::SessionCodec;

/// Process-wide identity configuration, loaded once at start-up.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Base URL of the OAuth server used for the code exchange.
    #[serde(default)]
    oauth_server_url: Option<String>,
    /// Application id registered with the OAuth server.
    #[serde(default)]
    app_id: Option<String>,
    /// Secret used to sign session tokens.
    #[serde(default)]
    session_secret: Option<String>,
    /// Comma-separated list of admin emails.
    #[serde(default)]
    admin_email_allowlist: String,
    /// Base URL of the identity backend that validates bearer tokens.
    #[serde(default)]
    auth_backend_url: Option<String>,
    /// Service credential for the identity backend.
    #[serde(default)]
    auth_backend_key: Option<String>,
    /// Timeout for every outbound identity request, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

impl IdentityConfig {
    /// Creates an empty configuration: every strategy disabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_oauth_server(mut self, url: impl Into<String>, app_id: impl Into<String>) -> Self {
        self.oauth_server_url = Some(url.into());
        self.app_id = Some(app_id.into());
        self
    }

    #[must_use]
    pub fn with_session_secret(mut self, secret: impl Into<String>) -> Self {
        self.session_secret = Some(secret.into());
        self
    }

    #[must_use]
    pub fn with_admin_emails(mut self, raw: impl Into<String>) -> Self {
        self.admin_email_allowlist = raw.into();
        self
    }

    #[must_use]
    pub fn with_auth_backend(mut self, url: impl Into<String>, key: impl Into<String>) -> Self {
        self.auth_backend_url = Some(url.into());
        self.auth_backend_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Returns the OAuth server base URL without a trailing slash.
    #[must_use]
    pub fn oauth_server_url(&self) -> Option<&str> {
        non_empty(self.oauth_server_url.as_ref()).map(|url| url.trim_end_matches('/'))
    }

    #[must_use]
    pub fn app_id(&self) -> Option<&str> {
        non_empty(self.app_id.as_ref())
    }

    #[must_use]
    pub fn session_secret(&self) -> Option<&str> {
        non_empty(self.session_secret.as_ref())
    }

    /// Returns the identity backend URL without a trailing slash.
    #[must_use]
    pub fn auth_backend_url(&self) -> Option<&str> {
        non_empty(self.auth_backend_url.as_ref()).map(|url| url.trim_end_matches('/'))
    }

    #[must_use]
    pub fn auth_backend_key(&self) -> Option<&str> {
        non_empty(self.auth_backend_key.as_ref())
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Parses the admin allowlist.
    #[must_use]
    pub fn admin_allowlist(&self) -> AdminAllowlist {
        AdminAllowlist::from_comma_list(&self.admin_email_allowlist)
    }

    /// Builds the session codec from the configured secret.
    pub fn session_codec(&self) -> Result<SessionCodec, SessionError> {
        SessionCodec::new(self.session_secret().unwrap_or_default())
    }

    /// Returns true if bearer tokens can be validated.
    #[must_use]
    pub fn bearer_auth_enabled(&self) -> bool {
        self.auth_backend_url().is_some() && self.auth_backend_key().is_some()
    }

    /// Returns true if the OAuth code exchange can run.
    #[must_use]
    pub fn oauth_enabled(&self) -> bool {
        self.oauth_server_url().is_some() && self.app_id().is_some()
    }
}
