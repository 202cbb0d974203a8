//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables, with `__`
//! separating nested keys (e.g. `IDENTITY__SESSION_SECRET`).
//!
//! See [`IdentityConfig`](atelier_platform_access::IdentityConfig) for the
//! authentication settings.

use atelier_platform_access::IdentityConfig;
use serde::Deserialize;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL. Users are kept in memory when unset.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Address the HTTP listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Authentication configuration.
    #[serde(default)]
    pub identity: IdentityConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is present but invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(pairs: &[(&str, &str)]) -> ServerConfig {
        let mut builder = config::Config::builder();
        for (key, value) in pairs {
            builder = builder.set_override(*key, *value).expect("override");
        }
        builder
            .build()
            .expect("build")
            .try_deserialize()
            .expect("deserialize")
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]);
        assert_eq!(config.database_url, None);
        assert_eq!(config.listen_addr, "0.0.0.0:3000");
        assert!(!config.identity.oauth_enabled());
        assert!(config.identity.admin_allowlist().is_empty());
    }

    #[test]
    fn nested_identity_settings_are_read() {
        let config = load(&[
            ("database_url", "postgres://localhost/atelier"),
            ("identity.oauth_server_url", "https://oauth.example.com/"),
            ("identity.app_id", "app-123"),
            ("identity.session_secret", "s3cret"),
            ("identity.admin_email_allowlist", "a@b.com, C@D.com"),
        ]);

        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/atelier")
        );
        assert!(config.identity.oauth_enabled());
        assert_eq!(
            config.identity.oauth_server_url(),
            Some("https://oauth.example.com")
        );
        assert!(config.identity.session_codec().is_ok());
        assert!(config.identity.admin_allowlist().contains("c@d.com"));
    }
}
