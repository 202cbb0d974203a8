//! Authentication for the atelier server.
//!
//! This module provides:
//! - The OAuth callback that turns an authorization code into a session cookie
//! - Per-request authentication by bearer token or session cookie
//! - Extractors that expose the caller to route handlers
//!
//! # Roles
//!
//! The admin role is derived from the configured email allowlist on every
//! authentication. A user removed from the allowlist loses the role on their
//! next request.

pub mod authenticator;
pub mod backend;
pub mod cookies;
pub mod db;
pub mod middleware;
pub mod provider;
pub mod routes;

use atelier_platform_access::{
    AdminAllowlist, IdentityConfig, IdentityProviderError, SessionCodec, UserStore,
    UserSynchronizer,
};
use rootcause::prelude::Report;
use std::sync::Arc;
use tracing::warn;

pub use authenticator::{BearerStrategy, RequestAuthenticator, SessionStrategy};
pub use backend::{AuthBackendClient, IdentityBackend};
pub use middleware::{RequestContext, RequireAdmin, RequireAuth};
pub use provider::{IdentityProvider, OAuthServerClient};
pub use routes::{logout, me, oauth_callback};

/// Shared application state.
pub struct AppState {
    /// Application id embedded in session tokens.
    pub app_id: Option<String>,
    /// Session codec, absent when no secret is configured.
    pub session_codec: Option<SessionCodec>,
    /// OAuth server client, absent when not configured.
    pub provider: Option<Arc<dyn IdentityProvider>>,
    pub allowlist: Arc<AdminAllowlist>,
    pub synchronizer: UserSynchronizer,
    pub authenticator: RequestAuthenticator,
}

impl AppState {
    /// Creates application state from explicit collaborators.
    pub fn new(
        config: &IdentityConfig,
        store: Arc<dyn UserStore>,
        provider: Option<Arc<dyn IdentityProvider>>,
        backend: Option<Arc<dyn IdentityBackend>>,
    ) -> Self {
        let session_codec = match config.session_codec() {
            Ok(codec) => Some(codec),
            Err(e) => {
                warn!(error = %e, "session cookies are disabled");
                None
            }
        };
        let allowlist = Arc::new(config.admin_allowlist());
        let synchronizer = UserSynchronizer::new(store);

        let bearer = backend.map(|backend| BearerStrategy::new(backend, Arc::clone(&allowlist)));
        let session = SessionStrategy::new(
            session_codec.clone(),
            synchronizer.clone(),
            provider.clone(),
            Arc::clone(&allowlist),
        );

        Self {
            app_id: config.app_id().map(str::to_string),
            session_codec,
            provider,
            allowlist,
            synchronizer,
            authenticator: RequestAuthenticator::new(bearer, session),
        }
    }

    /// Creates application state, building HTTP clients for whatever
    /// external services are configured.
    pub fn from_config(
        config: &IdentityConfig,
        store: Arc<dyn UserStore>,
    ) -> Result<Self, Report<IdentityProviderError>> {
        let provider = OAuthServerClient::from_config(config)?
            .map(|client| Arc::new(client) as Arc<dyn IdentityProvider>);
        if provider.is_none() {
            warn!("OAuth server is not configured; sign-in is disabled");
        }

        let backend = AuthBackendClient::from_config(config)?
            .map(|client| Arc::new(client) as Arc<dyn IdentityBackend>);
        if backend.is_none() {
            warn!("identity backend is not configured; bearer tokens are ignored");
        }

        if config.admin_allowlist().is_empty() {
            warn!("admin email allowlist is empty; no user will be an admin");
        }

        Ok(Self::new(config, store, provider, backend))
    }
}
