//! Bearer-token identity backend client.

use async_trait::async_trait;
use atelier_core::OpenId;
use atelier_platform_access::{BackendUser, IdentityConfig, IdentityProviderError};
use reqwest::header::AUTHORIZATION;
use rootcause::prelude::Report;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

pub const USER_PATH: &str = "/auth/v1/user";

const PROVIDER: &str = "auth-backend";

/// Resolves bearer tokens to users.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Looks up the user a bearer token belongs to.
    async fn lookup_user(&self, token: &str) -> Result<BackendUser, Report<IdentityProviderError>>;
}

#[derive(Deserialize)]
struct BackendUserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// HTTP client for the identity backend.
#[derive(Debug, Clone)]
pub struct AuthBackendClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AuthBackendClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, Report<IdentityProviderError>> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityProviderError::Request {
                provider: PROVIDER.to_string(),
                details: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Creates a client from configuration, or `None` if the backend is not
    /// configured.
    pub fn from_config(
        config: &IdentityConfig,
    ) -> Result<Option<Self>, Report<IdentityProviderError>> {
        match (config.auth_backend_url(), config.auth_backend_key()) {
            (Some(url), Some(key)) => Self::new(url, key, config.request_timeout()).map(Some),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl IdentityBackend for AuthBackendClient {
    #[instrument(skip_all)]
    async fn lookup_user(&self, token: &str) -> Result<BackendUser, Report<IdentityProviderError>> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, USER_PATH))
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header("apikey", &self.api_key)
            .send()
            .await
            .map_err(|e| IdentityProviderError::Request {
                provider: PROVIDER.to_string(),
                details: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdentityProviderError::Rejected {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let body: BackendUserResponse =
            response
                .json()
                .await
                .map_err(|e| IdentityProviderError::InvalidResponse {
                    provider: PROVIDER.to_string(),
                    details: e.to_string(),
                })?;

        let id = OpenId::new(body.id).map_err(|e| IdentityProviderError::InvalidResponse {
            provider: PROVIDER.to_string(),
            details: e.to_string(),
        })?;
        Ok(BackendUser {
            id,
            email: body.email.filter(|e| !e.is_empty()),
        })
    }
}
