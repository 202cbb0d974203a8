//! OAuth server client: authorization-code exchange and user-info lookup.
//!
//! The OAuth server speaks JSON over POST:
//! - `ExchangeToken`: `{clientId, grantType, code, redirectUri}` -> `{accessToken}`
//! - `GetUserInfo`: `{accessToken}` -> `{openId, name, email, platform, platforms}`
//! - `GetUserInfoWithJwt`: `{jwtToken, projectId}` -> same shape as `GetUserInfo`

use async_trait::async_trait;
use atelier_platform_access::{IdentityConfig, IdentityProviderError, UserInfo};
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use oauth2::{AccessToken, AuthorizationCode, RedirectUrl};
use rootcause::prelude::Report;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

pub const EXCHANGE_TOKEN_PATH: &str = "/webdev.v1.WebDevAuthPublicService/ExchangeToken";
pub const GET_USER_INFO_PATH: &str = "/webdev.v1.WebDevAuthPublicService/GetUserInfo";
pub const GET_USER_INFO_WITH_JWT_PATH: &str =
    "/webdev.v1.WebDevAuthPublicService/GetUserInfoWithJwt";

const PROVIDER: &str = "oauth-server";

/// Standard alphabet, padding optional on decode.
const STATE_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Identity exchange against the external OAuth server.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchanges an authorization code for an access token.
    ///
    /// `state` is the base64-encoded redirect URI the flow was started with.
    async fn exchange_code_for_token(
        &self,
        code: &AuthorizationCode,
        state: &str,
    ) -> Result<AccessToken, Report<IdentityProviderError>>;

    /// Fetches user info for an access token.
    async fn get_user_info(
        &self,
        access_token: &AccessToken,
    ) -> Result<UserInfo, Report<IdentityProviderError>>;

    /// Fetches user info for a session token issued by this application.
    async fn get_user_info_with_jwt(
        &self,
        jwt: &str,
    ) -> Result<UserInfo, Report<IdentityProviderError>>;
}

/// Decodes the OAuth `state` parameter into the redirect URI it carries.
pub fn decode_state(state: &str) -> Result<RedirectUrl, IdentityProviderError> {
    let bytes = STATE_ENGINE
        .decode(state.trim())
        .map_err(|e| IdentityProviderError::InvalidState {
            reason: format!("not base64: {e}"),
        })?;
    let uri = String::from_utf8(bytes).map_err(|e| IdentityProviderError::InvalidState {
        reason: format!("not utf-8: {e}"),
    })?;
    RedirectUrl::new(uri).map_err(|e| IdentityProviderError::InvalidState {
        reason: format!("invalid redirect URI: {e}"),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeTokenRequest<'a> {
    client_id: &'a str,
    grant_type: &'a str,
    code: &'a str,
    redirect_uri: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeTokenResponse {
    access_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserInfoRequest<'a> {
    access_token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserInfoWithJwtRequest<'a> {
    jwt_token: &'a str,
    project_id: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserInfoResponse {
    #[serde(default)]
    open_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    platforms: Vec<serde_json::Value>,
}

impl UserInfoResponse {
    fn into_user_info(self) -> UserInfo {
        let platforms: Vec<&str> = self
            .platforms
            .iter()
            .filter_map(serde_json::Value::as_str)
            .collect();
        UserInfo::from_provider(
            self.open_id,
            self.name,
            self.email,
            self.platform.as_deref(),
            &platforms,
        )
    }
}

/// HTTP client for the OAuth server.
#[derive(Debug, Clone)]
pub struct OAuthServerClient {
    http: reqwest::Client,
    base_url: String,
    app_id: String,
}

impl OAuthServerClient {
    /// Creates a client for `base_url`, identifying as `app_id`.
    pub fn new(
        base_url: &str,
        app_id: &str,
        timeout: Duration,
    ) -> Result<Self, Report<IdentityProviderError>> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| IdentityProviderError::Request {
                provider: PROVIDER.to_string(),
                details: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            app_id: app_id.to_string(),
        })
    }

    /// Creates a client from configuration, or `None` if the OAuth server
    /// is not configured.
    pub fn from_config(
        config: &IdentityConfig,
    ) -> Result<Option<Self>, Report<IdentityProviderError>> {
        match (config.oauth_server_url(), config.app_id()) {
            (Some(url), Some(app_id)) => {
                Self::new(url, app_id, config.request_timeout()).map(Some)
            }
            _ => Ok(None),
        }
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, Report<IdentityProviderError>>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .json(body)
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

        let body = response
            .json::<R>()
            .await
            .map_err(|e| IdentityProviderError::InvalidResponse {
                provider: PROVIDER.to_string(),
                details: e.to_string(),
            })?;
        Ok(body)
    }
}

#[async_trait]
impl IdentityProvider for OAuthServerClient {
    #[instrument(skip_all)]
    async fn exchange_code_for_token(
        &self,
        code: &AuthorizationCode,
        state: &str,
    ) -> Result<AccessToken, Report<IdentityProviderError>> {
        let redirect_uri = decode_state(state)?;
        debug!(redirect_uri = %redirect_uri.as_str(), "exchanging authorization code");

        let request = ExchangeTokenRequest {
            client_id: &self.app_id,
            grant_type: "authorization_code",
            code: code.secret(),
            redirect_uri: redirect_uri.as_str(),
        };
        let response: ExchangeTokenResponse = self.post(EXCHANGE_TOKEN_PATH, &request).await?;

        if response.access_token.is_empty() {
            return Err(IdentityProviderError::InvalidResponse {
                provider: PROVIDER.to_string(),
                details: "empty access token".to_string(),
            }
            .into());
        }
        Ok(AccessToken::new(response.access_token))
    }

    #[instrument(skip_all)]
    async fn get_user_info(
        &self,
        access_token: &AccessToken,
    ) -> Result<UserInfo, Report<IdentityProviderError>> {
        let request = UserInfoRequest {
            access_token: access_token.secret(),
        };
        let response: UserInfoResponse = self.post(GET_USER_INFO_PATH, &request).await?;
        Ok(response.into_user_info())
    }

    #[instrument(skip_all)]
    async fn get_user_info_with_jwt(
        &self,
        jwt: &str,
    ) -> Result<UserInfo, Report<IdentityProviderError>> {
        let request = UserInfoWithJwtRequest {
            jwt_token: jwt,
            project_id: &self.app_id,
        };
        let response: UserInfoResponse = self.post(GET_USER_INFO_WITH_JWT_PATH, &request).await?;
        Ok(response.into_user_info())
    }
}
