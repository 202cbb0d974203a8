//! Authentication routes: OAuth callback, logout, and current caller.

use atelier_platform_access::{Identity, SessionPayload, UserInfo, default_session_ttl};
use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, Uri, header::LOCATION},
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use oauth2::AuthorizationCode;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument};

use super::{
    AppState,
    cookies::{is_secure_request, removal_cookie, session_cookie},
    middleware::RequestContext,
};

/// Query parameters for the OAuth callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

impl CallbackQuery {
    fn into_parts(self) -> Option<(String, String)> {
        let code = self.code.filter(|c| !c.is_empty())?;
        let state = self.state.filter(|s| !s.is_empty())?;
        Some((code, state))
    }
}

/// Completes the OAuth flow: exchanges the code, records the user, and sets
/// the session cookie.
#[instrument(skip_all)]
pub async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
    uri: Uri,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<impl IntoResponse, CallbackError> {
    let (code, oauth_state) = query.into_parts().ok_or(CallbackError::MissingParameters)?;

    let provider = state
        .provider
        .as_ref()
        .ok_or(CallbackError::NotConfigured("OAuth server"))?;
    let codec = state
        .session_codec
        .as_ref()
        .ok_or(CallbackError::NotConfigured("session secret"))?;
    let app_id = state
        .app_id
        .as_deref()
        .ok_or(CallbackError::NotConfigured("app id"))?;

    let access_token = provider
        .exchange_code_for_token(&AuthorizationCode::new(code), &oauth_state)
        .await
        .map_err(|e| CallbackError::Provider(e.to_string()))?;
    let info: UserInfo = provider
        .get_user_info(&access_token)
        .await
        .map_err(|e| CallbackError::Provider(e.to_string()))?;
    let open_id = info
        .require_open_id()
        .map_err(|_| CallbackError::MissingOpenId)?;

    let role = state.allowlist.resolve(info.email.as_deref());
    state
        .synchronizer
        .record_sign_in(open_id.clone(), &info, role, Utc::now())
        .await
        .map_err(|e| CallbackError::Store(e.to_string()))?;

    let payload = SessionPayload::new(open_id.clone(), app_id, info.session_name(&open_id));
    let token = codec
        .sign(&payload, Some(default_session_ttl()))
        .map_err(|e| CallbackError::Session(e.to_string()))?;

    info!(open_id = %open_id, role = %role, "user signed in");

    let cookie = session_cookie(token, is_secure_request(&uri, &headers));
    Ok((
        StatusCode::FOUND,
        jar.add(cookie),
        [(LOCATION, HeaderValue::from_static("/"))],
    ))
}

/// Clears the session cookie.
pub async fn logout(uri: Uri, headers: HeaderMap, jar: CookieJar) -> impl IntoResponse {
    let cookie = removal_cookie(is_secure_request(&uri, &headers));
    (jar.add(cookie), Json(json!({ "success": true })))
}

/// Returns the caller's identity, or `null` when anonymous.
pub async fn me(RequestContext(user): RequestContext) -> Json<Option<Identity>> {
    Json(user.map(|u| u.into_identity()))
}

/// OAuth callback errors.
#[derive(Debug)]
pub enum CallbackError {
    MissingParameters,
    MissingOpenId,
    NotConfigured(&'static str),
    Provider(String),
    Store(String),
    Session(String),
}

impl IntoResponse for CallbackError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::MissingParameters => (StatusCode::BAD_REQUEST, "code and state are required"),
            Self::MissingOpenId => (StatusCode::BAD_REQUEST, "openId missing from user info"),
            Self::NotConfigured(what) => {
                error!("OAuth callback failed: {} is not configured", what);
                (StatusCode::INTERNAL_SERVER_ERROR, "OAuth callback failed")
            }
            Self::Provider(msg) => {
                error!("OAuth callback failed: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "OAuth callback failed")
            }
            Self::Store(msg) => {
                error!("Failed to record sign-in: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "OAuth callback failed")
            }
            Self::Session(msg) => {
                error!("Failed to sign session: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "OAuth callback failed")
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
