//! Authentication extractors for Axum.

use atelier_platform_access::{
    AuthOutcome, AuthStrategy, AuthenticatedUser, AuthenticationError,
};
use axum::{
    Json,
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;

use super::AppState;

/// The caller of the current request, if any.
///
/// Never rejects: a denied credential degrades to anonymous.
pub struct RequestContext(pub Option<AuthenticatedUser>);

impl<S> FromRequestParts<S> for RequestContext
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = Arc::<AppState>::from_ref(state);
        let outcome = app_state.authenticator.authenticate(&parts.headers).await;
        Ok(RequestContext(outcome.into_user()))
    }
}

/// Extractor for requiring an authenticated caller.
///
/// Rejects with 401 when no credential was presented or the bearer token was
/// refused, and with 403 when a presented session cookie fails.
pub struct RequireAuth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = Arc::<AppState>::from_ref(state);
        match app_state.authenticator.authenticate(&parts.headers).await {
            AuthOutcome::Authenticated(user) => Ok(RequireAuth(*user)),
            AuthOutcome::Anonymous
            | AuthOutcome::Denied {
                strategy: AuthStrategy::Bearer,
                ..
            }
            | AuthOutcome::Denied {
                error: AuthenticationError::MissingSession,
                ..
            } => Err(AuthRejection::NotAuthenticated),
            AuthOutcome::Denied { error, .. } => {
                Err(AuthRejection::Forbidden(error.public_message()))
            }
        }
    }
}

/// Extractor for requiring an authenticated admin.
pub struct RequireAdmin(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            return Err(AuthRejection::AdminRequired);
        }

        Ok(RequireAdmin(user))
    }
}

/// Rejection type for authentication extractors.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthRejection {
    NotAuthenticated,
    Forbidden(&'static str),
    AdminRequired,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotAuthenticated => (StatusCode::UNAUTHORIZED, "Please login"),
            Self::Forbidden(message) => (StatusCode::FORBIDDEN, message),
            Self::AdminRequired => (StatusCode::FORBIDDEN, "Admin access required"),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
