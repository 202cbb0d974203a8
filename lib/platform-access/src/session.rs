//! Signed session tokens carried in the session cookie.
//!
//! A session token is a compact HS256 JWT with the claims
//! `{openId, appId, name, exp}`. Nothing is stored server-side: a token is
//! valid as long as its signature checks out under the configured secret
//! and its expiry has not passed. Claims are signed, not encrypted.

use atelier_core::OpenId;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::SessionError;

/// Name of the cookie that carries the session token.
pub const SESSION_COOKIE_NAME: &str = "app_session_id";

/// One year in milliseconds, the default session lifetime.
pub const ONE_YEAR_MS: i64 = 365 * 24 * 60 * 60 * 1000;

/// Default session lifetime.
#[must_use]
pub fn default_session_ttl() -> Duration {
    Duration::milliseconds(ONE_YEAR_MS)
}

/// The identity claims of a verified session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPayload {
    pub open_id: OpenId,
    pub app_id: String,
    pub name: String,
}

impl SessionPayload {
    #[must_use]
    pub fn new(open_id: OpenId, app_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            open_id,
            app_id: app_id.into(),
            name: name.into(),
        }
    }
}

#[derive(Serialize)]
struct SessionClaims<'a> {
    #[serde(rename = "openId")]
    open_id: &'a str,
    #[serde(rename = "appId")]
    app_id: &'a str,
    name: &'a str,
    exp: i64,
}

/// Claims as found in an incoming token, before shape validation.
#[derive(Deserialize)]
struct RawSessionClaims {
    #[serde(rename = "openId", default)]
    open_id: Option<Value>,
    #[serde(rename = "appId", default)]
    app_id: Option<Value>,
    #[serde(default)]
    name: Option<Value>,
}

/// Signs and verifies session tokens with a shared secret.
#[derive(Clone)]
pub struct SessionCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionCodec {
    /// Creates a codec keyed by `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MissingSecret`] if the secret is empty.
    pub fn new(secret: &str) -> Result<Self, SessionError> {
        if secret.is_empty() {
            return Err(SessionError::MissingSecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Signs a session valid for `ttl` (one year when `None`) from now.
    pub fn sign(
        &self,
        payload: &SessionPayload,
        ttl: Option<Duration>,
    ) -> Result<String, SessionError> {
        self.sign_issued_at(payload, ttl, Utc::now())
    }

    /// Signs a session as if it had been issued at `issued_at`.
    pub fn sign_issued_at(
        &self,
        payload: &SessionPayload,
        ttl: Option<Duration>,
        issued_at: DateTime<Utc>,
    ) -> Result<String, SessionError> {
        let expires_at = issued_at + ttl.unwrap_or_else(default_session_ttl);
        let claims = SessionClaims {
            open_id: payload.open_id.as_str(),
            app_id: &payload.app_id,
            name: &payload.name,
            exp: expires_at.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            SessionError::Signing {
                reason: e.to_string(),
            }
        })
    }

    /// Verifies a token and returns its identity claims.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Expired`] if the embedded expiry has passed
    /// - [`SessionError::MalformedClaims`] if `openId`, `appId` or `name` is
    ///   missing or not a non-empty string
    /// - [`SessionError::InvalidSignature`] for anything else that fails to
    ///   validate, including tokens that are not well-formed JWTs
    pub fn verify(&self, token: &str) -> Result<SessionPayload, SessionError> {
        let data = decode::<RawSessionClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => SessionError::Expired,
                ErrorKind::MissingRequiredClaim(claim) => SessionError::MalformedClaims {
                    reason: format!("missing {claim}"),
                },
                _ => SessionError::InvalidSignature,
            })?;

        let claims = data.claims;
        let open_id = required_string(claims.open_id, "openId")?;
        let app_id = required_string(claims.app_id, "appId")?;
        let name = required_string(claims.name, "name")?;

        let open_id = OpenId::new(open_id).map_err(|e| SessionError::MalformedClaims {
            reason: e.to_string(),
        })?;

        Ok(SessionPayload {
            open_id,
            app_id,
            name,
        })
    }
}

impl fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCodec")
            .field("algorithm", &Algorithm::HS256)
            .finish_non_exhaustive()
    }
}

fn required_string(value: Option<Value>, claim: &str) -> Result<String, SessionError> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Ok(s),
        _ => Err(SessionError::MalformedClaims {
            reason: format!("{claim} must be a non-empty string"),
        }),
    }
}
