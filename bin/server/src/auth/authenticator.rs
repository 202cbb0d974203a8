//! Per-request authentication.
//!
//! A request is resolved by exactly one strategy:
//! - `Authorization: Bearer <token>` present: the identity backend decides
//! - otherwise: the session cookie is verified locally, and the user record
//!   is loaded (resynchronized from the OAuth server when missing)
//!
//! Both strategies resolve the role from the admin allowlist.

use atelier_core::OpenId;
use atelier_platform_access::{
    AdminAllowlist, AuthOutcome, AuthStrategy, AuthenticatedUser, AuthenticationError, Identity,
    SESSION_COOKIE_NAME, SessionCodec, User, UserSynchronizer, UserUpsert,
};
use axum::http::{HeaderMap, header::AUTHORIZATION};
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::backend::IdentityBackend;
use super::provider::IdentityProvider;

/// Extracts a non-empty bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
}

/// Extracts the session cookie value.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE_NAME)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// Validates bearer tokens against the identity backend.
#[derive(Clone)]
pub struct BearerStrategy {
    backend: Arc<dyn IdentityBackend>,
    allowlist: Arc<AdminAllowlist>,
}

impl BearerStrategy {
    pub fn new(backend: Arc<dyn IdentityBackend>, allowlist: Arc<AdminAllowlist>) -> Self {
        Self { backend, allowlist }
    }

    #[instrument(skip_all)]
    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, AuthenticationError> {
        let user = self.backend.lookup_user(token).await.map_err(|report| {
            AuthenticationError::BackendRejected {
                reason: report.to_string(),
            }
        })?;

        let role = self.allowlist.resolve(user.email.as_deref());
        Ok(AuthenticatedUser::from_bearer(Identity {
            id: user.id,
            email: user.email,
            role,
        }))
    }
}

/// Verifies session cookies and keeps the user record in step.
#[derive(Clone)]
pub struct SessionStrategy {
    codec: Option<SessionCodec>,
    synchronizer: UserSynchronizer,
    provider: Option<Arc<dyn IdentityProvider>>,
    allowlist: Arc<AdminAllowlist>,
}

impl SessionStrategy {
    pub fn new(
        codec: Option<SessionCodec>,
        synchronizer: UserSynchronizer,
        provider: Option<Arc<dyn IdentityProvider>>,
        allowlist: Arc<AdminAllowlist>,
    ) -> Self {
        Self {
            codec,
            synchronizer,
            provider,
            allowlist,
        }
    }

    #[instrument(skip_all)]
    pub async fn authenticate(
        &self,
        token: Option<&str>,
    ) -> Result<AuthenticatedUser, AuthenticationError> {
        let token = token.ok_or(AuthenticationError::MissingSession)?;
        let codec = self
            .codec
            .as_ref()
            .ok_or(AuthenticationError::SessionsDisabled)?;
        let session = codec
            .verify(token)
            .map_err(AuthenticationError::InvalidSession)?;

        let signed_in_at = Utc::now();
        let mut user = self
            .synchronizer
            .get_user(&session.open_id)
            .await
            .map_err(|report| AuthenticationError::Store {
                reason: report.to_string(),
            })?;

        if user.is_none() {
            debug!(open_id = %session.open_id, "user missing locally, resyncing");
            user = self.resync(token, &session.open_id, signed_in_at).await?;
        }

        let mut user = user.ok_or_else(|| AuthenticationError::UserNotFound {
            open_id: session.open_id.to_string(),
        })?;

        let role = self.allowlist.resolve(user.email());
        self.synchronizer
            .refresh_sign_in(user.id(), role, signed_in_at)
            .await
            .map_err(|report| AuthenticationError::Store {
                reason: report.to_string(),
            })?;
        user.merge(
            UserUpsert::new(user.id().clone())
                .with_role(role)
                .signed_in_at(signed_in_at),
        );

        Ok(AuthenticatedUser::from_session(user, role))
    }

    /// Re-fetches the user from the OAuth server using the session token and
    /// writes it to the store.
    ///
    /// The provider must describe the identity the session was issued for.
    async fn resync(
        &self,
        token: &str,
        expected: &OpenId,
        signed_in_at: DateTime<Utc>,
    ) -> Result<Option<User>, AuthenticationError> {
        let sync_failure = |reason: String| AuthenticationError::SyncFailure { reason };

        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| sync_failure("OAuth server is not configured".to_string()))?;
        let info = provider
            .get_user_info_with_jwt(token)
            .await
            .map_err(|report| sync_failure(report.to_string()))?;
        let open_id = info
            .require_open_id()
            .map_err(|err| sync_failure(err.to_string()))?;
        if &open_id != expected {
            return Err(sync_failure(format!(
                "provider returned {open_id} for session of {expected}"
            )));
        }

        let role = self.allowlist.resolve(info.email.as_deref());
        self.synchronizer
            .record_sign_in(open_id.clone(), &info, role, signed_in_at)
            .await
            .map_err(|report| sync_failure(report.to_string()))?;

        self.synchronizer
            .get_user(&open_id)
            .await
            .map_err(|report| sync_failure(report.to_string()))
    }
}

/// Authenticates inbound requests.
///
/// Holds no per-request state; every call starts from the request headers.
#[derive(Clone)]
pub struct RequestAuthenticator {
    bearer: Option<BearerStrategy>,
    session: SessionStrategy,
}

impl RequestAuthenticator {
    pub fn new(bearer: Option<BearerStrategy>, session: SessionStrategy) -> Self {
        Self { bearer, session }
    }

    /// Resolves the caller of a request.
    ///
    /// A bearer token selects the bearer strategy; with no identity backend
    /// configured the caller stays anonymous. Without a bearer token the
    /// session cookie decides.
    pub async fn authenticate(&self, headers: &HeaderMap) -> AuthOutcome {
        if let Some(token) = bearer_token(headers) {
            let Some(bearer) = &self.bearer else {
                debug!("bearer token presented but no identity backend is configured");
                return AuthOutcome::Anonymous;
            };
            return match bearer.authenticate(token).await {
                Ok(user) => AuthOutcome::Authenticated(Box::new(user)),
                Err(error) => {
                    warn!(error = %error, "bearer authentication failed");
                    AuthOutcome::Denied {
                        strategy: AuthStrategy::Bearer,
                        error,
                    }
                }
            };
        }

        let token = session_token(headers);
        match self.session.authenticate(token.as_deref()).await {
            Ok(user) => AuthOutcome::Authenticated(Box::new(user)),
            Err(AuthenticationError::MissingSession) => AuthOutcome::Denied {
                strategy: AuthStrategy::SessionCookie,
                error: AuthenticationError::MissingSession,
            },
            Err(error) => {
                warn!(error = %error, "session authentication failed");
                AuthOutcome::Denied {
                    strategy: AuthStrategy::SessionCookie,
                    error,
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use atelier_platform_access::{
        BackendUser, IdentityProviderError, InMemoryUserStore, Role, SessionError, SessionPayload,
        UserInfo, UserStore,
    };
    use axum::http::HeaderValue;
    use oauth2::{AccessToken, AuthorizationCode};
    use rootcause::prelude::Report;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) const SECRET: &str = "test-secret";
    pub(crate) const APP_ID: &str = "app-123";

    /// Provider double returning canned user info.
    #[derive(Default)]
    pub(crate) struct FakeProvider {
        pub(crate) info: Option<UserInfo>,
        pub(crate) jwt_calls: AtomicUsize,
    }

    impl FakeProvider {
        pub(crate) fn returning(info: UserInfo) -> Self {
            Self {
                info: Some(info),
                jwt_calls: AtomicUsize::new(0),
            }
        }

        fn answer(&self) -> Result<UserInfo, Report<IdentityProviderError>> {
            self.info.clone().ok_or_else(|| {
                IdentityProviderError::Rejected {
                    provider: "fake".to_string(),
                    status: 500,
                }
                .into()
            })
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        async fn exchange_code_for_token(
            &self,
            code: &AuthorizationCode,
            _state: &str,
        ) -> Result<AccessToken, Report<IdentityProviderError>> {
            if code.secret() == "bad" {
                return Err(IdentityProviderError::Rejected {
                    provider: "fake".to_string(),
                    status: 401,
                }
                .into());
            }
            Ok(AccessToken::new(format!("access-{}", code.secret())))
        }

        async fn get_user_info(
            &self,
            _access_token: &AccessToken,
        ) -> Result<UserInfo, Report<IdentityProviderError>> {
            self.answer()
        }

        async fn get_user_info_with_jwt(
            &self,
            _jwt: &str,
        ) -> Result<UserInfo, Report<IdentityProviderError>> {
            self.jwt_calls.fetch_add(1, Ordering::SeqCst);
            self.answer()
        }
    }

    /// Backend double accepting a single token.
    pub(crate) struct FakeBackend {
        pub(crate) token: &'static str,
        pub(crate) user: BackendUser,
    }

    #[async_trait]
    impl IdentityBackend for FakeBackend {
        async fn lookup_user(
            &self,
            token: &str,
        ) -> Result<BackendUser, Report<IdentityProviderError>> {
            if token == self.token {
                Ok(self.user.clone())
            } else {
                Err(IdentityProviderError::Rejected {
                    provider: "fake".to_string(),
                    status: 401,
                }
                .into())
            }
        }
    }

    pub(crate) fn open_id(id: &str) -> OpenId {
        OpenId::new(id).expect("valid open id")
    }

    pub(crate) fn codec() -> SessionCodec {
        SessionCodec::new(SECRET).expect("codec")
    }

    pub(crate) fn token_for(id: &str) -> String {
        codec()
            .sign(&SessionPayload::new(open_id(id), APP_ID, "Ada"), None)
            .expect("sign")
    }

    fn cookie_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "cookie",
            HeaderValue::from_str(&format!("{SESSION_COOKIE_NAME}={token}")).expect("header"),
        );
        headers
    }

    fn bearer_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).expect("header"),
        );
        headers
    }

    fn session_strategy(
        store: Arc<InMemoryUserStore>,
        provider: Option<Arc<dyn IdentityProvider>>,
        allowlist: &str,
    ) -> SessionStrategy {
        SessionStrategy::new(
            Some(codec()),
            UserSynchronizer::new(store),
            provider,
            Arc::new(AdminAllowlist::from_comma_list(allowlist)),
        )
    }

    fn authenticator(
        store: Arc<InMemoryUserStore>,
        provider: Option<Arc<dyn IdentityProvider>>,
        backend: Option<Arc<dyn IdentityBackend>>,
        allowlist: &str,
    ) -> RequestAuthenticator {
        let list = Arc::new(AdminAllowlist::from_comma_list(allowlist));
        RequestAuthenticator::new(
            backend.map(|b| BearerStrategy::new(b, Arc::clone(&list))),
            session_strategy(store, provider, allowlist),
        )
    }

    async fn seed(store: &InMemoryUserStore, id: &str, email: &str) {
        store
            .upsert_user(
                UserUpsert::new(open_id(id))
                    .with_email(Some(email.to_string()))
                    .signed_in_at(Utc::now() - chrono::Duration::days(3)),
            )
            .await
            .expect("seed");
    }

    fn denied_error(outcome: AuthOutcome) -> AuthenticationError {
        match outcome {
            AuthOutcome::Denied { error, .. } => error,
            other => panic!("expected denial, got {other:?}"),
        }
    }

    #[test]
    fn bearer_token_requires_prefix_and_value() {
        assert_eq!(bearer_token(&bearer_headers("abc")), Some("abc"));

        let mut basic = HeaderMap::new();
        basic.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&basic), None);

        let mut empty = HeaderMap::new();
        empty.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&empty), None);
    }

    #[test]
    fn session_token_reads_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "cookie",
            HeaderValue::from_static("theme=dark; app_session_id=tok-1"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("tok-1"));
        assert_eq!(session_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn known_user_is_authenticated_and_refreshed() {
        let store = Arc::new(InMemoryUserStore::new());
        seed(&store, "u1", "a@b.com").await;
        let before = store
            .get_user(&open_id("u1"))
            .await
            .expect("get")
            .expect("seeded")
            .last_signed_in();

        let auth = authenticator(store.clone(), None, None, "");
        let user = auth
            .authenticate(&cookie_headers(&token_for("u1")))
            .await
            .into_user()
            .expect("authenticated");

        assert_eq!(user.strategy(), AuthStrategy::SessionCookie);
        assert_eq!(user.identity().id.as_str(), "u1");
        assert_eq!(user.identity().role, Role::User);

        let stored = store
            .get_user(&open_id("u1"))
            .await
            .expect("get")
            .expect("stored");
        assert!(stored.last_signed_in() > before);
        assert_eq!(
            user.user().map(User::last_signed_in),
            Some(stored.last_signed_in())
        );
    }

    #[tokio::test]
    async fn allowlisted_session_user_becomes_admin() {
        let store = Arc::new(InMemoryUserStore::new());
        seed(&store, "u1", "Boss@Shop.com").await;

        let auth = authenticator(store.clone(), None, None, " boss@shop.com ");
        let user = auth
            .authenticate(&cookie_headers(&token_for("u1")))
            .await
            .into_user()
            .expect("authenticated");

        assert!(user.is_admin());
        let stored = store.get_user(&open_id("u1")).await.expect("get");
        assert_eq!(stored.map(|u| u.role()), Some(Role::Admin));
    }

    #[tokio::test]
    async fn missing_user_is_resynced_once() {
        let store = Arc::new(InMemoryUserStore::new());
        let provider = Arc::new(FakeProvider::returning(UserInfo {
            open_id: Some("u7".to_string()),
            name: Some("Grace".to_string()),
            email: Some("g@h.com".to_string()),
            login_method: Some("github".to_string()),
        }));

        let auth = authenticator(store.clone(), Some(provider.clone()), None, "");
        let user = auth
            .authenticate(&cookie_headers(&token_for("u7")))
            .await
            .into_user()
            .expect("authenticated");

        assert_eq!(user.identity().id.as_str(), "u7");
        assert_eq!(provider.jwt_calls.load(Ordering::SeqCst), 1);
        let stored = store
            .get_user(&open_id("u7"))
            .await
            .expect("get")
            .expect("resynced");
        assert_eq!(stored.login_method(), Some("github"));
        assert_eq!(stored.name(), Some("Grace"));
    }

    #[tokio::test]
    async fn resync_failure_is_sync_failure() {
        let store = Arc::new(InMemoryUserStore::new());
        let provider = Arc::new(FakeProvider::default());

        let auth = authenticator(store.clone(), Some(provider), None, "");
        let error = denied_error(auth.authenticate(&cookie_headers(&token_for("u7"))).await);

        assert!(matches!(error, AuthenticationError::SyncFailure { .. }));
        assert_eq!(error.public_message(), "Failed to sync user info");
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn resync_for_other_identity_is_rejected() {
        let store = Arc::new(InMemoryUserStore::new());
        let provider = Arc::new(FakeProvider::returning(UserInfo {
            open_id: Some("someone-else".to_string()),
            ..UserInfo::default()
        }));

        let auth = authenticator(store.clone(), Some(provider), None, "");
        let error = denied_error(auth.authenticate(&cookie_headers(&token_for("u7"))).await);

        assert!(matches!(error, AuthenticationError::SyncFailure { .. }));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn tampered_cookie_never_touches_store() {
        let store = Arc::new(InMemoryUserStore::new());
        seed(&store, "u1", "a@b.com").await;
        let writes = store.write_count();

        let mut token = token_for("u1");
        token.push('x');

        let auth = authenticator(store.clone(), None, None, "");
        let error = denied_error(auth.authenticate(&cookie_headers(&token)).await);

        assert!(matches!(error, AuthenticationError::InvalidSession(_)));
        assert_eq!(error.public_message(), "Invalid session cookie");
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn expired_cookie_is_denied() {
        let store = Arc::new(InMemoryUserStore::new());
        seed(&store, "u1", "a@b.com").await;
        let token = codec()
            .sign_issued_at(
                &SessionPayload::new(open_id("u1"), APP_ID, "Ada"),
                Some(chrono::Duration::seconds(60)),
                Utc::now() - chrono::Duration::hours(1),
            )
            .expect("sign");

        let writes = store.write_count();

        let auth = authenticator(store.clone(), None, None, "");
        let error = denied_error(auth.authenticate(&cookie_headers(&token)).await);
        assert_eq!(error, AuthenticationError::InvalidSession(SessionError::Expired));
        assert_eq!(error.public_message(), "Invalid session cookie");
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn no_credentials_is_missing_session() {
        let auth = authenticator(Arc::new(InMemoryUserStore::new()), None, None, "");
        let error = denied_error(auth.authenticate(&HeaderMap::new()).await);
        assert_eq!(error, AuthenticationError::MissingSession);
        assert_eq!(error.public_message(), "Invalid session cookie");
    }

    #[tokio::test]
    async fn sessions_disabled_without_secret() {
        let store = Arc::new(InMemoryUserStore::new());
        let auth = RequestAuthenticator::new(
            None,
            SessionStrategy::new(
                None,
                UserSynchronizer::new(store),
                None,
                Arc::new(AdminAllowlist::empty()),
            ),
        );
        let error = denied_error(auth.authenticate(&cookie_headers(&token_for("u1"))).await);
        assert_eq!(error, AuthenticationError::SessionsDisabled);
    }

    #[tokio::test]
    async fn bearer_resolves_role_from_allowlist() {
        let store = Arc::new(InMemoryUserStore::new());
        let backend = Arc::new(FakeBackend {
            token: "tok-1",
            user: BackendUser {
                id: open_id("b1"),
                email: Some("owner@studio.com".to_string()),
            },
        });

        let auth = authenticator(store.clone(), None, Some(backend), "owner@studio.com");
        let user = auth
            .authenticate(&bearer_headers("tok-1"))
            .await
            .into_user()
            .expect("authenticated");

        assert_eq!(user.strategy(), AuthStrategy::Bearer);
        assert!(user.is_admin());
        assert!(user.user().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn bearer_outside_allowlist_is_user() {
        let backend = Arc::new(FakeBackend {
            token: "tok-1",
            user: BackendUser {
                id: open_id("b2"),
                email: Some("clerk@studio.com".to_string()),
            },
        });

        let auth = authenticator(
            Arc::new(InMemoryUserStore::new()),
            None,
            Some(backend),
            "owner@studio.com",
        );
        let user = auth
            .authenticate(&bearer_headers("tok-1"))
            .await
            .into_user()
            .expect("authenticated");

        assert_eq!(user.identity().role, Role::User);
    }

    #[tokio::test]
    async fn rejected_bearer_is_denied_without_cookie_fallback() {
        let store = Arc::new(InMemoryUserStore::new());
        seed(&store, "u1", "a@b.com").await;
        let backend = Arc::new(FakeBackend {
            token: "tok-1",
            user: BackendUser {
                id: open_id("b1"),
                email: None,
            },
        });

        let mut headers = bearer_headers("wrong");
        headers.insert(
            "cookie",
            HeaderValue::from_str(&format!("{SESSION_COOKIE_NAME}={}", token_for("u1")))
                .expect("header"),
        );

        let auth = authenticator(store, None, Some(backend), "");
        match auth.authenticate(&headers).await {
            AuthOutcome::Denied { strategy, error } => {
                assert_eq!(strategy, AuthStrategy::Bearer);
                assert!(matches!(error, AuthenticationError::BackendRejected { .. }));
            }
            other => panic!("expected denial, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn bearer_without_backend_is_anonymous() {
        let auth = authenticator(Arc::new(InMemoryUserStore::new()), None, None, "");
        assert!(matches!(
            auth.authenticate(&bearer_headers("tok-1")).await,
            AuthOutcome::Anonymous
        ));
    }
}
