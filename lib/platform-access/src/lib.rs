//! Platform access, authentication, and role resolution for atelier.
//!
//! This crate provides:
//! - User records and insert-or-merge upserts (`User`, `UserUpsert`)
//! - Allowlist-based role resolution (`Role`, `AdminAllowlist`)
//! - Signed session tokens (`SessionCodec`, `SessionPayload`)
//! - Login method normalization (`derive_login_method`)
//! - The user store contract and synchronizer (`UserStore`, `UserSynchronizer`)
//! - Identity configuration (`IdentityConfig`)
//! - Authentication error types
//!
//! # Access Control Model
//!
//! A caller is authenticated either by a session cookie signed by this
//! process or by a bearer token validated by the external identity
//! backend. Either way the role is recomputed from the admin allowlist on
//! every request.
//!
//! # Example
//!
//! ```
//! use atelier_core::OpenId;
//! use atelier_platform_access::{AdminAllowlist, Role, SessionCodec, SessionPayload};
//! use chrono::Duration;
//!
//! let codec = SessionCodec::new("change-me").expect("secret is set");
//! let payload = SessionPayload::new(OpenId::new("u1").expect("id"), "app-1", "Ada");
//!
//! let token = codec.sign(&payload, Some(Duration::hours(1))).expect("sign");
//! assert_eq!(codec.verify(&token).expect("verify"), payload);
//!
//! let allowlist = AdminAllowlist::from_comma_list("owner@studio.com");
//! assert_eq!(allowlist.resolve(Some("Owner@Studio.com")), Role::Admin);
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod login_method;
pub mod role;
pub mod session;
pub mod store;
pub mod user;

// Re-export main types at crate root
pub use auth::{AuthOutcome, AuthStrategy, AuthenticatedUser, BackendUser, Identity, UserInfo};
pub use config::IdentityConfig;
pub use error::{AuthenticationError, IdentityProviderError, SessionError, StoreError};
pub use login_method::derive_login_method;
pub use role::{AdminAllowlist, Role};
pub use session::{
    ONE_YEAR_MS, SESSION_COOKIE_NAME, SessionCodec, SessionPayload, default_session_ttl,
};
pub use store::{InMemoryUserStore, UserStore, UserSynchronizer};
pub use user::{User, UserUpsert};
