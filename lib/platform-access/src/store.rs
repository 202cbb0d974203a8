//! User store contract and the synchronizer built on it.
//!
//! The store is an external collaborator reached only through
//! `get_user`/`upsert_user`. Upserts are insert-or-merge keyed by `id`, so
//! two concurrent first sign-ins for the same identity race harmlessly:
//! the last write wins on mutable fields and the id is never duplicated.

use async_trait::async_trait;
use atelier_core::{OpenId, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use crate::auth::UserInfo;
use crate::error::StoreError;
use crate::role::Role;
use crate::user::{User, UserUpsert};

/// Persistence contract for user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Loads a user by identity.
    async fn get_user(&self, id: &OpenId) -> Result<Option<User>, StoreError>;

    /// Inserts the user if absent, otherwise merges the provided fields.
    async fn upsert_user(&self, upsert: UserUpsert) -> Result<(), StoreError>;
}

/// In-process user store with the same merge semantics as the database.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<OpenId, User>>,
    writes: AtomicUsize,
}

impl InMemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    /// Returns true if no user is stored.
    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }

    /// Number of upserts applied since creation.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get_user(&self, id: &OpenId) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn upsert_user(&self, upsert: UserUpsert) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        match users.get_mut(&upsert.id) {
            Some(existing) => existing.merge(upsert),
            None => {
                let user = User::from_upsert(upsert, Utc::now());
                users.insert(user.id().clone(), user);
            }
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Keeps local user records in step with successful authentications.
#[derive(Clone)]
pub struct UserSynchronizer {
    store: Arc<dyn UserStore>,
}

impl UserSynchronizer {
    #[must_use]
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub async fn get_user(&self, id: &OpenId) -> Result<Option<User>, StoreError> {
        self.store.get_user(id).await
    }

    /// Writes the provider's view of a user who just authenticated.
    pub async fn record_sign_in(
        &self,
        open_id: OpenId,
        info: &UserInfo,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        debug!(open_id = %open_id, "recording sign-in");
        self.store
            .upsert_user(info.to_upsert(open_id, role, now))
            .await
    }

    /// Refreshes `lastSignedIn` (and the resolved role) for a known user.
    pub async fn refresh_sign_in(
        &self,
        open_id: &OpenId,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.store
            .upsert_user(
                UserUpsert::new(open_id.clone())
                    .with_role(role)
                    .signed_in_at(now),
            )
            .await
    }
}
