//! Persistence seams for identities and tasks.
//!
//! Two implementations ship: [`MemoryStore`] for development and tests, and
//! [`PgStore`] backed by Postgres. Both enforce email/username uniqueness
//! atomically on insert and cascade task removal when an identity is deleted.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::model::{Identity, Task};
use anyhow::Result;
use async_trait::async_trait;
use std::{fmt, sync::Arc};
use thiserror::Error;
use uuid::Uuid;

/// Which unique identity attribute collided.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Username,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email => f.write_str("email"),
            Self::Username => f.write_str("username"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} already exists")]
    Conflict(UniqueField),
    #[error("owner {0} does not exist")]
    MissingOwner(Uuid),
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Identity>>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Identity>>;
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Identity>>;
    async fn exists_by_email(&self, email: &str) -> StoreResult<bool>;
    async fn exists_by_username(&self, username: &str) -> StoreResult<bool>;
    /// All identities ordered by username.
    async fn find_all(&self) -> StoreResult<Vec<Identity>>;
    /// Insert a new identity, failing with [`StoreError::Conflict`] on a duplicate email or username.
    async fn insert(&self, identity: &Identity) -> StoreResult<()>;
    /// Update an existing identity. Returns `false` when it does not exist.
    async fn save(&self, identity: &Identity) -> StoreResult<bool>;
    /// Delete an identity and every task it owns. Returns `false` when nothing was deleted.
    async fn delete_by_id(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Task>>;
    /// Tasks of one owner ordered by creation time.
    async fn find_by_owner_id(&self, owner_id: Uuid) -> StoreResult<Vec<Task>>;
    async fn find_all(&self) -> StoreResult<Vec<Task>>;
    /// Fails with [`StoreError::MissingOwner`] when the owner does not exist.
    async fn insert(&self, task: &Task) -> StoreResult<()>;
    async fn save(&self, task: &Task) -> StoreResult<bool>;
    async fn delete_by_id(&self, id: Uuid) -> StoreResult<bool>;
}

/// Both stores, shared by the request handlers.
#[derive(Clone)]
pub struct Stores {
    pub credentials: Arc<dyn CredentialStore>,
    pub tasks: Arc<dyn TaskStore>,
}

impl Stores {
    #[must_use]
    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            credentials: store.clone(),
            tasks: store,
        }
    }

    /// Connect to Postgres and apply the schema.
    ///
    /// # Errors
    /// Returns an error if the connection or the schema migration fails.
    pub async fn postgres(dsn: &str) -> Result<Self> {
        let store = Arc::new(PgStore::connect(dsn).await?);
        Ok(Self {
            credentials: store.clone(),
            tasks: store,
        })
    }
}
