use super::{CredentialStore, StoreError, StoreResult, TaskStore, UniqueField};
use crate::model::{Identity, Task};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, Identity>,
    tasks: HashMap<Uuid, Task>,
}

/// Process-local store. Uniqueness checks and inserts happen under one write lock.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn conflict_with(users: &HashMap<Uuid, Identity>, identity: &Identity) -> Option<UniqueField> {
    users.values().find_map(|existing| {
        if existing.id == identity.id {
            None
        } else if existing.email == identity.email {
            Some(UniqueField::Email)
        } else if existing.username == identity.username {
            Some(UniqueField::Username)
        } else {
            None
        }
    })
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Identity>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Identity>> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|user| user.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Identity>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn exists_by_email(&self, email: &str) -> StoreResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().any(|user| user.email == email))
    }

    async fn exists_by_username(&self, username: &str) -> StoreResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().any(|user| user.username == username))
    }

    async fn find_all(&self) -> StoreResult<Vec<Identity>> {
        let inner = self.inner.read().await;
        let mut users: Vec<Identity> = inner.users.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn insert(&self, identity: &Identity) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(field) = conflict_with(&inner.users, identity) {
            return Err(StoreError::Conflict(field));
        }
        if inner.users.contains_key(&identity.id) {
            return Err(StoreError::Corrupt(format!(
                "identity {} already exists",
                identity.id
            )));
        }
        inner.users.insert(identity.id, identity.clone());
        Ok(())
    }

    async fn save(&self, identity: &Identity) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&identity.id) {
            return Ok(false);
        }
        if let Some(field) = conflict_with(&inner.users, identity) {
            return Err(StoreError::Conflict(field));
        }
        inner.users.insert(identity.id, identity.clone());
        Ok(true)
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        if inner.users.remove(&id).is_none() {
            return Ok(false);
        }
        inner.tasks.retain(|_, task| task.owner_id != id);
        Ok(true)
    }
}

fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Task>> {
        Ok(self.inner.read().await.tasks.get(&id).cloned())
    }

    async fn find_by_owner_id(&self, owner_id: Uuid) -> StoreResult<Vec<Task>> {
        let inner = self.inner.read().await;
        let mut tasks: Vec<Task> = inner
            .tasks
            .values()
            .filter(|task| task.owner_id == owner_id)
            .cloned()
            .collect();
        sort_tasks(&mut tasks);
        Ok(tasks)
    }

    async fn find_all(&self) -> StoreResult<Vec<Task>> {
        let inner = self.inner.read().await;
        let mut tasks: Vec<Task> = inner.tasks.values().cloned().collect();
        sort_tasks(&mut tasks);
        Ok(tasks)
    }

    async fn insert(&self, task: &Task) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&task.owner_id) {
            return Err(StoreError::MissingOwner(task.owner_id));
        }
        inner.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn save(&self, task: &Task) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.tasks.get_mut(&task.id) {
            Some(existing) => {
                *existing = task.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.inner.write().await.tasks.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewTask, Role};
    use chrono::Utc;
    use std::sync::Arc;

    fn identity(username: &str, email: &str) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: email.to_string(),
            username: username.to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
        }
    }

    fn stores() -> (Arc<dyn CredentialStore>, Arc<dyn TaskStore>) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), store)
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_email_and_username() {
        let (credentials, _) = stores();
        credentials
            .insert(&identity("alice", "alice@x.com"))
            .await
            .unwrap();

        let err = credentials
            .insert(&identity("alice2", "alice@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(UniqueField::Email)));

        let err = credentials
            .insert(&identity("alice", "other@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(UniqueField::Username)));

        assert_eq!(credentials.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn lookups_by_identifier() {
        let (credentials, _) = stores();
        let alice = identity("alice", "alice@x.com");
        credentials.insert(&alice).await.unwrap();

        assert_eq!(
            credentials.find_by_email("alice@x.com").await.unwrap(),
            Some(alice.clone())
        );
        assert_eq!(
            credentials.find_by_username("alice").await.unwrap(),
            Some(alice.clone())
        );
        assert!(credentials.exists_by_email("alice@x.com").await.unwrap());
        assert!(!credentials.exists_by_username("bob").await.unwrap());
        assert!(credentials.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_updates_only_existing_identities() {
        let (credentials, _) = stores();
        let mut alice = identity("alice", "alice@x.com");
        credentials.insert(&alice).await.unwrap();

        alice.role = Role::Admin;
        assert!(credentials.save(&alice).await.unwrap());
        let stored = credentials.find_by_id(alice.id).await.unwrap().unwrap();
        assert_eq!(stored.role, Role::Admin);

        assert!(!credentials.save(&identity("ghost", "ghost@x.com")).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_identity_cascades_to_tasks() {
        let (credentials, tasks) = stores();
        let alice = identity("alice", "alice@x.com");
        let bob = identity("bob", "bob@x.com");
        credentials.insert(&alice).await.unwrap();
        credentials.insert(&bob).await.unwrap();

        let now = Utc::now();
        let new = |title: &str| NewTask {
            title: title.to_string(),
            ..NewTask::default()
        };
        tasks.insert(&Task::create(alice.id, new("a1"), now)).await.unwrap();
        tasks.insert(&Task::create(alice.id, new("a2"), now)).await.unwrap();
        tasks.insert(&Task::create(bob.id, new("b1"), now)).await.unwrap();

        assert!(credentials.delete_by_id(alice.id).await.unwrap());
        assert!(tasks.find_by_owner_id(alice.id).await.unwrap().is_empty());
        assert_eq!(tasks.find_all().await.unwrap().len(), 1);
        assert!(!credentials.delete_by_id(alice.id).await.unwrap());
    }

    #[tokio::test]
    async fn task_insert_requires_owner() {
        let (_, tasks) = stores();
        let owner = Uuid::new_v4();
        let task = Task::create(
            owner,
            NewTask {
                title: "orphan".to_string(),
                ..NewTask::default()
            },
            Utc::now(),
        );
        let err = tasks.insert(&task).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingOwner(id) if id == owner));
    }
}
