//! Postgres-backed stores.

use super::{CredentialStore, StoreError, StoreResult, TaskStore, UniqueField};
use crate::model::{Identity, Task};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgPoolOptions, postgres::PgRow};
use tracing::{Instrument, Span};
use uuid::Uuid;

const SCHEMA: &str = include_str!("../../sql/schema.sql");

const USER_COLUMNS: &str = "id, email, username, password_hash, role";
const TASK_COLUMNS: &str =
    "id, owner_id, title, description, completed, priority, due_date, created_at";

pub struct PgStore {
    pool: PgPool,
}

fn db_span(operation: &'static str, statement: &str) -> Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

impl PgStore {
    /// Connect and apply `sql/schema.sql`.
    ///
    /// # Errors
    /// Returns an error if the pool cannot be created or a schema statement fails.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Apply the schema one statement at a time.
    ///
    /// # Errors
    /// Returns an error naming the first statement that failed.
    pub async fn migrate(&self) -> Result<()> {
        for statement in split_sql_statements(SCHEMA) {
            sqlx::query(&statement)
                .execute(&self.pool)
                .instrument(db_span("MIGRATE", &statement))
                .await
                .with_context(|| format!("failed to apply schema statement: {statement}"))?;
        }
        Ok(())
    }
}

/// Split a SQL script on statement-terminating semicolons, dropping comment-only lines.
pub(crate) fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

/// Map driver errors onto the store taxonomy (23505 unique, 23503 foreign key).
fn map_error(err: sqlx::Error, owner_id: Option<Uuid>) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some("23505") => {
                let field = match db_err.constraint() {
                    Some(name) if name.contains("username") => UniqueField::Username,
                    _ => UniqueField::Email,
                };
                return StoreError::Conflict(field);
            }
            Some("23503") => {
                if let Some(owner_id) = owner_id {
                    return StoreError::MissingOwner(owner_id);
                }
            }
            _ => {}
        }
    }
    StoreError::Database(err)
}

fn identity_from_row(row: &PgRow) -> StoreResult<Identity> {
    let role: String = row.try_get("role")?;
    Ok(Identity {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        role: role
            .parse()
            .map_err(|err| StoreError::Corrupt(format!("users.role: {err}")))?,
    })
}

fn task_from_row(row: &PgRow) -> StoreResult<Task> {
    let priority: String = row.try_get("priority")?;
    Ok(Task {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        completed: row.try_get("completed")?,
        priority: priority
            .parse()
            .map_err(|err| StoreError::Corrupt(format!("tasks.priority: {err}")))?,
        due_date: row.try_get("due_date")?,
        created_at: row.try_get("created_at")?,
    })
}

impl PgStore {
    async fn fetch_identity(&self, column: &str, value: &str) -> StoreResult<Option<Identity>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let row = sqlx::query(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await?;
        row.as_ref().map(identity_from_row).transpose()
    }

    async fn exists(&self, column: &str, value: &str) -> StoreResult<bool> {
        let query = format!("SELECT EXISTS (SELECT 1 FROM users WHERE {column} = $1)");
        let exists: bool = sqlx::query_scalar(&query)
            .bind(value)
            .fetch_one(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await?;
        Ok(exists)
    }

    async fn fetch_tasks(&self, query: &str, owner_id: Option<Uuid>) -> StoreResult<Vec<Task>> {
        let mut statement = sqlx::query(query);
        if let Some(owner_id) = owner_id {
            statement = statement.bind(owner_id);
        }
        let rows = statement
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;
        rows.iter().map(task_from_row).collect()
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        let query = "SELECT 1";
        sqlx::query(query)
            .execute(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Identity>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await?;
        row.as_ref().map(identity_from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Identity>> {
        self.fetch_identity("email", email).await
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Identity>> {
        self.fetch_identity("username", username).await
    }

    async fn exists_by_email(&self, email: &str) -> StoreResult<bool> {
        self.exists("email", email).await
    }

    async fn exists_by_username(&self, username: &str) -> StoreResult<bool> {
        self.exists("username", username).await
    }

    async fn find_all(&self) -> StoreResult<Vec<Identity>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY username");
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await?;
        rows.iter().map(identity_from_row).collect()
    }

    async fn insert(&self, identity: &Identity) -> StoreResult<()> {
        let query = r"
            INSERT INTO users (id, email, username, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
        ";
        sqlx::query(query)
            .bind(identity.id)
            .bind(&identity.email)
            .bind(&identity.username)
            .bind(&identity.password_hash)
            .bind(identity.role.as_str())
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await
            .map_err(|err| map_error(err, None))?;
        Ok(())
    }

    async fn save(&self, identity: &Identity) -> StoreResult<bool> {
        let query = r"
            UPDATE users
            SET email = $2, username = $3, password_hash = $4, role = $5
            WHERE id = $1
        ";
        let result = sqlx::query(query)
            .bind(identity.id)
            .bind(&identity.email)
            .bind(&identity.username)
            .bind(&identity.password_hash)
            .bind(identity.role.as_str())
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await
            .map_err(|err| map_error(err, None))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<bool> {
        // tasks go with the user through ON DELETE CASCADE
        let query = "DELETE FROM users WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Task>> {
        let query = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn find_by_owner_id(&self, owner_id: Uuid) -> StoreResult<Vec<Task>> {
        let query =
            format!("SELECT {TASK_COLUMNS} FROM tasks WHERE owner_id = $1 ORDER BY created_at, id");
        self.fetch_tasks(&query, Some(owner_id)).await
    }

    async fn find_all(&self) -> StoreResult<Vec<Task>> {
        let query = format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at, id");
        self.fetch_tasks(&query, None).await
    }

    async fn insert(&self, task: &Task) -> StoreResult<()> {
        let query = r"
            INSERT INTO tasks
                (id, owner_id, title, description, completed, priority, due_date, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ";
        sqlx::query(query)
            .bind(task.id)
            .bind(task.owner_id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.completed)
            .bind(task.priority.as_str())
            .bind(task.due_date)
            .bind(task.created_at)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await
            .map_err(|err| map_error(err, Some(task.owner_id)))?;
        Ok(())
    }

    async fn save(&self, task: &Task) -> StoreResult<bool> {
        // owner_id is intentionally absent from the SET list
        let query = r"
            UPDATE tasks
            SET title = $2, description = $3, completed = $4, priority = $5, due_date = $6
            WHERE id = $1
        ";
        let result = sqlx::query(query)
            .bind(task.id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.completed)
            .bind(task.priority.as_str())
            .bind(task.due_date)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<bool> {
        let query = "DELETE FROM tasks WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
