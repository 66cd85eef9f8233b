//! Queries against the `users` table.
//!
//! Rows are only ever inserted or read; there is no update or delete path.

use serde::{Deserialize, Serialize};
use sqlx::Executor;

use crate::DbBackend;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UsersRow {
    pub username: String,
    pub password_hash: String,
}

/// Result of an insert against the username primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The primary key rejected the row; the existing row is untouched.
    UsernameTaken,
}

/// Insert a new user. A unique-constraint rejection is reported as
/// [`InsertOutcome::UsernameTaken`]; every other database error is returned.
pub async fn insert_user<'e, E>(executor: E, row: &UsersRow) -> Result<InsertOutcome, sqlx::Error>
where
    E: Executor<'e, Database = DbBackend>,
{
    let result = sqlx::query("INSERT INTO users (username, password_hash) VALUES (?, ?)")
        .bind(&row.username)
        .bind(&row.password_hash)
        .execute(executor)
        .await;

    match result {
        Ok(_) => Ok(InsertOutcome::Inserted),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Ok(InsertOutcome::UsernameTaken)
        }
        Err(e) => Err(e),
    }
}

pub async fn find_password_hash<'e, E>(
    executor: E,
    username: &str,
) -> Result<Option<String>, sqlx::Error>
where
    E: Executor<'e, Database = DbBackend>,
{
    sqlx::query_scalar("SELECT password_hash FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(executor)
        .await
}

pub async fn list_all<'e, E>(executor: E) -> Result<Vec<UsersRow>, sqlx::Error>
where
    E: Executor<'e, Database = DbBackend>,
{
    sqlx::query_as::<_, UsersRow>("SELECT username, password_hash FROM users ORDER BY username")
        .fetch_all(executor)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn migrated_pool() -> crate::DbPool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("connect");
        credstore_migrations::sqlite_migrator()
            .run(&pool)
            .await
            .expect("migrate");
        pool
    }

    fn row(username: &str, hash: &str) -> UsersRow {
        UsersRow {
            username: username.to_string(),
            password_hash: hash.to_string(),
        }
    }

    #[tokio::test]
    async fn insert_then_find() {
        let pool = migrated_pool().await;
        let outcome = insert_user(&pool, &row("alice", "h1")).await.expect("insert");
        assert_eq!(outcome, InsertOutcome::Inserted);

        let hash = find_password_hash(&pool, "alice").await.expect("find");
        assert_eq!(hash.as_deref(), Some("h1"));
        assert_eq!(find_password_hash(&pool, "bob").await.expect("find"), None);
    }

    #[tokio::test]
    async fn duplicate_username_keeps_original_row() {
        let pool = migrated_pool().await;
        insert_user(&pool, &row("alice", "h1")).await.expect("insert");

        let outcome = insert_user(&pool, &row("alice", "h2")).await.expect("insert");
        assert_eq!(outcome, InsertOutcome::UsernameTaken);

        let hash = find_password_hash(&pool, "alice").await.expect("find");
        assert_eq!(hash.as_deref(), Some("h1"));
    }

    #[tokio::test]
    async fn usernames_are_case_sensitive() {
        let pool = migrated_pool().await;
        insert_user(&pool, &row("alice", "h1")).await.expect("insert");
        let outcome = insert_user(&pool, &row("Alice", "h2")).await.expect("insert");
        assert_eq!(outcome, InsertOutcome::Inserted);
    }

    #[tokio::test]
    async fn list_all_is_ordered() {
        let pool = migrated_pool().await;
        insert_user(&pool, &row("carol", "h3")).await.expect("insert");
        insert_user(&pool, &row("alice", "h1")).await.expect("insert");

        let rows = list_all(&pool).await.expect("list");
        assert_eq!(rows, vec![row("alice", "h1"), row("carol", "h3")]);
    }

    #[tokio::test]
    async fn missing_table_is_an_error_not_a_conflict() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("connect");
        assert!(insert_user(&pool, &row("alice", "h1")).await.is_err());
    }
}
