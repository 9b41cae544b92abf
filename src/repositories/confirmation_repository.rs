use crate::models::email_confirmation::EmailConfirmation;
use crate::repositories::user_repository::{map_unique_violation, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait ConfirmationRepository: Send + Sync {
    /// Stores `activation_key` as the user's only confirmation, dropping any
    /// previous one in the same transaction.
    async fn replace_for_user(
        &self,
        user_id: i64,
        activation_key: &str,
        sent: DateTime<Utc>,
    ) -> RepositoryResult<EmailConfirmation>;
    async fn find_by_key(&self, activation_key: &str) -> RepositoryResult<Option<EmailConfirmation>>;
    async fn find_by_user(&self, user_id: i64) -> RepositoryResult<Option<EmailConfirmation>>;
    /// Returns whether a row was removed.
    async fn delete_for_user(&self, user_id: i64) -> RepositoryResult<bool>;
}

pub struct SqliteConfirmationRepository {
    pool: SqlitePool,
}

impl SqliteConfirmationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConfirmationRepository for SqliteConfirmationRepository {
    async fn replace_for_user(
        &self,
        user_id: i64,
        activation_key: &str,
        sent: DateTime<Utc>,
    ) -> RepositoryResult<EmailConfirmation> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM email_confirmations WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            "INSERT INTO email_confirmations (user_id, activation_key, sent) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(activation_key)
        .bind(sent)
        .execute(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        tx.commit().await?;

        Ok(EmailConfirmation {
            id: result.last_insert_rowid(),
            user_id,
            activation_key: activation_key.to_string(),
            sent,
        })
    }

    async fn find_by_key(&self, activation_key: &str) -> RepositoryResult<Option<EmailConfirmation>> {
        let confirmation = sqlx::query_as::<_, EmailConfirmation>(
            "SELECT id, user_id, activation_key, sent FROM email_confirmations WHERE activation_key = ?",
        )
        .bind(activation_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(confirmation)
    }

    async fn find_by_user(&self, user_id: i64) -> RepositoryResult<Option<EmailConfirmation>> {
        let confirmation = sqlx::query_as::<_, EmailConfirmation>(
            "SELECT id, user_id, activation_key, sent FROM email_confirmations WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(confirmation)
    }

    async fn delete_for_user(&self, user_id: i64) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM email_confirmations WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::user_repository::RepositoryError;
    use crate::test_utils::{create_test_pool, test_helpers::insert_test_user};

    #[tokio::test]
    async fn test_replace_keeps_one_key_per_user() {
        let pool = create_test_pool().await;
        let repo = SqliteConfirmationRepository::new(pool.clone());
        let user_id = insert_test_user(&pool, "test@example.com", "tester", "password", false)
            .await
            .unwrap();

        repo.replace_for_user(user_id, "first", Utc::now())
            .await
            .unwrap();
        let second = repo
            .replace_for_user(user_id, "second", Utc::now())
            .await
            .unwrap();

        assert!(repo.find_by_key("first").await.unwrap().is_none());
        let current = repo.find_by_user(user_id).await.unwrap().unwrap();
        assert_eq!(current.id, second.id);
        assert_eq!(current.activation_key, "second");
    }

    #[tokio::test]
    async fn test_duplicate_key_leaves_existing_row() {
        let pool = create_test_pool().await;
        let repo = SqliteConfirmationRepository::new(pool.clone());
        let alice = insert_test_user(&pool, "a@example.com", "alice", "password", false)
            .await
            .unwrap();
        let bob = insert_test_user(&pool, "b@example.com", "bob", "password", false)
            .await
            .unwrap();

        repo.replace_for_user(alice, "shared", Utc::now())
            .await
            .unwrap();
        repo.replace_for_user(bob, "bobs", Utc::now()).await.unwrap();

        let result = repo.replace_for_user(bob, "shared", Utc::now()).await;
        assert!(matches!(result, Err(RepositoryError::AlreadyExists(_))));

        // The failed replace rolled back
        let bobs = repo.find_by_user(bob).await.unwrap().unwrap();
        assert_eq!(bobs.activation_key, "bobs");
    }

    #[tokio::test]
    async fn test_key_removed_with_user() {
        let pool = create_test_pool().await;
        let repo = SqliteConfirmationRepository::new(pool.clone());
        let user_id = insert_test_user(&pool, "test@example.com", "tester", "password", false)
            .await
            .unwrap();
        repo.replace_for_user(user_id, "key", Utc::now())
            .await
            .unwrap();

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&pool)
            .await
            .unwrap();

        assert!(repo.find_by_key("key").await.unwrap().is_none());
        assert!(!repo.delete_for_user(user_id).await.unwrap());
    }
}
