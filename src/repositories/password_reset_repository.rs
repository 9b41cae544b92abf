use crate::models::password_reset::PasswordResetToken;
use crate::repositories::user_repository::{map_unique_violation, RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

#[async_trait]
pub trait PasswordResetRepository: Send + Sync {
    /// Inserts a token, removing the user's earlier unused tokens first.
    async fn create_token(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> RepositoryResult<PasswordResetToken>;
    async fn find_by_hash(&self, token_hash: &str) -> RepositoryResult<Option<PasswordResetToken>>;
    async fn mark_used(&self, id: i64, at: DateTime<Utc>) -> RepositoryResult<()>;
    /// Returns the number of rows removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> RepositoryResult<u64>;
}

pub struct SqlitePasswordResetRepository {
    pool: SqlitePool,
}

impl SqlitePasswordResetRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PasswordResetRepository for SqlitePasswordResetRepository {
    async fn create_token(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> RepositoryResult<PasswordResetToken> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM password_reset_tokens WHERE user_id = ? AND used_at IS NULL")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (user_id, token_hash, expires_at, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        tx.commit().await?;

        Ok(PasswordResetToken {
            id: result.last_insert_rowid(),
            user_id,
            token_hash: token_hash.to_string(),
            expires_at,
            used_at: None,
            created_at: now,
        })
    }

    async fn find_by_hash(&self, token_hash: &str) -> RepositoryResult<Option<PasswordResetToken>> {
        let token = sqlx::query_as::<_, PasswordResetToken>(
            r#"
            SELECT id, user_id, token_hash, expires_at, used_at, created_at
            FROM password_reset_tokens
            WHERE token_hash = ?
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    async fn mark_used(&self, id: i64, at: DateTime<Utc>) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE password_reset_tokens SET used_at = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> RepositoryResult<u64> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at < ?")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_pool, test_helpers::insert_test_user};
    use chrono::Duration;

    #[tokio::test]
    async fn test_new_token_replaces_unused_ones() {
        let pool = create_test_pool().await;
        let repo = SqlitePasswordResetRepository::new(pool.clone());
        let user_id = insert_test_user(&pool, "test@example.com", "tester", "password", true)
            .await
            .unwrap();
        let expires = Utc::now() + Duration::hours(1);

        let used = repo.create_token(user_id, "used", expires).await.unwrap();
        repo.mark_used(used.id, Utc::now()).await.unwrap();
        repo.create_token(user_id, "stale", expires).await.unwrap();
        repo.create_token(user_id, "fresh", expires).await.unwrap();

        assert!(repo.find_by_hash("stale").await.unwrap().is_none());
        assert!(repo.find_by_hash("used").await.unwrap().is_some());
        let fresh = repo.find_by_hash("fresh").await.unwrap().unwrap();
        assert!(fresh.is_usable_at(Utc::now()));
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let pool = create_test_pool().await;
        let repo = SqlitePasswordResetRepository::new(pool.clone());
        let alice = insert_test_user(&pool, "a@example.com", "alice", "password", true)
            .await
            .unwrap();
        let bob = insert_test_user(&pool, "b@example.com", "bob", "password", true)
            .await
            .unwrap();

        let now = Utc::now();
        repo.create_token(alice, "old", now - Duration::hours(1))
            .await
            .unwrap();
        repo.create_token(bob, "current", now + Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(repo.delete_expired(now).await.unwrap(), 1);
        assert!(repo.find_by_hash("old").await.unwrap().is_none());
        assert!(repo.find_by_hash("current").await.unwrap().is_some());
    }
}
