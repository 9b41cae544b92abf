use crate::models::user::{Gender, User};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Record not found")]
    NotFound,
    #[error("Duplicate value for {0}")]
    AlreadyExists(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Maps a failed write to `AlreadyExists` when SQLite reports a unique
/// constraint violation. The column name is taken from the driver message
/// (`UNIQUE constraint failed: users.email`).
pub(crate) fn map_unique_violation(err: sqlx::Error) -> RepositoryError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            let column = db_err
                .message()
                .rsplit('.')
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();
            return RepositoryError::AlreadyExists(column);
        }
    }
    RepositoryError::Database(err)
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Gender,
    pub birthday: Option<NaiveDate>,
    pub is_confirm: bool,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

const USER_COLUMNS: &str = "id, email, username, password_hash, first_name, last_name, gender, \
     birthday, avatar, is_confirm, is_active, is_staff, is_superuser, date_joined, last_login";

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, new_user: &NewUser) -> RepositoryResult<User>;
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>>;
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>>;
    async fn update_password(&self, id: i64, password_hash: &str) -> RepositoryResult<()>;
    /// Sets `is_confirm` and `is_active`.
    async fn activate(&self, id: i64) -> RepositoryResult<()>;
    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> RepositoryResult<()>;
    async fn delete_user(&self, id: i64) -> RepositoryResult<()>;
    async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> RepositoryResult<Vec<User>>;
}

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, column: &str, value: &str) -> RepositoryResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE {} = ?", USER_COLUMNS, column);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create_user(&self, new_user: &NewUser) -> RepositoryResult<User> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (
                email, username, password_hash, first_name, last_name, gender, birthday,
                is_confirm, is_active, is_staff, is_superuser, date_joined
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new_user.email)
        .bind(&new_user.username)
        .bind(&new_user.password_hash)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(new_user.gender.code())
        .bind(new_user.birthday)
        .bind(new_user.is_confirm)
        .bind(new_user.is_active)
        .bind(new_user.is_staff)
        .bind(new_user.is_superuser)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        let id = result.last_insert_rowid();
        self.find_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        self.find_one("email", email).await
    }

    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        self.find_one("username", username).await
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn activate(&self, id: i64) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE users SET is_confirm = TRUE, is_active = TRUE WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn delete_user(&self, id: i64) -> RepositoryResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> RepositoryResult<Vec<User>> {
        let limit = limit.unwrap_or(100);
        let offset = offset.unwrap_or(0);

        let sql = format!(
            "SELECT {} FROM users ORDER BY date_joined DESC, id DESC LIMIT ? OFFSET ?",
            USER_COLUMNS
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_pool;

    fn new_user(email: &str, username: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: "hash".to_string(),
            first_name: None,
            last_name: None,
            gender: Gender::NotSpecified,
            birthday: None,
            is_confirm: false,
            is_active: false,
            is_staff: false,
            is_superuser: false,
        }
    }

    #[tokio::test]
    async fn test_user_crud() {
        let pool = create_test_pool().await;
        let repo = SqliteUserRepository::new(pool);

        let user = repo
            .create_user(&new_user("test@example.com", "tester"))
            .await
            .unwrap();
        assert!(user.id > 0);
        assert_eq!(user.gender(), Gender::NotSpecified);
        assert!(!user.is_confirm);
        assert!(!user.is_active);

        let found = repo.find_by_username("tester").await.unwrap().unwrap();
        assert_eq!(found.email, "test@example.com");

        repo.activate(user.id).await.unwrap();
        let activated = repo.find_by_id(user.id).await.unwrap().unwrap();
        assert!(activated.is_confirm);
        assert!(activated.is_active);

        repo.update_password(user.id, "new-hash").await.unwrap();
        let updated = repo.find_by_email("test@example.com").await.unwrap().unwrap();
        assert_eq!(updated.password_hash, "new-hash");

        repo.delete_user(user.id).await.unwrap();
        assert!(repo.find_by_id(user.id).await.unwrap().is_none());
        assert!(matches!(
            repo.activate(user.id).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_unique_violations_name_the_column() {
        let pool = create_test_pool().await;
        let repo = SqliteUserRepository::new(pool);

        repo.create_user(&new_user("a@example.com", "alice"))
            .await
            .unwrap();

        match repo.create_user(&new_user("a@example.com", "other")).await {
            Err(RepositoryError::AlreadyExists(column)) => assert_eq!(column, "email"),
            other => panic!("expected duplicate email, got {:?}", other.map(|u| u.id)),
        }
        match repo.create_user(&new_user("b@example.com", "alice")).await {
            Err(RepositoryError::AlreadyExists(column)) => assert_eq!(column, "username"),
            other => panic!("expected duplicate username, got {:?}", other.map(|u| u.id)),
        }
    }

    #[tokio::test]
    async fn test_list_users_newest_first() {
        let pool = create_test_pool().await;
        let repo = SqliteUserRepository::new(pool);

        for i in 0..3 {
            repo.create_user(&new_user(&format!("u{}@example.com", i), &format!("u{}", i)))
                .await
                .unwrap();
        }

        let users = repo.list_users(None, None).await.unwrap();
        let names: Vec<_> = users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["u2", "u1", "u0"]);

        let page = repo.list_users(Some(1), Some(1)).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].username, "u1");
    }
}
