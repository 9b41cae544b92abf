pub mod test_helpers {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::Router;
    use chrono::{DateTime, Utc};
    use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
    use tower_sessions::{MemoryStore, SessionManagerLayer};

    use crate::config::Settings;
    use crate::models::{site::Site, user::User};
    use crate::routes::app_router;
    use crate::services::email_service::{
        render_confirmation_email, render_password_reset_email, EmailError, EmailService,
        RenderedEmail,
    };
    use crate::AppState;

    /// Create a new in-memory SQLite database for testing
    pub async fn create_test_db() -> Result<SqlitePool, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(pool)
    }

    /// Insert a test user with hashed password
    pub async fn insert_test_user(
        pool: &SqlitePool,
        email: &str,
        username: &str,
        password: &str,
        confirmed: bool,
    ) -> Result<i64, sqlx::Error> {
        use argon2::{
            password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
            Argon2,
        };

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                sqlx::Error::Configuration(format!("Password hashing failed: {}", e).into())
            })?
            .to_string();

        let result = sqlx::query(
            "INSERT INTO users (email, username, password_hash, is_confirm, is_active, date_joined) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(email)
        .bind(username)
        .bind(password_hash)
        .bind(confirmed)
        .bind(confirmed)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Moves the `sent` timestamp of a user's confirmation key.
    pub async fn set_confirmation_sent(
        pool: &SqlitePool,
        user_id: i64,
        sent: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE email_confirmations SET sent = ? WHERE user_id = ?")
            .bind(sent)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn count_confirmations(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM email_confirmations")
            .fetch_one(pool)
            .await
    }

    pub fn test_settings(site: Option<Site>, confirmation_days: i64) -> Settings {
        Settings {
            database_url: "sqlite::memory:".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            environment: "test".to_string(),
            site,
            confirmation_days,
            password_reset_hours: 72,
            smtp: None,
        }
    }

    pub fn test_site() -> Site {
        Site::new("testserver", "Test Site")
    }

    /// Keeps every message instead of sending it.
    #[derive(Clone, Default)]
    pub struct RecordingEmailService {
        sent: Arc<Mutex<Vec<RenderedEmail>>>,
    }

    impl RecordingEmailService {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn sent(&self) -> Vec<RenderedEmail> {
            self.sent
                .lock()
                .map(|sent| sent.clone())
                .unwrap_or_default()
        }

        pub fn last_to(&self, address: &str) -> Option<RenderedEmail> {
            self.sent().into_iter().rev().find(|email| email.to == address)
        }

        fn record(&self, email: RenderedEmail) {
            if let Ok(mut sent) = self.sent.lock() {
                sent.push(email);
            }
        }
    }

    #[async_trait]
    impl EmailService for RecordingEmailService {
        async fn send_confirmation_email(
            &self,
            site: &Site,
            user: &User,
            activate_url: &str,
        ) -> Result<(), EmailError> {
            self.record(render_confirmation_email(site, user, activate_url)?);
            Ok(())
        }

        async fn send_password_reset_email(
            &self,
            site: &Site,
            user: &User,
            reset_url: &str,
        ) -> Result<(), EmailError> {
            self.record(render_password_reset_email(site, user, reset_url)?);
            Ok(())
        }
    }

    /// Extracts the last path segment before the trailing slash of the first
    /// link in `body` that starts with `prefix`.
    pub fn link_token(body: &str, prefix: &str) -> Option<String> {
        let start = body.find(prefix)? + prefix.len();
        let rest = &body[start..];
        let end = rest.find('/')?;
        Some(rest[..end].to_string())
    }

    /// Application state wired to an in-memory database and a recording mailer.
    pub struct TestApp {
        pub pool: SqlitePool,
        pub state: AppState,
        pub emails: RecordingEmailService,
    }

    impl TestApp {
        pub async fn new(site: Option<Site>, confirmation_days: i64) -> Result<Self, sqlx::Error> {
            let pool = create_test_db().await?;
            let emails = RecordingEmailService::new();
            let settings = test_settings(site, confirmation_days);
            let state = AppState::new(pool.clone(), &settings, Arc::new(emails.clone()));

            Ok(Self {
                pool,
                state,
                emails,
            })
        }

        /// Router with an in-memory session store.
        pub fn router(&self) -> Router {
            app_router(self.state.clone()).layer(SessionManagerLayer::new(MemoryStore::default()))
        }
    }
}

// Note: This is test-only code. Panic on error is acceptable in tests.
#[cfg(test)]
pub async fn create_test_pool() -> sqlx::SqlitePool {
    match test_helpers::create_test_db().await {
        Ok(pool) => pool,
        Err(e) => panic!("Failed to create test pool: {}", e),
    }
}
