pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod messages;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

use std::sync::Arc;

use config::Settings;
use repositories::{
    SqliteConfirmationRepository, SqlitePasswordResetRepository, SqliteUserRepository,
};
use services::{
    AuthService, ConfirmationService, EmailService, PasswordResetService, UserService,
};

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub auth_service: Arc<AuthService>,
    pub confirmation_service: Arc<ConfirmationService>,
    pub password_reset_service: Arc<PasswordResetService>,
    pub pool: sqlx::SqlitePool,
}

impl AppState {
    /// Wires the SQLite repositories into the services.
    pub fn new(
        pool: sqlx::SqlitePool,
        settings: &Settings,
        email_service: Arc<dyn EmailService>,
    ) -> Self {
        let user_repository = Arc::new(SqliteUserRepository::new(pool.clone()));
        let confirmation_repository = Arc::new(SqliteConfirmationRepository::new(pool.clone()));
        let reset_repository = Arc::new(SqlitePasswordResetRepository::new(pool.clone()));

        let user_service = Arc::new(UserService::new(user_repository.clone()));
        let auth_service = Arc::new(AuthService::new(user_repository.clone()));
        let confirmation_service = Arc::new(ConfirmationService::new(
            confirmation_repository,
            user_repository.clone(),
            email_service.clone(),
            settings.site.clone(),
            settings.confirmation_window(),
        ));
        let password_reset_service = Arc::new(PasswordResetService::new(
            reset_repository,
            user_repository,
            user_service.clone(),
            email_service,
            settings.site.clone(),
            settings.password_reset_window(),
        ));

        Self {
            user_service,
            auth_service,
            confirmation_service,
            password_reset_service,
            pool,
        }
    }
}
