use tower_sessions::Session;

use crate::models::user::User;

const USER_ID_KEY: &str = "user_id";
const EMAIL_KEY: &str = "email";
const AUTH_TIMESTAMP_KEY: &str = "auth_timestamp";

/// Binds `user` to the session. The session id is cycled first so a token
/// planted before login cannot be reused.
pub async fn log_in(session: &Session, user: &User) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(USER_ID_KEY, user.id).await?;
    session.insert(EMAIL_KEY, user.email.clone()).await?;
    session
        .insert(AUTH_TIMESTAMP_KEY, chrono::Utc::now().timestamp())
        .await?;
    Ok(())
}

pub async fn log_out(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

pub async fn current_user_id(session: &Session) -> Option<i64> {
    session.get::<i64>(USER_ID_KEY).await.ok().flatten()
}

pub async fn current_user_email(session: &Session) -> Option<String> {
    session.get::<String>(EMAIL_KEY).await.ok().flatten()
}
