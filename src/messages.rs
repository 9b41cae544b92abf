//! One-shot notices carried in the session from a redirecting handler to the
//! next rendered page.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

const MESSAGES_KEY: &str = "_messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
}

impl Level {
    pub fn css_class(&self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub level: Level,
    pub text: String,
}

pub async fn add_message(
    session: &Session,
    level: Level,
    text: impl Into<String>,
) -> Result<(), tower_sessions::session::Error> {
    let mut pending: Vec<Message> = session.get(MESSAGES_KEY).await?.unwrap_or_default();
    pending.push(Message {
        level,
        text: text.into(),
    });
    session.insert(MESSAGES_KEY, pending).await
}

pub async fn success(session: &Session, text: impl Into<String>) {
    if let Err(e) = add_message(session, Level::Success, text).await {
        tracing::warn!("Failed to store message in session: {}", e);
    }
}

pub async fn error(session: &Session, text: impl Into<String>) {
    if let Err(e) = add_message(session, Level::Error, text).await {
        tracing::warn!("Failed to store message in session: {}", e);
    }
}

/// Drains pending messages. Each message is returned exactly once.
pub async fn take_messages(session: &Session) -> Vec<Message> {
    match session.remove::<Vec<Message>>(MESSAGES_KEY).await {
        Ok(messages) => messages.unwrap_or_default(),
        Err(e) => {
            tracing::warn!("Failed to read messages from session: {}", e);
            Vec::new()
        }
    }
}
