use crate::auth::session::current_user_email;
use crate::error::Result;
use crate::messages::{take_messages, Message};
use crate::models::user::User;
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::Html};
use tower_sessions::Session;

#[derive(Template, WebTemplate)]
#[template(path = "main.html")]
struct MainTemplate {
    current_user: Option<String>,
    messages: Vec<Message>,
    users: Vec<User>,
}

/// Landing page: pending notices plus the list of registered users.
pub async fn index_handler(
    State(app_state): State<AppState>,
    session: Session,
) -> Result<Html<String>> {
    let users = app_state.user_service.list_users(None, None).await?;

    let template = MainTemplate {
        current_user: current_user_email(&session).await,
        messages: take_messages(&session).await,
        users,
    };

    Ok(Html(template.render()?))
}
