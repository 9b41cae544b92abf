use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use super::session::current_user_id;

/// Keeps signed-in users away from the login and registration forms.
pub async fn redirect_if_authenticated(session: Session, request: Request, next: Next) -> Response {
    if current_user_id(&session).await.is_some() {
        Redirect::to("/").into_response()
    } else {
        next.run(request).await
    }
}
