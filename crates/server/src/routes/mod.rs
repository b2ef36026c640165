pub mod chat;
pub mod history;
pub mod system;
pub mod ui;

use actix_web::cookie::{Cookie, SameSite};
use actix_web::{web, HttpRequest};
use uuid::Uuid;

use crate::state::AppState;

/// Cookie carrying the chat session id
pub const SESSION_COOKIE: &str = "cordchat_session";

/// Register all routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(ui::index)
        .service(ui::app_js)
        .service(ui::style_css)
        .service(system::health)
        .service(
            web::scope("/api")
                .service(chat::chat)
                .service(history::get_history)
                .service(history::clear_history)
                .service(system::status),
        );
}

/// Session of the calling browser, created when the cookie is absent or stale
pub(crate) async fn session_id(req: &HttpRequest, state: &AppState) -> Uuid {
    let existing = req
        .cookie(SESSION_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value()).ok());
    state.sessions.resolve(existing).await
}

pub(crate) fn session_cookie(id: Uuid) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, id.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish()
}
