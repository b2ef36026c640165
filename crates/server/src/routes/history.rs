use actix_web::{get, post, web, HttpRequest, HttpResponse};

use super::{session_cookie, session_id};
use crate::state::AppState;
use crate::types::{HistoryResponse, SuccessResponse};

#[get("/history")]
pub async fn get_history(
    req: HttpRequest,
    state: web::Data<std::sync::Arc<AppState>>,
) -> actix_web::Result<HttpResponse> {
    let id = session_id(&req, &state).await;
    let messages = state.sessions.history(id).await;
    Ok(HttpResponse::Ok()
        .cookie(session_cookie(id))
        .json(HistoryResponse { messages }))
}

#[post("/clear")]
pub async fn clear_history(
    req: HttpRequest,
    state: web::Data<std::sync::Arc<AppState>>,
) -> actix_web::Result<HttpResponse> {
    let id = session_id(&req, &state).await;
    state.sessions.clear(id).await;
    Ok(HttpResponse::Ok().cookie(session_cookie(id)).json(SuccessResponse {
        success: true,
        message: Some("Chat history cleared".to_string()),
    }))
}
