use actix_web::{get, web, HttpResponse};

use crate::state::AppState;
use crate::types::{IndexStatus, StatusResponse};

/// Configuration and readiness report
#[get("/status")]
pub async fn status(state: web::Data<std::sync::Arc<AppState>>) -> actix_web::Result<HttpResponse> {
    let index = match &state.chain {
        Some(chain) => {
            let (documents, embedding_model, dimension) = chain.retriever().store().stats().await;
            Some(IndexStatus {
                documents,
                embedding_model,
                dimension,
            })
        }
        None => None,
    };

    Ok(HttpResponse::Ok().json(StatusResponse {
        api_key_loaded: state.config.has_api_key(),
        chain_ready: state.chain.is_some(),
        init_error: state.init_error.clone(),
        index,
        chat_model: state.config.chat_model.clone(),
        top_k: state.config.top_k,
        dataset_repo: state.config.hf_dataset_repo.clone(),
        active_sessions: state.sessions.count().await,
    }))
}

/// Liveness probe
#[get("/health")]
pub async fn health() -> actix_web::Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "ok"
    })))
}
