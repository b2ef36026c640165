use actix_web::{post, web, HttpRequest, HttpResponse};
use cordchat_common::CordChatError;
use tracing::{debug, error, info};

use super::{session_cookie, session_id};
use crate::error::ApiError;
use crate::state::AppState;
use crate::types::{ChatInput, ChatOutput, StoredMessage, MAX_MESSAGE_CHARS};

/// Answer a question and record the exchange in the caller's session
#[post("/chat")]
pub async fn chat(
    req: HttpRequest,
    body: web::Json<ChatInput>,
    state: web::Data<std::sync::Arc<AppState>>,
) -> Result<HttpResponse, ApiError> {
    let message = body.message.trim();
    if message.is_empty() {
        return Err(CordChatError::invalid_input("Message cannot be empty").into());
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(CordChatError::invalid_input(format!(
            "Message is too long (max {} characters)",
            MAX_MESSAGE_CHARS
        ))
        .into());
    }

    let chain = state.chain.clone().ok_or_else(|| {
        CordChatError::unavailable(format!(
            "Chat is not available: {}",
            state
                .init_error
                .as_deref()
                .unwrap_or("the answer chain is not initialized")
        ))
    })?;

    let id = session_id(&req, &state).await;
    let generation = state.sessions.append(id, StoredMessage::user(message)).await;
    info!("Chat question in session {} ({} chars)", id, message.len());

    let (output, reply) = match chain.invoke(message).await {
        Ok(result) => {
            let reply = StoredMessage::assistant(&result.answer, Some(result.sources.clone()));
            let output = ChatOutput {
                answer: result.answer,
                sources: result.sources,
                error: false,
            };
            (output, reply)
        }
        Err(e) => {
            error!("Chat failed in session {}: {}", id, e);
            let notice = format!("Sorry, I encountered an error: {}", e);
            let reply = StoredMessage::assistant(&notice, None);
            let output = ChatOutput {
                answer: notice,
                sources: Vec::new(),
                error: true,
            };
            (output, reply)
        }
    };

    // The session may have been evicted, expired or cleared while the chain ran
    let recorded = match generation {
        Some(generation) => {
            state
                .sessions
                .append_in_generation(id, generation, reply)
                .await
        }
        None => false,
    };
    if !recorded {
        debug!("Reply not recorded: session {} was cleared or dropped", id);
    }

    Ok(HttpResponse::Ok().cookie(session_cookie(id)).json(output))
}
