//! cordchat HTTP Server
//!
//! Actix-web chat UI and JSON API over the RAG chain

pub mod bootstrap;
pub mod chain;
pub mod error;
pub mod routes;
pub mod sessions;
pub mod state;
pub mod types;

use actix_web::{error::InternalError, web, App, HttpResponse, HttpServer};
use cordchat_common::{AppConfig, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_actix_web::TracingLogger;

pub use bootstrap::{build_chain, build_chain_with, build_llm, prepare_index};
pub use chain::{source_info, RagAnswer, RagChain};
pub use state::AppState;

/// Largest accepted JSON request body
const JSON_LIMIT: usize = 64 * 1024;

/// How often idle sessions are purged
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// JSON extractor config: malformed bodies get a 400 with a JSON error
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_LIMIT)
        .error_handler(|err, _req| {
            let message = err.to_string();
            InternalError::from_response(
                err,
                HttpResponse::BadRequest().json(serde_json::json!({ "error": message })),
            )
            .into()
        })
}

/// Start the server and run until shutdown
pub async fn start_server(config: AppConfig) -> Result<()> {
    config.validate()?;

    let chain = build_chain(&config).await;
    let state = Arc::new(AppState::new(config.clone(), chain));

    let purge_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            purge_state.sessions.purge_expired().await;
        }
    });

    let bind_addr = config.server_bind_address();
    info!("Starting server on http://{}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .app_data(json_config())
            .configure(routes::configure)
    })
    .bind(&bind_addr)?
    .run()
    .await?;

    info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test};
    use cordchat_common::CordChatError;
    use cordchat_llm::mock::MockLlm;
    use cordchat_vector::{Document, DocumentMetadata, IndexEntry, VectorIndex, VectorStore};
    use routes::SESSION_COOKIE;
    use types::{ChatOutput, HistoryResponse, MessageRole, StatusResponse};

    const PASSAGES: [(&str, &str, &str); 3] = [
        (
            "Neurological manifestations",
            "2021-03-01",
            "anosmia and loss of smell are common neurological symptoms of covid infection",
        ),
        (
            "Vaccine effectiveness",
            "2021-06-15",
            "mrna vaccine effectiveness against hospitalization remained high",
        ),
        (
            "Remdesivir outcomes",
            "2020-11-20",
            "remdesivir treatment shortened recovery time in hospitalized adults",
        ),
    ];

    async fn ready_state(llm: Arc<MockLlm>, dir: &std::path::Path) -> Arc<AppState> {
        let mut index = VectorIndex::new("mock-embed");
        for (i, (title, date, text)) in PASSAGES.iter().enumerate() {
            index
                .add_entry(IndexEntry {
                    document: Document {
                        id: i.to_string(),
                        page_content: text.to_string(),
                        metadata: DocumentMetadata {
                            title: Some(title.to_string()),
                            publish_time: Some(date.to_string()),
                            ..Default::default()
                        },
                    },
                    embedding: MockLlm::embed_text(text),
                })
                .unwrap();
        }
        let config = AppConfig {
            index_dir: dir.to_path_buf(),
            top_k: 2,
            ..Default::default()
        };
        VectorStore::new(index, dir).save().await.unwrap();
        let chain = build_chain_with(&config, llm).await;
        Arc::new(AppState::new(config, chain))
    }

    fn broken_state() -> Arc<AppState> {
        Arc::new(AppState::new(
            AppConfig::default(),
            Err(CordChatError::config("OPENAI_API_KEY is not set")),
        ))
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state.clone()))
                    .app_data(json_config())
                    .configure(routes::configure),
            )
            .await
        };
    }

    fn chat_request(message: &str) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/chat")
            .set_json(serde_json::json!({ "message": message }))
    }

    #[actix_web::test]
    async fn test_chat_answers_with_sources_and_sets_cookie() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlm::with_answer("Loss of smell is common."));
        let state = ready_state(llm.clone(), dir.path()).await;
        let app = app!(state);

        let resp = test::call_service(&app, chat_request("Is loss of smell a symptom?").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = resp
            .response()
            .cookies()
            .find(|c| c.name() == SESSION_COOKIE)
            .map(|c| c.into_owned())
            .unwrap();
        assert!(cookie.http_only().unwrap_or(false));

        let body: ChatOutput = test::read_body_json(resp).await;
        assert!(!body.error);
        assert_eq!(body.answer, "Loss of smell is common.");
        assert_eq!(body.sources.len(), 2);
        assert_eq!(body.sources[0].title, "Neurological manifestations");
        assert!(body.sources[0]
            .text
            .starts_with("**Neurological manifestations** (2021-03-01)\n"));
        assert!(llm.prompts()[0].contains("Question: Is loss of smell a symptom?"));

        // Same cookie, same transcript
        let req = test::TestRequest::get()
            .uri("/api/history")
            .cookie(cookie.clone())
            .to_request();
        let history: HistoryResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(history.messages.len(), 2);
        assert_eq!(history.messages[0].role, MessageRole::User);
        assert_eq!(history.messages[0].content, "Is loss of smell a symptom?");
        assert_eq!(history.messages[1].role, MessageRole::Assistant);
        assert_eq!(history.messages[1].sources.as_ref().map(Vec::len), Some(2));

        // Another browser sees nothing
        let req = test::TestRequest::get().uri("/api/history").to_request();
        let other: HistoryResponse = test::call_and_read_body_json(&app, req).await;
        assert!(other.messages.is_empty());

        // Clear empties the transcript
        let req = test::TestRequest::post()
            .uri("/api/clear")
            .cookie(cookie.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri("/api/history")
            .cookie(cookie)
            .to_request();
        let history: HistoryResponse = test::call_and_read_body_json(&app, req).await;
        assert!(history.messages.is_empty());
    }

    #[actix_web::test]
    async fn test_chat_rejects_empty_and_oversized_messages() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlm::new());
        let state = ready_state(llm.clone(), dir.path()).await;
        let app = app!(state);

        let resp = test::call_service(&app, chat_request("   ").to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let long = "a".repeat(types::MAX_MESSAGE_CHARS + 1);
        let resp = test::call_service(&app, chat_request(&long).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("too long"));

        let req = test::TestRequest::post()
            .uri("/api/chat")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        assert!(llm.prompts().is_empty());
    }

    #[actix_web::test]
    async fn test_chat_failure_is_recorded_as_error_message() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlm::new());
        llm.set_fail_chat(true);
        let state = ready_state(llm, dir.path()).await;
        let app = app!(state);

        let resp = test::call_service(&app, chat_request("vaccine effectiveness").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = resp
            .response()
            .cookies()
            .find(|c| c.name() == SESSION_COOKIE)
            .map(|c| c.into_owned())
            .unwrap();
        let body: ChatOutput = test::read_body_json(resp).await;
        assert!(body.error);
        assert!(body.answer.starts_with("Sorry, I encountered an error: "));
        assert!(body.sources.is_empty());

        let req = test::TestRequest::get()
            .uri("/api/history")
            .cookie(cookie)
            .to_request();
        let history: HistoryResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(history.messages.len(), 2);
        assert_eq!(history.messages[1].content, body.answer);
    }

    #[actix_web::test]
    async fn test_chat_unavailable_without_chain() {
        let state = broken_state();
        let app = app!(state);

        let resp = test::call_service(&app, chat_request("anything").to_request()).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("OPENAI_API_KEY"));

        let req = test::TestRequest::get().uri("/api/status").to_request();
        let status: StatusResponse = test::call_and_read_body_json(&app, req).await;
        assert!(!status.chain_ready);
        assert!(!status.api_key_loaded);
        assert!(status.index.is_none());
        assert!(status.init_error.unwrap().contains("OPENAI_API_KEY"));
    }

    #[actix_web::test]
    async fn test_status_reports_index() {
        let dir = tempfile::tempdir().unwrap();
        let state = ready_state(Arc::new(MockLlm::new()), dir.path()).await;
        let app = app!(state);

        let req = test::TestRequest::get().uri("/api/status").to_request();
        let status: StatusResponse = test::call_and_read_body_json(&app, req).await;
        assert!(status.chain_ready);
        assert_eq!(status.top_k, 2);
        let index = status.index.unwrap();
        assert_eq!(index.documents, PASSAGES.len());
        assert_eq!(index.embedding_model, "mock-embed");
    }

    #[actix_web::test]
    async fn test_ui_and_health() {
        let app = app!(broken_state());

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        assert!(String::from_utf8_lossy(&body).contains("COVID-19 Research RAG Chatbot"));

        let resp = test::call_service(&app, test::TestRequest::get().uri("/app.js").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
    }
}
