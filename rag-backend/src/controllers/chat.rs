use actix_web::web::Bytes;
use actix_web::{HttpResponse, Responder, web};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;

use crate::AppState;
use crate::workflow::ChatRequest;

const ANONYMOUS_USER: &str = "anonymous";

#[derive(Debug, Deserialize)]
pub struct ChatInput {
    pub input: String,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Omit to start a new conversation; its id comes back in the
    /// `X-Conversation-Id` response header.
    #[serde(default)]
    pub conversation_id: Option<String>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/chat").route(web::post().to(chat)))
        .service(
            web::resource("/api/chat/history/{conversation_id}")
                .route(web::get().to(get_history)),
        );
}

/// Stream a chat response as server-sent events
async fn chat(state: web::Data<AppState>, body: web::Json<ChatInput>) -> impl Responder {
    let body = body.into_inner();
    if body.input.trim().is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "input must not be empty"
        }));
    }

    let request = ChatRequest {
        user_id: body.user_id.unwrap_or_else(|| ANONYMOUS_USER.to_string()),
        conversation_id: body.conversation_id,
        input: body.input,
    };

    let (conversation_id, receiver) = state.orchestrator.run(request);

    let frames = ReceiverStream::new(receiver)
        .map(|event| Ok::<Bytes, actix_web::Error>(Bytes::from(event.to_sse_frame())));

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("X-Conversation-Id", conversation_id))
        .streaming(frames)
}

/// Full turn history for a conversation, oldest first
async fn get_history(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let conversation_id = path.into_inner();

    match state.history.read(&conversation_id).await {
        Ok(turns) => HttpResponse::Ok().json(serde_json::json!({
            "conversation_id": conversation_id,
            "turns": turns
        })),
        Err(e) => {
            log::error!("[CHAT] {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to read conversation history"
            }))
        }
    }
}
