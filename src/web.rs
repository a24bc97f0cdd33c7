use std::{convert::Infallible, net::SocketAddr};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;
use warp::{
    http::StatusCode,
    reply::{self, Reply, Response},
    Filter, Rejection,
};

use crate::lang_graph::LoanAssistant;

const MIN_MESSAGE_CHARS: usize = 3;
const MAX_MESSAGE_CHARS: usize = 1000;
const MAX_BODY_BYTES: u64 = 16 * 1024;

/// Reply for a failed run. Distinct from the escalation message, which is a
/// successful outcome.
pub const FAILURE_MESSAGE: &str =
    "Sorry, we could not process your request right now. Please try again later.";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub request_id: String,
}

pub fn routes(
    assistant: LoanAssistant,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| reply::json(&json!({ "status": "ok" })));

    let chat = warp::path("chat")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(warp::any().map(move || assistant.clone()))
        .and_then(chat);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST"])
        .allow_headers(vec!["content-type"]);

    health.or(chat).with(cors)
}

async fn chat(request: ChatRequest, assistant: LoanAssistant) -> Result<Response, Infallible> {
    let request_id = request
        .request_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let message_length = request.message.chars().count();
    info!(%request_id, message_length, "Incoming chat request");

    if !(MIN_MESSAGE_CHARS..=MAX_MESSAGE_CHARS).contains(&message_length) {
        let body = json!({
            "error": format!(
                "message must be between {MIN_MESSAGE_CHARS} and {MAX_MESSAGE_CHARS} characters"
            ),
            "request_id": request_id,
        });
        return Ok(
            reply::with_status(reply::json(&body), StatusCode::UNPROCESSABLE_ENTITY)
                .into_response(),
        );
    }

    match assistant.query(&request.message).await {
        Ok(answer) => {
            info!(%request_id, "Chat request completed");
            Ok(reply::json(&ChatResponse { answer, request_id }).into_response())
        }
        Err(e) => {
            error!(%request_id, error = %e, "Chat request failed");
            let body = ChatResponse {
                answer: FAILURE_MESSAGE.to_string(),
                request_id,
            };
            Ok(
                reply::with_status(reply::json(&body), StatusCode::INTERNAL_SERVER_ERROR)
                    .into_response(),
            )
        }
    }
}

/// Serves until Ctrl-C.
pub async fn serve(assistant: LoanAssistant, addr: SocketAddr) -> Result<(), warp::Error> {
    let (bound, server) =
        warp::serve(routes(assistant)).try_bind_with_graceful_shutdown(addr, async {
            tokio::signal::ctrl_c().await.ok();
        })?;
    info!("Listening on {}", bound);
    server.await;
    info!("Server stopped");
    Ok(())
}
