use super::state::AppState;
use crate::bridge::BridgeSession;
use crate::providers::{
    AgentProvider, AgentProviderFactory, DisconnectedAgent, LlmProcessor, MeetingProviderFactory,
    NullSpeech, OpenAiCompatProcessor, SharedAgent,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StartBridgeResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /bridge/start
/// Construct providers from configuration and start the bridge session
pub async fn start_bridge(State(state): State<AppState>) -> impl IntoResponse {
    // Only one bridge session at a time
    {
        let bridge = state.bridge.read().await;
        if bridge.is_some() {
            return (
                StatusCode::CONFLICT,
                Json(ErrorResponse {
                    error: "Bridge session already active".to_string(),
                }),
            )
                .into_response();
        }
    }

    let (meeting, control) = match MeetingProviderFactory::create(state.config.meeting.clone()) {
        Ok(pair) => pair,
        Err(e) => {
            error!("Failed to create meeting provider: {:#}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to create meeting provider: {}", e),
                }),
            )
                .into_response();
        }
    };

    let agent: SharedAgent = match &state.config.agent_provider {
        Some(agent_config) => Arc::new(Mutex::new(AgentProviderFactory::create(
            agent_config.clone(),
        ))),
        None => {
            let disconnected: Box<dyn AgentProvider> = Box::new(DisconnectedAgent);
            Arc::new(Mutex::new(disconnected))
        }
    };

    let llm: Option<Arc<dyn LlmProcessor>> = state
        .config
        .llm
        .clone()
        .map(|cfg| Arc::new(OpenAiCompatProcessor::new(cfg)) as Arc<dyn LlmProcessor>);

    let session = match BridgeSession::new(
        &state.config,
        meeting,
        control,
        Arc::new(NullSpeech),
        agent,
        llm,
    ) {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to create bridge session: {:#}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to create bridge session: {}", e),
                }),
            )
                .into_response();
        }
    };

    if let Err(e) = session.start().await {
        error!("Failed to start bridge session: {:#}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to start bridge session: {}", e),
            }),
        )
            .into_response();
    }

    {
        let mut bridge = state.bridge.write().await;
        *bridge = Some(session);
    }

    info!("Bridge session started via HTTP");

    (
        StatusCode::OK,
        Json(StartBridgeResponse {
            status: "running".to_string(),
            message: "Bridge session started".to_string(),
        }),
    )
        .into_response()
}

/// POST /bridge/stop
/// Stop the active bridge session and return the call summary
pub async fn stop_bridge(State(state): State<AppState>) -> impl IntoResponse {
    let session = {
        let mut bridge = state.bridge.write().await;
        bridge.take()
    };

    match session {
        Some(session) => match session.stop().await {
            Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
            Err(e) => {
                error!("Failed to stop bridge session: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: format!("Failed to stop bridge session: {}", e),
                    }),
                )
                    .into_response()
            }
        },
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "No active bridge session".to_string(),
            }),
        )
            .into_response(),
    }
}

/// GET /bridge/status
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let bridge = state.bridge.read().await;

    match bridge.as_ref() {
        Some(session) => (StatusCode::OK, Json(session.status().await)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "No active bridge session".to_string(),
            }),
        )
            .into_response(),
    }
}

/// GET /bridge/transcript
pub async fn get_transcript(State(state): State<AppState>) -> impl IntoResponse {
    let bridge = state.bridge.read().await;

    match bridge.as_ref() {
        Some(session) => (StatusCode::OK, Json(session.transcript().await)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "No active bridge session".to_string(),
            }),
        )
            .into_response(),
    }
}

/// GET /bridge/summary
pub async fn get_summary(State(state): State<AppState>) -> impl IntoResponse {
    let bridge = state.bridge.read().await;

    match bridge.as_ref() {
        Some(session) => (StatusCode::OK, Json(session.summary().await)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "No active bridge session".to_string(),
            }),
        )
            .into_response(),
    }
}

/// GET /responses/pending
pub async fn get_pending_responses(State(state): State<AppState>) -> impl IntoResponse {
    let bridge = state.bridge.read().await;

    match bridge.as_ref() {
        Some(session) => {
            (StatusCode::OK, Json(session.pending_responses().await)).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "No active bridge session".to_string(),
            }),
        )
            .into_response(),
    }
}

/// POST /responses/:response_id/approve
pub async fn approve_response(
    State(state): State<AppState>,
    Path(response_id): Path<Uuid>,
) -> impl IntoResponse {
    let bridge = state.bridge.read().await;

    match bridge.as_ref() {
        Some(session) => match session.approve_response(response_id).await {
            Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "status": "approved" })))
                .into_response(),
            Err(e) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("{}", e),
                }),
            )
                .into_response(),
        },
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "No active bridge session".to_string(),
            }),
        )
            .into_response(),
    }
}

/// POST /responses/:response_id/reject
pub async fn reject_response(
    State(state): State<AppState>,
    Path(response_id): Path<Uuid>,
) -> impl IntoResponse {
    let bridge = state.bridge.read().await;

    match bridge.as_ref() {
        Some(session) => match session.reject_response(response_id).await {
            Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "status": "rejected" })))
                .into_response(),
            Err(e) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("{}", e),
                }),
            )
                .into_response(),
        },
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "No active bridge session".to_string(),
            }),
        )
            .into_response(),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
