//! HTTP API server for external control (operator panel)
//!
//! This module provides a REST API for controlling the bridge:
//! - POST /bridge/start - Start the bridge session
//! - POST /bridge/stop - Stop it and return the call summary
//! - GET /bridge/status - Query session status
//! - GET /bridge/transcript - Get the conversation log
//! - GET /bridge/summary - Get call analytics
//! - GET /responses/pending - List pending responses
//! - POST /responses/:id/approve - Approve a pending response
//! - POST /responses/:id/reject - Reject a pending response
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
