//! Chat Bot
//!
//! Receives OneBot events over HTTP, parses group commands and dispatches
//! them to the core services.

pub mod commands;
pub mod custom;
pub mod events;
mod handlers;
mod notify;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

pub use commands::{Command, CommandParser};
pub use custom::{CustomCommand, CustomCommands};
pub use events::{Event, QuickReply};
pub use handlers::{Bot, BotError};
pub use notify::GroupNotifier;

/// Create the event router.
pub fn router(bot: Arc<Bot>) -> Router {
    Router::new()
        .route("/events", post(receive_event))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(bot)
}

/// Accept one event; answer with a quick reply or 204.
async fn receive_event(State(bot): State<Arc<Bot>>, Json(event): Json<Event>) -> Response {
    match bot.handle_event(event).await {
        Some(reply) => Json(QuickReply::new(reply)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn health() -> &'static str {
    "ok"
}
