// Internal HTTP routes: the leaderboard read endpoint and a status probe,
// both polled by the client outside the WebSocket connection.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::interface_adapters::http::ErrorResponse;
use crate::interface_adapters::state::AppState;
use crate::use_cases::account::LeaderBoardUseCase;

pub async fn status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let matches = state.matches.active_matches().await;
    let player_count: usize = matches.iter().map(|h| h.player_count.load(Ordering::SeqCst)).sum();
    Json(json!({
        "status": "ok",
        "matches": matches.len(),
        "players": player_count,
    }))
}

pub async fn leaderboard_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let use_case = LeaderBoardUseCase { store: state.accounts.clone() };
    match use_case.execute().await {
        Ok(board) => Json(board).into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse { error: err.to_string() }),
        )
            .into_response(),
    }
}
