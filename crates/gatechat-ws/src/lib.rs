mod handler;

use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use gatechat_core::token::verify_token;
use gatechat_core::AppState;
use serde::Deserialize;

pub fn gateway_router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}

#[derive(Debug, Deserialize)]
struct ConnectParams {
    token: Option<String>,
}

/// Credential and room checks happen here, at the HTTP stage, so rejected
/// clients get a status code instead of a socket that immediately closes.
async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> Response {
    let Some(token) = params.token else {
        return (StatusCode::UNAUTHORIZED, "missing credential").into_response();
    };
    let claim = match verify_token(&token, &state.config.signing_secret) {
        Ok(claim) => claim,
        Err(err) => return (StatusCode::UNAUTHORIZED, err.to_string()).into_response(),
    };

    // Entitlements are re-checked against the room's current threshold, not
    // just trusted from issuance time.
    let room = state.rooms.resolve(claim.room.as_deref()).clone();
    if !state.rooms.is_eligible(claim.nft_count, &room.id, claim.is_admin) {
        return (StatusCode::FORBIDDEN, "insufficient entitlements for room").into_response();
    }

    ws.on_upgrade(move |socket| handler::handle_connection(socket, state, claim, room))
}
