use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use gatechat_core::dispatch::{handle_event, join_actions, leave_actions, Action, SessionCtx};
use gatechat_core::rooms::Room;
use gatechat_core::token::Claim;
use gatechat_core::AppState;
use gatechat_models::{ClientEvent, ErrorCode, ServerEvent};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Duration;
use uuid::Uuid;

const PING_INTERVAL: Duration = Duration::from_secs(30);

type Sink = SplitSink<WebSocket, Message>;

/// Holds the session's presence registration. Deregistration lives in `Drop`
/// so it runs on every exit path out of the session task, including a panic
/// mid-loop; a plain call at the end of the task would be skipped on unwind
/// and leave the user permanently "online".
struct PresenceGuard {
    state: AppState,
    room_id: String,
    user_id: String,
    connection_id: Uuid,
}

impl Drop for PresenceGuard {
    fn drop(&mut self) {
        for action in leave_actions(&self.state, &self.room_id, &self.user_id) {
            if let Action::BroadcastOthers(event) = action {
                self.state
                    .event_bus
                    .broadcast_others(&self.room_id, self.connection_id, event);
            }
        }
        tracing::info!(
            user = %self.user_id,
            room = %self.room_id,
            connection = %self.connection_id,
            "gateway connection closed"
        );
    }
}

pub(crate) async fn handle_connection(
    socket: WebSocket,
    state: AppState,
    claim: Claim,
    room: Room,
) {
    let mut ctx = SessionCtx::new(&claim, &room, &state);
    tracing::info!(
        user = %ctx.user_id,
        room = %ctx.room_id,
        connection = %ctx.connection_id,
        "gateway connection opened"
    );

    let (mut sink, mut stream) = socket.split();
    // Subscribe before announcing the join so no event can slip between.
    let mut bus = state.event_bus.subscribe();

    // Registers presence; the guard below covers everything after it.
    let joined = join_actions(&state, &mut ctx).await;
    let _guard = PresenceGuard {
        state: state.clone(),
        room_id: ctx.room_id.clone(),
        user_id: ctx.user_id.clone(),
        connection_id: ctx.connection_id,
    };
    if execute(&state, &ctx, &mut sink, joined).await.is_err() {
        return;
    }

    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.tick().await; // skip immediate first tick

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let actions = match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => handle_event(&state, &mut ctx, event).await,
                        // Unknown or malformed events never touch the room.
                        Err(_) => vec![Action::Reply(ServerEvent::Error {
                            message: "unrecognized event".to_string(),
                            code: ErrorCode::Invalid,
                        })],
                    };
                    if execute(&state, &ctx, &mut sink, actions).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // binary, ping, pong: nothing to do
                Some(Err(err)) => {
                    tracing::debug!(connection = %ctx.connection_id, error = %err, "socket read failed");
                    break;
                }
            },
            event = bus.recv() => match event {
                Ok(room_event) => {
                    if room_event.room_id != ctx.room_id {
                        continue;
                    }
                    if room_event.exclude_connection == Some(ctx.connection_id) {
                        continue;
                    }
                    if send_event(&mut sink, &room_event.event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    // The client already missed events; a reconnect replays
                    // history and resyncs presence.
                    tracing::warn!(
                        connection = %ctx.connection_id,
                        skipped,
                        "gateway subscriber lagged, dropping connection"
                    );
                    break;
                }
                Err(RecvError::Closed) => break,
            },
            _ = ping.tick() => {
                if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }
}

async fn execute(
    state: &AppState,
    ctx: &SessionCtx,
    sink: &mut Sink,
    actions: Vec<Action>,
) -> Result<(), ()> {
    for action in actions {
        match action {
            Action::Reply(event) => send_event(sink, &event).await?,
            Action::Broadcast(event) => state.event_bus.broadcast(&ctx.room_id, event),
            Action::BroadcastOthers(event) => {
                state
                    .event_bus
                    .broadcast_others(&ctx.room_id, ctx.connection_id, event)
            }
        }
    }
    Ok(())
}

async fn send_event(sink: &mut Sink, event: &ServerEvent) -> Result<(), ()> {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(err) => {
            tracing::error!(error = %err, "failed to encode outbound event");
            return Ok(());
        }
    };
    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}
