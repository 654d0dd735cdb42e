use chrono::Utc;
use gatechat_models::{
    ClientEvent, ErrorCode, MessageDraft, MessageSender, PresenceEntry, ReactionUser, ReplyRef,
    ServerEvent,
};
use gatechat_util::{snowflake, validation};
use uuid::Uuid;

use crate::ratelimit::FixedWindow;
use crate::rooms::Room;
use crate::store::{MessageStore, ReactionOutcome};
use crate::token::Claim;
use crate::AppState;

/// What the transport adapter should do with a produced event. Protocol
/// logic only ever emits these; it never touches a socket.
#[derive(Debug)]
pub enum Action {
    /// Direct reply to the originating connection, never relayed.
    Reply(ServerEvent),
    /// Fan out to every connection in the room, origin included.
    Broadcast(ServerEvent),
    /// Fan out to every connection in the room except the origin.
    BroadcastOthers(ServerEvent),
}

/// Connection-local session state. Everything here is owned by one
/// connection task; only the presence tracker and store are shared.
#[derive(Debug)]
pub struct SessionCtx {
    pub connection_id: Uuid,
    pub user_id: String,
    pub is_admin: bool,
    pub nft_count: i64,
    pub room_id: String,
    pub room_label: String,
    pub name: String,
    pub avatar: Option<String>,
    pub limiter: FixedWindow,
}

impl SessionCtx {
    pub fn new(claim: &Claim, room: &Room, state: &AppState) -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            user_id: claim.sub.clone(),
            is_admin: claim.is_admin,
            nft_count: claim.nft_count,
            room_id: room.id.clone(),
            room_label: room.label.clone(),
            // Until the client identifies, the user id doubles as the name.
            name: claim.sub.clone(),
            avatar: None,
            limiter: FixedWindow::new(state.config.rate_limit),
        }
    }

    fn presence_entry(&self) -> PresenceEntry {
        PresenceEntry {
            user_id: self.user_id.clone(),
            name: self.name.clone(),
            avatar: self.avatar.clone(),
            nft_count: self.nft_count,
            is_admin: self.is_admin,
        }
    }

    fn sender_snapshot(&self) -> MessageSender {
        MessageSender {
            id: self.user_id.clone(),
            name: self.name.clone(),
            avatar: self.avatar.clone(),
            nft_count: self.nft_count,
        }
    }
}

fn store_for(state: &AppState, ctx: &SessionCtx) -> MessageStore {
    MessageStore::new(
        state.db.clone(),
        ctx.room_id.clone(),
        state.config.message_ttl,
        state.config.history_limit,
    )
}

fn error(code: ErrorCode, message: &str) -> Action {
    Action::Reply(ServerEvent::Error {
        message: message.to_string(),
        code,
    })
}

/// Joined-state entry: register presence, replay history, announce the user
/// if this is their first connection to the room.
pub async fn join_actions(state: &AppState, ctx: &mut SessionCtx) -> Vec<Action> {
    let mut actions = vec![Action::Reply(ServerEvent::Connected {
        user_id: ctx.user_id.clone(),
        is_admin: ctx.is_admin,
        room_name: ctx.room_label.clone(),
    })];

    // Snapshot before registering so the joining client sees who was
    // already there.
    let present = state.presence.list(&ctx.room_id);
    actions.push(Action::Reply(ServerEvent::UserList(present)));

    let first_connection = state
        .presence
        .connect(&ctx.room_id, &ctx.user_id, ctx.presence_entry());

    match store_for(state, ctx).recent().await {
        Ok(history) => actions.push(Action::Reply(ServerEvent::MessageHistory(history))),
        Err(err) => {
            tracing::error!(room = %ctx.room_id, error = %err, "failed to load message history");
            actions.push(error(ErrorCode::SaveError, "failed to load history"));
        }
    }

    if first_connection {
        actions.push(Action::BroadcastOthers(ServerEvent::UserJoined(
            ctx.presence_entry(),
        )));
    }
    actions
}

/// Teardown. Must never fail: it runs while the transport is collapsing,
/// typically from a drop guard, so it takes the bare identity instead of a
/// session that may already be gone.
pub fn leave_actions(state: &AppState, room_id: &str, user_id: &str) -> Vec<Action> {
    let remaining = state.presence.disconnect(room_id, user_id);
    if remaining == 0 {
        vec![Action::BroadcastOthers(ServerEvent::UserLeft {
            user_id: user_id.to_string(),
        })]
    } else {
        Vec::new()
    }
}

/// One inbound event in, a list of output actions out. Every failure path
/// becomes a caller-only error event; nothing escapes to the caller's task.
pub async fn handle_event(state: &AppState, ctx: &mut SessionCtx, event: ClientEvent) -> Vec<Action> {
    match event {
        ClientEvent::Identify { name, avatar } => handle_identify(state, ctx, name, avatar),
        ClientEvent::Send {
            text,
            name,
            avatar,
            reply_to_id,
        } => handle_send(state, ctx, text, name, avatar, reply_to_id).await,
        ClientEvent::TypingStart {} => vec![Action::BroadcastOthers(ServerEvent::Typing {
            user_id: ctx.user_id.clone(),
            name: ctx.name.clone(),
        })],
        ClientEvent::TypingStop {} => vec![Action::BroadcastOthers(ServerEvent::StoppedTyping {
            user_id: ctx.user_id.clone(),
            name: ctx.name.clone(),
        })],
        ClientEvent::React { message_id, emoji } => {
            handle_reaction(state, ctx, message_id, emoji, true).await
        }
        ClientEvent::Unreact { message_id, emoji } => {
            handle_reaction(state, ctx, message_id, emoji, false).await
        }
        ClientEvent::AdminDelete { message_id } => handle_admin_delete(state, ctx, message_id).await,
    }
}

fn handle_identify(
    state: &AppState,
    ctx: &mut SessionCtx,
    name: String,
    avatar: Option<String>,
) -> Vec<Action> {
    if validation::validate_display_name(&name).is_err() {
        return vec![error(ErrorCode::Invalid, "invalid display name")];
    }
    ctx.name = name.trim().to_string();
    if let Some(avatar) = avatar.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
        ctx.avatar = Some(avatar.to_string());
    }
    match state.presence.update(
        &ctx.room_id,
        &ctx.user_id,
        Some(&ctx.name),
        ctx.avatar.as_deref(),
    ) {
        Some(entry) => vec![Action::Broadcast(ServerEvent::UserUpdated(entry))],
        None => Vec::new(),
    }
}

async fn handle_send(
    state: &AppState,
    ctx: &mut SessionCtx,
    text: String,
    name: Option<String>,
    avatar: Option<String>,
    reply_to_id: Option<String>,
) -> Vec<Action> {
    if !ctx.limiter.admit(Utc::now()) {
        return vec![error(ErrorCode::RateLimit, "slow down, too many messages")];
    }

    // Silent profile refresh riding along with the message.
    if let Some(name) = name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        if validation::validate_display_name(name).is_ok() {
            ctx.name = name.to_string();
        }
    }
    if let Some(avatar) = avatar.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
        ctx.avatar = Some(avatar.to_string());
    }
    state.presence.update(
        &ctx.room_id,
        &ctx.user_id,
        Some(&ctx.name),
        ctx.avatar.as_deref(),
    );

    match validation::validate_message_text(&text) {
        Ok(()) => {}
        Err(validation::ValidationError::Empty) => {
            return vec![error(ErrorCode::Invalid, "message text is required")];
        }
        Err(validation::ValidationError::TooLong { max, .. }) => {
            return vec![error(
                ErrorCode::InvalidLength,
                &format!("message exceeds {max} characters"),
            )];
        }
    }

    let store = store_for(state, ctx);

    // A missing reply target never fails the send; the quote is dropped.
    let reply_to = match reply_to_id.as_deref().and_then(snowflake::parse) {
        Some(target_id) => match store.find_by_id(target_id).await {
            Ok(Some(target)) => Some(ReplyRef {
                id: target.id,
                excerpt: validation::reply_excerpt(&target.text),
                sender_name: target.sender.name,
            }),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(room = %ctx.room_id, error = %err, "reply target lookup failed");
                None
            }
        },
        None => None,
    };

    let draft = MessageDraft {
        text: text.trim().to_string(),
        sender: ctx.sender_snapshot(),
        reply_to,
    };
    match store.create(draft).await {
        Ok(message) => vec![Action::Broadcast(ServerEvent::Message(message))],
        Err(err) => {
            tracing::error!(room = %ctx.room_id, error = %err, "failed to persist message");
            vec![error(ErrorCode::SaveError, "failed to save message")]
        }
    }
}

async fn handle_reaction(
    state: &AppState,
    ctx: &mut SessionCtx,
    message_id: String,
    emoji: String,
    add: bool,
) -> Vec<Action> {
    let Some(target_id) = snowflake::parse(&message_id) else {
        return vec![error(ErrorCode::InvalidId, "malformed message id")];
    };
    if validation::validate_emoji(&emoji).is_err() {
        return vec![error(ErrorCode::Invalid, "invalid emoji")];
    }

    let store = store_for(state, ctx);
    let outcome = if add {
        let user = ReactionUser {
            id: ctx.user_id.clone(),
            name: ctx.name.clone(),
        };
        store.add_reaction(target_id, &emoji, &user).await
    } else {
        store.remove_reaction(target_id, &emoji, &ctx.user_id).await
    };

    match outcome {
        Ok(ReactionOutcome::Applied(_)) => {
            let event = if add {
                ServerEvent::ReactionAdded {
                    message_id: target_id.to_string(),
                    emoji,
                    user_id: ctx.user_id.clone(),
                    user_name: ctx.name.clone(),
                }
            } else {
                ServerEvent::ReactionRemoved {
                    message_id: target_id.to_string(),
                    emoji,
                    user_id: ctx.user_id.clone(),
                }
            };
            vec![Action::Broadcast(event)]
        }
        // Same-user duplicate: deliberately indistinguishable from success.
        Ok(ReactionOutcome::Duplicate) => Vec::new(),
        Ok(ReactionOutcome::NotFound) => vec![error(ErrorCode::NotFound, "message not found")],
        Err(err) => {
            tracing::error!(room = %ctx.room_id, error = %err, "reaction update failed");
            vec![error(ErrorCode::ReactionError, "failed to update reaction")]
        }
    }
}

async fn handle_admin_delete(
    state: &AppState,
    ctx: &mut SessionCtx,
    message_id: String,
) -> Vec<Action> {
    if !ctx.is_admin {
        return vec![error(ErrorCode::Unauthorized, "admin privileges required")];
    }
    let Some(target_id) = snowflake::parse(&message_id) else {
        return vec![error(ErrorCode::InvalidId, "malformed message id")];
    };
    match store_for(state, ctx).delete(target_id).await {
        Ok(true) => vec![Action::Broadcast(ServerEvent::MessageDeleted {
            message_id: target_id.to_string(),
        })],
        Ok(false) => vec![error(ErrorCode::NotFound, "message not found")],
        Err(err) => {
            tracing::error!(room = %ctx.room_id, error = %err, "failed to delete message");
            vec![error(ErrorCode::SaveError, "failed to delete message")]
        }
    }
}
