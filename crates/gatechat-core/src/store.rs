use chrono::{DateTime, Utc};
use gatechat_db::{messages, reactions, DbPool};
use gatechat_models::{Message, MessageDraft, MessageSender, Reaction, ReactionUser, ReplyRef};
use gatechat_util::snowflake;

use crate::error::CoreError;

/// Outcome of an atomic reaction update. `Duplicate` is deliberately
/// indistinguishable from success on the wire: the caller emits nothing.
#[derive(Debug)]
pub enum ReactionOutcome {
    Applied(Message),
    Duplicate,
    NotFound,
}

/// Room-scoped view over the message tables. All reads honor the retention
/// horizon so a message past its TTL is gone even before the reaper runs.
#[derive(Clone)]
pub struct MessageStore {
    db: DbPool,
    room_id: String,
    ttl: chrono::Duration,
    history_limit: i64,
}

impl MessageStore {
    pub fn new(db: DbPool, room_id: impl Into<String>, ttl: chrono::Duration, history_limit: i64) -> Self {
        Self {
            db,
            room_id: room_id.into(),
            ttl,
            history_limit,
        }
    }

    fn cutoff(&self) -> DateTime<Utc> {
        Utc::now() - self.ttl
    }

    /// Most recent messages, oldest-to-newest, reactions attached.
    pub async fn recent(&self) -> Result<Vec<Message>, CoreError> {
        let rows = messages::recent_messages(&self.db, &self.room_id, self.history_limit, self.cutoff()).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let reaction_rows = reactions::reactions_for_message(&self.db, row.id).await?;
            out.push(assemble(row, reaction_rows));
        }
        Ok(out)
    }

    /// Persist a draft: snowflake id, server timestamp, sender snapshot
    /// denormalized onto the row.
    pub async fn create(&self, draft: MessageDraft) -> Result<Message, CoreError> {
        let id = snowflake::generate(0);
        let reply_to_id = draft
            .reply_to
            .as_ref()
            .and_then(|reply| snowflake::parse(&reply.id));
        let row = messages::create_message(
            &self.db,
            id,
            &self.room_id,
            &draft.text,
            &draft.sender.id,
            &draft.sender.name,
            draft.sender.avatar.as_deref(),
            draft.sender.nft_count,
            reply_to_id,
            draft.reply_to.as_ref().map(|reply| reply.excerpt.as_str()),
            draft.reply_to.as_ref().map(|reply| reply.sender_name.as_str()),
            Utc::now(),
        )
        .await?;
        Ok(assemble(row, Vec::new()))
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Message>, CoreError> {
        let Some(row) = messages::get_message(&self.db, &self.room_id, id, self.cutoff()).await? else {
            return Ok(None);
        };
        let reaction_rows = reactions::reactions_for_message(&self.db, row.id).await?;
        Ok(Some(assemble(row, reaction_rows)))
    }

    /// Atomic add: the insert conflicts (affecting zero rows) when the user
    /// already reacted with that emoji, so concurrent duplicates cannot
    /// double-insert. A miss on the existence check means the message never
    /// existed or has expired.
    pub async fn add_reaction(
        &self,
        message_id: i64,
        emoji: &str,
        user: &ReactionUser,
    ) -> Result<ReactionOutcome, CoreError> {
        if messages::get_message(&self.db, &self.room_id, message_id, self.cutoff())
            .await?
            .is_none()
        {
            return Ok(ReactionOutcome::NotFound);
        }
        let inserted =
            reactions::add_reaction(&self.db, message_id, emoji, &user.id, &user.name).await?;
        if !inserted {
            return Ok(ReactionOutcome::Duplicate);
        }
        match self.find_by_id(message_id).await? {
            Some(message) => Ok(ReactionOutcome::Applied(message)),
            // Expired between the check and the insert; the reaper will
            // collect the orphan row.
            None => Ok(ReactionOutcome::NotFound),
        }
    }

    /// Atomic remove; an emoji entry whose last user leaves simply has no
    /// rows anymore, so empty entries never appear in reads.
    pub async fn remove_reaction(
        &self,
        message_id: i64,
        emoji: &str,
        user_id: &str,
    ) -> Result<ReactionOutcome, CoreError> {
        if messages::get_message(&self.db, &self.room_id, message_id, self.cutoff())
            .await?
            .is_none()
        {
            return Ok(ReactionOutcome::NotFound);
        }
        let removed = reactions::remove_reaction(&self.db, message_id, emoji, user_id).await?;
        if !removed {
            return Ok(ReactionOutcome::Duplicate);
        }
        match self.find_by_id(message_id).await? {
            Some(message) => Ok(ReactionOutcome::Applied(message)),
            None => Ok(ReactionOutcome::NotFound),
        }
    }

    /// Administrative soft delete. Returns false when the message does not
    /// exist in this room (or already expired).
    pub async fn delete(&self, id: i64) -> Result<bool, CoreError> {
        Ok(messages::soft_delete_message(&self.db, &self.room_id, id).await?)
    }
}

/// Group reaction rows by emoji in first-seen order. Rows arrive sorted by
/// creation time, so emoji order reflects who reacted first.
fn assemble(row: messages::MessageRow, reaction_rows: Vec<reactions::ReactionRow>) -> Message {
    let mut grouped: Vec<Reaction> = Vec::new();
    for reaction in reaction_rows {
        let user = ReactionUser {
            id: reaction.user_id,
            name: reaction.user_name,
        };
        match grouped.iter_mut().find(|group| group.emoji == reaction.emoji) {
            Some(group) => group.users.push(user),
            None => grouped.push(Reaction {
                emoji: reaction.emoji,
                users: vec![user],
            }),
        }
    }

    let reply_to = match (row.reply_to_id, row.reply_excerpt, row.reply_sender_name) {
        (Some(id), Some(excerpt), Some(sender_name)) => Some(ReplyRef {
            id: id.to_string(),
            excerpt,
            sender_name,
        }),
        _ => None,
    };

    Message {
        id: row.id.to_string(),
        room_id: row.room_id,
        text: row.content,
        sender: MessageSender {
            id: row.sender_id,
            name: row.sender_name,
            avatar: row.sender_avatar,
            nft_count: row.sender_entitlements,
        },
        reply_to,
        reactions: grouped,
        created_at: row.created_at,
    }
}
