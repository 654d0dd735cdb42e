pub mod gateway;
pub mod message;
pub mod presence;

pub use gateway::{ClientEvent, ErrorCode, ServerEvent};
pub use message::{Message, MessageDraft, MessageSender, Reaction, ReactionUser, ReplyRef};
pub use presence::PresenceEntry;
