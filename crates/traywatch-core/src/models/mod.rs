pub mod api;
pub mod conversation;
pub mod status;

pub use api::{Conversation, Membership, Team, User};
pub use conversation::{Aggregate, ConversationCounters, ConversationKind};
pub use status::{derive_status, StatusLevel, StatusSink};
