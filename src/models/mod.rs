pub mod member;
pub mod message;
pub mod presence;
pub mod room;

pub use member::MemberRole;
pub use message::{Message, MessageEnvelope, MessageKind};
pub use presence::{PresenceRecord, PresenceStatus};
pub use room::RoomKind;
