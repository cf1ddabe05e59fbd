pub mod conversation;
pub mod message;
pub mod participant;
pub mod read_receipt;

pub use conversation::{Conversation, ConversationStatus, ConversationType, ConversationView};
pub use message::{Message, MessageStatus, MessageType};
pub use participant::Participant;
pub use read_receipt::ReadReceipt;
