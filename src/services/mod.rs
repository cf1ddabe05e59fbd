pub mod conversation_service;
pub mod message_service;
pub mod participant_service;
pub mod read_receipt_service;
