pub mod message_store;
pub mod ticket_store;
