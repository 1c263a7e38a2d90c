pub mod conversation;
pub mod cursor;
pub mod message;
