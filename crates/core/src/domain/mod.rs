pub mod catalog;
pub mod conversation;
pub mod session;
