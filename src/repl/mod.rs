//! Conversation Loop
//!
//! Line-oriented console session on top of [`crate::ChatClient`].

pub mod command;
pub mod session;

pub use command::Command;
pub use session::Session;
