//! # UI Module
//!
//! Plain-text replies for slash commands.
//!
//! Mentions render as names without notifying anyone. The one exception is
//! the `/next` announcement, which pings the performer taking the stage.

pub mod messages;

pub use messages::Reply;
