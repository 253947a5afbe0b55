pub mod bot;
pub mod config;
pub mod error;
pub mod queue;
pub mod storage;
pub mod templates;
pub mod ui;
