//! `tchat`: terminal chat with a peer addressed by its onion service id.

pub mod app;
pub mod chat;
pub mod config;
pub mod crypto;
pub mod sync;
pub mod transport;
pub mod ui;
