//! tchat relay library.
//!
//! A small relay for local use and tests: authenticated readers on `/read`
//! receive every message accepted on `/send`.

pub mod config;
pub mod relay;
