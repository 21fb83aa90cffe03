//! Shared protocol definitions for the tchat wire format.

pub mod identity;
pub mod message;
pub mod signing;
pub mod wire;
