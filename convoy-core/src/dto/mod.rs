//! Data Transfer Objects
//!
//! Payloads exchanged with the HTTP layer, the remote CI system and live
//! event subscribers.

pub mod deploy;
pub mod event;
pub mod remote;
