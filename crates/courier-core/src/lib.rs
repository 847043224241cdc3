//! Platform-agnostic core of the courier bulk-DM service: domain types,
//! the ports the chat adapter implements, recipient resolution, the
//! dispatch loop, the reply store and the listener that feeds it.
//!
//! The Discord binding and the HTTP/WebSocket surface live in sibling
//! crates and only talk to this one through the traits in [`platform`]
//! and [`store`].

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod hub;
pub mod listener;
pub mod logging;
pub mod platform;
pub mod resolver;
pub mod store;

pub use errors::{Error, Result};
