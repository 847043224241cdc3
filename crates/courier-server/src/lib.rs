//! HTTP and WebSocket surface of the courier service.
//!
//! Thin glue over `courier-core`: handlers validate the request, open a
//! session through the connector, run the core operation and map the
//! outcome onto JSON. The WebSocket route is a transport for the reply
//! hub, nothing more.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod ws;

pub use router::{build_router, run, AppState};
