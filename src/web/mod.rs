//! JSON HTTP API.

pub mod server;
pub mod types;

pub use server::{AppState, build_router, start_server};
