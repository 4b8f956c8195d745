//! HTTP surface of the robobrain service.
//!
//! Exposes session context updates, the speech-input conversation endpoint,
//! memory insert/search, and session inspection over a JSON REST API.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
