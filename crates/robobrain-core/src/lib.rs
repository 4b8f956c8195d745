pub mod config;
pub mod error;
pub mod types;

pub use config::BrainConfig;
pub use error::{BrainError, Result, UpstreamError, UpstreamService};
pub use types::*;
