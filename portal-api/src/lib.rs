//! Portal API
//!
//! HTTP surface for the file exchange portal: session-gated JSON endpoints
//! over the authorization engine, file vault, metadata index and audit log.

pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;
pub mod services;
pub mod state;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use router::create_router;
pub use state::AppState;
