//! Web API module for singledrive.
//!
//! This module provides the HTTP surface over the drive: upload, listing,
//! structural mutations, downloads and table introspection.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::{create_health_router, create_router};
pub use server::WebServer;
