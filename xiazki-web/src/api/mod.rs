//! HTTP API handlers for xiazki-web

pub mod auth;
pub mod books;
pub mod error;
pub mod events;
pub mod health;
pub mod reviews;

pub use auth::{auth_middleware, CurrentUser};
pub use error::{ApiError, ApiResult};
pub use health::health_routes;
