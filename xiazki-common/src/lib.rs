//! # xiazki common library
//!
//! Shared code for the xiazki book tracker:
//! - Database schema initialisation
//! - Domain models (books, reading events, reviews, users)
//! - Storage operations, including the reading-event consistency rule,
//!   the review upsert and review statistics
//! - Configuration loading
//! - ISBN helpers

pub mod config;
pub mod db;
pub mod error;
pub mod isbn;

pub use error::{Error, Result};
