//! services/web/src/error.rs
//!
//! Defines the primary error type for the entire web service.

use crate::config::ConfigError;
use chatbot_core::catalog::CatalogError;
use chatbot_core::ports::PortError;

/// The primary error type for the `web` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// The intent catalog files are missing or malformed.
    #[error("Intent catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// A page template failed to compile or render.
    #[error("Template Error: {0}")]
    Template(#[from] minijinja::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
