//! Command-line client library for the Beeper Desktop API.
//!
//! The crate is organized around four pieces: the [`client`] transport with its error
//! classification in [`error`], the multi-format output [`render`]er, the layered [`config`]
//! resolver, and the background [`update`] checker.

// Public modules
pub mod client;
pub mod config;
pub mod error;
pub mod observability;
pub mod render;
pub mod types;
pub mod update;
pub mod utils;

// Re-exports
pub use client::{ApiResponse, BeeperClient};
pub use config::{Config, ConfigLayer, OutputFormat};
pub use error::{Error, ErrorCategory, Result};
pub use observability::register_biometrics;
pub use types::*;
pub use update::{UpdateChecker, UpdateHandle, UpdateInfo};

/// Version of this build.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
