//! EasyCut Common Utilities
//!
//! Shared infrastructure for all EasyCut crates:
//! - Error taxonomy and result alias
//! - Tracing/logging initialization
//! - Application configuration (workdir, encoder binaries, logging)

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
