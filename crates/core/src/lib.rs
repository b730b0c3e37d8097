//! Core utilities for the triangle renderer.
//!
//! This crate provides the foundational pieces shared by the other crates:
//! - Error types and result aliases for the platform layer
//! - Logging initialization

mod error;
mod logging;

pub use error::{Error, Result};
pub use logging::init_logging;
