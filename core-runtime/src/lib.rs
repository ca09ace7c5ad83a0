//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the media library core:
//! - Logging and tracing infrastructure
//! - Configuration management
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the data-access crates
//! depend on. It establishes the logging conventions and the validated
//! configuration object handed to the library at startup.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{LibraryConfig, LibraryConfigBuilder};
pub use error::{Error, Result};
