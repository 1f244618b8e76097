//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the offline chapter cache:
//! - Logging and tracing infrastructure
//! - Configuration management (builder, environment, desktop defaults)
//! - The runtime error type
//!
//! ## Overview
//!
//! Every other core crate depends on this one for its logging conventions
//! and for the [`CoreConfig`](config::CoreConfig) that carries the host
//! bridges into the service layer.

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
