//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the floor-music core:
//! - Logging and tracing infrastructure
//! - Configuration and bridge wiring
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the cache manager and
//! playback controller depend on. It establishes the logging conventions,
//! the fail-fast capability checks, and the event broadcasting mechanism used
//! throughout the workspace.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
