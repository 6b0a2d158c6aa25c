//! `ltigate` Core Library
//!
//! Shared functionality for the `ltigate` launch engine:
//! - Configuration resolution and hierarchy
//! - `SQLite` pool helpers and the storage error type
//! - Tracing subscriber setup
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod tracing_init;

pub use config::{Config, DeploymentPolicy};
pub use error::{Error, Result};
