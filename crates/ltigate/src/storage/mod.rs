//! `SQLite` launch store.
//!
//! Persists platforms, registrations, deployments, platform instances and
//! launches, and implements [`LaunchRepository`](crate::repo::LaunchRepository)
//! on top of them.

mod db;
mod models;
mod queries;


pub use db::{DatabaseError, LaunchDatabase};
