//! Database connection and initialization.

pub use ltigate_core::db::DatabaseError;

ltigate_core::define_database!(LaunchDatabase, "Launch database migrations complete");
