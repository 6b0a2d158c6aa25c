//! ltigate Launch Engine Library
//!
//! Core functionality for the LTI 1.3 third-party-initiated login flow:
//! - Signed, short-lived state tokens binding an OIDC login to a launch
//! - Platform key set cache for identity token verification
//! - Identity token verification and LTI claim decoding
//! - Launch orchestration (login initiation and callback) with single-use launches
//! - `SQLite` launch store and HTTP endpoints for the tool

pub mod keyset;
pub mod launch;
pub mod models;
pub mod repo;
pub mod routes;
pub mod storage;
pub mod token;

#[cfg(test)]
mod test_support;
