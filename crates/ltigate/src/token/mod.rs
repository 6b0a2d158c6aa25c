//! Token handling for the launch flow.
//!
//! Provides the signed `state` codec and identity token verification with
//! LTI 1.3 claim decoding.

pub mod claims;
pub mod id_token;
pub mod state;

pub use claims::LtiClaims;
pub use id_token::{ExpectedClaims, IdTokenError, IdTokenVerifier};
pub use state::{StateCodec, StateError};
