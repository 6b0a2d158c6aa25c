//! Platform key sets (JWKS) used to verify identity tokens.

mod cache;
mod source;

pub use cache::KeySetCache;
pub use source::{HttpKeySetSource, KeySetSource, StaticKeySource};

/// Key set retrieval errors.
#[derive(Debug, thiserror::Error)]
pub enum KeySetError {
    #[error("failed to fetch key set from {url}: {message}")]
    Unreachable { url: String, message: String },

    #[error("key set endpoint {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("malformed key set from {url}: {reason}")]
    Malformed { url: String, reason: String },

    #[error("no key set known for {url}")]
    Unknown { url: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}
