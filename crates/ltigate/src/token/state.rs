//! Signed `state` values for the OIDC login round trip.

use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ltigate_core::db::unix_timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifetime of a state token.
pub const STATE_TTL_SECS: i64 = 10 * 60;

#[derive(Debug, Serialize, Deserialize)]
struct StateClaims {
    iss: String,
    iat: i64,
    nbf: i64,
    exp: i64,
    #[serde(
        rename = "lti_launch_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    launch_id: Option<String>,
}

/// Why a state token was refused.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("state token expired")]
    Expired,

    #[error("state token is not valid yet")]
    NotYetValid,

    #[error("state token signature is invalid")]
    InvalidSignature,

    #[error("malformed state token: {0}")]
    MalformedToken(String),

    #[error("state token rejected: {0}")]
    Rejected(jsonwebtoken::errors::Error),

    #[error("failed to sign state token: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for StateError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            JwtErrorKind::ExpiredSignature => Self::Expired,
            JwtErrorKind::ImmatureSignature => Self::NotYetValid,
            JwtErrorKind::InvalidSignature => Self::InvalidSignature,
            JwtErrorKind::InvalidToken
            | JwtErrorKind::Base64(_)
            | JwtErrorKind::Json(_)
            | JwtErrorKind::Utf8(_) => Self::MalformedToken(e.to_string()),
            _ => Self::Rejected(e),
        }
    }
}

/// Creates and verifies HS256 state tokens carrying a launch id.
#[derive(Clone)]
pub struct StateCodec {
    issuer: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl StateCodec {
    pub fn new(issuer: impl Into<String>, secret: &[u8]) -> Self {
        Self {
            issuer: issuer.into(),
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Mint a state token for the launch, valid for [`STATE_TTL_SECS`].
    pub fn create(&self, launch_id: Uuid) -> Result<String, StateError> {
        self.create_at(launch_id, unix_timestamp())
    }

    pub(crate) fn create_at(&self, launch_id: Uuid, issued_at: i64) -> Result<String, StateError> {
        let claims = StateClaims {
            iss: self.issuer.clone(),
            iat: issued_at,
            nbf: issued_at,
            exp: issued_at + STATE_TTL_SECS,
            launch_id: Some(launch_id.to_string()),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(StateError::Signing)
    }

    /// Check signature, issuer and validity window, and recover the launch id.
    pub fn verify(&self, token: &str) -> Result<Uuid, StateError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        let data = jsonwebtoken::decode::<StateClaims>(token, &self.decoding_key, &validation)?;
        let launch_id = data
            .claims
            .launch_id
            .ok_or_else(|| StateError::MalformedToken("lti_launch_id claim missing".to_string()))?;
        Uuid::parse_str(&launch_id)
            .map_err(|e| StateError::MalformedToken(format!("lti_launch_id {launch_id:?}: {e}")))
    }
}
