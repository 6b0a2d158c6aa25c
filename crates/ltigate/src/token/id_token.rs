//! Identity token verification against a platform key set.

use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::jwk::{Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::Value;

use super::claims::{LTI_VERSION, LtiClaims, MAX_SUBJECT_LEN, RESOURCE_LINK_REQUEST, claim};
use crate::launch::ErrorKind;

/// Values the token must carry for the launch being completed.
#[derive(Debug, Clone, Copy)]
pub struct ExpectedClaims<'a> {
    /// The platform's issuer.
    pub issuer: &'a str,
    /// The registration's client id.
    pub audience: &'a str,
    /// The nonce issued at login.
    pub nonce: &'a str,
}

/// Why an identity token was refused.
#[derive(Debug, thiserror::Error)]
pub enum IdTokenError {
    #[error("malformed id_token: {0}")]
    Malformed(String),

    #[error("no key in the platform key set matches kid {kid:?}")]
    UnknownKey { kid: Option<String> },

    #[error("platform key is unusable: {0}")]
    UnusableKey(String),

    #[error("id_token signature is invalid")]
    InvalidSignature,

    #[error("id_token expired")]
    Expired,

    #[error("id_token is not valid yet")]
    NotYetValid,

    #[error("id_token iss is not the platform issuer {expected}")]
    IssuerMismatch { expected: String },

    #[error("id_token aud does not contain client id {expected}")]
    AudienceMismatch { expected: String },

    #[error("id_token azp {actual} is not client id {expected}")]
    AuthorizedPartyMismatch { expected: String, actual: String },

    #[error("id_token nonce does not match the launch")]
    NonceMismatch,

    #[error("id_token is missing required claim {0}")]
    MissingClaim(String),

    #[error("id_token claim {claim} has unsupported value {actual:?}")]
    UnsupportedClaimValue { claim: &'static str, actual: String },

    #[error("id_token claims could not be decoded: {0}")]
    MalformedClaims(#[source] serde_json::Error),

    #[error("id_token sub is {length} characters long, limit is {MAX_SUBJECT_LEN}")]
    SubjectTooLong { length: usize },

    #[error("id_token rejected: {0}")]
    Rejected(#[source] jsonwebtoken::errors::Error),
}

impl IdTokenError {
    /// Failure category of this refusal.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::IssuerMismatch { .. }
            | Self::AudienceMismatch { .. }
            | Self::AuthorizedPartyMismatch { .. }
            | Self::NonceMismatch
            | Self::SubjectTooLong { .. } => ErrorKind::IdentityMismatch,
            Self::MissingClaim(_) | Self::UnsupportedClaimValue { .. } => ErrorKind::Validation,
            Self::Malformed(_)
            | Self::UnknownKey { .. }
            | Self::UnusableKey(_)
            | Self::InvalidSignature
            | Self::Expired
            | Self::NotYetValid
            | Self::MalformedClaims(_)
            | Self::Rejected(_) => ErrorKind::CryptoFailure,
        }
    }

    fn from_jwt(e: jsonwebtoken::errors::Error, expected: &ExpectedClaims<'_>) -> Self {
        match e.kind() {
            JwtErrorKind::InvalidSignature => Self::InvalidSignature,
            JwtErrorKind::ExpiredSignature => Self::Expired,
            JwtErrorKind::ImmatureSignature => Self::NotYetValid,
            JwtErrorKind::InvalidIssuer => Self::IssuerMismatch {
                expected: expected.issuer.to_string(),
            },
            JwtErrorKind::InvalidAudience => Self::AudienceMismatch {
                expected: expected.audience.to_string(),
            },
            JwtErrorKind::MissingRequiredClaim(name) => Self::MissingClaim(name.clone()),
            JwtErrorKind::InvalidToken
            | JwtErrorKind::Base64(_)
            | JwtErrorKind::Json(_)
            | JwtErrorKind::Utf8(_) => Self::Malformed(e.to_string()),
            _ => Self::Rejected(e),
        }
    }
}

/// Verifies platform-signed identity tokens and decodes their LTI claims.
#[derive(Debug, Clone, Copy)]
pub struct IdTokenVerifier {
    leeway_secs: u64,
}

impl IdTokenVerifier {
    /// `leeway_secs` is the clock skew tolerated on `exp` and `nbf`.
    pub const fn new(leeway_secs: u64) -> Self {
        Self { leeway_secs }
    }

    /// Verify `id_token` against `key_set` and the expected launch values.
    ///
    /// Only the algorithm of the selected key's family is accepted, so an
    /// HMAC-signed token cannot pass against a published RSA key.
    pub fn verify(
        &self,
        key_set: &JwkSet,
        expected: &ExpectedClaims<'_>,
        id_token: &str,
    ) -> Result<LtiClaims, IdTokenError> {
        let header = jsonwebtoken::decode_header(id_token)
            .map_err(|e| IdTokenError::Malformed(e.to_string()))?;
        let jwk = select_key(key_set, header.kid.as_deref())?;
        if let Some(key_alg) = jwk.common.key_algorithm
            && signing_algorithm(key_alg) != Some(header.alg)
        {
            return Err(IdTokenError::UnusableKey(format!(
                "key is for {key_alg}, token is signed with {:?}",
                header.alg
            )));
        }
        let key = DecodingKey::from_jwk(jwk).map_err(|e| IdTokenError::UnusableKey(e.to_string()))?;

        let mut validation = Validation::new(header.alg);
        validation.leeway = self.leeway_secs;
        validation.set_issuer(&[expected.issuer]);
        validation.set_audience(&[expected.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        let payload = jsonwebtoken::decode::<Value>(id_token, &key, &validation)
            .map_err(|e| IdTokenError::from_jwt(e, expected))?
            .claims;

        check_launch_claims(&payload, expected)?;

        let claims: LtiClaims =
            serde_json::from_value(payload).map_err(IdTokenError::MalformedClaims)?;
        if let Some(sub) = &claims.sub {
            let length = sub.chars().count();
            if length > MAX_SUBJECT_LEN {
                return Err(IdTokenError::SubjectTooLong { length });
            }
        }
        Ok(claims)
    }
}

/// Pick the key named by `kid`. A token without `kid` is only accepted
/// against a single-key set.
fn select_key<'a>(key_set: &'a JwkSet, kid: Option<&str>) -> Result<&'a Jwk, IdTokenError> {
    let found = match kid {
        Some(kid) => key_set.find(kid),
        None if key_set.keys.len() == 1 => key_set.keys.first(),
        None => None,
    };
    found.ok_or_else(|| IdTokenError::UnknownKey {
        kid: kid.map(str::to_string),
    })
}

/// Signature algorithm a JWK `alg` names. Encryption algorithms map to none.
const fn signing_algorithm(key_alg: KeyAlgorithm) -> Option<Algorithm> {
    match key_alg {
        KeyAlgorithm::HS256 => Some(Algorithm::HS256),
        KeyAlgorithm::HS384 => Some(Algorithm::HS384),
        KeyAlgorithm::HS512 => Some(Algorithm::HS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        KeyAlgorithm::RSA1_5
        | KeyAlgorithm::RSA_OAEP
        | KeyAlgorithm::RSA_OAEP_256
        | KeyAlgorithm::UNKNOWN_ALGORITHM => None,
    }
}

fn required_str<'a>(payload: &'a Value, name: &'static str) -> Result<&'a str, IdTokenError> {
    payload
        .get(name)
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| IdTokenError::MissingClaim(name.to_string()))
}

fn check_launch_claims(payload: &Value, expected: &ExpectedClaims<'_>) -> Result<(), IdTokenError> {
    required_str(payload, claim::DEPLOYMENT_ID)?;

    let message_type = required_str(payload, claim::MESSAGE_TYPE)?;
    if message_type != RESOURCE_LINK_REQUEST {
        return Err(IdTokenError::UnsupportedClaimValue {
            claim: claim::MESSAGE_TYPE,
            actual: message_type.to_string(),
        });
    }

    let version = required_str(payload, claim::VERSION)?;
    if version != LTI_VERSION {
        return Err(IdTokenError::UnsupportedClaimValue {
            claim: claim::VERSION,
            actual: version.to_string(),
        });
    }

    required_str(payload, claim::TARGET_LINK_URI)?;

    if required_str(payload, "nonce")? != expected.nonce {
        return Err(IdTokenError::NonceMismatch);
    }

    if let Some(azp) = payload.get("azp").and_then(Value::as_str)
        && azp != expected.audience
    {
        return Err(IdTokenError::AuthorizedPartyMismatch {
            expected: expected.audience.to_string(),
            actual: azp.to_string(),
        });
    }

    Ok(())
}
