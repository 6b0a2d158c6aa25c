use std::fmt;

use uuid::Uuid;

use crate::keyset::KeySetError;
use crate::repo::RepositoryError;
use crate::token::{IdTokenError, StateError};

/// Coarse failure categories of a refused launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A request was missing required fields or carried unsupported values.
    Validation,
    /// A referenced registration, deployment or launch does not exist.
    LookupFailure,
    /// Issuer, audience, nonce, deployment or subject did not line up.
    IdentityMismatch,
    /// A token could not be signed, decoded or verified.
    CryptoFailure,
    /// A collaborator (key set endpoint or store) failed.
    UpstreamFailure,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::LookupFailure => "lookup_failure",
            Self::IdentityMismatch => "identity_mismatch",
            Self::CryptoFailure => "crypto_failure",
            Self::UpstreamFailure => "upstream_failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A login initiation request missing a required field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LoginRequestError {
    #[error("login request is missing iss")]
    MissingIssuer,
    #[error("login request is missing client_id")]
    MissingClientId,
    #[error("login request is missing login_hint")]
    MissingLoginHint,
    #[error("login request is missing target_link_uri")]
    MissingTargetLinkUri,
}

/// Why a login or callback was refused.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error(transparent)]
    InvalidLoginRequest(#[from] LoginRequestError),

    #[error("no registration for client id {client_id}")]
    RegistrationNotFound { client_id: String },

    #[error("issuer {actual} does not match registered platform issuer {expected}")]
    IssuerMismatch { expected: String, actual: String },

    #[error("deployment {platform_deployment_id} is not registered")]
    DeploymentNotFound { platform_deployment_id: String },

    #[error("invalid state: {0}")]
    InvalidState(#[source] StateError),

    #[error("could not issue state: {0}")]
    StateSigning(#[source] StateError),

    #[error("launch {launch_id} not found or already used")]
    LaunchNotFound { launch_id: Uuid },

    #[error(transparent)]
    KeyFetch(#[from] KeySetError),

    #[error("invalid id_token: {0}")]
    InvalidIdentityToken(#[source] IdTokenError),

    #[error("id_token sub is {length} characters long")]
    SubjectTooLong { length: usize },

    #[error("id_token deployment {actual} does not match launch deployment {expected}")]
    DeploymentMismatch { expected: String, actual: String },

    #[error("launch {launch_id} was already used")]
    AlreadyUsed { launch_id: Uuid },

    #[error("failed to record launch {launch_id}: {source}")]
    LaunchUpdateFailed {
        launch_id: Uuid,
        #[source]
        source: RepositoryError,
    },

    #[error("store failed during {step}: {source}")]
    Repository {
        step: &'static str,
        #[source]
        source: RepositoryError,
    },
}

impl LaunchError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidLoginRequest(_) => ErrorKind::Validation,
            Self::RegistrationNotFound { .. }
            | Self::DeploymentNotFound { .. }
            | Self::LaunchNotFound { .. }
            | Self::AlreadyUsed { .. } => ErrorKind::LookupFailure,
            Self::IssuerMismatch { .. }
            | Self::SubjectTooLong { .. }
            | Self::DeploymentMismatch { .. } => ErrorKind::IdentityMismatch,
            Self::InvalidState(_) | Self::StateSigning(_) => ErrorKind::CryptoFailure,
            Self::InvalidIdentityToken(e) => e.kind(),
            Self::KeyFetch(KeySetError::Malformed { .. }) => ErrorKind::CryptoFailure,
            Self::KeyFetch(_) | Self::LaunchUpdateFailed { .. } | Self::Repository { .. } => {
                ErrorKind::UpstreamFailure
            }
        }
    }
}

impl From<IdTokenError> for LaunchError {
    fn from(e: IdTokenError) -> Self {
        match e {
            IdTokenError::SubjectTooLong { length } => Self::SubjectTooLong { length },
            other => Self::InvalidIdentityToken(other),
        }
    }
}
