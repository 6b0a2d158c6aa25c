//! Launch orchestration.
//!
//! [`LaunchService`] drives the two legs of the OIDC third-party-initiated
//! login: [`login`](LaunchService::login) creates a launch and the
//! authentication request, [`callback`](LaunchService::callback) verifies
//! the platform's identity token and marks the launch used.
//!
//! A launch moves `Created -> Used` exactly once. Nothing is written during
//! the callback until the final conditional update, so a failed callback
//! leaves the launch usable for a retry.

mod callback;
mod error;
mod login;
mod params;


use std::sync::Arc;

use ltigate_core::{DeploymentPolicy, config::LaunchConfig};
use tracing::debug;

pub use error::{ErrorKind, LaunchError, LoginRequestError};
pub use params::{
    AuthRequestParams, AuthUrlError, CallbackRequest, CallbackResponse, LoginRequest,
    LoginResponse,
};

use crate::keyset::KeySetCache;
use crate::models::{Deployment, NewDeployment, Registration};
use crate::repo::{LaunchRepository, RepositoryError};
use crate::token::{IdTokenVerifier, StateCodec};

/// The launch protocol engine. Shared across requests.
pub struct LaunchService {
    config: LaunchConfig,
    repo: Arc<dyn LaunchRepository>,
    key_sets: Arc<KeySetCache>,
    state: StateCodec,
    verifier: IdTokenVerifier,
}

impl LaunchService {
    pub fn new(
        config: LaunchConfig,
        repo: Arc<dyn LaunchRepository>,
        key_sets: Arc<KeySetCache>,
    ) -> Self {
        let state = StateCodec::new(config.issuer.clone(), config.state_secret.as_bytes());
        let verifier = IdTokenVerifier::new(config.id_token_leeway_secs);
        Self {
            config,
            repo,
            key_sets,
            state,
            verifier,
        }
    }

    pub const fn state_codec(&self) -> &StateCodec {
        &self.state
    }

    pub const fn key_sets(&self) -> &Arc<KeySetCache> {
        &self.key_sets
    }

    /// Find the deployment for `platform_deployment_id`, creating it when the
    /// policy allows.
    async fn resolve_deployment(
        &self,
        registration: &Registration,
        platform_deployment_id: &str,
        step: &'static str,
    ) -> Result<Deployment, LaunchError> {
        let result = match self.config.deployment_policy {
            DeploymentPolicy::Upsert => {
                self.repo
                    .upsert_deployment(NewDeployment {
                        registration_id: registration.id,
                        platform_deployment_id: platform_deployment_id.to_string(),
                    })
                    .await
            }
            DeploymentPolicy::RequireExisting => {
                self.repo
                    .get_deployment_by_platform_deployment_id(
                        registration.id,
                        platform_deployment_id,
                    )
                    .await
            }
        };

        match result {
            Ok(deployment) => {
                debug!(deployment_id = %deployment.id, platform_deployment_id, "Deployment resolved");
                Ok(deployment)
            }
            Err(RepositoryError::NotFound(_)) => Err(LaunchError::DeploymentNotFound {
                platform_deployment_id: platform_deployment_id.to_string(),
            }),
            Err(source) => Err(LaunchError::Repository { step, source }),
        }
    }
}
