use tracing::{info, instrument, warn};

use super::{AuthRequestParams, LaunchError, LaunchService, LoginRequest, LoginResponse};
use crate::models::NewLaunch;
use crate::repo::RepositoryError;

impl LaunchService {
    /// Handle an OIDC login initiation from a platform.
    #[instrument(skip(self, request), fields(client_id = %request.client_id, iss = %request.iss))]
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, LaunchError> {
        request.validate()?;

        let registration = match self
            .repo
            .get_registration_by_client_id(&request.client_id)
            .await
        {
            Ok(registration) => registration,
            Err(RepositoryError::NotFound(_)) => {
                return Err(LaunchError::RegistrationNotFound {
                    client_id: request.client_id.clone(),
                });
            }
            Err(source) => {
                return Err(LaunchError::Repository {
                    step: "load registration",
                    source,
                });
            }
        };

        if request.iss != registration.platform.issuer {
            warn!(expected = %registration.platform.issuer, "Login issuer does not match registration");
            return Err(LaunchError::IssuerMismatch {
                expected: registration.platform.issuer,
                actual: request.iss.clone(),
            });
        }

        let deployment = match request.deployment_id() {
            Some(platform_deployment_id) => Some(
                self.resolve_deployment(&registration, platform_deployment_id, "resolve deployment")
                    .await?,
            ),
            None => None,
        };

        let launch = self
            .repo
            .create_launch(NewLaunch {
                registration,
                deployment,
            })
            .await
            .map_err(|source| LaunchError::Repository {
                step: "create launch",
                source,
            })?;

        let state = self
            .state
            .create(launch.id)
            .map_err(LaunchError::StateSigning)?;

        info!(launch_id = %launch.id, "Launch created");

        Ok(LoginResponse {
            launch_id: launch.id,
            auth_login_url: launch.registration.platform.auth_login_url.clone(),
            params: AuthRequestParams::new(
                request,
                &self.config.redirect_uri,
                launch.nonce,
                state,
            ),
        })
    }
}
