use ltigate_core::db::unix_timestamp;
use tracing::{Span, field, info, instrument, warn};

use super::{CallbackRequest, CallbackResponse, LaunchError, LaunchService};
use crate::models::{Deployment, Launch, NewPlatformInstance, PlatformInstance};
use crate::repo::RepositoryError;
use crate::token::{ExpectedClaims, LtiClaims};

impl LaunchService {
    /// Handle the platform's authentication response and complete the launch.
    #[instrument(skip(self, request), fields(launch_id = field::Empty))]
    pub async fn callback(
        &self,
        request: &CallbackRequest,
    ) -> Result<CallbackResponse, LaunchError> {
        let launch_id = self
            .state
            .verify(&request.state)
            .map_err(LaunchError::InvalidState)?;
        Span::current().record("launch_id", field::display(launch_id));

        let launch = match self.repo.get_launch(launch_id).await {
            Ok(launch) if !launch.is_used() => launch,
            Ok(_) | Err(RepositoryError::NotFound(_)) => {
                return Err(LaunchError::LaunchNotFound { launch_id });
            }
            Err(source) => {
                return Err(LaunchError::Repository {
                    step: "load launch",
                    source,
                });
            }
        };

        let platform = &launch.registration.platform;
        let key_set = self.key_sets.get(&platform.key_set_url).await?;

        let claims = self.verifier.verify(
            &key_set,
            &ExpectedClaims {
                issuer: &platform.issuer,
                audience: &launch.registration.client_id,
                nonce: &launch.nonce,
            },
            &request.id_token,
        )?;

        let deployment = self.reconcile_deployment(&launch, &claims).await?;
        let platform_instance = self.record_platform_instance(&launch, &claims).await?;

        let completed = launch
            .complete(deployment, platform_instance, unix_timestamp())
            .ok_or(LaunchError::AlreadyUsed { launch_id })?;
        let launch = self
            .repo
            .update_launch(&completed)
            .await
            .map_err(|source| LaunchError::LaunchUpdateFailed { launch_id, source })?;

        info!(
            deployment = %claims.deployment_id,
            message_type = %claims.message_type,
            "Launch completed"
        );

        Ok(CallbackResponse { claims, launch })
    }

    /// The deployment bound at login must match the token; otherwise the
    /// token's deployment is resolved now.
    async fn reconcile_deployment(
        &self,
        launch: &Launch,
        claims: &LtiClaims,
    ) -> Result<Deployment, LaunchError> {
        match &launch.deployment {
            Some(bound) if bound.platform_deployment_id == claims.deployment_id => {
                Ok(bound.clone())
            }
            Some(bound) => {
                warn!(
                    expected = %bound.platform_deployment_id,
                    actual = %claims.deployment_id,
                    "id_token deployment differs from launch"
                );
                Err(LaunchError::DeploymentMismatch {
                    expected: bound.platform_deployment_id.clone(),
                    actual: claims.deployment_id.clone(),
                })
            }
            None => {
                self.resolve_deployment(
                    &launch.registration,
                    &claims.deployment_id,
                    "reconcile deployment",
                )
                .await
            }
        }
    }

    /// Upsert the audit-only platform instance named by the tool platform claim.
    async fn record_platform_instance(
        &self,
        launch: &Launch,
        claims: &LtiClaims,
    ) -> Result<Option<PlatformInstance>, LaunchError> {
        let (Some(guid), Some(tool_platform)) =
            (claims.platform_instance_guid(), claims.tool_platform.as_ref())
        else {
            return Ok(None);
        };

        let instance = self
            .repo
            .upsert_platform_instance(NewPlatformInstance {
                platform_id: launch.registration.platform.id,
                guid: guid.to_string(),
                contact_email: tool_platform.contact_email.clone(),
                description: tool_platform.description.clone(),
                name: tool_platform.name.clone(),
                url: tool_platform.url.clone(),
                product_family_code: tool_platform.product_family_code.clone(),
                version: tool_platform.version.clone(),
            })
            .await
            .map_err(|source| LaunchError::Repository {
                step: "record platform instance",
                source,
            })?;
        Ok(Some(instance))
    }
}
