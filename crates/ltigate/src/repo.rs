//! Storage capability consumed by the launch engine.
//!
//! The engine only talks to this trait; [`crate::storage::LaunchDatabase`]
//! is the bundled `SQLite` implementation.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    Deployment, Launch, NewDeployment, NewLaunch, NewPlatformInstance, PlatformInstance,
    Registration,
};

/// Errors reported by a [`LaunchRepository`].
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A conditional write did not apply, e.g. the launch was already used.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Lookup, create and update operations over platforms, registrations,
/// deployments, platform instances and launches.
///
/// Implementations must make [`get_launch`](Self::get_launch) exclude used
/// launches, and [`update_launch`](Self::update_launch) must refuse to touch
/// a launch that is already used, atomically with the write.
#[async_trait]
pub trait LaunchRepository: Send + Sync {
    async fn get_registration_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Registration, RepositoryError>;

    /// Return the deployment with this platform deployment id under the
    /// registration, creating it if absent. Never creates duplicates.
    async fn upsert_deployment(
        &self,
        deployment: NewDeployment,
    ) -> Result<Deployment, RepositoryError>;

    async fn get_deployment_by_platform_deployment_id(
        &self,
        registration_id: Uuid,
        platform_deployment_id: &str,
    ) -> Result<Deployment, RepositoryError>;

    /// Return the platform instance with this guid under the platform,
    /// creating it if absent.
    async fn upsert_platform_instance(
        &self,
        instance: NewPlatformInstance,
    ) -> Result<PlatformInstance, RepositoryError>;

    /// Persist a new launch with a freshly generated id and nonce.
    async fn create_launch(&self, launch: NewLaunch) -> Result<Launch, RepositoryError>;

    /// Load a launch that has not been used yet.
    async fn get_launch(&self, id: Uuid) -> Result<Launch, RepositoryError>;

    /// Write the deployment, platform instance and `used_at` of a launch.
    async fn update_launch(&self, launch: &Launch) -> Result<Launch, RepositoryError>;
}
