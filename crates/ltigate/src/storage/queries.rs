//! Database queries for the launch store.

use async_trait::async_trait;
use ltigate_core::db::unix_timestamp;
use uuid::Uuid;

use super::db::{DatabaseError, LaunchDatabase};
use super::models::{
    DeploymentRow, LaunchRow, PlatformInstanceRow, PlatformRow, RegistrationRow, parse_id,
};
use crate::models::{
    Deployment, Launch, NewDeployment, NewLaunch, NewPlatformInstance, Platform,
    PlatformInstance, Registration,
};
use crate::repo::{LaunchRepository, RepositoryError};

const REGISTRATION_SELECT: &str = "SELECT r.id, r.client_id, p.id AS platform_id, p.issuer, \
     p.key_set_url, p.auth_login_url \
     FROM registrations r JOIN platforms p ON p.id = r.platform_id";

impl LaunchDatabase {
    // =========================================================================
    // Platform and registration queries
    // =========================================================================

    /// Register a platform.
    pub async fn create_platform(
        &self,
        issuer: &str,
        key_set_url: &str,
        auth_login_url: &str,
    ) -> Result<Platform, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO platforms (id, issuer, key_set_url, auth_login_url, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(issuer)
        .bind(key_set_url)
        .bind(auth_login_url)
        .bind(unix_timestamp())
        .execute(self.pool())
        .await?;

        self.get_platform(&id).await
    }

    pub async fn get_platform(&self, id: &str) -> Result<Platform, DatabaseError> {
        sqlx::query_as::<_, PlatformRow>("SELECT * FROM platforms WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Platform {id}")))?
            .try_into()
    }

    /// Register the tool under a platform.
    pub async fn create_registration(
        &self,
        platform_id: Uuid,
        client_id: &str,
    ) -> Result<Registration, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO registrations (id, platform_id, client_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(platform_id.to_string())
        .bind(client_id)
        .bind(unix_timestamp())
        .execute(self.pool())
        .await?;

        self.get_registration(&id).await
    }

    pub async fn get_registration(&self, id: &str) -> Result<Registration, DatabaseError> {
        sqlx::query_as::<_, RegistrationRow>(&format!("{REGISTRATION_SELECT} WHERE r.id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Registration {id}")))?
            .try_into()
    }

    pub async fn find_registration_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Registration, DatabaseError> {
        sqlx::query_as::<_, RegistrationRow>(&format!(
            "{REGISTRATION_SELECT} WHERE r.client_id = ?"
        ))
        .bind(client_id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Registration for client {client_id}")))?
        .try_into()
    }

    // =========================================================================
    // Deployment queries
    // =========================================================================

    /// Create the deployment unless it exists, then return the stored row.
    pub async fn ensure_deployment(
        &self,
        registration_id: Uuid,
        platform_deployment_id: &str,
    ) -> Result<Deployment, DatabaseError> {
        sqlx::query(
            "INSERT INTO deployments (id, registration_id, platform_deployment_id, created_at) VALUES (?, ?, ?, ?)
             ON CONFLICT (registration_id, platform_deployment_id) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(registration_id.to_string())
        .bind(platform_deployment_id)
        .bind(unix_timestamp())
        .execute(self.pool())
        .await?;

        self.find_deployment(registration_id, platform_deployment_id)
            .await
    }

    pub async fn find_deployment(
        &self,
        registration_id: Uuid,
        platform_deployment_id: &str,
    ) -> Result<Deployment, DatabaseError> {
        sqlx::query_as::<_, DeploymentRow>(
            "SELECT * FROM deployments WHERE registration_id = ? AND platform_deployment_id = ?",
        )
        .bind(registration_id.to_string())
        .bind(platform_deployment_id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Deployment {platform_deployment_id}")))?
        .try_into()
    }

    async fn get_deployment(&self, id: &str) -> Result<Deployment, DatabaseError> {
        sqlx::query_as::<_, DeploymentRow>("SELECT * FROM deployments WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Deployment {id}")))?
            .try_into()
    }

    // =========================================================================
    // Platform instance queries
    // =========================================================================

    /// Create or refresh the platform instance keyed by `(platform_id, guid)`.
    /// Descriptive fields the platform stops sending are kept.
    pub async fn ensure_platform_instance(
        &self,
        instance: &NewPlatformInstance,
    ) -> Result<PlatformInstance, DatabaseError> {
        let now = unix_timestamp();
        sqlx::query(
            "INSERT INTO platform_instances
                (id, platform_id, guid, contact_email, description, name, url,
                 product_family_code, version, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (platform_id, guid) DO UPDATE SET
                contact_email = COALESCE(excluded.contact_email, contact_email),
                description = COALESCE(excluded.description, description),
                name = COALESCE(excluded.name, name),
                url = COALESCE(excluded.url, url),
                product_family_code = COALESCE(excluded.product_family_code, product_family_code),
                version = COALESCE(excluded.version, version),
                updated_at = excluded.updated_at",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(instance.platform_id.to_string())
        .bind(&instance.guid)
        .bind(&instance.contact_email)
        .bind(&instance.description)
        .bind(&instance.name)
        .bind(&instance.url)
        .bind(&instance.product_family_code)
        .bind(&instance.version)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        sqlx::query_as::<_, PlatformInstanceRow>(
            "SELECT * FROM platform_instances WHERE platform_id = ? AND guid = ?",
        )
        .bind(instance.platform_id.to_string())
        .bind(&instance.guid)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Platform instance {}", instance.guid)))?
        .try_into()
    }

    async fn get_platform_instance(&self, id: &str) -> Result<PlatformInstance, DatabaseError> {
        sqlx::query_as::<_, PlatformInstanceRow>("SELECT * FROM platform_instances WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Platform instance {id}")))?
            .try_into()
    }

    // =========================================================================
    // Launch queries
    // =========================================================================

    /// Insert a launch with a fresh id and nonce.
    pub async fn insert_launch(&self, launch: NewLaunch) -> Result<Launch, DatabaseError> {
        let id = Uuid::new_v4();
        let nonce = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO launches (id, nonce, registration_id, deployment_id, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&nonce)
        .bind(launch.registration.id.to_string())
        .bind(launch.deployment.as_ref().map(|d| d.id.to_string()))
        .bind(unix_timestamp())
        .execute(self.pool())
        .await?;

        Ok(Launch {
            id,
            nonce,
            registration: launch.registration,
            deployment: launch.deployment,
            platform_instance: None,
            used_at: None,
        })
    }

    /// Load a launch that has not been used.
    pub async fn find_active_launch(&self, id: Uuid) -> Result<Launch, DatabaseError> {
        let row = sqlx::query_as::<_, LaunchRow>(
            "SELECT * FROM launches WHERE id = ? AND used_at IS NULL",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Active launch {id}")))?;

        self.hydrate_launch(row).await
    }

    async fn hydrate_launch(&self, row: LaunchRow) -> Result<Launch, DatabaseError> {
        let registration = self.get_registration(&row.registration_id).await?;
        let deployment = match &row.deployment_id {
            Some(id) => Some(self.get_deployment(id).await?),
            None => None,
        };
        let platform_instance = match &row.platform_instance_id {
            Some(id) => Some(self.get_platform_instance(id).await?),
            None => None,
        };
        Ok(Launch {
            id: parse_id("launches.id", &row.id)?,
            nonce: row.nonce,
            registration,
            deployment,
            platform_instance,
            used_at: row.used_at,
        })
    }

    /// Record the callback outcome. Only an unused launch is updated, so of
    /// two racing completions exactly one succeeds.
    pub async fn complete_launch(&self, launch: &Launch) -> Result<(), DatabaseError> {
        let used_at = launch
            .used_at
            .ok_or_else(|| DatabaseError::Query(format!("Launch {} has no used_at", launch.id)))?;

        let result = sqlx::query(
            "UPDATE launches SET deployment_id = ?, platform_instance_id = ?, used_at = ?
             WHERE id = ? AND used_at IS NULL",
        )
        .bind(launch.deployment.as_ref().map(|d| d.id.to_string()))
        .bind(launch.platform_instance.as_ref().map(|p| p.id.to_string()))
        .bind(used_at)
        .bind(launch.id.to_string())
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::Conflict(format!(
                "Launch {} is already used or does not exist",
                launch.id
            )));
        }
        Ok(())
    }

    /// Delete unused launches created before `cutoff`. Their state tokens
    /// have expired, so they can never complete.
    pub async fn purge_abandoned_launches(&self, cutoff: i64) -> Result<u64, DatabaseError> {
        let result =
            sqlx::query("DELETE FROM launches WHERE used_at IS NULL AND created_at < ?")
                .bind(cutoff)
                .execute(self.pool())
                .await?;
        Ok(result.rows_affected())
    }
}

impl From<DatabaseError> for RepositoryError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound(what) => Self::NotFound(what),
            DatabaseError::Conflict(what) => Self::Conflict(what),
            other => Self::Backend(other.to_string()),
        }
    }
}

#[async_trait]
impl LaunchRepository for LaunchDatabase {
    async fn get_registration_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Registration, RepositoryError> {
        Ok(self.find_registration_by_client_id(client_id).await?)
    }

    async fn upsert_deployment(
        &self,
        deployment: NewDeployment,
    ) -> Result<Deployment, RepositoryError> {
        Ok(self
            .ensure_deployment(deployment.registration_id, &deployment.platform_deployment_id)
            .await?)
    }

    async fn get_deployment_by_platform_deployment_id(
        &self,
        registration_id: Uuid,
        platform_deployment_id: &str,
    ) -> Result<Deployment, RepositoryError> {
        Ok(self
            .find_deployment(registration_id, platform_deployment_id)
            .await?)
    }

    async fn upsert_platform_instance(
        &self,
        instance: NewPlatformInstance,
    ) -> Result<PlatformInstance, RepositoryError> {
        Ok(self.ensure_platform_instance(&instance).await?)
    }

    async fn create_launch(&self, launch: NewLaunch) -> Result<Launch, RepositoryError> {
        Ok(self.insert_launch(launch).await?)
    }

    async fn get_launch(&self, id: Uuid) -> Result<Launch, RepositoryError> {
        Ok(self.find_active_launch(id).await?)
    }

    async fn update_launch(&self, launch: &Launch) -> Result<Launch, RepositoryError> {
        self.complete_launch(launch).await?;
        Ok(launch.clone())
    }
}
