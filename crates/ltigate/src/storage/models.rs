//! Row types for the launch store and their mapping into domain records.

use uuid::Uuid;

use super::db::DatabaseError;
use crate::models::{Deployment, Platform, PlatformInstance, Registration};

pub(super) fn parse_id(column: &str, value: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value).map_err(|e| DatabaseError::Corrupt(format!("{column} {value:?}: {e}")))
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlatformRow {
    pub id: String,
    pub issuer: String,
    pub key_set_url: String,
    pub auth_login_url: String,
}

impl TryFrom<PlatformRow> for Platform {
    type Error = DatabaseError;

    fn try_from(row: PlatformRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_id("platforms.id", &row.id)?,
            issuer: row.issuer,
            key_set_url: row.key_set_url,
            auth_login_url: row.auth_login_url,
        })
    }
}

/// A registration joined with its platform.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RegistrationRow {
    pub id: String,
    pub client_id: String,
    pub platform_id: String,
    pub issuer: String,
    pub key_set_url: String,
    pub auth_login_url: String,
}

impl TryFrom<RegistrationRow> for Registration {
    type Error = DatabaseError;

    fn try_from(row: RegistrationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_id("registrations.id", &row.id)?,
            platform: Platform {
                id: parse_id("registrations.platform_id", &row.platform_id)?,
                issuer: row.issuer,
                key_set_url: row.key_set_url,
                auth_login_url: row.auth_login_url,
            },
            client_id: row.client_id,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DeploymentRow {
    pub id: String,
    pub registration_id: String,
    pub platform_deployment_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
}

impl TryFrom<DeploymentRow> for Deployment {
    type Error = DatabaseError;

    fn try_from(row: DeploymentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_id("deployments.id", &row.id)?,
            registration_id: parse_id("deployments.registration_id", &row.registration_id)?,
            platform_deployment_id: row.platform_deployment_id,
            name: row.name,
            description: row.description,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlatformInstanceRow {
    pub id: String,
    pub platform_id: String,
    pub guid: String,
    pub contact_email: Option<String>,
    pub description: Option<String>,
    pub name: Option<String>,
    pub url: Option<String>,
    pub product_family_code: Option<String>,
    pub version: Option<String>,
}

impl TryFrom<PlatformInstanceRow> for PlatformInstance {
    type Error = DatabaseError;

    fn try_from(row: PlatformInstanceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_id("platform_instances.id", &row.id)?,
            platform_id: parse_id("platform_instances.platform_id", &row.platform_id)?,
            guid: row.guid,
            contact_email: row.contact_email,
            description: row.description,
            name: row.name,
            url: row.url,
            product_family_code: row.product_family_code,
            version: row.version,
        })
    }
}

/// Launch row. References are resolved by the query layer.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LaunchRow {
    pub id: String,
    pub nonce: String,
    pub registration_id: String,
    pub deployment_id: Option<String>,
    pub platform_instance_id: Option<String>,
    pub used_at: Option<i64>,
}
