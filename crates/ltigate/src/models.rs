//! Domain records exchanged between the launch engine and its repository.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A learning platform, identified by its issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub id: Uuid,
    /// `iss` of the identity tokens the platform signs, e.g. `https://canvas.instructure.com`.
    pub issuer: String,
    /// URL of the platform's published JWKS.
    pub key_set_url: String,
    /// OIDC authorization endpoint the login redirect goes to.
    pub auth_login_url: String,
}

/// The tool's installation under one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: Uuid,
    pub platform: Platform,
    pub client_id: String,
}

/// A deployment of a registration, named by the platform's `deployment_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: Uuid,
    pub registration_id: Uuid,
    pub platform_deployment_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Deployment to resolve or create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDeployment {
    pub registration_id: Uuid,
    pub platform_deployment_id: String,
}

/// The concrete platform tenant a launch came from. Audit only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInstance {
    pub id: Uuid,
    pub platform_id: Uuid,
    pub guid: String,
    pub contact_email: Option<String>,
    pub description: Option<String>,
    pub name: Option<String>,
    pub url: Option<String>,
    pub product_family_code: Option<String>,
    pub version: Option<String>,
}

/// Platform instance to resolve or create, keyed by `(platform_id, guid)`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewPlatformInstance {
    pub platform_id: Uuid,
    pub guid: String,
    pub contact_email: Option<String>,
    pub description: Option<String>,
    pub name: Option<String>,
    pub url: Option<String>,
    pub product_family_code: Option<String>,
    pub version: Option<String>,
}

/// Launch to create. The repository assigns the id and nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLaunch {
    pub registration: Registration,
    pub deployment: Option<Deployment>,
}

/// Lifecycle position of a [`Launch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchState {
    /// Nonce issued, waiting for the callback.
    Created,
    /// Callback completed. Terminal.
    Used,
}

/// One handshake attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Launch {
    pub id: Uuid,
    pub nonce: String,
    pub registration: Registration,
    pub deployment: Option<Deployment>,
    pub platform_instance: Option<PlatformInstance>,
    /// Unix timestamp of the successful callback.
    pub used_at: Option<i64>,
}

impl Launch {
    pub const fn state(&self) -> LaunchState {
        if self.used_at.is_some() {
            LaunchState::Used
        } else {
            LaunchState::Created
        }
    }

    pub const fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    /// Transition `Created -> Used`, binding the reconciled deployment and
    /// platform instance. Returns `None` if the launch is already used.
    #[must_use]
    pub fn complete(
        &self,
        deployment: Deployment,
        platform_instance: Option<PlatformInstance>,
        used_at: i64,
    ) -> Option<Self> {
        if self.is_used() {
            return None;
        }
        Some(Self {
            deployment: Some(deployment),
            platform_instance,
            used_at: Some(used_at),
            ..self.clone()
        })
    }
}
