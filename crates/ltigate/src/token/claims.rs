//! LTI 1.3 claims carried by a resource link launch `id_token`.

use std::collections::BTreeMap;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// The only LTI version this engine accepts.
pub const LTI_VERSION: &str = "1.3.0";

/// The only message type this engine accepts.
pub const RESOURCE_LINK_REQUEST: &str = "LtiResourceLinkRequest";

/// Longest `sub` accepted, in characters.
pub const MAX_SUBJECT_LEN: usize = 255;

/// Claim names under the LTI namespace.
pub mod claim {
    pub const MESSAGE_TYPE: &str = "https://purl.imsglobal.org/spec/lti/claim/message_type";
    pub const VERSION: &str = "https://purl.imsglobal.org/spec/lti/claim/version";
    pub const DEPLOYMENT_ID: &str = "https://purl.imsglobal.org/spec/lti/claim/deployment_id";
    pub const TARGET_LINK_URI: &str = "https://purl.imsglobal.org/spec/lti/claim/target_link_uri";
    pub const RESOURCE_LINK: &str = "https://purl.imsglobal.org/spec/lti/claim/resource_link";
    pub const ROLES: &str = "https://purl.imsglobal.org/spec/lti/claim/roles";
    pub const ROLE_SCOPE_MENTOR: &str =
        "https://purl.imsglobal.org/spec/lti/claim/role_scope_mentor";
    pub const CONTEXT: &str = "https://purl.imsglobal.org/spec/lti/claim/context";
    pub const TOOL_PLATFORM: &str = "https://purl.imsglobal.org/spec/lti/claim/tool_platform";
    pub const LAUNCH_PRESENTATION: &str =
        "https://purl.imsglobal.org/spec/lti/claim/launch_presentation";
    pub const LIS: &str = "https://purl.imsglobal.org/spec/lti/claim/lis";
    pub const CUSTOM: &str = "https://purl.imsglobal.org/spec/lti/claim/custom";
}

/// Decoded claims of a verified launch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LtiClaims {
    pub iss: String,
    #[serde(deserialize_with = "one_or_many")]
    pub aud: Vec<String>,
    #[serde(default)]
    pub azp: Option<String>,
    /// Absent for anonymous launches.
    #[serde(default)]
    pub sub: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    pub nonce: String,

    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,

    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/message_type")]
    pub message_type: String,
    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/version")]
    pub version: String,
    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/deployment_id")]
    pub deployment_id: String,
    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/target_link_uri")]
    pub target_link_uri: String,
    #[serde(
        rename = "https://purl.imsglobal.org/spec/lti/claim/resource_link",
        default,
        deserialize_with = "object_section"
    )]
    pub resource_link: Option<ResourceLinkClaim>,
    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/roles", default)]
    pub roles: Vec<String>,
    #[serde(
        rename = "https://purl.imsglobal.org/spec/lti/claim/role_scope_mentor",
        default
    )]
    pub role_scope_mentor: Vec<String>,
    #[serde(
        rename = "https://purl.imsglobal.org/spec/lti/claim/context",
        default,
        deserialize_with = "object_section"
    )]
    pub context: Option<ContextClaim>,
    #[serde(
        rename = "https://purl.imsglobal.org/spec/lti/claim/tool_platform",
        default,
        deserialize_with = "object_section"
    )]
    pub tool_platform: Option<ToolPlatformClaim>,
    #[serde(
        rename = "https://purl.imsglobal.org/spec/lti/claim/launch_presentation",
        default,
        deserialize_with = "object_section"
    )]
    pub launch_presentation: Option<LaunchPresentationClaim>,
    #[serde(
        rename = "https://purl.imsglobal.org/spec/lti/claim/lis",
        default,
        deserialize_with = "object_section"
    )]
    pub lis: Option<LisClaim>,
    #[serde(
        rename = "https://purl.imsglobal.org/spec/lti/claim/custom",
        default,
        deserialize_with = "string_map"
    )]
    pub custom: BTreeMap<String, String>,
}

impl LtiClaims {
    /// GUID of the platform tenant, if the platform sent a non-empty one.
    pub fn platform_instance_guid(&self) -> Option<&str> {
        self.tool_platform
            .as_ref()
            .and_then(|p| p.guid.as_deref())
            .filter(|guid| !guid.is_empty())
    }

    /// Whether the launch carries `role`, given either as a full role URI or
    /// as the short name after the final `#`.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles
            .iter()
            .any(|r| r == role || r.rsplit_once('#').is_some_and(|(_, short)| short == role))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLinkClaim {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextClaim {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "type", default)]
    pub context_type: Vec<String>,
}

/// Platform tenant details. Feeds the platform instance record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToolPlatformClaim {
    #[serde(default)]
    pub guid: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub product_family_code: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchPresentationClaim {
    #[serde(default)]
    pub document_target: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub return_url: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LisClaim {
    #[serde(default)]
    pub person_sourcedid: Option<String>,
    #[serde(default)]
    pub course_offering_sourcedid: Option<String>,
    #[serde(default)]
    pub course_section_sourcedid: Option<String>,
}

/// `aud` may be a single string or an array of strings.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(aud) => vec![aud],
        OneOrMany::Many(auds) => auds,
    })
}

/// Claim sections must be JSON objects. Derived struct visitors also accept
/// arrays and fill fields by position, which would let `["x"]` pass as a
/// resource link.
fn object_section<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Option::<serde_json::Map<String, Value>>::deserialize(deserializer)?
        .map(|section| serde_json::from_value(Value::Object(section)).map_err(D::Error::custom))
        .transpose()
}

/// Custom parameters are strings, but some platforms send bare numbers or
/// booleans. Those are kept in their JSON text form.
fn string_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect())
}
