//! Wire-level inputs and outputs of the two launch phases.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::LoginRequestError;
use crate::models::Launch;
use crate::token::LtiClaims;

/// OIDC third-party-initiated login parameters sent by the platform.
///
/// Missing fields deserialize as empty so that [`validate`](Self::validate)
/// can name the one that is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub iss: String,
    #[serde(default)]
    pub login_hint: String,
    #[serde(default)]
    pub target_link_uri: String,
    #[serde(default)]
    pub lti_message_hint: Option<String>,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub lti_deployment_id: Option<String>,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), LoginRequestError> {
        if self.iss.is_empty() {
            return Err(LoginRequestError::MissingIssuer);
        }
        if self.client_id.is_empty() {
            return Err(LoginRequestError::MissingClientId);
        }
        if self.login_hint.is_empty() {
            return Err(LoginRequestError::MissingLoginHint);
        }
        if self.target_link_uri.is_empty() {
            return Err(LoginRequestError::MissingTargetLinkUri);
        }
        Ok(())
    }

    pub fn message_hint(&self) -> Option<&str> {
        self.lti_message_hint.as_deref().filter(|h| !h.is_empty())
    }

    pub fn deployment_id(&self) -> Option<&str> {
        self.lti_deployment_id.as_deref().filter(|d| !d.is_empty())
    }
}

/// Form body the platform posts to the redirect URI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackRequest {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub id_token: String,
}

/// OIDC authentication request parameters for the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthRequestParams {
    pub scope: &'static str,
    pub response_type: &'static str,
    pub response_mode: &'static str,
    pub prompt: &'static str,
    pub client_id: String,
    pub redirect_uri: String,
    pub login_hint: String,
    pub state: String,
    pub nonce: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lti_message_hint: Option<String>,
}

impl AuthRequestParams {
    pub(crate) fn new(request: &LoginRequest, redirect_uri: &str, nonce: String, state: String) -> Self {
        Self {
            scope: "openid",
            response_type: "id_token",
            response_mode: "form_post",
            prompt: "none",
            client_id: request.client_id.clone(),
            redirect_uri: redirect_uri.to_string(),
            login_hint: request.login_hint.clone(),
            state,
            nonce,
            lti_message_hint: request.message_hint().map(str::to_string),
        }
    }

    /// Name/value pairs, sorted by name.
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![
            ("client_id", self.client_id.as_str()),
            ("login_hint", self.login_hint.as_str()),
            ("nonce", self.nonce.as_str()),
            ("prompt", self.prompt),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("response_mode", self.response_mode),
            ("response_type", self.response_type),
            ("scope", self.scope),
            ("state", self.state.as_str()),
        ];
        if let Some(hint) = &self.lti_message_hint {
            pairs.push(("lti_message_hint", hint.as_str()));
        }
        pairs.sort_unstable_by_key(|(name, _)| *name);
        pairs
    }

    /// `auth_login_url` with these parameters appended to its query.
    pub fn redirect_url(&self, auth_login_url: &str) -> Result<Url, AuthUrlError> {
        let mut url = Url::parse(auth_login_url).map_err(|e| AuthUrlError {
            url: auth_login_url.to_string(),
            reason: e.to_string(),
        })?;
        url.query_pairs_mut().extend_pairs(self.pairs());
        Ok(url)
    }
}

/// The platform's authentication URL could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("invalid platform authentication URL {url}: {reason}")]
pub struct AuthUrlError {
    pub url: String,
    pub reason: String,
}

/// Result of a successful login initiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginResponse {
    pub launch_id: Uuid,
    /// Platform authentication endpoint to send the browser to.
    pub auth_login_url: String,
    pub params: AuthRequestParams,
}

impl LoginResponse {
    pub fn redirect_url(&self) -> Result<Url, AuthUrlError> {
        self.params.redirect_url(&self.auth_login_url)
    }
}

/// Result of a successful callback.
#[derive(Debug, Clone, Serialize)]
pub struct CallbackResponse {
    pub claims: LtiClaims,
    pub launch: Launch,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request() -> LoginRequest {
        LoginRequest {
            iss: "https://lms.example".into(),
            login_hint: "u1".into(),
            target_link_uri: "https://tool.example/".into(),
            client_id: "abc".into(),
            ..LoginRequest::default()
        }
    }

    #[test]
    fn validate_names_the_first_missing_field() {
        assert_eq!(request().validate(), Ok(()));

        let cases = [
            (
                LoginRequest {
                    iss: String::new(),
                    ..request()
                },
                LoginRequestError::MissingIssuer,
            ),
            (
                LoginRequest {
                    client_id: String::new(),
                    ..request()
                },
                LoginRequestError::MissingClientId,
            ),
            (
                LoginRequest {
                    login_hint: String::new(),
                    ..request()
                },
                LoginRequestError::MissingLoginHint,
            ),
            (
                LoginRequest {
                    target_link_uri: String::new(),
                    ..request()
                },
                LoginRequestError::MissingTargetLinkUri,
            ),
        ];
        for (req, expected) in cases {
            assert_eq!(req.validate(), Err(expected));
        }
    }

    #[test]
    fn empty_optional_fields_count_as_absent() {
        let req = LoginRequest {
            lti_message_hint: Some(String::new()),
            lti_deployment_id: Some(String::new()),
            ..request()
        };
        assert!(req.message_hint().is_none());
        assert!(req.deployment_id().is_none());
    }

    #[test]
    fn redirect_url_carries_sorted_encoded_params() {
        let params = AuthRequestParams::new(
            &LoginRequest {
                lti_message_hint: Some("hint".into()),
                ..request()
            },
            "/lti/callback",
            "n1".into(),
            "s1".into(),
        );
        let url = params.redirect_url("https://lms.example/auth").unwrap();
        assert_eq!(
            url.as_str(),
            "https://lms.example/auth?client_id=abc&login_hint=u1&lti_message_hint=hint\
             &nonce=n1&prompt=none&redirect_uri=%2Flti%2Fcallback&response_mode=form_post\
             &response_type=id_token&scope=openid&state=s1"
        );
    }

    #[test]
    fn redirect_url_keeps_existing_query() {
        let params = AuthRequestParams::new(&request(), "https://tool.example/cb", "n".into(), "s".into());
        let url = params.redirect_url("https://lms.example/auth?tenant=7").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("tenant".to_string(), "7".to_string()));
        assert!(pairs.iter().all(|(name, _)| name != "lti_message_hint"));
        assert!(pairs.contains(&("redirect_uri".to_string(), "https://tool.example/cb".to_string())));
    }

    #[test]
    fn unparsable_auth_url_is_reported() {
        let params = AuthRequestParams::new(&request(), "/cb", "n".into(), "s".into());
        assert!(params.redirect_url("not a url").is_err());
    }
}
