//! Backend configuration and client options

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use amplify_todo_auth::Auth;

use crate::error::Error;

/// Environment variable naming the outputs file
pub const OUTPUTS_ENV: &str = "AMPLIFY_OUTPUTS";
/// Outputs file read when [`OUTPUTS_ENV`] is unset
pub const DEFAULT_OUTPUTS_PATH: &str = "amplify_outputs.json";
/// The only authorization mode the Todo model is declared with
pub const USER_POOL_AUTHORIZATION: &str = "AMAZON_COGNITO_USER_POOLS";

/// The generated backend configuration artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmplifyOutputs {
    #[serde(default)]
    pub version: String,
    pub auth: AuthOutputs,
    pub data: DataOutputs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthOutputs {
    pub aws_region: String,
    pub user_pool_id: String,
    pub user_pool_client_id: String,
    #[serde(default)]
    pub identity_pool_id: Option<String>,
    #[serde(default)]
    pub standard_required_attributes: Vec<String>,
    #[serde(default)]
    pub username_attributes: Vec<String>,
    #[serde(default)]
    pub user_verification_types: Vec<String>,
    #[serde(default)]
    pub password_policy: Option<PasswordPolicy>,
}

impl AuthOutputs {
    /// Regional endpoint of the identity service
    pub fn endpoint(&self) -> String {
        Auth::endpoint_for_region(&self.aws_region)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    #[serde(default)]
    pub min_length: usize,
    #[serde(default)]
    pub require_lowercase: bool,
    #[serde(default)]
    pub require_uppercase: bool,
    #[serde(default)]
    pub require_numbers: bool,
    #[serde(default)]
    pub require_symbols: bool,
}

impl PasswordPolicy {
    /// The first rule `password` breaks, as a user-facing message
    pub fn check(&self, password: &str) -> Option<String> {
        if password.chars().count() < self.min_length {
            return Some(format!(
                "Password must have at least {} characters",
                self.min_length
            ));
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            return Some("Password must have lower case letters".to_string());
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            return Some("Password must have upper case letters".to_string());
        }
        if self.require_numbers && !password.chars().any(|c| c.is_ascii_digit()) {
            return Some("Password must have numbers".to_string());
        }
        if self.require_symbols && !password.chars().any(|c| c.is_ascii_punctuation()) {
            return Some("Password must have special characters".to_string());
        }
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataOutputs {
    pub url: String,
    pub aws_region: String,
    pub default_authorization_type: String,
    #[serde(default)]
    pub authorization_types: Vec<String>,
}

impl AmplifyOutputs {
    /// Parse and validate an outputs document
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> Result<Self, Error> {
        let outputs: AmplifyOutputs = serde_json::from_str(json)?;
        outputs.validate()?;
        Ok(outputs)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        log::debug!("Loading backend outputs from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_str(&json)
    }

    /// Load the file named by `AMPLIFY_OUTPUTS`, or `amplify_outputs.json`
    pub fn from_env() -> Result<Self, Error> {
        let path = std::env::var(OUTPUTS_ENV).unwrap_or_else(|_| DEFAULT_OUTPUTS_PATH.to_string());
        Self::from_file(path)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.auth.aws_region.trim().is_empty() {
            return Err(Error::config("auth.aws_region is empty"));
        }
        if self.auth.user_pool_id.trim().is_empty() {
            return Err(Error::config("auth.user_pool_id is empty"));
        }
        if self.auth.user_pool_client_id.trim().is_empty() {
            return Err(Error::config("auth.user_pool_client_id is empty"));
        }
        Url::parse(&self.data.url)?;
        if self.data.default_authorization_type != USER_POOL_AUTHORIZATION {
            return Err(Error::config(format!(
                "unsupported default authorization type {}",
                self.data.default_authorization_type
            )));
        }
        Ok(())
    }
}

/// Configuration options for the client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Whether to automatically refresh the token
    pub auto_refresh_token: bool,

    /// Whether to keep the signed-in session in memory
    pub persist_session: bool,

    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// Identity service endpoint, instead of the regional one
    pub auth_endpoint: Option<String>,

    /// Realtime endpoint, instead of the one derived from the data URL
    pub realtime_endpoint: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            auto_refresh_token: true,
            persist_session: true,
            request_timeout: Some(Duration::from_secs(30)),
            auth_endpoint: None,
            realtime_endpoint: None,
        }
    }
}

impl ClientOptions {
    /// Set whether to automatically refresh the token
    pub fn with_auto_refresh_token(mut self, value: bool) -> Self {
        self.auto_refresh_token = value;
        self
    }

    /// Set whether to persist the session
    pub fn with_persist_session(mut self, value: bool) -> Self {
        self.persist_session = value;
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    pub fn with_auth_endpoint(mut self, value: &str) -> Self {
        self.auth_endpoint = Some(value.to_string());
        self
    }

    pub fn with_realtime_endpoint(mut self, value: &str) -> Self {
        self.realtime_endpoint = Some(value.to_string());
        self
    }
}
