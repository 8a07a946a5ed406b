//! User-pool authentication client for amplify-todo
//!
//! This crate talks to the managed identity service: email sign-up with
//! custom attributes, confirmation, password sign-in, token refresh,
//! attribute reads and updates, and global sign-out.

mod session;
mod types;

use log::{debug, info, warn};
use reqwest::Client;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use serde_json::json;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

pub use session::{decode_claims, Session, TokenClaims};
pub use types::*;

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const AMZ_JSON: &str = "application/x-amz-json-1.1";

/// エラー型
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Service error ({kind}): {message}")]
    Service { kind: String, message: String },

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Sign-in requires the {0} challenge, which this client does not answer")]
    ChallengeRequired(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Missing session")]
    MissingSession,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

impl AuthError {
    /// Build an error from a service error body such as
    /// `{"__type": "...#UsernameExistsException", "message": "..."}`.
    pub(crate) fn from_service_body(body: &str) -> Self {
        let parsed: serde_json::Value = serde_json::from_str(body).unwrap_or_default();
        let kind = parsed
            .get("__type")
            .and_then(|v| v.as_str())
            .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
            .unwrap_or_else(|| "UnknownError".to_string());
        let message = parsed
            .get("message")
            .or_else(|| parsed.get("Message"))
            .and_then(|v| v.as_str())
            .map(String::from)
            .unwrap_or_else(|| body.to_string());

        if kind == "NotAuthorizedException" {
            AuthError::NotAuthorized(message)
        } else {
            AuthError::Service { kind, message }
        }
    }

    /// The service exception name, when the error came from the service
    pub fn kind(&self) -> Option<&str> {
        match self {
            AuthError::Service { kind, .. } => Some(kind.as_str()),
            AuthError::NotAuthorized(_) => Some("NotAuthorizedException"),
            _ => None,
        }
    }
}

/// クライアントオプション
#[derive(Debug, Clone)]
pub struct AuthOptions {
    pub auto_refresh_token: bool,
    pub persist_session: bool,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            auto_refresh_token: true,
            persist_session: true,
        }
    }
}

/// Auth クライアント
pub struct Auth {
    endpoint: String,
    client_id: String,
    http_client: Client,
    options: AuthOptions,
    current_session: Arc<RwLock<Option<Session>>>,
}

impl Auth {
    /// Create a client for the user-pool app client `client_id`
    pub fn new(endpoint: &str, client_id: &str, http_client: Client, options: AuthOptions) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            client_id: client_id.to_string(),
            http_client,
            options,
            current_session: Arc::new(RwLock::new(None)),
        }
    }

    /// The regional identity service endpoint
    pub fn endpoint_for_region(region: &str) -> String {
        format!("https://cognito-idp.{}.amazonaws.com/", region)
    }

    pub fn options(&self) -> &AuthOptions {
        &self.options
    }

    async fn call<B, T>(&self, operation: &str, body: &B) -> Result<T, AuthError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        debug!("Calling {}", operation);
        let response = self
            .http_client
            .post(&self.endpoint)
            .header("Content-Type", AMZ_JSON)
            .header("X-Amz-Target", format!("{}.{}", TARGET_PREFIX, operation))
            .body(serde_json::to_vec(body)?)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            let error = AuthError::from_service_body(&error_text);
            warn!("{} failed: {}", operation, error);
            return Err(error);
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// ユーザー登録
    ///
    /// Login is by email, so the email is the username.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        attributes: &UserAttributes,
    ) -> Result<SignUpResult, AuthError> {
        let payload = json!({
            "ClientId": self.client_id,
            "Username": email,
            "Password": password,
            "UserAttributes": attributes.to_wire(),
        });

        let result: SignUpResult = self.call("SignUp", &payload).await?;
        info!(
            "Signed up {} (confirmed: {})",
            result.user_sub, result.user_confirmed
        );
        Ok(result)
    }

    /// Confirm a sign-up with the code delivered to the user
    pub async fn confirm_sign_up(&self, email: &str, code: &str) -> Result<(), AuthError> {
        let payload = json!({
            "ClientId": self.client_id,
            "Username": email,
            "ConfirmationCode": code,
        });

        let _: IgnoredAny = self.call("ConfirmSignUp", &payload).await?;
        Ok(())
    }

    /// Send the confirmation code again
    pub async fn resend_sign_up_code(&self, email: &str) -> Result<CodeDeliveryDetails, AuthError> {
        let payload = json!({
            "ClientId": self.client_id,
            "Username": email,
        });

        let response: ResendCodeResponse = self.call("ResendConfirmationCode", &payload).await?;
        Ok(response.code_delivery_details.unwrap_or_default())
    }

    /// メール・パスワードでログイン
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let payload = json!({
            "AuthFlow": "USER_PASSWORD_AUTH",
            "ClientId": self.client_id,
            "AuthParameters": {
                "USERNAME": email,
                "PASSWORD": password,
            },
        });

        let response: InitiateAuthResponse = self.call("InitiateAuth", &payload).await?;
        let session = Self::session_from(response, None)?;
        info!("Signed in as {}", session.claims.username);

        if self.options.persist_session {
            self.set_session(session.clone());
        }

        Ok(session)
    }

    /// セッションをリフレッシュ
    pub async fn refresh_session(&self) -> Result<Session, AuthError> {
        let session = self.get_session().ok_or(AuthError::MissingSession)?;
        let refresh_token = session.refresh_token.clone().ok_or(AuthError::MissingSession)?;

        let payload = json!({
            "AuthFlow": "REFRESH_TOKEN_AUTH",
            "ClientId": self.client_id,
            "AuthParameters": {
                "REFRESH_TOKEN": refresh_token,
            },
        });

        let response: InitiateAuthResponse = self.call("InitiateAuth", &payload).await?;
        // The refresh flow does not return a new refresh token.
        let new_session = Self::session_from(response, Some(refresh_token))?;
        debug!("Session refreshed, expires at {}", new_session.expires_at);

        if self.options.persist_session {
            self.set_session(new_session.clone());
        }

        Ok(new_session)
    }

    fn session_from(
        response: InitiateAuthResponse,
        refresh_token: Option<String>,
    ) -> Result<Session, AuthError> {
        if let Some(challenge) = response.challenge_name {
            return Err(AuthError::ChallengeRequired(challenge));
        }
        let result = response
            .authentication_result
            .ok_or_else(|| AuthError::InvalidToken("no authentication result".to_string()))?;
        Session::from_result(result, refresh_token)
    }

    /// 現在のセッションを取得
    pub fn get_session(&self) -> Option<Session> {
        self.current_session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_session(&self, session: Session) {
        *self
            .current_session
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    fn clear_session(&self) {
        *self
            .current_session
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// The current session, refreshed first when it has expired
    pub async fn valid_session(&self) -> Result<Session, AuthError> {
        let session = self.get_session().ok_or(AuthError::MissingSession)?;
        if session.is_expired() && self.options.auto_refresh_token {
            return self.refresh_session().await;
        }
        Ok(session)
    }

    /// 現在のユーザーの属性を取得
    pub async fn fetch_user_attributes(&self) -> Result<UserAttributes, AuthError> {
        let session = self.valid_session().await?;
        let payload = json!({ "AccessToken": session.access_token });

        let response: GetUserResponse = self.call("GetUser", &payload).await?;
        Ok(UserAttributes::from_wire(response.user_attributes))
    }

    /// Update mutable attributes such as `nickname`
    pub async fn update_user_attributes(&self, attributes: &UserAttributes) -> Result<(), AuthError> {
        let session = self.valid_session().await?;
        let payload = json!({
            "AccessToken": session.access_token,
            "UserAttributes": attributes.to_wire(),
        });

        let _: IgnoredAny = self.call("UpdateUserAttributes", &payload).await?;
        Ok(())
    }

    /// サインアウト
    ///
    /// The local session is dropped even if the service call fails.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let session = self.get_session().ok_or(AuthError::MissingSession)?;
        let payload = json!({ "AccessToken": session.access_token });

        let result: Result<IgnoredAny, AuthError> = self.call("GlobalSignOut", &payload).await;
        self.clear_session();
        info!("Signed out {}", session.claims.username);
        result.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_strips_namespace() {
        let err = AuthError::from_service_body(
            r#"{"__type":"com.amazonaws#UsernameExistsException","message":"User already exists"}"#,
        );
        match err {
            AuthError::Service { kind, message } => {
                assert_eq!(kind, "UsernameExistsException");
                assert_eq!(message, "User already exists");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_not_authorized_maps_to_variant() {
        let err = AuthError::from_service_body(
            r#"{"__type":"NotAuthorizedException","message":"Incorrect username or password."}"#,
        );
        assert!(matches!(err, AuthError::NotAuthorized(_)));
        assert_eq!(err.kind(), Some("NotAuthorizedException"));
    }

    #[test]
    fn test_non_json_error_body_is_kept() {
        let err = AuthError::from_service_body("Bad Gateway");
        match err {
            AuthError::Service { kind, message } => {
                assert_eq!(kind, "UnknownError");
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_regional_endpoint() {
        assert_eq!(
            Auth::endpoint_for_region("ap-northeast-2"),
            "https://cognito-idp.ap-northeast-2.amazonaws.com/"
        );
    }

    #[test]
    fn test_sign_out_without_session() {
        tokio_test::block_on(async {
            let auth = Auth::new(
                "http://127.0.0.1:9",
                "client",
                Client::new(),
                AuthOptions::default(),
            );
            let result = auth.sign_out().await;
            assert!(matches!(result, Err(AuthError::MissingSession)));
        });
    }
}
