//! Session management for authentication

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::types::AuthenticationResult;
use crate::AuthError;

/// Claims read from the access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    #[serde(alias = "cognito:username")]
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: i64,
}

/// Session data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub claims: TokenClaims,
}

impl Session {
    pub(crate) fn from_result(
        result: AuthenticationResult,
        previous_refresh_token: Option<String>,
    ) -> Result<Self, AuthError> {
        let claims = decode_claims(&result.access_token)?;
        Ok(Self {
            expires_at: Utc::now() + Duration::seconds(result.expires_in),
            refresh_token: result.refresh_token.or(previous_refresh_token),
            token_type: result.token_type.unwrap_or_else(|| "Bearer".to_string()),
            access_token: result.access_token,
            id_token: result.id_token,
            claims,
        })
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// The identity string the data service stores in owner fields
    pub fn owner(&self) -> String {
        format!("{}::{}", self.claims.sub, self.claims.username)
    }
}

/// Read the claims of a token issued by the identity service.
///
/// Signatures are not checked here; the data service verifies every token it
/// receives.
pub fn decode_claims(token: &str) -> Result<TokenClaims, AuthError> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))
}
