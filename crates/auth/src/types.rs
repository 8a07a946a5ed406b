//! Wire types for the identity service

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single `{Name, Value}` attribute as sent over the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeType {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: String,
}

/// User profile attributes (`email`, `nickname`, `name`, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAttributes {
    values: BTreeMap<String, String>,
}

impl UserAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn to_wire(&self) -> Vec<AttributeType> {
        self.values
            .iter()
            .map(|(name, value)| AttributeType {
                name: name.clone(),
                value: value.clone(),
            })
            .collect()
    }

    pub fn from_wire(attributes: Vec<AttributeType>) -> Self {
        Self {
            values: attributes.into_iter().map(|a| (a.name, a.value)).collect(),
        }
    }
}

/// Where a confirmation code was sent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CodeDeliveryDetails {
    pub destination: Option<String>,
    pub delivery_medium: Option<String>,
    pub attribute_name: Option<String>,
}

/// サインアップ結果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SignUpResult {
    pub user_confirmed: bool,
    pub user_sub: String,
    pub code_delivery_details: Option<CodeDeliveryDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ResendCodeResponse {
    pub code_delivery_details: Option<CodeDeliveryDetails>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct AuthenticationResult {
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub token_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct InitiateAuthResponse {
    pub challenge_name: Option<String>,
    pub authentication_result: Option<AuthenticationResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct GetUserResponse {
    #[allow(dead_code)]
    pub username: String,
    #[serde(default)]
    pub user_attributes: Vec<AttributeType>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes_wire_form() {
        let attrs = UserAttributes::new()
            .with("nickname", "밍키")
            .with("email", "minky@example.com");

        let wire = serde_json::to_value(attrs.to_wire()).unwrap();
        assert_eq!(
            wire,
            serde_json::json!([
                {"Name": "email", "Value": "minky@example.com"},
                {"Name": "nickname", "Value": "밍키"}
            ])
        );
    }

    #[test]
    fn test_get_user_response_parses_attributes() {
        let body = r#"{
            "Username": "abc-123",
            "UserAttributes": [
                {"Name": "sub", "Value": "abc-123"},
                {"Name": "nickname", "Value": "todo-fan"}
            ]
        }"#;
        let response: GetUserResponse = serde_json::from_str(body).unwrap();
        let attrs = UserAttributes::from_wire(response.user_attributes);
        assert_eq!(attrs.get("nickname"), Some("todo-fan"));
        assert_eq!(attrs.get("email"), None);
        assert_eq!(attrs.len(), 2);
    }
}
