//! GraphQL request and response envelopes

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

#[derive(Debug, Serialize)]
pub(crate) struct GraphQLRequest<'a> {
    pub query: &'a str,
    pub variables: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLError {
    pub message: String,
    #[serde(default)]
    pub error_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQLResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQLError>>,
}

impl GraphQLResponse {
    /// The `data` object, or the joined errors
    pub fn into_data(self) -> Result<Value, Error> {
        if let Some(errors) = self.errors.filter(|e| !e.is_empty()) {
            let message = errors
                .iter()
                .map(|e| match &e.error_type {
                    Some(kind) => format!("{}: {}", kind, e.message),
                    None => e.message.clone(),
                })
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::Data(message));
        }
        self.data
            .ok_or_else(|| Error::data("response carried neither data nor errors"))
    }
}

/// Deserialize the root field `field` of a `data` object
pub(crate) fn take_field<T: DeserializeOwned>(mut data: Value, field: &str) -> Result<T, Error> {
    match data.get_mut(field).map(Value::take) {
        Some(Value::Null) | None => Err(Error::data(format!("{} returned no data", field))),
        Some(value) => Ok(serde_json::from_value(value)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_errors_take_precedence() {
        let response: GraphQLResponse = serde_json::from_value(json!({
            "data": {"createTodo": null},
            "errors": [
                {"errorType": "Unauthorized", "message": "Not Authorized to access createTodo"},
                {"message": "second"}
            ]
        }))
        .unwrap();
        match response.into_data() {
            Err(Error::Data(message)) => assert_eq!(
                message,
                "Unauthorized: Not Authorized to access createTodo; second"
            ),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_take_field() {
        let data = json!({"deleteTodo": {"id": "1"}});
        let value: Value = take_field(data, "deleteTodo").unwrap();
        assert_eq!(value, json!({"id": "1"}));

        let missing: Result<Value, _> = take_field(json!({"deleteTodo": null}), "deleteTodo");
        assert!(matches!(missing, Err(Error::Data(_))));
    }
}
