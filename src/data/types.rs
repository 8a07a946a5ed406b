use serde::{Deserialize, Serialize};

/// Todo レコード
///
/// `id` and `owner` are assigned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Todo {
    /// Content, or an empty string when unset
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

/// The only fields a client supplies on create
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateTodoInput {
    pub content: String,
}

impl CreateTodoInput {
    pub fn new(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct DeleteTodoInput<'a> {
    pub id: &'a str,
}

/// One page of a list query
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoPage {
    #[serde(default)]
    pub items: Vec<Option<Todo>>,
    pub next_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_todo_from_service_shape() {
        let todo: Todo = serde_json::from_value(json!({
            "id": "9f1c",
            "content": "우유 사기",
            "owner": "s-1::u-1",
            "createdAt": "2025-08-01T00:00:00.000Z",
            "updatedAt": "2025-08-01T00:00:00.000Z",
            "__typename": "Todo"
        }))
        .unwrap();
        assert_eq!(todo.text(), "우유 사기");
        assert_eq!(todo.owner.as_deref(), Some("s-1::u-1"));
    }

    #[test]
    fn test_null_content() {
        let todo: Todo = serde_json::from_value(json!({"id": "1", "content": null})).unwrap();
        assert_eq!(todo.text(), "");
    }

    #[test]
    fn test_create_input_carries_content_only() {
        let input = serde_json::to_value(CreateTodoInput::new("walk")).unwrap();
        assert_eq!(input, json!({"content": "walk"}));
    }
}
