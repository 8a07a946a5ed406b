use amplify_todo_auth::UserAttributes;

/// Shown until attributes load, and when none of them is set
pub const FALLBACK_DISPLAY_NAME: &str = "고객님";

/// Attributes consulted for the greeting, first non-empty wins
const DISPLAY_NAME_ATTRIBUTES: [&str; 4] = ["nickname", "name", "preferred_username", "email"];

pub fn resolve_display_name(attributes: &UserAttributes) -> String {
    DISPLAY_NAME_ATTRIBUTES
        .iter()
        .filter_map(|name| attributes.get(name))
        .find(|value| !value.is_empty())
        .unwrap_or(FALLBACK_DISPLAY_NAME)
        .to_string()
}

/// Badge text: the first two characters
pub fn avatar_text(display_name: &str) -> String {
    display_name.chars().take(2).collect()
}
