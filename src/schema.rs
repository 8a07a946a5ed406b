//! 認証・データスキーマ宣言
//!
//! Declares what the backend enforces: email login with a required, mutable
//! `nickname` attribute, and the owner-scoped `Todo` model. The data client
//! builds its GraphQL documents from these declarations.

/// How users log in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMethod {
    Email,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeDataType {
    String,
    Number,
    Boolean,
}

/// A user profile attribute the identity service is configured with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAttributeSpec {
    pub name: &'static str,
    pub required: bool,
    pub mutable: bool,
    pub data_type: AttributeDataType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSchema {
    pub login_with: LoginMethod,
    pub user_attributes: Vec<UserAttributeSpec>,
}

impl AuthSchema {
    /// Email login plus a required, mutable `nickname`
    pub fn declared() -> Self {
        Self {
            login_with: LoginMethod::Email,
            user_attributes: vec![UserAttributeSpec {
                name: "nickname",
                required: true,
                mutable: true,
                data_type: AttributeDataType::String,
            }],
        }
    }

    /// Attributes a sign-up must supply
    pub fn required_attributes(&self) -> impl Iterator<Item = &UserAttributeSpec> {
        self.user_attributes.iter().filter(|a| a.required)
    }

    pub fn attribute(&self, name: &str) -> Option<&UserAttributeSpec> {
        self.user_attributes.iter().find(|a| a.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
}

/// 認可ルール
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRule {
    /// Only the identity recorded in `field` may read or write the record
    Owner { field: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationMode {
    UserPool,
}

impl AuthorizationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationMode::UserPool => crate::config::USER_POOL_AUTHORIZATION,
        }
    }
}

/// Change events a model can be subscribed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelEvent {
    Create,
    Update,
    Delete,
}

impl ModelEvent {
    fn verb(&self) -> &'static str {
        match self {
            ModelEvent::Create => "Create",
            ModelEvent::Update => "Update",
            ModelEvent::Delete => "Delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSchema {
    pub name: &'static str,
    pub fields: Vec<FieldSpec>,
    pub authorization: Vec<AuthRule>,
}

impl ModelSchema {
    pub fn todo() -> Self {
        Self {
            name: "Todo",
            fields: vec![
                FieldSpec {
                    name: "content",
                    field_type: FieldType::String,
                },
                FieldSpec {
                    name: "owner",
                    field_type: FieldType::String,
                },
            ],
            authorization: vec![AuthRule::Owner { field: "owner" }],
        }
    }

    pub fn owner_field(&self) -> Option<&'static str> {
        self.authorization.iter().find_map(|rule| match rule {
            AuthRule::Owner { field } => Some(*field),
        })
    }

    /// `id`, the declared fields and the service timestamps
    pub fn selection_set(&self) -> String {
        let mut fields = vec!["id"];
        fields.extend(self.fields.iter().map(|f| f.name));
        fields.extend(["createdAt", "updatedAt"]);
        fields.join(" ")
    }

    /// Root field name of an operation, e.g. `createTodo`
    pub fn mutation_field(&self, event: ModelEvent) -> String {
        format!("{}{}", event.verb().to_lowercase(), self.name)
    }

    pub fn list_field(&self) -> String {
        format!("list{}s", self.name)
    }

    /// Root field name of a subscription, e.g. `onDeleteTodo`
    pub fn subscription_field(&self, event: ModelEvent) -> String {
        format!("on{}{}", event.verb(), self.name)
    }

    pub fn create_mutation(&self) -> String {
        self.mutation(ModelEvent::Create)
    }

    pub fn delete_mutation(&self) -> String {
        self.mutation(ModelEvent::Delete)
    }

    fn mutation(&self, event: ModelEvent) -> String {
        let verb = event.verb();
        format!(
            "mutation {verb}{name}($input: {verb}{name}Input!) {{ {field}(input: $input) {{ {selection} }} }}",
            verb = verb,
            name = self.name,
            field = self.mutation_field(event),
            selection = self.selection_set(),
        )
    }

    pub fn list_query(&self) -> String {
        format!(
            "query List{name}s($filter: Model{name}FilterInput, $limit: Int, $nextToken: String) {{ {field}(filter: $filter, limit: $limit, nextToken: $nextToken) {{ items {{ {selection} }} nextToken }} }}",
            name = self.name,
            field = self.list_field(),
            selection = self.selection_set(),
        )
    }

    /// Subscription document. Owner-scoped models take an `$owner` argument.
    pub fn subscription(&self, event: ModelEvent) -> String {
        let field = self.subscription_field(event);
        let operation = format!("On{}{}", event.verb(), self.name);
        match self.owner_field() {
            Some(owner) => format!(
                "subscription {operation}(${owner}: String) {{ {field}({owner}: ${owner}) {{ {selection} }} }}",
                operation = operation,
                owner = owner,
                field = field,
                selection = self.selection_set(),
            ),
            None => format!(
                "subscription {operation} {{ {field} {{ {selection} }} }}",
                operation = operation,
                field = field,
                selection = self.selection_set(),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSchema {
    pub models: Vec<ModelSchema>,
    pub default_authorization_mode: AuthorizationMode,
}

impl DataSchema {
    pub fn declared() -> Self {
        Self {
            models: vec![ModelSchema::todo()],
            default_authorization_mode: AuthorizationMode::UserPool,
        }
    }

    pub fn model(&self, name: &str) -> Option<&ModelSchema> {
        self.models.iter().find(|m| m.name == name)
    }
}
