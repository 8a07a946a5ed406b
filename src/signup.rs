//! 会員登録フォーム
//!
//! Extends the default email sign-up with a name (stored as `nickname`) and a
//! terms checkbox. Submission is blocked until the terms are accepted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use amplify_todo_auth::UserAttributes;

use crate::config::PasswordPolicy;
use crate::schema::AuthSchema;

pub const TERMS_LABEL: &str = "이용약관에 동의합니다.";
pub const TERMS_ACKNOWLEDGEMENT: &str = "이용약관에 동의해야 회원가입이 가능합니다.";
pub const NAME_REQUIRED: &str = "Name을 입력해주세요.";

/// Why a sign-up submission was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignUpValidation {
    #[error("{field}: {message}")]
    Field { field: &'static str, message: String },

    /// Blocking message shown instead of submitting
    #[error("{0}")]
    Acknowledgement(String),
}

impl SignUpValidation {
    fn field(field: &'static str, message: &str) -> Self {
        SignUpValidation::Field {
            field,
            message: message.to_string(),
        }
    }

    /// The text shown to the user
    pub fn message(&self) -> &str {
        match self {
            SignUpValidation::Field { message, .. } => message,
            SignUpValidation::Acknowledgement(message) => message,
        }
    }
}

/// Values typed into the form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignUpFields {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    /// Submitted as the `nickname` attribute
    pub name: String,
}

/// Terms checkbox state.
///
/// Written by the checkbox, read by the submission guard. The guard runs
/// outside the form's own update cycle, so it reads the cell rather than a
/// copy taken at render time.
#[derive(Debug, Clone, Default)]
pub struct TermsAgreement(Arc<AtomicBool>);

impl TermsAgreement {
    pub fn set(&self, accepted: bool) {
        self.0.store(accepted, Ordering::Release);
    }

    pub fn is_accepted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// カスタム会員登録フォーム
#[derive(Debug)]
pub struct SignUpForm {
    schema: AuthSchema,
    password_policy: Option<PasswordPolicy>,
    terms: TermsAgreement,
}

impl SignUpForm {
    pub fn new(schema: AuthSchema, password_policy: Option<PasswordPolicy>) -> Self {
        Self {
            schema,
            password_policy,
            terms: TermsAgreement::default(),
        }
    }

    pub fn set_terms_accepted(&self, accepted: bool) {
        self.terms.set(accepted);
    }

    pub fn terms_accepted(&self) -> bool {
        self.terms.is_accepted()
    }

    /// Submission guard
    pub fn validate_custom_sign_up(&self) -> Result<(), SignUpValidation> {
        if self.terms.is_accepted() {
            Ok(())
        } else {
            Err(SignUpValidation::Acknowledgement(
                TERMS_ACKNOWLEDGEMENT.to_string(),
            ))
        }
    }

    /// Form value backing a profile attribute
    fn attribute_value<'a>(fields: &'a SignUpFields, attribute: &str) -> Option<&'a str> {
        match attribute {
            "nickname" => Some(&fields.name),
            "email" => Some(&fields.email),
            _ => None,
        }
    }

    pub fn validate(&self, fields: &SignUpFields) -> Result<(), SignUpValidation> {
        if fields.email.trim().is_empty() {
            return Err(SignUpValidation::field("email", "Email을 입력해주세요."));
        }
        if fields.password.is_empty() {
            return Err(SignUpValidation::field("password", "Password를 입력해주세요."));
        }
        for attribute in self.schema.required_attributes() {
            let value = Self::attribute_value(fields, attribute.name).unwrap_or_default();
            if value.trim().is_empty() {
                let message = match attribute.name {
                    "nickname" => NAME_REQUIRED.to_string(),
                    other => format!("{}을 입력해주세요.", other),
                };
                return Err(SignUpValidation::Field {
                    field: attribute.name,
                    message,
                });
            }
        }
        if fields.password != fields.confirm_password {
            return Err(SignUpValidation::field(
                "confirm_password",
                "Your passwords must match",
            ));
        }
        if let Some(problem) = self
            .password_policy
            .as_ref()
            .and_then(|policy| policy.check(&fields.password))
        {
            return Err(SignUpValidation::Field {
                field: "password",
                message: problem,
            });
        }
        self.validate_custom_sign_up()
    }

    /// Attributes submitted with the sign-up
    pub fn attributes(&self, fields: &SignUpFields) -> UserAttributes {
        let mut attributes = UserAttributes::new().with("email", fields.email.trim());
        for attribute in &self.schema.user_attributes {
            if let Some(value) = Self::attribute_value(fields, attribute.name) {
                if !value.trim().is_empty() {
                    attributes.insert(attribute.name, value);
                }
            }
        }
        attributes
    }

    /// Form markup; `error` is shown above the footer
    pub fn render(&self, error: Option<&SignUpValidation>) -> String {
        let checked = if self.terms.is_accepted() { " checked" } else { "" };
        let mut html = String::from("<form class=\"sign-up\">\n");
        html.push_str(
            "  <div class=\"amplify-field\"><label for=\"nickname\">Name</label>\
             <input type=\"text\" name=\"nickname\" id=\"nickname\" placeholder=\"Enter your Name\" required></div>\n",
        );
        html.push_str("  <div class=\"amplify-field\"><label for=\"email\">Email</label><input type=\"email\" name=\"email\" id=\"email\" required></div>\n");
        html.push_str("  <div class=\"amplify-field\"><label for=\"password\">Password</label><input type=\"password\" name=\"password\" id=\"password\" required></div>\n");
        html.push_str("  <div class=\"amplify-field\"><label for=\"confirm_password\">Confirm Password</label><input type=\"password\" name=\"confirm_password\" id=\"confirm_password\" required></div>\n");
        html.push_str(&format!(
            "  <div class=\"amplify-field terms\"><input type=\"checkbox\" id=\"agreeTerms\"{} required><label for=\"agreeTerms\">&nbsp;{}</label></div>\n",
            checked, TERMS_LABEL
        ));
        if let Some(error) = error {
            html.push_str(&format!(
                "  <p class=\"error\" role=\"alert\">{}</p>\n",
                crate::shell::escape_html(error.message())
            ));
        }
        html.push_str(
            "  <footer>회원가입을 진행하면 <a href=\"/terms\" target=\"_blank\" rel=\"noopener noreferrer\">이용약관</a> \
             및 <a href=\"/privacy\" target=\"_blank\" rel=\"noopener noreferrer\">개인정보처리방침</a>에 동의한 것으로 간주합니다.</footer>\n",
        );
        html.push_str("</form>");
        html
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> SignUpForm {
        SignUpForm::new(
            AuthSchema::declared(),
            Some(PasswordPolicy {
                min_length: 8,
                require_lowercase: true,
                require_uppercase: false,
                require_numbers: true,
                require_symbols: false,
            }),
        )
    }

    fn fields() -> SignUpFields {
        SignUpFields {
            email: "minky@example.com".to_string(),
            password: "password1".to_string(),
            confirm_password: "password1".to_string(),
            name: "밍키".to_string(),
        }
    }

    #[test]
    fn test_unchecked_terms_block_submission() {
        let form = form();
        assert_eq!(
            form.validate(&fields()),
            Err(SignUpValidation::Acknowledgement(
                TERMS_ACKNOWLEDGEMENT.to_string()
            ))
        );
    }

    #[test]
    fn test_guard_reads_latest_checkbox_value() {
        let form = form();
        form.set_terms_accepted(true);
        assert_eq!(form.validate_custom_sign_up(), Ok(()));
        form.set_terms_accepted(false);
        assert!(form.validate_custom_sign_up().is_err());
        form.set_terms_accepted(true);
        assert_eq!(form.validate(&fields()), Ok(()));
    }

    #[test]
    fn test_name_is_required() {
        let form = form();
        form.set_terms_accepted(true);
        let mut fields = fields();
        fields.name = "   ".to_string();
        let err = form.validate(&fields).unwrap_err();
        assert_eq!(err.message(), NAME_REQUIRED);
    }

    #[test]
    fn test_required_fields_come_before_the_guard() {
        let form = form();
        let mut fields = fields();
        fields.email.clear();
        assert!(matches!(
            form.validate(&fields),
            Err(SignUpValidation::Field { field: "email", .. })
        ));
    }

    #[test]
    fn test_password_rules() {
        let form = form();
        form.set_terms_accepted(true);

        let mut mismatch = fields();
        mismatch.confirm_password = "password2".to_string();
        assert!(matches!(
            form.validate(&mismatch),
            Err(SignUpValidation::Field { field: "confirm_password", .. })
        ));

        let mut weak = fields();
        weak.password = "short1".to_string();
        weak.confirm_password = "short1".to_string();
        assert!(matches!(
            form.validate(&weak),
            Err(SignUpValidation::Field { field: "password", .. })
        ));
    }

    #[test]
    fn test_name_submitted_as_nickname() {
        let attributes = form().attributes(&fields());
        assert_eq!(attributes.get("nickname"), Some("밍키"));
        assert_eq!(attributes.get("email"), Some("minky@example.com"));
        assert_eq!(attributes.get("name"), None);
    }

    #[test]
    fn test_render_shows_terms_and_footer() {
        let form = form();
        let html = form.render(None);
        assert!(html.contains(TERMS_LABEL));
        assert!(html.contains("href=\"/terms\""));
        assert!(html.contains("href=\"/privacy\""));
        assert!(!html.contains(" checked"));

        form.set_terms_accepted(true);
        let err = SignUpValidation::Acknowledgement(TERMS_ACKNOWLEDGEMENT.to_string());
        let html = form.render(Some(&err));
        assert!(html.contains(" checked"));
        assert!(html.contains(TERMS_ACKNOWLEDGEMENT));
    }
}
