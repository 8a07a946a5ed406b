//! Authentication wrapper: drives sign-up, confirmation, sign-in and sign-out,
//! and tracks which screen is current.

use async_trait::async_trait;
use log::{debug, info};
use std::sync::{Arc, Mutex, PoisonError};

use amplify_todo_auth::{Auth, AuthError, Session, SignUpResult, UserAttributes};

use crate::error::Error;
use crate::signup::{SignUpFields, SignUpForm};

/// Current screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    SignIn,
    SignUp,
    ConfirmSignUp { email: String },
    SignedIn,
}

/// The signed-in user as seen by the application shell
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn user_attributes(&self) -> Result<UserAttributes, Error>;

    async fn sign_out(&self) -> Result<(), Error>;
}

pub struct Authenticator {
    auth: Arc<Auth>,
    form: SignUpForm,
    route: Mutex<Route>,
}

impl Authenticator {
    /// Starts on the sign-in screen, or signed in when `auth` already holds a session
    pub fn new(auth: Arc<Auth>, form: SignUpForm) -> Self {
        let route = if auth.get_session().is_some() {
            Route::SignedIn
        } else {
            Route::SignIn
        };
        Self {
            auth,
            form,
            route: Mutex::new(route),
        }
    }

    pub fn route(&self) -> Route {
        self.route
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_route(&self, route: Route) {
        debug!("Route -> {:?}", route);
        *self.route.lock().unwrap_or_else(PoisonError::into_inner) = route;
    }

    /// Switch between the sign-in and sign-up screens
    pub fn show(&self, route: Route) {
        self.set_route(route);
    }

    pub fn form(&self) -> &SignUpForm {
        &self.form
    }

    /// 会員登録
    ///
    /// Nothing is sent to the identity service unless the form validates.
    pub async fn sign_up(&self, fields: &SignUpFields) -> Result<SignUpResult, Error> {
        self.form.validate(fields)?;

        let email = fields.email.trim();
        let attributes = self.form.attributes(fields);
        let result = self.auth.sign_up(email, &fields.password, &attributes).await?;

        if result.user_confirmed {
            self.set_route(Route::SignIn);
        } else {
            self.set_route(Route::ConfirmSignUp {
                email: email.to_string(),
            });
        }
        Ok(result)
    }

    pub async fn confirm_sign_up(&self, email: &str, code: &str) -> Result<(), Error> {
        self.auth.confirm_sign_up(email, code.trim()).await?;
        info!("Confirmed {}", email);
        self.set_route(Route::SignIn);
        Ok(())
    }

    pub async fn resend_code(&self, email: &str) -> Result<(), Error> {
        let delivery = self.auth.resend_sign_up_code(email).await?;
        debug!("Code resent via {:?}", delivery.delivery_medium);
        Ok(())
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, Error> {
        let session = self.auth.sign_in(email.trim(), password).await?;
        self.set_route(Route::SignedIn);
        Ok(session)
    }

    /// Back to the sign-in screen; the local session is gone even if the
    /// service call failed
    pub async fn sign_out(&self) -> Result<(), Error> {
        let result = match self.auth.sign_out().await {
            Err(AuthError::MissingSession) => Ok(()),
            other => other,
        };
        self.set_route(Route::SignIn);
        Ok(result?)
    }
}

#[async_trait]
impl SessionProvider for Authenticator {
    async fn user_attributes(&self) -> Result<UserAttributes, Error> {
        Ok(self.auth.fetch_user_attributes().await?)
    }

    async fn sign_out(&self) -> Result<(), Error> {
        Authenticator::sign_out(self).await
    }
}
