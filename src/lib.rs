//! amplify-todo
//!
//! A todo list client for an Amplify backend: email sign-up with a nickname,
//! owner-scoped `Todo` records over GraphQL, and a live query that keeps the
//! application shell's list current.

pub mod authenticator;
pub mod config;
pub mod data;
pub mod error;
pub mod fetch;
pub mod schema;
pub mod shell;
pub mod signup;

use reqwest::Client;
use std::path::Path;
use std::sync::Arc;

use amplify_todo_auth::{Auth, AuthOptions};

use crate::authenticator::Authenticator;
use crate::config::{AmplifyOutputs, ClientOptions};
use crate::data::DataClient;
use crate::error::Error;
use crate::schema::AuthSchema;
use crate::signup::SignUpForm;

pub use amplify_todo_auth as auth;
pub use amplify_todo_realtime as realtime;

/// The configured backend: one identity client and one data client sharing
/// an HTTP client
pub struct Amplify {
    outputs: AmplifyOutputs,
    options: ClientOptions,
    http_client: Client,
    auth: Arc<Auth>,
    data: DataClient,
}

impl Amplify {
    /// Configure from already loaded outputs
    ///
    /// # Example
    ///
    /// ```no_run
    /// use amplify_todo::{Amplify, config::{AmplifyOutputs, ClientOptions}};
    ///
    /// let outputs = AmplifyOutputs::from_file("amplify_outputs.json").unwrap();
    /// let amplify = Amplify::configure(outputs, ClientOptions::default()).unwrap();
    /// ```
    pub fn configure(outputs: AmplifyOutputs, options: ClientOptions) -> Result<Self, Error> {
        outputs.validate()?;

        let mut builder = Client::builder();
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        let endpoint = options
            .auth_endpoint
            .clone()
            .unwrap_or_else(|| outputs.auth.endpoint());
        let auth = Arc::new(Auth::new(
            &endpoint,
            &outputs.auth.user_pool_client_id,
            http_client.clone(),
            AuthOptions {
                auto_refresh_token: options.auto_refresh_token,
                persist_session: options.persist_session,
            },
        ));
        let data = DataClient::new(&outputs.data, Arc::clone(&auth), http_client.clone(), options.clone())?;

        log::info!(
            "Configured for user pool {} in {}",
            outputs.auth.user_pool_id,
            outputs.auth.aws_region
        );

        Ok(Self {
            outputs,
            options,
            http_client,
            auth,
            data,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P, options: ClientOptions) -> Result<Self, Error> {
        Self::configure(AmplifyOutputs::from_file(path)?, options)
    }

    pub fn outputs(&self) -> &AmplifyOutputs {
        &self.outputs
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    pub fn auth(&self) -> Arc<Auth> {
        Arc::clone(&self.auth)
    }

    pub fn data(&self) -> &DataClient {
        &self.data
    }

    /// An authenticator whose sign-up form follows the declared auth schema
    /// and the configured password policy
    pub fn authenticator(&self) -> Authenticator {
        let form = SignUpForm::new(
            AuthSchema::declared(),
            self.outputs.auth.password_policy.clone(),
        );
        Authenticator::new(self.auth(), form)
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::authenticator::{Authenticator, Route, SessionProvider};
    pub use crate::config::{AmplifyOutputs, ClientOptions};
    pub use crate::data::{CreateTodoInput, DataClient, Snapshot, Todo, TodoBackend};
    pub use crate::error::Error;
    pub use crate::shell::{AppShell, Presentation, Prompt, Theme, ViewMode, ViewState};
    pub use crate::signup::{SignUpFields, SignUpForm, SignUpValidation};
    pub use crate::Amplify;
}
