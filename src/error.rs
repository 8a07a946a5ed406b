//! Error handling for the amplify-todo client

use std::fmt;
use thiserror::Error;

use amplify_todo_auth::AuthError;
use amplify_todo_realtime::RealtimeError;

use crate::signup::SignUpValidation;

/// Unified error type for the amplify-todo client
#[derive(Error, Debug)]
pub enum Error {
    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Identity service errors
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Subscription transport errors
    #[error("Realtime error: {0}")]
    Realtime(#[from] RealtimeError),

    /// GraphQL errors returned by the data service
    #[error("Data error: {0}")]
    Data(String),

    /// Non-2xx responses from the data service
    #[error("Request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    /// A request header value that cannot be sent
    #[error("Invalid value for header {0}")]
    InvalidHeader(String),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Invalid or unreadable backend configuration
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Sign-up form validation failures
    #[error("Validation error: {0}")]
    Validation(#[from] SignUpValidation),
}

impl Error {
    /// Create a new data error
    pub fn data<T: fmt::Display>(msg: T) -> Self {
        Error::Data(msg.to_string())
    }

    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new API error
    pub fn api<T: fmt::Display>(status: u16, msg: T) -> Self {
        Error::Api {
            status,
            message: msg.to_string(),
        }
    }
}
