//! HTTP client abstraction for making requests to the data service

use crate::error::Error;
use log::{trace, warn};
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client, Method, RequestBuilder,
};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use url::Url;

/// Helper for building and executing HTTP requests
pub struct FetchBuilder<'a> {
    client: &'a Client,
    url: String,
    method: Method,
    headers: HeaderMap,
    timeout: Option<Duration>,
    body: Option<Vec<u8>>,
    invalid_header: Option<&'static str>,
}

impl<'a> FetchBuilder<'a> {
    /// Create a new FetchBuilder
    pub fn new(client: &'a Client, url: &str, method: Method) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        Self {
            client,
            url: url.to_string(),
            method,
            headers,
            timeout: None,
            body: None,
            invalid_header: None,
        }
    }

    /// Add a header to the request. An unusable value fails the request.
    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(e) => {
                warn!("Invalid value for header {}: {}", name, e);
                self.invalid_header.get_or_insert(name);
            }
        }
        self
    }

    /// Send a user-pool token as-is; the data service takes no scheme prefix
    pub fn authorization(self, token: &str) -> Self {
        self.header("Authorization", token)
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add a JSON body to the request
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, Error> {
        let json = serde_json::to_vec(body)?;
        self.body = Some(json);
        Ok(self)
    }

    /// Build the request
    fn build(&self) -> Result<RequestBuilder, Error> {
        if let Some(name) = self.invalid_header {
            return Err(Error::InvalidHeader(name.to_string()));
        }
        let url = Url::parse(&self.url)?;

        let mut req = self.client.request(self.method.clone(), url.as_str());
        req = req.headers(self.headers.clone());

        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        if let Some(body) = &self.body {
            req = req.body(body.clone());
        }

        Ok(req)
    }

    /// Execute the request and parse the response as JSON
    pub async fn execute<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let req = self.build()?;
        trace!("{} {}", self.method, self.url);
        let response = req.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(Error::api(status.as_u16(), text));
        }

        let result = response.json::<T>().await?;
        Ok(result)
    }
}

/// Helper for creating HTTP requests
pub struct Fetch;

impl Fetch {
    /// Create a POST request
    pub fn post<'a>(client: &'a Client, url: &str) -> FetchBuilder<'a> {
        FetchBuilder::new(client, url, Method::POST)
    }
}
