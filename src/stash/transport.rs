//! The HTTP seam of the client.
//!
//! A [`Connector`] opens one [`Connection`] per API call. The connection is
//! owned by the call and released when it is dropped, whichever way the
//! call ends.

use std::time::Duration;

use async_trait::async_trait;
use hyper::ext::ReasonPhrase;
use reqwest::{header, Client, Method, StatusCode, Url};

use crate::config::Credentials;
use crate::error::{BoxError, ClientError, Result};

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub body: Option<serde_json::Value>,
    pub credentials: Option<Credentials>,
}

impl ApiRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            body: None,
            credentials: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: Url) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: Url) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub status_text: String,
    pub body: String,
}

impl ApiResponse {
    /// Response carrying the standard reason phrase of `status`.
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        let status_text = status.canonical_reason().unwrap_or_default();
        Self::with_status_text(status, status_text, body)
    }

    pub fn with_status_text(
        status: StatusCode,
        status_text: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            body: body.into(),
        }
    }
}

#[async_trait]
pub trait Connection: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> std::result::Result<ApiResponse, BoxError>;
}

pub trait Connector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn Connection>>;
}

/// Opens a fresh reqwest connection pool for every call.
pub struct ReqwestConnector {
    timeout: Duration,
    verify_tls: bool,
}

impl ReqwestConnector {
    pub fn new(timeout: Duration, verify_tls: bool) -> Self {
        Self {
            timeout,
            verify_tls,
        }
    }
}

impl Connector for ReqwestConnector {
    fn connect(&self) -> Result<Box<dyn Connection>> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static("stashreview/0.1"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(self.timeout)
            .danger_accept_invalid_certs(!self.verify_tls)
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Box::new(ReqwestConnection { client }))
    }
}

struct ReqwestConnection {
    client: Client,
}

#[async_trait]
impl Connection for ReqwestConnection {
    async fn execute(&self, request: ApiRequest) -> std::result::Result<ApiResponse, BoxError> {
        let mut builder = self.client.request(request.method, request.url);
        if let Some(credentials) = &request.credentials {
            builder = builder.basic_auth(&credentials.login, Some(&credentials.password));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        // hyper only records the phrase when it differs from the canonical one
        let status_text = response
            .extensions()
            .get::<ReasonPhrase>()
            .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned());
        let body = response.text().await?;

        Ok(match status_text {
            Some(status_text) => ApiResponse::with_status_text(status, status_text, body),
            None => ApiResponse::new(status, body),
        })
    }
}

impl Drop for ReqwestConnection {
    fn drop(&mut self) {
        tracing::trace!("Releasing HTTP connection pool");
    }
}
