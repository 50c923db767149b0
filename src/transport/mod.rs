pub mod http;
pub mod retry;

use async_trait::async_trait;
use reqwest::Method;
use thiserror::Error;

pub use http::{AccessToken, HttpTransport};
pub use retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("log store returned error status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("request cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// One request against the log store.
#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    pub url: String,
    pub method: Method,
    pub body: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl ExchangeRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct ExchangeResponse {
    pub body: String,
}

/// A single authenticated request/response exchange.
///
/// Implementations do not retry; retrying is layered on top by
/// [`retry::with_retry`].
#[async_trait]
pub trait Exchange: Send + Sync {
    async fn exchange(&self, request: ExchangeRequest) -> Result<ExchangeResponse>;
}
