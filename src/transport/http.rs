use crate::transport::{Exchange, ExchangeRequest, ExchangeResponse, Result, TransportError};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Bearer token handed to the transport at construction.
///
/// Acquiring and refreshing the token is the caller's business.
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// [`Exchange`] over HTTP(S)
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    token: Option<AccessToken>,
}

impl HttpTransport {
    pub fn new(timeout: Duration, token: Option<AccessToken>) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { client, token })
    }
}

#[async_trait]
impl Exchange for HttpTransport {
    async fn exchange(&self, request: ExchangeRequest) -> Result<ExchangeResponse> {
        let mut builder = self.client.request(request.method, &request.url);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = &self.token {
            builder = builder.header(reqwest::header::AUTHORIZATION, token.bearer());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            return Err(TransportError::Status {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body = response.text().await?;
        Ok(ExchangeResponse { body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_not_printed() {
        let token = AccessToken::new("secret-value");
        assert_eq!(format!("{:?}", token), "AccessToken(***)");
        assert_eq!(token.bearer(), "Bearer secret-value");
    }

    #[test]
    fn test_transport_builds_without_token() {
        let transport = HttpTransport::new(Duration::from_secs(5), None).unwrap();
        assert!(transport.token.is_none());
    }
}
