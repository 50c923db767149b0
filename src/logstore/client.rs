use crate::config::types::Config;
use crate::logstore::correlation::assemble;
use crate::logstore::dedup::{filter_seen, SeenIds};
use crate::logstore::normalize::normalize_page;
use crate::logstore::protocol::{Criteria, Endpoint, TimeWindow};
use crate::logstore::record::LogRecord;
use crate::logstore::target::Target;
use crate::logstore::{LogStoreError, Result};
use crate::transport::retry::with_retry;
use crate::transport::{
    AccessToken, Exchange, ExchangeRequest, HttpTransport, RetryPolicy, TransportError,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Result of one fetch for one target
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub target: Target,
    /// Matching records the log store reported for the window
    pub total: u64,
    /// Deduplicated, assembled, normalized; newest first
    pub records: Vec<LogRecord>,
    /// Every id seen in this page, for the next fetch's filter
    pub seen_ids: SeenIds,
}

/// Log store query client
pub struct LogStoreClient {
    transport: Arc<dyn Exchange>,
    endpoint: Endpoint,
    retry: RetryPolicy,
}

impl std::fmt::Debug for LogStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStoreClient")
            .field("endpoint", &self.endpoint)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl LogStoreClient {
    pub fn new(transport: Arc<dyn Exchange>, endpoint: Endpoint, retry: RetryPolicy) -> Self {
        Self {
            transport,
            endpoint,
            retry,
        }
    }

    /// HTTP client for the configured log store. The bearer token, if any,
    /// is read from the environment variable named by `transport.token_env`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let token = config
            .transport
            .token_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|token| !token.is_empty())
            .map(AccessToken::new);

        if token.is_none() {
            tracing::debug!("No access token configured, sending unauthenticated requests");
        }

        let transport = HttpTransport::new(config.transport.timeout, token)?;
        let endpoint = Endpoint::new(&config.log_store.uri, config.log_store.generation.resolve());

        Ok(Self::new(
            Arc::new(transport),
            endpoint,
            RetryPolicy::from(&config.transport.retry),
        ))
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Fetch one page and run it through dedup, correlation and normalization.
    pub async fn fetch_page(
        &self,
        target: &Target,
        window: TimeWindow,
        criteria: &Criteria,
        seen: &SeenIds,
        cancel: &CancellationToken,
    ) -> Result<FetchedPage> {
        let url = self.endpoint.query_url(target, &window, criteria)?;

        tracing::debug!(
            target = %target,
            from = ?window.from,
            to = ?window.to,
            "Fetching log records"
        );

        let request = ExchangeRequest::get(url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json");

        let response = with_retry(&self.retry, cancel, target.as_str(), || {
            self.transport.exchange(request.clone())
        })
        .await
        .map_err(|e| match e {
            TransportError::Cancelled => LogStoreError::Cancelled,
            other => LogStoreError::Transport(other),
        })?;

        let page = self.endpoint.parse_page(&response.body)?;
        let received = page.records.len();

        let (fresh, seen_ids) = filter_seen(page.records, seen);
        let records = normalize_page(assemble(fresh), target);

        tracing::trace!(
            target = %target,
            total = page.total,
            received = received,
            delivered = records.len(),
            "Processed log page"
        );

        Ok(FetchedPage {
            target: target.clone(),
            total: page.total,
            records,
            seen_ids,
        })
    }
}
