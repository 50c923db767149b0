pub mod client;
pub mod correlation;
pub mod dedup;
pub mod history;
pub mod normalize;
pub mod protocol;
pub mod record;
pub mod repair;
pub mod tail;
pub mod target;
pub mod timestamp;

use thiserror::Error;

pub use client::{FetchedPage, LogStoreClient};
pub use dedup::SeenIds;
pub use history::{fetch_historical, HistoryOptions, HistoryStats};
pub use protocol::{ApiGeneration, Criteria, Endpoint, TimeWindow};
pub use record::{LogRecord, RawRecord, RecordType};
pub use tail::{start_tail, TailHandle, TailOptions};
pub use target::Target;

#[derive(Debug, Error)]
pub enum LogStoreError {
    #[error("transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("malformed log store response: {0}")]
    MalformedPage(#[source] serde_json::Error),

    #[error("invalid log store endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, LogStoreError>;
