use crate::logstore::client::LogStoreClient;
use crate::logstore::dedup::SeenIds;
use crate::logstore::protocol::{Criteria, TimeWindow};
use crate::logstore::record::LogRecord;
use crate::logstore::target::Target;
use crate::logstore::Result;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

/// Logger whose records are stamped in the wrong timezone
pub const DEFAULT_CLOCK_SKEWED_LOGGER: &str = "UuC3::Helper::ProgressMonitor";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryOptions {
    /// Records from these loggers never narrow the window
    pub clock_skewed_loggers: Vec<String>,
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            clock_skewed_loggers: vec![DEFAULT_CLOCK_SKEWED_LOGGER.to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryStats {
    pub pages: usize,
    pub records: usize,
}

/// Whether `record` comes from a logger whose timestamps cannot be trusted
pub(crate) fn is_clock_skewed(record: &LogRecord, skewed_loggers: &[String]) -> bool {
    record
        .logger
        .as_ref()
        .is_some_and(|logger| skewed_loggers.contains(logger))
}

/// Oldest `event_time` on the page, ignoring clock-skewed loggers unless
/// nothing else is there.
fn oldest_event_time(records: &[LogRecord], options: &HistoryOptions) -> Option<DateTime<Utc>> {
    records
        .iter()
        .filter(|r| !is_clock_skewed(r, &options.clock_skewed_loggers))
        .map(|r| r.event_time)
        .min()
        .or_else(|| records.iter().map(|r| r.event_time).min())
}

/// Export every record in `window`, newest page first.
///
/// A missing `to` with a `from` means "until now". Each page is handed to
/// `on_page` (newest record first), then `to` is moved back to the oldest
/// record of that page. Stops when the log store reports no matches, a page
/// brings nothing new, a bound is open, the window closes, or `to` stops
/// moving back.
pub async fn fetch_historical<F>(
    client: &LogStoreClient,
    target: &Target,
    window: TimeWindow,
    criteria: &Criteria,
    options: &HistoryOptions,
    cancel: &CancellationToken,
    mut on_page: F,
) -> Result<HistoryStats>
where
    F: FnMut(Vec<LogRecord>),
{
    let from = window.from;
    let mut to = match window {
        TimeWindow {
            from: Some(_),
            to: None,
        } => Some(Utc::now()),
        TimeWindow { to, .. } => to,
    };

    let mut seen = SeenIds::new();
    let mut stats = HistoryStats::default();

    loop {
        let page = client
            .fetch_page(target, TimeWindow::new(from, to), criteria, &seen, cancel)
            .await?;

        stats.pages += 1;
        stats.records += page.records.len();

        let total = page.total;
        let delivered = page.records.len();
        let oldest = oldest_event_time(&page.records, options);
        seen = page.seen_ids;
        on_page(page.records);

        if total == 0 || delivered == 0 {
            break;
        }

        let (Some(from), Some(current_to), Some(oldest)) = (from, to, oldest) else {
            break;
        };
        if oldest <= from {
            break;
        }
        if oldest >= current_to {
            tracing::warn!(
                target = %target,
                to = %current_to,
                total = total,
                "History window cannot be narrowed further, stopping"
            );
            break;
        }

        to = Some(oldest);
    }

    tracing::debug!(
        target = %target,
        pages = stats.pages,
        records = stats.records,
        "Historical fetch finished"
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logstore::RecordType;
    use chrono::TimeZone;
    use serde_json::Map;

    fn record(logger: &str, minute: u32) -> LogRecord {
        let at = Utc.with_ymd_and_hms(2021, 6, 1, 12, minute, 0).unwrap();
        LogRecord {
            id: None,
            app_target_uri: "ues:T:A".to_string(),
            record_type: Some(RecordType::TraceLog),
            log_level: None,
            logger: Some(logger.to_string()),
            message: String::new(),
            stack_trace: None,
            correlation_id: None,
            thread_name: None,
            time: at,
            event_time: at,
            timestamp: None,
            extensions: Map::new(),
        }
    }

    #[test]
    fn test_oldest_ignores_skewed_logger() {
        let records = vec![
            record("App", 30),
            record(DEFAULT_CLOCK_SKEWED_LOGGER, 5),
            record("App", 20),
        ];

        let oldest = oldest_event_time(&records, &HistoryOptions::default()).unwrap();
        assert_eq!(oldest, records[2].event_time);
    }

    #[test]
    fn test_oldest_uses_skewed_when_alone() {
        let records = vec![record(DEFAULT_CLOCK_SKEWED_LOGGER, 5)];

        let oldest = oldest_event_time(&records, &HistoryOptions::default()).unwrap();
        assert_eq!(oldest, records[0].event_time);
    }

    #[test]
    fn test_oldest_of_empty_page() {
        assert!(oldest_event_time(&[], &HistoryOptions::default()).is_none());
    }
}
