use crate::logstore::client::{FetchedPage, LogStoreClient};
use crate::logstore::dedup::SeenIds;
use crate::logstore::history::{is_clock_skewed, DEFAULT_CLOCK_SKEWED_LOGGER};
use crate::logstore::normalize::sort_newest_first;
use crate::logstore::protocol::{Criteria, TimeWindow};
use crate::logstore::record::LogRecord;
use crate::logstore::target::Target;
use crate::logstore::LogStoreError;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailOptions {
    /// Pause between the end of one cycle and the start of the next
    pub poll_interval: Duration,
    /// Records from these loggers never move the cursor
    pub clock_skewed_loggers: Vec<String>,
}

impl Default for TailOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            clock_skewed_loggers: vec![DEFAULT_CLOCK_SKEWED_LOGGER.to_string()],
        }
    }
}

/// Per-target polling state, owned by the tail loop
#[derive(Debug, Clone)]
pub struct PollState {
    pub target: Target,
    pub cursor: DateTime<Utc>,
    pub seen_ids: SeenIds,
}

impl PollState {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            cursor: DateTime::<Utc>::UNIX_EPOCH,
            seen_ids: SeenIds::new(),
        }
    }

    /// Adopt a fetched page: take its ids, move the cursor to its newest
    /// record, and hand back the records.
    ///
    /// Clock-skewed loggers are ignored unless nothing else is on the page,
    /// and the cursor never passes `now`, the upper bound of the window
    /// that was fetched.
    fn apply(
        &mut self,
        page: FetchedPage,
        skewed_loggers: &[String],
        now: DateTime<Utc>,
    ) -> Vec<LogRecord> {
        let newest = page
            .records
            .iter()
            .filter(|r| !is_clock_skewed(r, skewed_loggers))
            .map(|r| r.event_time)
            .max()
            .or_else(|| page.records.iter().map(|r| r.event_time).max());

        if let Some(newest) = newest {
            self.cursor = self.cursor.max(newest.min(now));
        }
        self.seen_ids = page.seen_ids;
        page.records
    }
}

/// Running tail loop
#[derive(Debug)]
pub struct TailHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl TailHandle {
    /// Request the loop to stop; in-flight requests and the pause are aborted.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel and wait for the loop to exit
    pub async fn stop(self) -> Result<(), tokio::task::JoinError> {
        self.cancel.cancel();
        self.handle.await
    }
}

/// One poll of every target.
///
/// All targets are fetched concurrently; state is only touched once every
/// fetch has finished. A target whose fetch failed keeps its state and is
/// retried next cycle. Returns the new records in chronological order.
pub async fn poll_cycle(
    client: &LogStoreClient,
    states: &mut [PollState],
    criteria: &Criteria,
    options: &TailOptions,
    cancel: &CancellationToken,
) -> Vec<LogRecord> {
    let now = Utc::now();

    let results = join_all(states.iter().map(|state| {
        client.fetch_page(
            &state.target,
            TimeWindow::between(state.cursor, now),
            criteria,
            &state.seen_ids,
            cancel,
        )
    }))
    .await;

    let mut batch = Vec::new();
    for (state, result) in states.iter_mut().zip(results) {
        match result {
            Ok(page) => batch.extend(state.apply(page, &options.clock_skewed_loggers, now)),
            Err(LogStoreError::Cancelled) => {}
            Err(e) => warn!(
                target = %state.target,
                cursor = %state.cursor,
                error = %e,
                "Failed to fetch logs, will retry next cycle"
            ),
        }
    }

    sort_newest_first(&mut batch);
    batch.reverse();
    batch
}

async fn run_tail<F>(
    client: Arc<LogStoreClient>,
    mut states: Vec<PollState>,
    criteria: Criteria,
    options: TailOptions,
    cancel: CancellationToken,
    mut on_batch: F,
) where
    F: FnMut(Vec<LogRecord>) + Send + 'static,
{
    info!(
        targets = states.len(),
        poll_interval_ms = options.poll_interval.as_millis(),
        "Tailing logs"
    );

    loop {
        let batch = poll_cycle(&client, &mut states, &criteria, &options, &cancel).await;
        if cancel.is_cancelled() {
            break;
        }

        debug!(records = batch.len(), "Tail cycle complete");
        if !batch.is_empty() {
            on_batch(batch);
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(options.poll_interval) => {}
        }
    }

    info!("Tailing stopped");
}

/// Start tailing `targets`; every cycle's new records go to `on_batch` in
/// chronological order.
pub fn start_tail<F>(
    client: Arc<LogStoreClient>,
    targets: Vec<Target>,
    criteria: Criteria,
    options: TailOptions,
    on_batch: F,
) -> TailHandle
where
    F: FnMut(Vec<LogRecord>) + Send + 'static,
{
    let cancel = CancellationToken::new();
    let states = targets.into_iter().map(PollState::new).collect();

    let handle = tokio::spawn(run_tail(
        client,
        states,
        criteria,
        options,
        cancel.clone(),
        on_batch,
    ));

    TailHandle { cancel, handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::Map;

    fn record(id: &str, minute: u32) -> LogRecord {
        record_at(id, Utc.with_ymd_and_hms(2021, 6, 1, 12, minute, 0).unwrap())
    }

    fn record_at(id: &str, at: DateTime<Utc>) -> LogRecord {
        LogRecord {
            id: Some(id.to_string()),
            app_target_uri: "ues:T:A".to_string(),
            record_type: None,
            log_level: None,
            logger: None,
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
    fn test_new_state_starts_at_epoch() {
        let state = PollState::new(Target::parse("ues:T:A"));
        assert_eq!(state.cursor.timestamp(), 0);
        assert!(state.seen_ids.is_empty());
    }

    #[test]
    fn test_apply_advances_cursor_to_newest() {
        let mut state = PollState::new(Target::parse("ues:T:A"));
        let page = FetchedPage {
            target: state.target.clone(),
            total: 2,
            records: vec![record("b", 40), record("a", 10)],
            seen_ids: ["a", "b"].into_iter().collect(),
        };

        let records = state.apply(page, &[], Utc::now());

        assert_eq!(records.len(), 2);
        assert_eq!(state.cursor, records[0].event_time);
        assert!(state.seen_ids.contains("a"));
    }

    #[test]
    fn test_apply_empty_page_keeps_cursor() {
        let mut state = PollState::new(Target::parse("ues:T:A"));
        state.cursor = Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap();
        let before = state.cursor;

        let page = FetchedPage {
            target: state.target.clone(),
            total: 0,
            records: Vec::new(),
            seen_ids: SeenIds::new(),
        };
        state.apply(page, &[], Utc::now());

        assert_eq!(state.cursor, before);
    }

    fn skewed(id: &str, at: DateTime<Utc>) -> LogRecord {
        LogRecord {
            logger: Some(DEFAULT_CLOCK_SKEWED_LOGGER.to_string()),
            ..record_at(id, at)
        }
    }

    #[test]
    fn test_apply_ignores_skewed_logger() {
        let now = Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap();
        let mut state = PollState::new(Target::parse("ues:T:A"));
        let page = FetchedPage {
            target: state.target.clone(),
            total: 2,
            records: vec![
                skewed("s", now + chrono::Duration::hours(1)),
                record_at("a", now - chrono::Duration::seconds(10)),
            ],
            seen_ids: ["s", "a"].into_iter().collect(),
        };

        state.apply(page, &TailOptions::default().clock_skewed_loggers, now);

        assert_eq!(state.cursor, now - chrono::Duration::seconds(10));
    }

    #[test]
    fn test_apply_never_moves_cursor_past_now() {
        let now = Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap();
        let mut state = PollState::new(Target::parse("ues:T:A"));
        let page = FetchedPage {
            target: state.target.clone(),
            total: 1,
            records: vec![skewed("s", now + chrono::Duration::hours(1))],
            seen_ids: ["s"].into_iter().collect(),
        };

        let records = state.apply(page, &TailOptions::default().clock_skewed_loggers, now);

        assert_eq!(records.len(), 1);
        assert_eq!(state.cursor, now);
    }
}
