use crate::cli::relative_date::{parse_date_arg, DateArgError};
use crate::cli::render::ConsoleRenderer;
use crate::config::{load_config, Config, ConfigError};
use crate::logstore::protocol::RESERVED_PARAMS;
use crate::logstore::target::UesUri;
use crate::logstore::{
    fetch_historical, start_tail, Criteria, HistoryOptions, LogStoreClient, LogStoreError,
    TailOptions, Target, TimeWindow,
};
use chrono::Utc;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    LogStore(#[from] LogStoreError),

    #[error("{0}")]
    Date(#[from] DateArgError),

    #[error("invalid target '{0}': expected ues:<territory>:<artifact>[:<object>] or an instance id")]
    InvalidTarget(String),

    #[error("{0}")]
    Usage(String),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("failed to wait for Ctrl-C: {0}")]
    Signal(#[source] std::io::Error),

    #[error(
        "config not found (searched ~/.config/logstore/config.yml and /etc/logstore/config.yml); \
         use --config <path>, --log-store-uri <uri>, or run 'logstore config init'"
    )]
    ConfigNotFound,
}

/// Arguments of `logstore logs`
#[derive(Debug, Clone, Default)]
pub struct LogsArgs {
    pub follow: bool,
    pub since: Option<String>,
    pub until: Option<String>,
    pub log_store_uri: Option<String>,
    pub criteria: Vec<(String, String)>,
    pub targets: Vec<String>,
}

/// `key=value` criterion for clap
pub fn parse_criterion(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, _)) if RESERVED_PARAMS.contains(&key.trim()) => Err(format!(
            "'{}' is set from the target and --since/--until, not a criterion",
            key.trim()
        )),
        Some((key, val)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), val.to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", value)),
    }
}

fn parse_target(value: &str) -> Result<Target, RunError> {
    let target = Target::parse(value.trim());
    match &target {
        Target::Uri(uri) if UesUri::parse(uri).is_none() => {
            Err(RunError::InvalidTarget(value.to_string()))
        }
        Target::InstanceId(id) if id.is_empty() => Err(RunError::InvalidTarget(value.to_string())),
        _ => Ok(target),
    }
}

/// Config from file when one is found, with `--log-store-uri` taking precedence
fn resolve_config(
    config_path: Option<PathBuf>,
    log_store_uri: Option<&str>,
) -> Result<Config, RunError> {
    let mut config = match (config_path, log_store_uri) {
        (Some(path), _) => {
            info!(config_path = %path.display(), "Loading configuration");
            load_config(&path)?
        }
        (None, Some(uri)) => Config::for_uri(uri),
        (None, None) => return Err(RunError::ConfigNotFound),
    };

    if let Some(uri) = log_store_uri {
        config.log_store.uri = uri.to_string();
    }

    Ok(config)
}

pub async fn logs(config_path: Option<PathBuf>, args: LogsArgs) -> Result<(), Box<dyn std::error::Error>> {
    run_logs(config_path, args).await.map_err(|e| e.into())
}

async fn run_logs(config_path: Option<PathBuf>, args: LogsArgs) -> Result<(), RunError> {
    let config = resolve_config(config_path, args.log_store_uri.as_deref())?;

    let targets = args
        .targets
        .iter()
        .map(|t| parse_target(t))
        .collect::<Result<Vec<_>, _>>()?;
    if targets.is_empty() {
        return Err(RunError::Usage("at least one target is required".to_string()));
    }

    let criteria: Criteria = args.criteria.into_iter().collect();
    let client = Arc::new(LogStoreClient::from_config(&config)?);
    let renderer = ConsoleRenderer::new(&targets);

    info!(
        endpoint = client.endpoint().base_uri(),
        generation = ?client.endpoint().generation(),
        targets = targets.len(),
        "Log store client ready"
    );

    if args.follow {
        follow(client, targets, criteria, TailOptions::from(&config), renderer).await
    } else {
        let now = Utc::now();
        let from = args.since.as_deref().map(|s| parse_date_arg(s, now)).transpose()?;
        let to = args.until.as_deref().map(|s| parse_date_arg(s, now)).transpose()?;
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(RunError::Usage(format!(
                    "--since ({}) is after --until ({})",
                    from.to_rfc3339(),
                    to.to_rfc3339()
                )));
            }
        }

        let [target] = <[Target; 1]>::try_from(targets).map_err(|targets| {
            RunError::Usage(format!(
                "history mode takes exactly one target, got {}",
                targets.len()
            ))
        })?;

        history(
            &client,
            &target,
            TimeWindow::new(from, to),
            &criteria,
            &HistoryOptions::from(&config.history),
            &renderer,
            signal::ctrl_c(),
        )
        .await
    }
}

/// Export history until done or `shutdown` resolves. On shutdown the
/// in-flight fetch is cancelled and drained before returning.
async fn history<S>(
    client: &LogStoreClient,
    target: &Target,
    window: TimeWindow,
    criteria: &Criteria,
    options: &HistoryOptions,
    renderer: &ConsoleRenderer,
    shutdown: S,
) -> Result<(), RunError>
where
    S: Future<Output = std::io::Result<()>>,
{
    let cancel = CancellationToken::new();
    let fetch = fetch_historical(client, target, window, criteria, options, &cancel, |records| {
        for record in &records {
            println!("{}", renderer.render(record));
        }
    });
    tokio::pin!(fetch);

    let result = tokio::select! {
        result = &mut fetch => result,
        signal_result = shutdown => {
            signal_result.map_err(RunError::Signal)?;
            info!("Interrupted");
            cancel.cancel();
            fetch.await
        }
    };

    match result {
        Ok(stats) => {
            info!(pages = stats.pages, records = stats.records, "History complete");
            Ok(())
        }
        Err(LogStoreError::Cancelled) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn follow(
    client: Arc<LogStoreClient>,
    targets: Vec<Target>,
    criteria: Criteria,
    options: TailOptions,
    renderer: ConsoleRenderer,
) -> Result<(), RunError> {
    let handle = start_tail(client, targets, criteria, options, move |batch| {
        for record in &batch {
            println!("{}", renderer.render(record));
        }
    });

    let signal_result = signal::ctrl_c().await;
    info!("Shutdown signal received");
    handle.stop().await?;

    signal_result.map_err(RunError::Signal)
}
