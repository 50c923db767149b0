use clap::{Parser, Subcommand};
use logstore::cli::run::{parse_criterion, LogsArgs};
use logstore::config::resolve_config_path;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "logstore")]
#[command(about = "Query and tail application logs from the log store", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print logs of one target for a time range, or follow several targets
    Logs {
        /// Keep polling for new records until Ctrl-C
        #[arg(short, long, conflicts_with_all = ["since", "until"])]
        follow: bool,

        /// Start of the range: RFC 3339, YYYY-MM-DD[THH:MM:SS] (UTC), or <n>m / <n>h ago
        #[arg(long)]
        since: Option<String>,

        /// End of the range, same formats as --since; defaults to now
        #[arg(long, requires = "since")]
        until: Option<String>,

        /// Log store base URI, overrides the config file
        #[arg(long)]
        log_store_uri: Option<String>,

        /// Extra query criterion, repeatable
        #[arg(short = 'c', long = "criterion", value_name = "KEY=VALUE", value_parser = parse_criterion)]
        criteria: Vec<(String, String)>,

        /// ues: URIs or application instance ids
        #[arg(required = true)]
        targets: Vec<String>,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a commented starter config
    Init {
        #[arg(long)]
        stdout: bool,
    },
    /// Load and validate the resolved config file
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Diagnostics go to stderr; stdout carries only log records
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logstore=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());

    match cli.command {
        Commands::Logs {
            follow,
            since,
            until,
            log_store_uri,
            criteria,
            targets,
        } => {
            let args = LogsArgs {
                follow,
                since,
                until,
                log_store_uri,
                criteria,
                targets,
            };
            logstore::cli::run::logs(config_path, args).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { stdout } => logstore::cli::config::init(stdout)?,
            ConfigAction::Validate => logstore::cli::config::validate(config_path)?,
        },
    }

    Ok(())
}
