use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use showwatch::config::{Config, CredentialSource, LayeredCredentials};
use showwatch::filter::{start_of_day, Visibility};
use showwatch::guide::HttpSearchClient;
use showwatch::lock::FileLock;
use showwatch::notify::{Dispatcher, MailRelayNotifier, Notifier, SlackNotifier};
use showwatch::pipeline::{mark_recorded, run_once, MarkOutcome, RunContext, RunOutcome};
use showwatch::storage::{render_table, Database, DatabaseError};

/// Get the config directory path (~/.config/showwatch/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("showwatch"))
}

/// Create the config directory with user-only permissions.
fn ensure_private_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(dir, perms) {
                    tracing::warn!(
                        path = %dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }
    Ok(())
}

#[derive(Parser, Debug)]
#[command(
    name = "showwatch",
    about = "Keeps a TV show's upcoming broadcasts in sync and reminds you to record them"
)]
struct Args {
    /// Config file (default: ~/.config/showwatch/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Episode database (default: database_path from the config, or
    /// ~/.config/showwatch/episodes.db)
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,

    /// Print the upcoming episodes table and exit
    #[arg(long, conflicts_with_all = ["mark_recorded", "unmark_recorded"])]
    list: bool,

    /// Tick the recorded box of an episode and exit
    #[arg(long, value_name = "TITLE", conflicts_with = "unmark_recorded")]
    mark_recorded: Option<String>,

    /// Clear the recorded box of an episode and exit
    #[arg(long, value_name = "TITLE")]
    unmark_recorded: Option<String>,
}

async fn open_database(path: &Path) -> Result<Database> {
    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    match Database::open(path_str).await {
        Ok(db) => Ok(db),
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: The episode database is locked by another process. Please try again later."
            );
            std::process::exit(1);
        }
        Err(e) => Err(anyhow::anyhow!("Failed to open database: {}", e)),
    }
}

async fn set_recorded(
    db: &Database,
    lock: &FileLock,
    config: &Config,
    title: &str,
    recorded: bool,
) -> Result<()> {
    match mark_recorded(db, lock, config.lock_timeout(), title, recorded).await? {
        MarkOutcome::Updated => {
            println!(
                "{} {:?}",
                if recorded { "Marked" } else { "Unmarked" },
                title
            );
            Ok(())
        }
        MarkOutcome::UnknownTitle => anyhow::bail!("No episode titled {:?}", title),
        MarkOutcome::Busy => {
            eprintln!("Error: A run is in progress. Please try again in a moment.");
            std::process::exit(1);
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    ensure_private_dir(&config_dir)?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = args
        .db
        .clone()
        .or_else(|| config.database_path.clone())
        .unwrap_or_else(|| config_dir.join("episodes.db"));
    let db = open_database(&db_path).await?;
    let lock = FileLock::new(config_dir.join("run.lock"));

    if args.list {
        let rows = db
            .upcoming_episodes(start_of_day(Utc::now()))
            .await
            .context("Failed to load upcoming episodes")?;
        print!("{}", render_table(&rows));
        return Ok(());
    }
    if let Some(title) = &args.mark_recorded {
        return set_recorded(&db, &lock, &config, title, true).await;
    }
    if let Some(title) = &args.unmark_recorded {
        return set_recorded(&db, &lock, &config, title, false).await;
    }

    config.validate().context("Configuration is incomplete")?;

    let client = reqwest::Client::builder()
        .timeout(config.http_timeout())
        .user_agent(concat!("showwatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let search = HttpSearchClient::new(client.clone(), &config.search_url)
        .context("Invalid search_url")?;

    let credentials: Arc<dyn CredentialSource> = Arc::new(LayeredCredentials::from_config(&config));
    let email = MailRelayNotifier::new(client.clone(), &config.email, credentials.clone())
        .context("Invalid email.api_url")?;
    let slack = SlackNotifier::new(client, config.slack.clone(), credentials);
    let notifiers: Vec<Box<dyn Notifier>> = vec![Box::new(email), Box::new(slack)];
    let dispatcher = Dispatcher::new(notifiers);

    let ctx = RunContext {
        config: &config,
        database: &db,
        search: &search,
        dispatcher: &dispatcher,
        lock: &lock,
        visibility: Visibility::Upcoming,
    };

    match run_once(&ctx, Utc::now()).await? {
        RunOutcome::Skipped => println!("Another run is in progress; nothing to do."),
        RunOutcome::Completed(summary) => println!(
            "Fetched {} episodes, {} stored, {} unrecorded airing soon.",
            summary.fetched,
            summary.stored,
            summary.due.len()
        ),
    }
    Ok(())
}
