mod config;
mod gateway;
mod net;
mod store;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::gateway::{
  EventOutcome, Gateway, GatewayEvent, LogSink, LogSyncHandler, PushBridge, SyncBridge, Worker,
};
use crate::net::{HttpFetcher, Method, Request};
use crate::store::{GenerationStore, SqliteStore};

#[derive(Parser, Debug)]
#[command(name = "offgate")]
#[command(about = "Offline cache gateway: versioned asset cache with cache-first serving")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/offgate/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Populate the configured generation from the precache manifest
  Install,
  /// Make the configured generation current and delete superseded ones
  Activate,
  /// Serve one request through the cache-first policy (body to stdout)
  Fetch {
    /// Absolute URL, or a path resolved against the configured origin
    url: String,
    #[arg(short, long, default_value = "GET")]
    method: String,
    /// Treat as a top-level navigation (offline shell fallback applies)
    #[arg(long)]
    navigate: bool,
  },
  /// List stored generations and their entry counts
  Status,
  /// Deliver a connectivity-restored signal for a sync tag
  Sync { tag: String },
  /// Deliver a push message and render the resulting notification
  Push { payload: Option<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = init_logging()?;

  let config = Config::load(args.config.as_deref())?;
  let store = SqliteStore::open()?;
  let fetcher = HttpFetcher::new(&config.origin)?;
  let gateway = Gateway::new(&config, store, fetcher)?;
  let worker = Worker::new(
    gateway,
    SyncBridge::new(LogSyncHandler),
    PushBridge::new(LogSink, config.notification.clone()),
  );

  match args.command {
    Command::Install => {
      worker.dispatch(GatewayEvent::Install).await?;
      eprintln!("installed generation {}", config.version);
    }
    Command::Activate => {
      worker.dispatch(GatewayEvent::Activate).await?;
      eprintln!("active generation: {}", config.version);
    }
    Command::Fetch {
      url,
      method,
      navigate,
    } => {
      let resolved = config.resolve(&url)?;
      let req = if navigate {
        // Navigations are always GET
        Request::navigation(resolved)
      } else {
        Request::new(resolved, Method::parse(&method)?)
      };

      let outcome = worker.dispatch(GatewayEvent::Fetch(req)).await?;
      let resp = match outcome {
        EventOutcome::Response(resp) => resp,
        other => return Err(eyre!("fetch produced no response: {:?}", other)),
      };

      eprintln!("{} {} ({:?})", resp.status, resp.status_text, resp.kind);
      std::io::stdout()
        .write_all(&resp.body)
        .map_err(|e| eyre!("Failed to write response body: {}", e))?;
      worker.gateway().drain_refills().await;
    }
    Command::Status => {
      let store = worker.gateway().store();
      let tags = store.list_generations()?;
      if tags.is_empty() {
        println!("no generations stored");
      }
      for tag in tags {
        let marker = if tag == config.version { " (current)" } else { "" };
        println!("{}  {} entries{}", tag, store.entry_count(&tag)?, marker);
      }
    }
    Command::Sync { tag } => {
      // A single CLI run has no page to register the tag, so queue it
      // before simulating the connectivity-restored delivery.
      worker.sync().register(&tag);
      worker.dispatch(GatewayEvent::Sync { tag }).await?;
    }
    Command::Push { payload } => {
      let payload = payload.map(String::into_bytes).unwrap_or_default();
      worker.dispatch(GatewayEvent::Push { payload }).await?;
    }
  }

  Ok(())
}

/// Route logs to a file under the user data dir; stdout belongs to fetched
/// response bodies.
fn init_logging() -> Result<tracing_appender::non_blocking::WorkerGuard> {
  let log_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?
    .join("offgate")
    .join("logs");

  std::fs::create_dir_all(&log_dir)
    .map_err(|e| eyre!("Failed to create log directory: {}", e))?;

  let appender = tracing_appender::rolling::daily(log_dir, "offgate.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_env("OFFGATE_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .with_writer(writer)
    .with_ansi(false)
    .init();

  info!("logging initialized");
  Ok(guard)
}
