//! Entry point: native-messaging host plus a few one-shot commands.

use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use handoff_core::bridge::OUTGOING_QUEUE;
use handoff_core::constants::{DEFAULT_AGENT_URL, DIRECT_SUBMIT_TIMEOUT, PROBE_TIMEOUT, SUBMIT_TIMEOUT};
use handoff_core::engine::is_eligible_url;
use handoff_core::{
    AgentApi, AgentClient, AvailabilityPolicy, Bridge, BridgeHost, BrowserDownloads, CheckOrder,
    Database, EndpointStyle, EngineSettings, HostUi, InterceptionEngine, MemoryModeStore,
    ModeController, ModeStore, SharedMode, SqliteModeStore, SuspendStrategy,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

mod app_config;
mod cli;

use app_config::FileConfig;
use cli::{Args, Command, ModeAction};

/// Effective settings after merging defaults, config file and CLI flags.
#[derive(Debug, Clone)]
struct Settings {
    agent_url: String,
    endpoint: EndpointStyle,
    availability_policy: AvailabilityPolicy,
    check_order: CheckOrder,
    suspend_strategy: SuspendStrategy,
    submit_timeout: Duration,
    direct_submit_timeout: Duration,
    database_path: Option<PathBuf>,
    log_level: &'static str,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let file_config = if args.no_config {
        None
    } else {
        app_config::load_default_file_config()?.config
    };
    let settings = resolve_settings(&args, file_config.as_ref())?;

    // Priority: RUST_LOG env var > CLI flags > config verbosity > default (info)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(settings.log_level));

    // stdout carries the native-messaging protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    debug!(?args, ?settings, "CLI arguments parsed");

    match args.command {
        None => run_host(&settings).await,
        Some(Command::Ping) => ping(&settings).await,
        Some(Command::Send { url }) => send(&settings, &url).await,
        Some(Command::Mode { action }) => mode(&settings, action.unwrap_or(ModeAction::Show)).await,
    }
}

fn resolve_settings(args: &Args, file: Option<&FileConfig>) -> Result<Settings> {
    let file = file.cloned().unwrap_or_default();

    let agent_url = args
        .agent_url
        .clone()
        .or(file.agent_url)
        .unwrap_or_else(|| DEFAULT_AGENT_URL.to_string());
    app_config::validate_agent_url(&agent_url)?;

    let log_level = if args.quiet {
        "error"
    } else if args.verbose > 0 {
        if args.verbose == 1 { "debug" } else { "trace" }
    } else {
        file.verbosity.map_or("info", |verbosity| verbosity.log_level())
    };

    Ok(Settings {
        agent_url,
        endpoint: args.submit_endpoint.or(file.submit_endpoint).unwrap_or_default(),
        availability_policy: args
            .availability_policy
            .or(file.availability_policy)
            .unwrap_or_default(),
        check_order: args.check_order.or(file.check_order).unwrap_or_default(),
        suspend_strategy: args
            .suspend_strategy
            .or(file.suspend_strategy)
            .unwrap_or_default(),
        submit_timeout: file
            .submit_timeout_ms
            .map_or(SUBMIT_TIMEOUT, Duration::from_millis),
        direct_submit_timeout: file
            .direct_submit_timeout_ms
            .map_or(DIRECT_SUBMIT_TIMEOUT, Duration::from_millis),
        database_path: args
            .db
            .clone()
            .or(file.database_path)
            .or_else(app_config::resolve_default_database_path),
        log_level,
    })
}

async fn open_database(path: &Path) -> Result<Database> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory '{}'", parent.display()))?;
    }
    Database::new(path)
        .await
        .with_context(|| format!("Failed to open settings database '{}'", path.display()))
}

async fn open_store(settings: &Settings) -> Result<Arc<dyn ModeStore>> {
    let Some(path) = settings.database_path.as_deref() else {
        bail!("No settings database location; pass --db or set HOME");
    };
    Ok(Arc::new(SqliteModeStore::new(open_database(path).await?)))
}

fn agent_client(settings: &Settings) -> Result<AgentClient> {
    AgentClient::new(&settings.agent_url, settings.endpoint)
        .with_context(|| format!("Failed to create agent client for '{}'", settings.agent_url))
}

async fn run_host(settings: &Settings) -> Result<()> {
    info!(
        agent = %settings.agent_url,
        policy = %settings.availability_policy,
        check_order = %settings.check_order,
        strategy = %settings.suspend_strategy,
        "native messaging host starting"
    );

    // A broken settings store must not keep downloads from being handled.
    let store: Arc<dyn ModeStore> = match open_store(settings).await {
        Ok(store) => store,
        Err(error) => {
            warn!(error = %format!("{error:#}"), "settings store unavailable; mode will not persist");
            Arc::new(MemoryModeStore::new())
        }
    };

    let agent = Arc::new(agent_client(settings)?);
    let (frames_tx, frames_rx) = mpsc::channel(OUTGOING_QUEUE);
    let host = Arc::new(BridgeHost::new(settings.suspend_strategy, frames_tx));
    let browser: Arc<dyn BrowserDownloads> = Arc::clone(&host) as Arc<dyn BrowserDownloads>;
    let ui: Arc<dyn HostUi> = Arc::clone(&host) as Arc<dyn HostUi>;

    let engine = Arc::new(InterceptionEngine::new(
        browser,
        ui,
        agent,
        Arc::new(SharedMode::default()),
        settings.availability_policy,
        EngineSettings {
            check_order: settings.check_order,
            submit_timeout: settings.submit_timeout,
        },
    ));
    let controller = Arc::new(
        ModeController::new(&engine, store).with_direct_timeout(settings.direct_submit_timeout),
    );

    Bridge::new(host, engine, controller)
        .run(tokio::io::stdin(), tokio::io::stdout(), frames_rx)
        .await
        .context("Native messaging connection failed")?;

    info!("native messaging host stopped");
    Ok(())
}

async fn ping(settings: &Settings) -> Result<()> {
    let agent = agent_client(settings)?;
    agent
        .ping(PROBE_TIMEOUT)
        .await
        .with_context(|| format!("Download manager at {} is not reachable", settings.agent_url))?;
    println!("download manager reachable at {}", settings.agent_url);
    Ok(())
}

async fn send(settings: &Settings, url: &str) -> Result<()> {
    if !is_eligible_url(url) {
        bail!("Cannot send '{url}': only http, https and ftp links can be handed over");
    }

    let mode = match open_store(settings).await {
        Ok(store) => store.load().await,
        Err(error) => {
            warn!(error = %format!("{error:#}"), "settings store unavailable; using default mode");
            handoff_core::Mode::default()
        }
    };

    let agent = agent_client(settings)?;
    agent
        .submit(url, mode, settings.direct_submit_timeout)
        .await
        .with_context(|| format!("Download manager did not accept '{url}'"))?;
    println!("sent {url} ({})", mode.title());
    Ok(())
}

async fn mode(settings: &Settings, action: ModeAction) -> Result<()> {
    let store = open_store(settings).await?;
    let mode = match action {
        ModeAction::Show => store.load().await,
        ModeAction::Cycle => {
            let next = store.load().await.next();
            store.save(next).await.context("Failed to save mode")?;
            next
        }
        ModeAction::Set { mode } => {
            store.save(mode).await.context("Failed to save mode")?;
            mode
        }
    };
    println!("{mode}");
    Ok(())
}
