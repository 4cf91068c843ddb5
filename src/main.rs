use anyhow::{Context, Result};
use hn_relay::clock::{Clock, SystemClock};
use hn_relay::config::Config;
use hn_relay::engine::format::MessageFormat;
use hn_relay::engine::{ItemDispatcher, Reconciler, RetentionSweeper};
use hn_relay::feed::hacker_news::HackerNewsApi;
use hn_relay::queue::{ActionKind, HandlerRegistry, InMemoryTaskQueue, RetryPolicy, WorkerGroup};
use hn_relay::store::file::JsonFileStore;
use hn_relay::store::memory::MemoryStore;
use hn_relay::store::StoryStore;
use hn_relay::telegram::rest::TelegramRest;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: hn-relay [run|poll|cleanup] [--dry-run]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Scheduler loop until Ctrl-C.
    Run,
    Poll,
    Cleanup,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<(Command, bool)> {
    let mut command = None;
    let mut dry_run = false;
    for arg in args {
        match arg.as_str() {
            "--dry-run" => dry_run = true,
            "run" | "poll" | "cleanup" if command.is_some() => {
                anyhow::bail!("more than one command given\n{}", USAGE)
            }
            "run" => command = Some(Command::Run),
            "poll" => command = Some(Command::Poll),
            "cleanup" => command = Some(Command::Cleanup),
            other => anyhow::bail!("unknown argument: {}\n{}", other, USAGE),
        }
    }
    Ok((command.unwrap_or(Command::Run), dry_run))
}

struct App {
    queue: InMemoryTaskQueue,
    registry: Arc<HandlerRegistry>,
    reconciler: Reconciler,
    sweeper: RetentionSweeper,
}

async fn build(config: &Config, dry_run: bool) -> Result<App> {
    let token = match Config::bot_token() {
        Ok(token) => token,
        Err(_) if dry_run => String::new(),
        Err(e) => return Err(e),
    };

    let hn = Arc::new(HackerNewsApi::new(&config.feed.api_base));
    let channel = Arc::new(TelegramRest::new(&config.telegram.api_base, token, dry_run));
    let store: Arc<dyn StoryStore> = match &config.store.path {
        // synthetic message ids must not reach the real store
        Some(_) if dry_run => Arc::new(MemoryStore::new()),
        Some(path) => Arc::new(
            JsonFileStore::open(path)
                .await
                .with_context(|| format!("opening story store {}", path))?,
        ),
        None => {
            tracing::warn!("store.path not set, records will not survive restarts");
            Arc::new(MemoryStore::new())
        }
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let queue = InMemoryTaskQueue::new(RetryPolicy::from_config(&config.queue));
    let budget = config.schedule.cycle_budget();

    let dispatcher = Arc::new(ItemDispatcher::new(
        hn.clone(),
        store.clone(),
        channel,
        clock.clone(),
        MessageFormat::from_config(config),
        config.filter.clone(),
        budget,
    ));
    let mut registry = HandlerRegistry::new();
    for kind in ActionKind::ALL {
        registry.register(kind, dispatcher.clone())?;
    }
    registry.ensure_complete()?;

    let reconciler = Reconciler::new(
        hn,
        store.clone(),
        Arc::new(queue.clone()),
        config.feed.batch_size,
        budget,
    );
    let sweeper = RetentionSweeper::new(
        store,
        Arc::new(queue.clone()),
        clock,
        config.schedule.retention(),
        budget,
    );

    Ok(App { queue, registry: Arc::new(registry), reconciler, sweeper })
}

async fn run_scheduler(app: &App, config: &Config) {
    let mut poll = tokio::time::interval(config.schedule.poll_interval());
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut cleanup = tokio::time::interval(config.schedule.cleanup_interval());
    cleanup.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = poll.tick() => {
                if let Err(e) = app.reconciler.run_poll().await {
                    let reason = format!("{:#}", e);
                    tracing::error!(error = %reason, "poll cycle failed");
                }
            }
            _ = cleanup.tick() => {
                if let Err(e) = app.sweeper.run_sweep().await {
                    let reason = format!("{:#}", e);
                    tracing::error!(error = %reason, "sweep failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown requested");
                break;
            }
        }
        let counts = app.queue.counts();
        tracing::debug!(
            queued = counts.queued,
            running = counts.running,
            retry_scheduled = counts.retry_scheduled,
            dead = counts.dead,
            "queue status"
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load saved keys from .env (real env vars take precedence)
    Config::load_env_file();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hn_relay=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let (command, dry_run) = parse_args(std::env::args().skip(1))?;
    let config = Config::load(Path::new(&Config::default_path()))?;
    if dry_run {
        tracing::info!("dry run: no messages will be sent, edited or deleted");
    }

    let app = build(&config, dry_run).await?;
    let workers = WorkerGroup::spawn(config.queue.workers, app.queue.clone(), app.registry.clone());

    match command {
        Command::Run => run_scheduler(&app, &config).await,
        Command::Poll => {
            let report = app.reconciler.run_poll().await?;
            tracing::info!(?report, "waiting for tasks to finish");
            app.queue.wait_idle(Duration::from_millis(200)).await;
        }
        Command::Cleanup => {
            let report = app.sweeper.run_sweep().await?;
            tracing::info!(?report, "waiting for tasks to finish");
            app.queue.wait_idle(Duration::from_millis(200)).await;
        }
    }

    workers.shutdown_and_join().await;
    let counts = app.queue.counts();
    tracing::info!(succeeded = counts.succeeded, dead = counts.dead, "stopped");
    Ok(())
}
