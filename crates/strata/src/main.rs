use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use strata::bus::LoggingBus;
use strata::config::Config;
use strata::consumer::{ExternalEventConsumer, Registration};
use strata::demo_data::generate_demo_groups;
use strata::events::{EventDispatcher, HandlerRegistry};
use strata::object_store::LocalObjectStore;
use strata::shutdown::Shutdown;
use strata::snapshot::{
    ExportQueue, SnapshotRefreshHandler, SnapshotService, CLASSIFICATION_AGGREGATE,
};
use strata_core::bus::EventBus;
use strata_core::cache::Cache;
use strata_core::events::{AggregateRef, DomainEvent};
use strata_core::snapshot::{SnapshotFile, SnapshotView};
use strata_core::storage::SnapshotRepository;

/// Strata - Tiered snapshot cache with domain event propagation
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve the snapshot through cache, object store and repository and print it
    Get {
        /// Include inactive groups, categories and items
        #[arg(long)]
        include_inactive: bool,
    },
    /// Rebuild the cached snapshot from the repository and announce the change
    Refresh,
    /// Print the latest exported version
    Version {
        #[arg(long)]
        include_inactive: bool,
    },
    /// Export the repository state to the object store now
    Export {
        #[arg(long)]
        include_inactive: bool,
    },
    /// Consume external events until Ctrl+C or SIGTERM
    Consume,
}

/// Everything the commands run against.
struct Components {
    service: Arc<SnapshotService>,
    exports: Arc<ExportQueue>,
    dispatcher: EventDispatcher,
    bus: Arc<dyn EventBus>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Initialize tracing subscriber; stdout is reserved for command output
    let text = (!config.log_json)
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    let json = config
        .log_json
        .then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "strata=info".into()),
        )
        .with(text)
        .with(json)
        .init();

    let process = Shutdown::new();
    let components = build(&config, process.clone()).await?;

    let outcome = run(cli.command, &config, &components, process).await;

    // Let exports queued by cold reads finish before exiting.
    components
        .exports
        .shutdown(config.shutdown_timeout())
        .await;

    outcome
}

async fn build(config: &Config, process: Shutdown) -> Result<Components> {
    let cache = create_cache(config).await?;
    let objects = Arc::new(LocalObjectStore::new(&config.storage_root).await?);
    let repository = create_repository(config).await?;

    tracing::info!(
        storage_root = %config.storage_root.display(),
        bucket = %config.bucket_name,
        "Object store ready"
    );

    let service = SnapshotService::new(
        cache,
        objects,
        repository,
        config.cache_keys(),
        config.object_layout(),
        config.cache_ttl(),
    )
    .with_export_source(&config.service_name);
    let exports = Arc::new(ExportQueue::start(
        service.exporter(),
        config.export_queue_capacity,
        process,
    ));
    let service = Arc::new(service.with_export_queue(exports.clone()));

    let bus = create_bus(config).await?;
    let dispatcher =
        EventDispatcher::new(HandlerRegistry::new()).with_bus(bus.clone(), config.enable_publishing);

    Ok(Components {
        service,
        exports,
        dispatcher,
        bus,
    })
}

async fn run(
    command: Command,
    config: &Config,
    components: &Components,
    process: Shutdown,
) -> Result<()> {
    let service = &components.service;

    match command {
        Command::Get { include_inactive } => {
            let view = SnapshotView::from_include_inactive(include_inactive);
            let snapshot = service.get_snapshot(view).await?;
            let file = SnapshotFile::from_snapshot(&snapshot, &config.service_name, Utc::now());
            print_bytes(&file.to_json_pretty()?)?;
        }
        Command::Refresh => {
            let snapshot = service.refresh_snapshot().await?;
            let event = DomainEvent::updated(AggregateRef::new(
                CLASSIFICATION_AGGREGATE,
                SnapshotView::ActiveOnly,
            ));
            components.dispatcher.dispatch(vec![event]).await?;
            println!(
                "Refreshed snapshot: {} groups, {} categories, {} items",
                snapshot.group_count(),
                snapshot.category_count(),
                snapshot.item_count()
            );
        }
        Command::Version { include_inactive } => {
            let view = SnapshotView::from_include_inactive(include_inactive);
            match service.get_version_for(view).await {
                Some(version) => println!("{version}"),
                None => println!("No exported version for view {view}"),
            }
        }
        Command::Export { include_inactive } => {
            let view = SnapshotView::from_include_inactive(include_inactive);
            if !service.export_view(view).await {
                bail!("Export of view {view} failed, see logs");
            }
            if let Some(version) = service.get_version_for(view).await {
                println!("Exported {version}");
            }
        }
        Command::Consume => {
            let refresh = Arc::new(SnapshotRefreshHandler::new(service.clone()));
            let event_type =
                DomainEvent::updated(AggregateRef::new(CLASSIFICATION_AGGREGATE, "")).type_name();
            let consumer = ExternalEventConsumer::new(
                components.bus.clone(),
                config.enable_consuming,
            )
            .register(Registration::new("snapshot-refresh", event_type, refresh));

            tokio::spawn(shutdown_signal(process.clone()));
            consumer.run(process).await?;
        }
    }

    Ok(())
}

fn print_bytes(bytes: &[u8]) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(bytes)?;
    writeln!(stdout)?;
    Ok(())
}

#[cfg(not(feature = "redis"))]
async fn create_cache(config: &Config) -> Result<Arc<dyn Cache>> {
    Ok(Arc::new(strata::cache::MemoryCache::new(
        config.cache_max_entries,
    )))
}

#[cfg(feature = "redis")]
async fn create_cache(config: &Config) -> Result<Arc<dyn Cache>> {
    let cache = strata::cache::RedisCache::new(&config.redis_url).await?;
    tracing::info!(url = %config.redis_url, "Connected to Redis cache");
    Ok(Arc::new(cache))
}

#[cfg(not(feature = "sqlite"))]
async fn create_repository(_config: &Config) -> Result<Arc<dyn SnapshotRepository>> {
    Ok(Arc::new(strata::storage::InMemoryRepository::with_groups(
        generate_demo_groups(),
    )))
}

#[cfg(feature = "sqlite")]
async fn create_repository(config: &Config) -> Result<Arc<dyn SnapshotRepository>> {
    let repository = strata::storage::SqliteRepository::new(&config.sqlite_path).await?;
    if repository.is_empty().await? {
        tracing::info!(path = %config.sqlite_path, "Seeding empty database with demo data");
        repository.upsert_groups(generate_demo_groups()).await?;
    }
    Ok(Arc::new(repository))
}

/// Without a broker, publishing and consuming are only logged.
#[cfg(not(feature = "redis"))]
async fn create_bus(config: &Config) -> Result<Arc<dyn EventBus>> {
    Ok(Arc::new(LoggingBus::new(config.topic_mappings.clone())))
}

#[cfg(feature = "redis")]
async fn create_bus(config: &Config) -> Result<Arc<dyn EventBus>> {
    use strata::bus::{PubSubBus, RedisStreamTransport};

    if !config.enable_publishing && !config.enable_consuming {
        return Ok(Arc::new(LoggingBus::new(config.topic_mappings.clone())));
    }

    let transport = RedisStreamTransport::new(
        &config.redis_url,
        &config.consumer_name,
        config.max_delivery_attempts,
    )
    .await?;
    Ok(Arc::new(PubSubBus::new(transport, config.pubsub_settings())))
}

/// Wait for shutdown signals (Ctrl+C or SIGTERM) and trigger `shutdown`.
async fn shutdown_signal(shutdown: Shutdown) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }

    shutdown.trigger();
}
