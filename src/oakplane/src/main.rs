use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use oakplane_config::{FileConfig, RegistryEngine, StoreEngine, load_config};
use oakplane_control_sync::{HttpRegistryPublisher, MemoryRegistry, RegistryPublisher, WatchFeed};
use oakplane_core::ResourceKind;
use oakplane_memory::{Memory, Store, StoreRead};
use oakplane_release::{ControlPlane, spawn_watch_worker};
use oakplane_tracing::{Options, SpanSink};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(version, about = "OakPlane - API gateway control plane")]
struct Args {
    /// Path to config file (yaml/json/toml)
    #[arg(short, long, default_value = "./config.yaml")]
    config: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve: keep the store open and ingest gateway node heartbeats.
    Run,
    /// Push the current configuration of a resource to the registry.
    Release { kind: ResourceKind, id: String },
    /// Print the registry document a resource renders to.
    Show { kind: ResourceKind, id: String },
}

fn open_store(file: &FileConfig) -> Result<Store> {
    let memory = match file.store.engine {
        StoreEngine::Lmdb => Memory::open_lmdb(&file.store.path)
            .with_context(|| format!("open lmdb store at {}", file.store.path))?,
        StoreEngine::Memory => {
            warn!("in-memory store selected; nothing survives a restart");
            Memory::memory()
        }
    };
    Ok(Store::new(memory))
}

fn publisher(file: &FileConfig) -> Result<Arc<dyn RegistryPublisher>> {
    Ok(match file.registry.engine {
        RegistryEngine::Http => Arc::new(
            HttpRegistryPublisher::new(&file.registry.url, &file.registry.key_prefix, file.registry.timeout())
                .context("build registry publisher")?,
        ),
        RegistryEngine::Memory => Arc::new(MemoryRegistry::new()),
    })
}

async fn run(plane: ControlPlane, file: &FileConfig) -> Result<()> {
    let (tx, worker) = spawn_watch_worker(plane, file.watch.capacity);

    let feed = match file.watch.feed_url()? {
        Some(url) => {
            info!(%url, "polling watch feed");
            let feed = WatchFeed::new(url, file.watch.poll_interval(), file.watch.timeout())
                .context("build watch feed client")?;
            Some(tokio::spawn(async move { feed.run(tx).await }))
        }
        None => {
            info!("no watch feed configured");
            drop(tx);
            None
        }
    };

    signal::ctrl_c().await.context("wait for ctrl-c")?;
    info!("Shutting down");
    if let Some(feed) = feed {
        feed.abort();
    }
    worker.abort();
    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let file = load_config(&args.config)?;

    let spans = match file.tracing.otlp_endpoint() {
        Some(endpoint) => SpanSink::Otlp(endpoint),
        None if file.tracing.stdout_spans => SpanSink::Stdout,
        None => SpanSink::Off,
    };
    let telemetry = oakplane_tracing::init(&Options {
        service_name: &file.tracing.service_name,
        level: &file.tracing.level,
        format: &file.tracing.format,
        spans,
    })?;
    info!(name = %file.controlplane.name, command = ?args.command, "OakPlane starting");

    let store = Arc::new(open_store(&file)?);
    let publisher = publisher(&file)?;
    info!(engine = store.memory().engine_name(), registry = publisher.name(), "control plane ready");
    let plane = ControlPlane::new(store, publisher);

    let outcome = execute(plane, &file, args.command).await;
    telemetry.shutdown();
    outcome
}

async fn execute(plane: ControlPlane, file: &FileConfig, command: Command) -> Result<()> {
    match command {
        Command::Run => run(plane, file).await,
        Command::Release { kind, id } => {
            plane.release(kind, &id).await.with_context(|| format!("release {kind} {id}"))?;
            info!(%kind, %id, "released");
            Ok(())
        }
        Command::Show { kind, id } => {
            let document = plane.document(kind, &id).with_context(|| format!("render {kind} {id}"))?;
            println!("{}", serde_json::to_string_pretty(&document)?);
            Ok(())
        }
    }
}
