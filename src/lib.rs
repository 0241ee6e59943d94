pub mod auth;
pub mod cli;
pub mod config;
pub mod fields;
pub mod ingest;
pub mod model;
pub mod normalize;
pub mod server;
pub mod store;
pub mod summary;

use std::{env, fs, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::cli::{Cli, Commands, IngestArgs, InitDbArgs, ServeArgs};
use crate::config::AppConfig;
use crate::store::RecordStore;

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("avance_dashboard", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => handle_serve(&args),
        Commands::InitDb(args) => handle_init_db(&args),
        Commands::Ingest(args) => handle_ingest(&args),
    }
}

fn handle_serve(args: &ServeArgs) -> Result<()> {
    ensure_parent_dir(&args.database)?;
    let config = AppConfig::from_serve_args(args);
    let runtime = tokio::runtime::Runtime::new().context("Starting async runtime")?;
    runtime.block_on(server::serve(config))
}

fn handle_init_db(args: &InitDbArgs) -> Result<()> {
    ensure_parent_dir(&args.database)?;
    let store = RecordStore::open(&args.database)?;
    store.init_schema()?;
    auth::ensure_initial_admin(&store, args.admin_code.as_deref())?;
    info!("Base de datos inicializada en {:?}", args.database);
    Ok(())
}

fn handle_ingest(args: &IngestArgs) -> Result<()> {
    ensure_parent_dir(&args.database)?;
    let mut store = RecordStore::open(&args.database)?;
    store.init_schema()?;
    let bytes = fs::read(&args.input)
        .with_context(|| format!("Reading input file {:?}", args.input))?;
    let filename = args
        .input
        .file_name()
        .and_then(|name| name.to_str())
        .map(String::from);
    let summary = ingest::ingest_csv(&mut store, filename.as_deref(), &bytes)?;
    info!(
        "Carga procesada: {} insertado(s), {} actualizado(s), {} en total",
        summary.inserted, summary.updated, summary.total
    );
    Ok(())
}

fn ensure_parent_dir(path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Creating data directory {parent:?}"))?;
    }
    Ok(())
}
