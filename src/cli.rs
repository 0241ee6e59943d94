use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Internal dashboard for hardware-upgrade tracking", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the dashboard HTTP server
    Serve(ServeArgs),
    /// Create the database schema and bootstrap the initial admin user
    InitDb(InitDbArgs),
    /// Load one CSV file into the record store without going through HTTP
    Ingest(IngestArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// SQLite database file
    #[arg(long, env = "AVANCE_DATABASE", default_value = "data/dashboard.db")]
    pub database: PathBuf,
    /// Address to bind the HTTP server to
    #[arg(long, env = "AVANCE_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,
    /// Initial admin password, used once while no admin user exists
    #[arg(long, env = "AVANCE_ADMIN_CODE", hide_env_values = true)]
    pub admin_code: Option<String>,
    /// Directory with the dashboard front-end assets
    #[arg(long, default_value = "static")]
    pub static_dir: PathBuf,
}

#[derive(Debug, Args)]
pub struct InitDbArgs {
    /// SQLite database file
    #[arg(long, env = "AVANCE_DATABASE", default_value = "data/dashboard.db")]
    pub database: PathBuf,
    /// Initial admin password, used once while no admin user exists
    #[arg(long, env = "AVANCE_ADMIN_CODE", hide_env_values = true)]
    pub admin_code: Option<String>,
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Input CSV file to load
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// SQLite database file
    #[arg(long, env = "AVANCE_DATABASE", default_value = "data/dashboard.db")]
    pub database: PathBuf,
}
