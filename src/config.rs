//! Startup configuration, resolved once from CLI flags and environment
//! variables and passed explicitly to the pieces that need it.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::cli::ServeArgs;

/// Upload size ceiling for the CSV endpoint.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite database file backing records and users.
    pub database: PathBuf,
    /// Address the HTTP server binds to.
    pub bind: SocketAddr,
    /// Bootstrap password for the initial `admin` account; consumed
    /// only while no admin user exists.
    pub admin_code: Option<String>,
    /// Directory with the dashboard front-end assets.
    pub static_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_serve_args(args: &ServeArgs) -> Self {
        Self {
            database: args.database.clone(),
            bind: args.bind,
            admin_code: args.admin_code.clone(),
            static_dir: args.static_dir.clone(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}
