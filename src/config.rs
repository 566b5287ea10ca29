use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: String,
    pub database_url: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "File upload & analysis API")]
pub struct Args {
    /// Host to bind to (overrides FILE_ANALYZER_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides FILE_ANALYZER_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory uploads are stored in (overrides FILE_ANALYZER_UPLOAD_DIR)
    #[arg(long)]
    pub upload_dir: Option<String>,

    /// Database URL (overrides FILE_ANALYZER_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("FILE_ANALYZER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("FILE_ANALYZER_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing FILE_ANALYZER_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3001,
            Err(err) => return Err(err).context("reading FILE_ANALYZER_PORT"),
        };
        let env_upload =
            env::var("FILE_ANALYZER_UPLOAD_DIR").unwrap_or_else(|_| "./uploads".into());
        let env_db = env::var("FILE_ANALYZER_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/files.db".into());

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            upload_dir: args.upload_dir.unwrap_or(env_upload),
            database_url: args.database_url.unwrap_or(env_db),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
