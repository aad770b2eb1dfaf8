//! Application configuration: CLI flags override environment variables;
//! secrets are env-only and checked eagerly at startup.

use anyhow::{Context, Result, bail};
use clap::Parser;
use secrecy::SecretString;
use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    /// Operator secret the vault key is derived from. Required, non-empty.
    pub vault_secret: SecretString,
    /// Secret bearer tokens are signed with. Required, non-empty.
    pub token_secret: SecretString,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Encrypted file vault API")]
pub struct Args {
    /// Host to bind to (overrides FILE_VAULT_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides FILE_VAULT_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where encrypted blobs are stored (overrides FILE_VAULT_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides FILE_VAULT_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Resolve the full configuration, returning it with the migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();

        let port = match args.port {
            Some(port) => port,
            None => match env::var("FILE_VAULT_PORT") {
                Ok(raw) => raw
                    .parse::<u16>()
                    .with_context(|| format!("FILE_VAULT_PORT value `{raw}` is not a port"))?,
                Err(_) => 3000,
            },
        };

        let cfg = Self {
            host: args.host.unwrap_or_else(|| env_or("FILE_VAULT_HOST", "0.0.0.0")),
            port,
            storage_dir: args
                .storage_dir
                .unwrap_or_else(|| env_or("FILE_VAULT_STORAGE_DIR", "./data/blobs")),
            database_url: args.database_url.unwrap_or_else(|| {
                env_or("FILE_VAULT_DATABASE_URL", "sqlite://./data/meta/file_vault.db")
            }),
            // The process refuses to start without its secrets rather than
            // failing on first use.
            vault_secret: required_secret("FILE_VAULT_SECRET")?,
            token_secret: required_secret("FILE_VAULT_TOKEN_SECRET")?,
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn required_secret(name: &str) -> Result<SecretString> {
    let value = env::var(name).with_context(|| format!("{name} must be set"))?;
    if value.is_empty() {
        bail!("{name} must not be empty");
    }
    Ok(SecretString::from(value))
}
