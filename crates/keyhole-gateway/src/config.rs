use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const SERVER_ADDRESS_ENV: &str = "SERVER_ADDRESS";
pub const BASE_URL_ENV: &str = "BASE_URL";
pub const ENABLE_HTTPS_ENV: &str = "ENABLE_HTTPS";
pub const USE_GRPC_ENV: &str = "USE_GRPC";
pub const FILE_STORAGE_PATH_ENV: &str = "FILE_STORAGE_PATH";
pub const DATABASE_DSN_ENV: &str = "DATABASE_DSN";
pub const USER_KEY_ENV: &str = "USER_KEY";
pub const AUTH_KEY_ENV: &str = "AUTH_KEY";
pub const TRUSTED_SUBNET_ENV: &str = "TRUSTED_SUBNET";
pub const CONFIG_ENV: &str = "CONFIG";

pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:8080";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_FILE_STORAGE_PATH: &str = "keyhole_storage.json";
pub const DEFAULT_USER_KEY: &str = "keyhole_user_secret";
pub const DEFAULT_AUTH_KEY: &str = "user";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    File(#[from] std::io::Error),
    #[error("could not parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid base url: {0}")]
    BaseUrl(#[from] url::ParseError),
}

/// Command line / environment options. Every field is optional so the
/// precedence merge can tell "set" apart from "defaulted".
#[derive(Debug, Default, Parser)]
#[command(name = "keyhole", about = "URL shortening service")]
pub struct Cli {
    /// Listen endpoint.
    #[arg(short = 'a', long, env = SERVER_ADDRESS_ENV)]
    pub server_address: Option<String>,

    /// Scheme and host prefixed to short identifiers.
    #[arg(short = 'b', long, env = BASE_URL_ENV)]
    pub base_url: Option<String>,

    /// HTTPS front-end selection (termination is not handled in-process).
    #[arg(short = 's', long, env = ENABLE_HTTPS_ENV)]
    pub enable_https: Option<bool>,

    /// Serve the gRPC front instead of HTTP.
    #[arg(long, env = USE_GRPC_ENV)]
    pub use_grpc: Option<bool>,

    /// Journal file path; selects the file back-end when no DSN is given.
    #[arg(short = 'f', long, env = FILE_STORAGE_PATH_ENV)]
    pub file_storage_path: Option<String>,

    /// Postgres connection string; selects the relational back-end.
    #[arg(short = 'd', long, env = DATABASE_DSN_ENV)]
    pub database_dsn: Option<String>,

    /// Secret the identity encryption key is derived from.
    #[arg(long, env = USER_KEY_ENV)]
    pub user_key: Option<String>,

    /// Cookie / metadata name carrying the user token.
    #[arg(long, env = AUTH_KEY_ENV)]
    pub auth_key: Option<String>,

    /// CIDR admitted to the internal stats endpoint.
    #[arg(short = 't', long, env = TRUSTED_SUBNET_ENV)]
    pub trusted_subnet: Option<String>,

    /// JSON config file consulted below flags and environment.
    #[arg(short = 'c', long, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,
}

/// JSON config file contents; any subset of the options may appear.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server_address: Option<String>,
    pub base_url: Option<String>,
    pub enable_https: Option<bool>,
    pub use_grpc: Option<bool>,
    pub file_storage_path: Option<String>,
    pub database_dsn: Option<String>,
    pub user_key: Option<String>,
    pub auth_key: Option<String>,
    pub trusted_subnet: Option<String>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub base_url: Url,
    pub enable_https: bool,
    pub use_grpc: bool,
    pub file_storage_path: String,
    /// Empty means "use the file back-end".
    pub database_dsn: Option<String>,
    pub user_key: String,
    pub auth_key: String,
    pub trusted_subnet: Option<String>,
}

impl Config {
    /// Loads configuration with precedence CLI flag > environment > JSON
    /// config file > built-in default. Flags and environment are resolved
    /// together by clap; the file fills whatever they left unset.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = Cli::parse();
        let file = match &cli.config {
            Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
            None => FileConfig::default(),
        };
        Self::merge(cli, file)
    }

    /// Merges already-parsed sources; split out for tests.
    pub fn merge(cli: Cli, file: FileConfig) -> Result<Self, ConfigError> {
        let base_url = cli
            .base_url
            .or(file.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let database_dsn = cli
            .database_dsn
            .or(file.database_dsn)
            .filter(|dsn| !dsn.is_empty());

        Ok(Self {
            server_address: cli
                .server_address
                .or(file.server_address)
                .unwrap_or_else(|| DEFAULT_SERVER_ADDRESS.to_string()),
            base_url: Url::parse(&base_url)?,
            enable_https: cli.enable_https.or(file.enable_https).unwrap_or(false),
            use_grpc: cli.use_grpc.or(file.use_grpc).unwrap_or(false),
            file_storage_path: cli
                .file_storage_path
                .or(file.file_storage_path)
                .unwrap_or_else(|| DEFAULT_FILE_STORAGE_PATH.to_string()),
            database_dsn,
            user_key: cli
                .user_key
                .or(file.user_key)
                .unwrap_or_else(|| DEFAULT_USER_KEY.to_string()),
            auth_key: cli
                .auth_key
                .or(file.auth_key)
                .unwrap_or_else(|| DEFAULT_AUTH_KEY.to_string()),
            trusted_subnet: cli.trusted_subnet.or(file.trusted_subnet),
        })
    }
}
