use crate::error::ConfigError;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use url::Url;

pub const DEFAULT_LISTEN_PORT: u16 = 7000;
pub const DEFAULT_TARGET_URL: &str = "http://localhost:7890";

#[derive(Parser, Debug, Default)]
#[command(name = "pathproxy")]
#[command(about = "A single-target HTTP reverse proxy with an optional path allow-list")]
pub struct Args {
    #[arg(
        short = 'p',
        long = "listen-port",
        alias = "listenPort",
        help = "Port to listen on [default: 7000]"
    )]
    pub listen_port: Option<u16>,

    #[arg(
        short = 't',
        long = "target-url",
        alias = "targetUrl",
        help = "Target base URL to proxy to [default: http://localhost:7890]"
    )]
    pub target_url: Option<String>,

    #[arg(
        short = 'e',
        long = "endpoint",
        alias = "allowed-path",
        help = "Only forward requests whose path equals this exactly"
    )]
    pub endpoint: Option<String>,

    #[arg(short = 'c', long = "config", help = "Path to a TOML config file")]
    pub config: Option<PathBuf>,

    #[arg(long = "print-config", help = "Print the resolved config as TOML and exit")]
    pub print_config: bool,
}

/// On-disk form of the configuration. Every key is optional; command-line
/// flags win over file values.
#[derive(Deserialize, Serialize, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_path: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Resolved startup configuration. Built once, then shared read-only by
/// every request handler.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyConfig {
    pub listen_port: u16,
    pub target: Url,
    /// `None` means every path is forwarded.
    pub allowed_path: Option<String>,
}

impl ProxyConfig {
    pub fn resolve(args: &Args) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(args, file)
    }

    fn merge(args: &Args, file: FileConfig) -> Result<Self, ConfigError> {
        let listen_port = args
            .listen_port
            .or(file.listen_port)
            .unwrap_or(DEFAULT_LISTEN_PORT);

        let target_url = args
            .target_url
            .clone()
            .or(file.target_url)
            .unwrap_or_else(|| DEFAULT_TARGET_URL.to_string());
        let target = parse_target(&target_url)?;

        let allowed_path = args
            .endpoint
            .clone()
            .or(file.allowed_path)
            .filter(|path| !path.is_empty());

        Ok(Self {
            listen_port,
            target,
            allowed_path,
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.listen_port))
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        let file = FileConfig {
            listen_port: Some(self.listen_port),
            target_url: Some(self.target.to_string()),
            allowed_path: self.allowed_path.clone(),
        };
        toml::to_string_pretty(&file)
    }
}

pub fn parse_target(raw: &str) -> Result<Url, ConfigError> {
    if raw.is_empty() {
        return Err(ConfigError::MissingTarget);
    }
    Url::parse(raw).map_err(|source| ConfigError::InvalidTarget {
        url: raw.to_string(),
        source,
    })
}
