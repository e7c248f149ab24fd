//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    collections::BTreeMap,
    net::SocketAddr,
    num::NonZeroUsize,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::domain::server::ServerAddress;
use crate::messaging::{Credentials, MessagingMode};

mod cli;

pub use cli::{CliArgs, Command, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "cairn";
const ENV_PREFIX: &str = "CAIRN";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_CALL_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_DOCUMENT_EXTENSION: &str = "aspx";
const DEFAULT_VIRTUAL_ROOT: &str = "/";
const DEFAULT_ROUTE_CACHE_LIMIT: usize = 500;
const DEFAULT_RESERVED_URLS: &[&str] = &["/_cairn/health"];
const DEFAULT_RESERVED_PATHS: &[&str] = &["/_cairn/", "/static/"];

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub messaging: MessagingSettings,
    pub routing: RoutingSettings,
    pub content: ContentSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct MessagingSettings {
    pub distributed_enabled: bool,
    pub mode: MessagingMode,
    pub servers: Vec<ServerAddress>,
    pub credentials: Option<Credentials>,
    pub call_timeout: Duration,
    pub application_id: String,
}

#[derive(Debug, Clone)]
pub struct RoutingSettings {
    pub reserved_urls: Vec<String>,
    pub reserved_paths: Vec<String>,
    pub document_extension: String,
    pub virtual_root: String,
}

#[derive(Debug, Clone)]
pub struct ContentSettings {
    pub snapshot_path: Option<PathBuf>,
    pub hide_top_level_node_from_path: bool,
    pub route_cache_limit: NonZeroUsize,
    /// Lower-cased host → root node id.
    pub domains: BTreeMap<String, i32>,
}

impl ContentSettings {
    /// Root node id configured for `host` (port ignored), or 0.
    pub fn root_for_host(&self, host: &str) -> i32 {
        let host = host.split(':').next().unwrap_or_default().to_lowercase();
        self.domains.get(&host).copied().unwrap_or(0)
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("messaging.servers")
            .with_list_parse_key("routing.reserved_urls")
            .with_list_parse_key("routing.reserved_paths")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    messaging: RawMessagingSettings,
    routing: RawRoutingSettings,
    content: RawContentSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(enabled) = overrides.messaging_distributed {
            self.messaging.distributed_enabled = Some(enabled);
        }
        if let Some(mode) = overrides.messaging_mode {
            self.messaging.mode = Some(mode);
        }
        if let Some(path) = overrides.content_snapshot.as_ref() {
            self.content.snapshot_path = Some(path.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            messaging,
            routing,
            content,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let messaging = build_messaging_settings(messaging)?;
        let routing = build_routing_settings(routing)?;
        let content = build_content_settings(content)?;

        Ok(Self {
            server,
            logging,
            messaging,
            routing,
            content,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }
    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;
    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_messaging_settings(
    messaging: RawMessagingSettings,
) -> Result<MessagingSettings, LoadError> {
    let servers = messaging
        .servers
        .unwrap_or_default()
        .iter()
        .filter(|value| !value.trim().is_empty())
        .map(|value| {
            value
                .parse::<ServerAddress>()
                .map_err(|err| LoadError::invalid("messaging.servers", err.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let username = non_empty(messaging.username);
    let password = non_empty(messaging.password);
    let credentials = match (username, password) {
        (Some(username), Some(password)) => Some(Credentials { username, password }),
        (None, None) => None,
        _ => {
            return Err(LoadError::invalid(
                "messaging.username",
                "username and password must be set together",
            ));
        }
    };

    let call_timeout_ms = messaging
        .call_timeout_ms
        .unwrap_or(DEFAULT_CALL_TIMEOUT_MS);
    if call_timeout_ms == 0 {
        return Err(LoadError::invalid(
            "messaging.call_timeout_ms",
            "must be greater than zero",
        ));
    }

    let application_id = non_empty(messaging.application_id)
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());

    Ok(MessagingSettings {
        distributed_enabled: messaging.distributed_enabled.unwrap_or(false),
        mode: messaging.mode.unwrap_or_default(),
        servers,
        credentials,
        call_timeout: Duration::from_millis(call_timeout_ms),
        application_id,
    })
}

fn build_routing_settings(routing: RawRoutingSettings) -> Result<RoutingSettings, LoadError> {
    let document_extension = routing
        .document_extension
        .unwrap_or_else(|| DEFAULT_DOCUMENT_EXTENSION.to_string())
        .trim()
        .trim_start_matches('.')
        .to_lowercase();
    if document_extension.is_empty() || document_extension.contains(['.', '/']) {
        return Err(LoadError::invalid(
            "routing.document_extension",
            "must be a bare file extension",
        ));
    }

    let virtual_root = routing
        .virtual_root
        .unwrap_or_else(|| DEFAULT_VIRTUAL_ROOT.to_string());
    if !virtual_root.trim().starts_with('/') {
        return Err(LoadError::invalid(
            "routing.virtual_root",
            "must be an absolute path",
        ));
    }

    Ok(RoutingSettings {
        reserved_urls: routing
            .reserved_urls
            .unwrap_or_else(|| owned(DEFAULT_RESERVED_URLS)),
        reserved_paths: routing
            .reserved_paths
            .unwrap_or_else(|| owned(DEFAULT_RESERVED_PATHS)),
        document_extension,
        virtual_root,
    })
}

fn build_content_settings(content: RawContentSettings) -> Result<ContentSettings, LoadError> {
    let snapshot_path = content
        .snapshot_path
        .filter(|path| !path.as_os_str().is_empty());
    let route_cache_limit =
        NonZeroUsize::new(content.route_cache_limit.unwrap_or(DEFAULT_ROUTE_CACHE_LIMIT))
            .unwrap_or(NonZeroUsize::MIN);

    let mut domains = BTreeMap::new();
    for (host, root_id) in content.domains.unwrap_or_default() {
        if root_id <= 0 {
            return Err(LoadError::invalid(
                "content.domains",
                format!("root node id for `{host}` must be positive"),
            ));
        }
        domains.insert(host.trim().to_lowercase(), root_id);
    }

    Ok(ContentSettings {
        snapshot_path,
        hide_top_level_node_from_path: content.hide_top_level_node_from_path.unwrap_or(true),
        route_cache_limit,
        domains,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMessagingSettings {
    distributed_enabled: Option<bool>,
    mode: Option<MessagingMode>,
    servers: Option<Vec<String>>,
    username: Option<String>,
    password: Option<String>,
    call_timeout_ms: Option<u64>,
    application_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRoutingSettings {
    reserved_urls: Option<Vec<String>>,
    reserved_paths: Option<Vec<String>>,
    document_extension: Option<String>,
    virtual_root: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentSettings {
    snapshot_path: Option<PathBuf>,
    hide_top_level_node_from_path: Option<bool>,
    route_cache_limit: Option<usize>,
    domains: Option<BTreeMap<String, i32>>,
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
