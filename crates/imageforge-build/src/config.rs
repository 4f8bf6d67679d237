//! Build configuration
//!
//! A build is described by a single `image` node in a KDL file:
//!
//! ```kdl
//! image "base-image" {
//!     credentials {
//!         api-key "user-uuid"
//!         api-token "token"
//!     }
//!     server {
//!         cores 2
//!         memory 4
//!         storage-capacity 10
//!         template-uuid "4db64bfc-9fb2-4976-80b5-94ff43b1233a"
//!         tags "imageforge" "ci"
//!     }
//!     template-name "base-image"
//!     ssh {
//!         username "root"
//!         timeout-secs 300
//!     }
//!     provision {
//!         shell "apt-get update"
//!         script "scripts/setup.sh"
//!     }
//! }
//! ```
//!
//! Values left out of the file fall back to environment variables
//! (`GRIDSCALE_UUID`, `GRIDSCALE_TOKEN`, `GRIDSCALE_URL`) and then to
//! built-in defaults. Every validation problem is reported at once.

use crate::error::ConfigError;
use kdl::{KdlDocument, KdlNode};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

pub const DEFAULT_API_URL: &str = "https://api.gridscale.io";
pub const DEFAULT_SSH_USERNAME: &str = "root";
pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_SSH_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// User UUID sent as `X-Auth-UserId`
    pub api_key: String,
    pub api_token: String,
    pub api_url: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_token", &"<redacted>")
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub name: String,
    pub cores: u32,
    /// GiB
    pub memory: u32,
    /// GiB
    pub storage_capacity: u32,
    pub template_uuid: String,
    pub hostname: Option<String>,
    pub password: Option<String>,
    /// Attach an extra unbootable storage of the same capacity
    pub secondary_storage: bool,
    pub iso_image_uuid: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshSettings {
    pub username: String,
    pub port: u16,
    /// Overrides the address assigned to the server
    pub host: Option<String>,
    pub timeout: Duration,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            username: DEFAULT_SSH_USERNAME.to_string(),
            port: DEFAULT_SSH_PORT,
            host: None,
            timeout: DEFAULT_SSH_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiSettings {
    pub request_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// One provisioning action run on the build server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provisioner {
    /// Inline shell command
    Shell(String),
    /// Local script file, uploaded through stdin
    Script(PathBuf),
}

impl Provisioner {
    pub fn name(&self) -> String {
        match self {
            Provisioner::Shell(command) => {
                let first_line = command.lines().next().unwrap_or_default();
                format!("shell: {}", first_line)
            }
            Provisioner::Script(path) => format!("script: {}", path.display()),
        }
    }

    /// The shell text to run remotely
    pub async fn script(&self) -> std::io::Result<String> {
        match self {
            Provisioner::Shell(command) => Ok(command.clone()),
            Provisioner::Script(path) => tokio::fs::read_to_string(path).await,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub build_name: String,
    pub credentials: Credentials,
    pub server: ServerSettings,
    pub template_name: String,
    pub ssh: SshSettings,
    pub provisioners: Vec<Provisioner>,
    pub debug: bool,
    pub debug_key_path: PathBuf,
    pub api: ApiSettings,
}

impl BuildConfig {
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// Values as written in the file, before defaults and validation
#[derive(Debug, Default)]
struct RawConfig {
    build_name: String,
    api_key: Option<String>,
    api_token: Option<String>,
    api_url: Option<String>,
    server_name: Option<String>,
    cores: Option<u32>,
    memory: Option<u32>,
    storage_capacity: Option<u32>,
    template_uuid: Option<String>,
    hostname: Option<String>,
    password: Option<String>,
    secondary_storage: bool,
    iso_image_uuid: Option<String>,
    tags: Vec<String>,
    template_name: Option<String>,
    ssh: SshSettings,
    provisioners: Vec<Provisioner>,
    debug: bool,
    debug_key_path: Option<PathBuf>,
    api: ApiSettings,
}

/// Load and validate a configuration file
pub fn load_config(path: &Path) -> ConfigResult<BuildConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    tracing::debug!("Loading build configuration from {}", path.display());
    parse_config(&content, base_dir)
}

/// Parse configuration text; relative script paths resolve against `base_dir`
pub fn parse_config(content: &str, base_dir: &Path) -> ConfigResult<BuildConfig> {
    let doc: KdlDocument = content.parse()?;

    let image = doc
        .nodes()
        .iter()
        .find(|node| node.name().value() == "image")
        .ok_or(ConfigError::MissingImage)?;

    let raw = parse_image(image, base_dir)?;
    finalize(raw)
}

fn parse_image(node: &KdlNode, base_dir: &Path) -> ConfigResult<RawConfig> {
    let mut raw = RawConfig {
        build_name: first_string(node).unwrap_or_else(|| "imageforge".to_string()),
        ..Default::default()
    };

    let Some(children) = node.children() else {
        return Ok(raw);
    };

    for child in children.nodes() {
        match child.name().value() {
            "credentials" => parse_credentials(child, &mut raw),
            "server" => parse_server(child, &mut raw)?,
            "template-name" | "template_name" => raw.template_name = first_string(child),
            "ssh" => parse_ssh(child, &mut raw.ssh)?,
            "provision" => parse_provision(child, base_dir, &mut raw.provisioners),
            "debug" => raw.debug = flag(child),
            "debug-key-path" | "debug_key_path" => {
                raw.debug_key_path = first_string(child).map(PathBuf::from);
            }
            "api" => parse_api(child, &mut raw.api)?,
            other => tracing::warn!("Unknown configuration node `{}` ignored", other),
        }
    }

    Ok(raw)
}

fn parse_credentials(node: &KdlNode, raw: &mut RawConfig) {
    for child in node.iter_children() {
        match child.name().value() {
            "api-key" | "api_key" => raw.api_key = first_string(child),
            "api-token" | "api_token" => raw.api_token = first_string(child),
            "api-url" | "api_url" => raw.api_url = first_string(child),
            other => tracing::warn!("Unknown credentials entry `{}` ignored", other),
        }
    }
}

fn parse_server(node: &KdlNode, raw: &mut RawConfig) -> ConfigResult<()> {
    for child in node.iter_children() {
        match child.name().value() {
            "name" => raw.server_name = first_string(child),
            "cores" => raw.cores = first_u32(child)?,
            "memory" => raw.memory = first_u32(child)?,
            "storage-capacity" | "storage_capacity" => raw.storage_capacity = first_u32(child)?,
            "template-uuid" | "template_uuid" => raw.template_uuid = first_string(child),
            "hostname" => raw.hostname = first_string(child),
            "password" => raw.password = first_string(child),
            "secondary-storage" | "secondary_storage" => raw.secondary_storage = flag(child),
            "iso-image-uuid" | "iso_image_uuid" => raw.iso_image_uuid = first_string(child),
            "tags" => {
                raw.tags = child
                    .entries()
                    .iter()
                    .filter_map(|e| e.value().as_string().map(|s| s.to_string()))
                    .collect();
            }
            other => tracing::warn!("Unknown server entry `{}` ignored", other),
        }
    }
    Ok(())
}

fn parse_ssh(node: &KdlNode, ssh: &mut SshSettings) -> ConfigResult<()> {
    for child in node.iter_children() {
        match child.name().value() {
            "username" => {
                if let Some(username) = first_string(child) {
                    ssh.username = username;
                }
            }
            "port" => {
                if let Some(port) = first_integer(child)? {
                    ssh.port = u16::try_from(port).map_err(|_| invalid(child, "not a port"))?;
                }
            }
            "host" => ssh.host = first_string(child),
            "timeout-secs" | "timeout_secs" => {
                if let Some(secs) = first_u64(child)? {
                    ssh.timeout = Duration::from_secs(secs);
                }
            }
            other => tracing::warn!("Unknown ssh entry `{}` ignored", other),
        }
    }
    Ok(())
}

fn parse_provision(node: &KdlNode, base_dir: &Path, provisioners: &mut Vec<Provisioner>) {
    for child in node.iter_children() {
        let Some(value) = first_string(child) else {
            tracing::warn!("Provisioner `{}` has no value", child.name().value());
            continue;
        };
        match child.name().value() {
            "shell" => provisioners.push(Provisioner::Shell(value)),
            "script" => {
                let path = PathBuf::from(value);
                let path = if path.is_absolute() {
                    path
                } else {
                    base_dir.join(path)
                };
                provisioners.push(Provisioner::Script(path));
            }
            other => tracing::warn!("Unknown provisioner `{}` ignored", other),
        }
    }
}

fn parse_api(node: &KdlNode, api: &mut ApiSettings) -> ConfigResult<()> {
    for child in node.iter_children() {
        match child.name().value() {
            "request-timeout-secs" | "request_timeout_secs" => {
                if let Some(secs) = first_u64(child)? {
                    api.request_timeout = Duration::from_secs(secs);
                }
            }
            "poll-interval-ms" | "poll_interval_ms" => {
                if let Some(ms) = first_u64(child)? {
                    api.poll_interval = Duration::from_millis(ms);
                }
            }
            other => tracing::warn!("Unknown api entry `{}` ignored", other),
        }
    }
    Ok(())
}

/// Apply environment and built-in defaults, then validate
fn finalize(raw: RawConfig) -> ConfigResult<BuildConfig> {
    let api_key = raw.api_key.or_else(|| env_var("GRIDSCALE_UUID"));
    let api_token = raw.api_token.or_else(|| env_var("GRIDSCALE_TOKEN"));
    let api_url = raw
        .api_url
        .or_else(|| env_var("GRIDSCALE_URL"))
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    let mut errors = Vec::new();
    if api_token.is_none() {
        errors.push("api-token must be specified (or set GRIDSCALE_TOKEN)".to_string());
    }
    if api_key.is_none() {
        errors.push("api-key must be specified (or set GRIDSCALE_UUID)".to_string());
    }
    if raw.template_uuid.is_none() {
        errors.push("server template-uuid must be specified".to_string());
    }
    for (key, value) in [
        ("cores", raw.cores),
        ("memory", raw.memory),
        ("storage-capacity", raw.storage_capacity),
    ] {
        if value.unwrap_or(0) == 0 {
            errors.push(format!("server {} must be greater than 0", key));
        }
    }
    if raw.ssh.username.is_empty() {
        errors.push("ssh username must not be empty".to_string());
    }
    if raw.api.poll_interval.is_zero() {
        errors.push("api poll-interval-ms must be greater than 0".to_string());
    }

    if !errors.is_empty() {
        return Err(ConfigError::Invalid(errors));
    }

    let template_name = raw
        .template_name
        .unwrap_or_else(|| format!("imageforge-{}", chrono::Utc::now().timestamp()));
    let server_name = raw
        .server_name
        .unwrap_or_else(|| format!("imageforge-{}", uuid::Uuid::new_v4()));
    let debug_key_path = raw
        .debug_key_path
        .unwrap_or_else(|| PathBuf::from(format!("gs_{}.pem", raw.build_name)));

    Ok(BuildConfig {
        credentials: Credentials {
            api_key: api_key.unwrap_or_default(),
            api_token: api_token.unwrap_or_default(),
            api_url,
        },
        server: ServerSettings {
            name: server_name,
            cores: raw.cores.unwrap_or_default(),
            memory: raw.memory.unwrap_or_default(),
            storage_capacity: raw.storage_capacity.unwrap_or_default(),
            template_uuid: raw.template_uuid.unwrap_or_default(),
            hostname: raw.hostname,
            password: raw.password,
            secondary_storage: raw.secondary_storage,
            iso_image_uuid: raw.iso_image_uuid,
            tags: raw.tags,
        },
        build_name: raw.build_name,
        template_name,
        ssh: raw.ssh,
        provisioners: raw.provisioners,
        debug: raw.debug,
        debug_key_path,
        api: raw.api,
    })
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn first_string(node: &KdlNode) -> Option<String> {
    node.entries()
        .first()
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn first_integer(node: &KdlNode) -> ConfigResult<Option<i128>> {
    match node.entries().first() {
        None => Ok(None),
        Some(entry) => entry
            .value()
            .as_integer()
            .map(Some)
            .ok_or_else(|| invalid(node, "expected an integer")),
    }
}

fn first_u32(node: &KdlNode) -> ConfigResult<Option<u32>> {
    first_integer(node)?
        .map(|v| u32::try_from(v).map_err(|_| invalid(node, "out of range")))
        .transpose()
}

fn first_u64(node: &KdlNode) -> ConfigResult<Option<u64>> {
    first_integer(node)?
        .map(|v| u64::try_from(v).map_err(|_| invalid(node, "out of range")))
        .transpose()
}

/// A bare node name counts as `#true`
fn flag(node: &KdlNode) -> bool {
    node.entries()
        .first()
        .and_then(|e| e.value().as_bool())
        .unwrap_or(true)
}

fn invalid(node: &KdlNode, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: node.name().value().to_string(),
        message: message.to_string(),
    }
}

trait NodeChildren {
    fn iter_children(&self) -> std::slice::Iter<'_, KdlNode>;
}

impl NodeChildren for KdlNode {
    fn iter_children(&self) -> std::slice::Iter<'_, KdlNode> {
        self.children()
            .map(|children| children.nodes())
            .unwrap_or(&[])
            .iter()
    }
}
