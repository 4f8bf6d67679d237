//! Request and response types shared by all providers

use serde::{Deserialize, Serialize};

/// Handle of a freshly created remote object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Created {
    /// Provider-assigned object UUID
    pub id: String,
}

impl Created {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// A network the server can be attached to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    pub name: String,
}

/// Request for a new compute server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCreateRequest {
    pub name: String,

    /// Number of virtual cores
    pub cores: u32,

    /// Memory in GB
    pub memory: u32,

    /// Free-form labels attached to the server
    pub labels: Vec<String>,
}

/// Storage performance class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    Storage,
    StorageHigh,
    #[default]
    StorageInsane,
}

/// Template the storage is seeded from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageTemplate {
    pub template_uuid: String,

    /// Root password set on first boot
    pub password: Option<String>,

    pub hostname: Option<String>,

    /// UUIDs of registered SSH keys to authorize
    pub ssh_keys: Vec<String>,
}

/// Request for a new storage volume
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageCreateRequest {
    pub name: String,

    /// Capacity in GB
    pub capacity: u32,

    pub storage_type: StorageType,

    /// `None` creates an empty, unbootable volume
    pub template: Option<StorageTemplate>,
}

/// IP address family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpFamily {
    #[default]
    V4,
    V6,
}

impl IpFamily {
    pub fn as_number(&self) -> u8 {
        match self {
            IpFamily::V4 => 4,
            IpFamily::V6 => 6,
        }
    }
}

/// Request for a new public IP address
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IpCreateRequest {
    pub name: String,
    pub family: IpFamily,
}

/// A created IP address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAddress {
    pub id: String,

    /// The routable address, e.g. "185.201.147.12"
    pub address: String,
}

/// Request to register a public SSH key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshKeyCreateRequest {
    pub name: String,

    /// Single line in OpenSSH authorized_keys format
    pub public_key: String,
}

/// Request for a point-in-time storage snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotCreateRequest {
    pub name: String,
}

/// Request to promote a snapshot into a bootable template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateCreateRequest {
    pub name: String,
    pub snapshot_id: String,
}

/// A bootable template (image)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,

    /// Location (region) the template lives in
    pub location_name: String,
}
