//! Build state shared between pipeline steps
//!
//! Every well-known key has its own typed field. A step writes only the
//! keys it owns and reads whatever earlier steps produced; `get`-style
//! accessors fail with [`BuildError::MissingState`] when the key was never
//! written.

use crate::communicator::RemoteSession;
use crate::error::{BuildError, CleanupError, Result};
use std::fmt;

/// Well-known state keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKey {
    SshKeyId,
    SshPrivateKey,
    ServerId,
    StorageId,
    SecondaryStorageId,
    IpId,
    ServerIp,
    Session,
    SnapshotName,
    SnapshotImageId,
    Regions,
}

impl StateKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateKey::SshKeyId => "ssh_key_id",
            StateKey::SshPrivateKey => "ssh_private_key",
            StateKey::ServerId => "server_id",
            StateKey::StorageId => "storage_id",
            StateKey::SecondaryStorageId => "secondary_storage_id",
            StateKey::IpId => "ip_id",
            StateKey::ServerIp => "server_ip",
            StateKey::Session => "session",
            StateKey::SnapshotName => "snapshot_name",
            StateKey::SnapshotImageId => "snapshot_image_id",
            StateKey::Regions => "regions",
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! string_keys {
    ($($field:ident, $put:ident, $opt:ident => $key:ident;)*) => {
        $(
            pub fn $put(&mut self, value: impl Into<String>) {
                self.$field = Some(value.into());
            }

            pub fn $field(&self) -> Result<&str> {
                self.$field
                    .as_deref()
                    .ok_or(BuildError::MissingState(StateKey::$key))
            }

            pub fn $opt(&self) -> Option<&str> {
                self.$field.as_deref()
            }
        )*
    };
}

/// Mutable state of one build
#[derive(Default)]
pub struct BuildState {
    ssh_key_id: Option<String>,
    ssh_private_key: Option<String>,
    server_id: Option<String>,
    storage_id: Option<String>,
    secondary_storage_id: Option<String>,
    ip_id: Option<String>,
    server_ip: Option<String>,
    session: Option<Box<dyn RemoteSession>>,
    snapshot_name: Option<String>,
    snapshot_image_id: Option<String>,
    regions: Option<Vec<String>>,
    error: Option<BuildError>,
    cleanup_errors: Vec<CleanupError>,
}

impl BuildState {
    pub fn new() -> Self {
        Self::default()
    }

    string_keys! {
        ssh_key_id, put_ssh_key_id, get_ssh_key_id => SshKeyId;
        ssh_private_key, put_ssh_private_key, get_ssh_private_key => SshPrivateKey;
        server_id, put_server_id, get_server_id => ServerId;
        storage_id, put_storage_id, get_storage_id => StorageId;
        secondary_storage_id, put_secondary_storage_id, get_secondary_storage_id => SecondaryStorageId;
        ip_id, put_ip_id, get_ip_id => IpId;
        server_ip, put_server_ip, get_server_ip => ServerIp;
        snapshot_name, put_snapshot_name, get_snapshot_name => SnapshotName;
        snapshot_image_id, put_snapshot_image_id, get_snapshot_image_id => SnapshotImageId;
    }

    pub fn put_regions(&mut self, regions: Vec<String>) {
        self.regions = Some(regions);
    }

    pub fn regions(&self) -> Result<&[String]> {
        self.regions
            .as_deref()
            .ok_or(BuildError::MissingState(StateKey::Regions))
    }

    pub fn put_session(&mut self, session: Box<dyn RemoteSession>) {
        self.session = Some(session);
    }

    pub fn session(&self) -> Result<&dyn RemoteSession> {
        self.session
            .as_deref()
            .ok_or(BuildError::MissingState(StateKey::Session))
    }

    pub fn take_session(&mut self) -> Option<Box<dyn RemoteSession>> {
        self.session.take()
    }

    /// Record the build error. The first error wins.
    pub fn put_error(&mut self, error: BuildError) {
        match self.error {
            Some(ref existing) => {
                tracing::warn!("Ignoring error after '{}': {}", existing, error);
            }
            None => self.error = Some(error),
        }
    }

    pub fn error(&self) -> Option<&BuildError> {
        self.error.as_ref()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn take_error(&mut self) -> Option<BuildError> {
        self.error.take()
    }

    pub fn record_cleanup_error(&mut self, error: CleanupError) {
        self.cleanup_errors.push(error);
    }

    pub fn cleanup_errors(&self) -> &[CleanupError] {
        &self.cleanup_errors
    }

    pub fn take_cleanup_errors(&mut self) -> Vec<CleanupError> {
        std::mem::take(&mut self.cleanup_errors)
    }
}
