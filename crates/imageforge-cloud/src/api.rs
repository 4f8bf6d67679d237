//! Cloud API capability set

use crate::error::Result;
use crate::types::{
    Created, IpAddress, IpCreateRequest, Network, ServerCreateRequest, SnapshotCreateRequest,
    SshKeyCreateRequest, StorageCreateRequest, Template, TemplateCreateRequest,
};
use async_trait::async_trait;

/// Remote operations the image builder needs from a provider
///
/// Every call is awaited to completion before the caller moves on. A call
/// that returns `Ok` has finished on the provider side; implementations
/// that talk to asynchronous APIs must wait for completion themselves.
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Returns the provider name (e.g., "gridscale")
    fn name(&self) -> &str;

    /// Look up the provider's public network
    async fn public_network(&self) -> Result<Network>;

    async fn create_server(&self, request: &ServerCreateRequest) -> Result<Created>;

    async fn delete_server(&self, server_id: &str) -> Result<()>;

    /// Power the server on
    async fn start_server(&self, server_id: &str) -> Result<()>;

    /// Hard power-off
    async fn stop_server(&self, server_id: &str) -> Result<()>;

    /// Graceful ACPI shutdown
    async fn shutdown_server(&self, server_id: &str) -> Result<()>;

    async fn create_storage(&self, request: &StorageCreateRequest) -> Result<Created>;

    async fn delete_storage(&self, storage_id: &str) -> Result<()>;

    async fn link_storage(&self, server_id: &str, storage_id: &str, bootdevice: bool)
    -> Result<()>;

    async fn unlink_storage(&self, server_id: &str, storage_id: &str) -> Result<()>;

    async fn create_ip(&self, request: &IpCreateRequest) -> Result<IpAddress>;

    async fn delete_ip(&self, ip_id: &str) -> Result<()>;

    async fn link_ip(&self, server_id: &str, ip_id: &str) -> Result<()>;

    async fn unlink_ip(&self, server_id: &str, ip_id: &str) -> Result<()>;

    async fn link_network(&self, server_id: &str, network_id: &str) -> Result<()>;

    async fn unlink_network(&self, server_id: &str, network_id: &str) -> Result<()>;

    async fn attach_iso_image(&self, server_id: &str, iso_image_id: &str) -> Result<()>;

    async fn create_ssh_key(&self, request: &SshKeyCreateRequest) -> Result<Created>;

    async fn delete_ssh_key(&self, ssh_key_id: &str) -> Result<()>;

    async fn create_snapshot(
        &self,
        storage_id: &str,
        request: &SnapshotCreateRequest,
    ) -> Result<Created>;

    async fn create_template(&self, request: &TemplateCreateRequest) -> Result<Created>;

    async fn get_template(&self, template_id: &str) -> Result<Template>;

    async fn delete_template(&self, template_id: &str) -> Result<()>;
}
