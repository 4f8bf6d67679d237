//! imageforge Cloud API
//!
//! This crate defines the provider-neutral capability set the image builder
//! consumes: servers, storages, IP addresses, networks, SSH keys, snapshots
//! and templates.
//!
//! # Supported Providers
//!
//! - **gridscale**: REST API (see `imageforge-cloud-gridscale`)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  forge CLI                       │
//! │             (forge build/destroy)                │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               imageforge-build                   │
//! │     steps ─▶ runner ─▶ artifact                  │
//! └─────────────────┬───────────────────────────────┘
//!                   │ trait CloudApi { ... }
//! ┌─────────────────▼───────────────────────────────┐
//! │               imageforge-cloud                   │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//!           ┌───────▼───────┐
//!           │   gridscale   │
//!           │   provider    │
//!           └───────────────┘
//! ```

pub mod api;
pub mod error;
pub mod types;

// Re-exports
pub use api::CloudApi;
pub use error::{CloudError, Result};
pub use types::{
    Created, IpAddress, IpCreateRequest, IpFamily, Network, ServerCreateRequest,
    SnapshotCreateRequest, SshKeyCreateRequest, StorageCreateRequest, StorageTemplate,
    StorageType, Template, TemplateCreateRequest,
};
