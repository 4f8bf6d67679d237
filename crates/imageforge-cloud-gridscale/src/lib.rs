//! gridscale provider for imageforge
//!
//! This crate implements the CloudApi trait for gridscale, talking to the
//! REST API directly.
//!
//! # Requirements
//!
//! - `GRIDSCALE_UUID` and `GRIDSCALE_TOKEN` (or explicit credentials)
//! - `GRIDSCALE_URL` optionally overrides the API endpoint
//!
//! # Example
//!
//! ```ignore
//! use imageforge_cloud::CloudApi;
//! use imageforge_cloud_gridscale::{ClientConfig, GridscaleClient};
//!
//! let client = GridscaleClient::new(ClientConfig::from_env()?);
//! let network = client.public_network().await?;
//! ```

pub mod client;
pub mod error;
pub mod provider;

pub use client::{ClientConfig, GRIDSCALE_API_BASE, GridscaleClient};
pub use error::{GridscaleError, Result};
