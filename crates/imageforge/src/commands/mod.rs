pub mod build;
pub mod destroy;
pub mod validate;

use imageforge_build::BuildConfig;
use imageforge_cloud_gridscale::{ClientConfig, GridscaleClient};

/// API client for the credentials of a build
pub fn client_for(config: &BuildConfig) -> GridscaleClient {
    let credentials = &config.credentials;
    GridscaleClient::new(
        ClientConfig::new(&credentials.api_key, &credentials.api_token)
            .with_api_url(&credentials.api_url)
            .with_request_timeout(config.api.request_timeout)
            .with_poll_interval(config.api.poll_interval),
    )
}
