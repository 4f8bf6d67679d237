use colored::Colorize;
use imageforge_build::Artifact;
use imageforge_cloud::CloudApi;
use imageforge_cloud_gridscale::{ClientConfig, GridscaleClient};
use std::sync::Arc;

/// Delete a template using credentials from the environment
pub async fn handle(template_id: &str) -> anyhow::Result<()> {
    let api: Arc<dyn CloudApi> = Arc::new(GridscaleClient::new(ClientConfig::from_env()?));

    let template = api.get_template(template_id).await?;
    let artifact = Artifact::new(
        template.name,
        template.id,
        vec![template.location_name],
        Arc::clone(&api),
    );

    println!("{} {}", "Destroying".yellow().bold(), artifact);
    artifact.destroy().await?;
    println!("{} {}", "✓ Destroyed".green().bold(), artifact.id());
    Ok(())
}
