use colored::Colorize;
use imageforge_build::load_config;
use std::path::Path;

pub fn handle(config_path: &Path) -> anyhow::Result<()> {
    println!(
        "{} {}",
        "Validating".blue(),
        config_path.display().to_string().cyan()
    );

    let config = load_config(config_path)?;
    let server = &config.server;

    println!("{}", "✓ Configuration is valid".green().bold());
    println!();
    println!("Summary:");
    println!("  Build: {}", config.build_name.cyan());
    println!("  API: {}", config.credentials.api_url);
    println!(
        "  Server: {} ({} cores, {} GiB memory, {} GiB storage)",
        server.name, server.cores, server.memory, server.storage_capacity
    );
    println!("  Base template: {}", server.template_uuid);
    if server.secondary_storage {
        println!("  Secondary storage: yes");
    }
    if let Some(iso) = &server.iso_image_uuid {
        println!("  ISO image: {}", iso);
    }
    println!("  Template name: {}", config.template_name.cyan());
    println!(
        "  SSH: {}@{}:{}",
        config.ssh.username,
        config.ssh.host.as_deref().unwrap_or("<server ip>"),
        config.ssh.port
    );
    println!("  Provisioners: {}", config.provisioners.len());
    for provisioner in &config.provisioners {
        println!("    - {}", provisioner.name());
    }
    Ok(())
}
