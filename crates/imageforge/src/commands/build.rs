use colored::Colorize;
use imageforge_build::{Builder, ConsoleUi, SshCommunicator, load_config};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub async fn handle(
    config_path: &Path,
    debug: bool,
    cancel_after_secs: Option<u64>,
) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if debug {
        config = config.with_debug(true);
    }

    println!(
        "{} {}",
        "Building".green().bold(),
        config.build_name.cyan()
    );

    let api = Arc::new(super::client_for(&config));
    let ui = Arc::new(ConsoleUi::with_prefix(&config.build_name));
    let mut builder = Builder::new(config, api, Arc::new(SshCommunicator::new()), ui);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("{}", "Interrupted, cleaning up...".yellow());
                cancel.cancel();
            }
        });
    }
    if let Some(secs) = cancel_after_secs {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            tracing::warn!("Cancelling build after {}s", secs);
            cancel.cancel();
        });
    }

    let result = builder.run(&cancel).await;

    let cleanup_errors = builder.cleanup_errors();
    if !cleanup_errors.is_empty() {
        eprintln!();
        eprintln!(
            "{}",
            "Some resources could not be destroyed:".yellow().bold()
        );
        for err in cleanup_errors {
            eprintln!("  {} {}", "!".red(), err);
        }
    }

    let artifact = result?;
    println!();
    println!("{}", "✓ Build finished".green().bold());
    println!("  {}", artifact);
    println!("  Artifact ID: {}", artifact.id().cyan());
    Ok(())
}
