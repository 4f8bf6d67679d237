mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "forge")]
#[command(about = "Build reusable gridscale templates from a KDL description", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a template
    Build {
        /// Path to the build configuration (KDL)
        config: PathBuf,
        /// Save the temporary SSH key next to the build
        #[arg(short, long)]
        debug: bool,
        /// Cancel the build after this many seconds (cleanup still runs)
        #[arg(long, value_name = "SECS")]
        cancel_after_secs: Option<u64>,
    },
    /// Validate a build configuration without touching the cloud
    Validate {
        /// Path to the build configuration (KDL)
        config: PathBuf,
    },
    /// Delete a template produced by an earlier build
    Destroy {
        /// Template UUID
        template_id: String,
    },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match cli.command {
        Commands::Build {
            config,
            debug,
            cancel_after_secs,
        } => commands::build::handle(&config, debug, cancel_after_secs).await,
        Commands::Validate { config } => commands::validate::handle(&config),
        Commands::Destroy { template_id } => commands::destroy::handle(&template_id).await,
        Commands::Version => {
            println!("imageforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
