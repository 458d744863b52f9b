//! fnforge CLI
//!
//! Builds, validates and inspects serverless function artifacts.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// fnforge - function artifacts from typed programs
#[derive(Parser)]
#[command(name = "fnforge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file or project directory
    #[arg(short, long, default_value = "fnforge.yaml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new fnforge project
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,

        /// Project name (defaults to directory name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Generate shims and package the functions artifact
    Build {
        /// Build a native executable
        #[arg(long)]
        native: bool,

        /// Artifact directory (overrides the configured one)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Check bindings without writing anything
    Validate,

    /// Inspect extracted functions
    Functions {
        #[command(subcommand)]
        command: FunctionCommands,
    },
}

#[derive(Subcommand)]
enum FunctionCommands {
    /// List all functions
    List,

    /// Print a function's descriptor
    Show {
        /// Function name
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Init { path, name } => {
            commands::init::run(&path, name.as_deref()).await?;
        }
        Commands::Build { native, output } => {
            commands::build::run(&cli.config, native, output.as_deref()).await?;
        }
        Commands::Validate => {
            commands::validate::run(&cli.config).await?;
        }
        Commands::Functions { command } => match command {
            FunctionCommands::List => {
                commands::functions::list(&cli.config).await?;
            }
            FunctionCommands::Show { name } => {
                commands::functions::show(&cli.config, &name).await?;
            }
        },
    }

    Ok(())
}
