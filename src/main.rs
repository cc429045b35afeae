use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use mithqal::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for mithqal::AppCommand {
    fn from(cmd: Commands) -> mithqal::AppCommand {
        match cmd {
            Commands::Rates { codes } => mithqal::AppCommand::Rates(codes),
            Commands::Value { file } => mithqal::AppCommand::Value(file),
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display current exchange rates
    Rates {
        /// Currency codes to price; defaults to the configured catalog
        codes: Vec<String>,
    },
    /// Convert a YAML file of monetary entries into the base currency
    Value {
        /// Path to a YAML list of `{value, currency}` entries
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => mithqal::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

fn setup() -> anyhow::Result<()> {
    use anyhow::Context;

    let path = mithqal::core::config::AppConfig::default_config_path()?;

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let default_config = r#"---
base_currency: "USD"

cache:
  ttl_secs: 3600

providers:
  er_api:
    base_url: "https://open.er-api.com"
  frankfurter:
    base_url: "https://api.frankfurter.dev"
  coingecko:
    base_url: "https://api.coingecko.com"
  gold_api:
    base_url: "https://api.gold-api.com"
"#;

    std::fs::write(&path, default_config)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}
