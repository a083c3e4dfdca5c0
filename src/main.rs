use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use seabrief::core::log::init_logging;

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

impl From<Commands> for seabrief::AppCommand {
    fn from(cmd: Commands) -> seabrief::AppCommand {
        match cmd {
            Commands::Run { name, country } => seabrief::AppCommand::Run { name, country },
            Commands::Check => seabrief::AppCommand::Check,
            Commands::Prune { days } => seabrief::AppCommand::Prune { days },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Push briefings to the configured groups
    Run {
        /// Run only the bot with this name
        #[arg(long)]
        name: Option<String>,

        /// Run only the bot for this country code (e.g. PH)
        #[arg(long)]
        country: Option<String>,
    },
    /// Check configuration and upstream API connectivity
    Check,
    /// Drop stale exchange-rate history records
    Prune {
        /// Retention in days
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => seabrief::run_command(cmd.into(), cli.config_path.as_deref()).await,
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

    let path = seabrief::config::AppConfig::default_config_path()?;

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let default_config = r#"---
bots:
  - name: "Manila briefing"
    country: "PH"
    city: "Manila"
    latitude: 14.6
    longitude: 120.9
    currency: "PHP"
    currency_name: "Philippine Peso"
    groups: []

groups: []

providers:
  weather:
    base_url: "https://api.open-meteo.com"
  exchange:
    base_url: "http://op.juhe.cn"
    api_key: ""
  # news:
  #   api_key: ""
  # dingtalk:
  #   client_id: ""
  #   client_secret: ""

monitor:
  change_threshold: 5.0
  rate_min: 0.01
  rate_max: 10000.0
"#;

    std::fs::write(&path, default_config)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}
