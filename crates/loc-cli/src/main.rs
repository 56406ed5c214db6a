use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "loc")]
#[command(about = "Location source orchestration CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> overrides)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Print the activation plan a tier resolves to, as JSON
    Plan {
        /// high | balanced | low | none, or a numeric priority code
        #[arg(long)]
        tier: String,

        #[arg(long, default_value_t = 0)]
        interval_ms: u64,

        /// Layered config paths in merge order (default: $LOC_CONFIG)
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Best last-known reading of a recorded track
    Last {
        #[command(flatten)]
        replay: commands::ReplayArgs,
    },

    /// Stream readings of a recorded track as JSON lines
    Watch {
        #[command(flatten)]
        replay: commands::ReplayArgs,

        /// Defaults to runtime.default_tier
        #[arg(long)]
        tier: Option<String>,

        #[arg(long, default_value_t = 0)]
        interval_ms: u64,

        /// Stop after this many readings
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Last known location, falling back to one high accuracy fix
    Locate {
        #[command(flatten)]
        replay: commands::ReplayArgs,

        /// Bound for the fallback fix (default: runtime.timeout_ms)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // dev-time convenience; absent file is fine
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let loaded = loc_config::load_layered_yaml(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Plan {
            tier,
            interval_ms,
            config_paths,
        } => {
            let (_, settings) = commands::load_settings(&config_paths)?;
            commands::plan::print_plan(&tier, interval_ms, &settings)?;
        }

        Commands::Last { replay } => commands::track::last(&replay).await?,

        Commands::Watch {
            replay,
            tier,
            interval_ms,
            limit,
        } => commands::track::watch(&replay, tier.as_deref(), interval_ms, limit).await?,

        Commands::Locate { replay, timeout_ms } => {
            commands::track::locate(&replay, timeout_ms).await?
        }
    }

    Ok(())
}

/// Logs go to stderr; stdout carries command output only.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
