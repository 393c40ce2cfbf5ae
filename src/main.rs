//! finroute - AI request routing and monthly cost governance
//!
//! A small service that sits between dashboard features and two inference
//! providers, picking a provider per request, enforcing a monthly spend
//! ceiling, and failing over transparently.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use finroute::api::run_server;
use finroute::config::Config;
use finroute::provider::Provider;
use finroute::router::{model_variant, RequestKind};
use finroute::storage;

#[derive(Parser)]
#[command(name = "finroute")]
#[command(about = "AI request routing and monthly cost governance")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the routing server
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,

        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Validate configuration file
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },

    /// Show the persisted usage ledger
    Usage {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "finroute=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, listen } => {
            let mut config = Config::from_file(&config)?;
            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "overriding listen address");
                config.server.listen = addr;
            }
            run_server(config).await
        }

        Commands::Check { config } => {
            let config = Config::from_file(&config)?;
            println!("configuration OK");
            for provider in [Provider::Numeric, Provider::Reasoning] {
                let entry = config.providers.get(provider);
                println!("  {} -> {}", provider, entry.url);
                for kind in RequestKind::ALL {
                    let variant = model_variant(provider, kind);
                    let price = entry.pricing.get(variant).copied().unwrap_or_default();
                    println!("    {:<15} {} @ {}/1k tokens", kind.as_str(), variant, price);
                }
            }
            println!(
                "  ceiling {} / soft threshold {} / timeout {}s",
                config.routing.monthly_cost_ceiling,
                config.routing.soft_cost_threshold,
                config.routing.request_timeout_secs
            );
            Ok(())
        }

        Commands::Usage { config } => {
            let config = Config::from_file(&config)?;
            let db = config.database();
            let pool = storage::init_pool(&db.path).await?;
            match storage::load_ledger(&pool).await? {
                Some(record) => {
                    println!("requests  numeric={}  reasoning={}  total={}",
                        record.requests_numeric, record.requests_reasoning, record.total_requests);
                    println!("total cost    {:.4}", record.total_cost);
                    println!("success rate  {:.4}", record.success_rate);
                    println!("limit reached {}", record.limit_reached);
                    println!("last reset    {}", record.last_reset);
                }
                None => println!("no usage recorded yet"),
            }
            Ok(())
        }
    }
}
