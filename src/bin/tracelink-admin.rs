use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracelink::analytics::Aggregator;
use tracelink::config::Config;
use tracelink::registry::{LinkRegistry, NewLink};
use tracelink::storage;

#[derive(Parser)]
#[command(name = "tracelink-admin")]
#[command(about = "Tracelink link management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a tracked link
    Create {
        /// Destination URL (http or https)
        url: String,
        #[arg(long)]
        title: Option<String>,
        /// Days until the link stops redirecting
        #[arg(long)]
        expiry_days: Option<u32>,
        #[arg(long)]
        owner: Option<String>,
    },
    /// List links, newest first, with click counts
    List {
        #[arg(long)]
        owner: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Show global stats, or stats for one short code
    Stats { code: Option<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage = storage::connect(&config.database, &config.cache).await?;
    let registry = Arc::new(LinkRegistry::new(
        Arc::clone(&storage),
        config.registry.clone(),
    ));
    let aggregator = Aggregator::new(
        Arc::clone(&registry),
        storage,
        config.recorder.storage_timeout(),
        config.recorder.recent_visits_limit,
    );

    match cli.command {
        Commands::Create {
            url,
            title,
            expiry_days,
            owner,
        } => {
            let link = registry
                .create(NewLink {
                    original_url: url,
                    title,
                    expiry_days,
                    owner,
                })
                .await
                .context("Failed to create link")?;
            println!("✓ Created {}", link.tracking_url(&config.redirect_base_url));
            println!("  -> {}", link.original_url);
        }
        Commands::List { owner, limit } => {
            let links = aggregator
                .list_with_clicks(owner.as_deref(), limit.clamp(1, 100), 0, &config.redirect_base_url)
                .await
                .context("Failed to list links")?;
            if links.is_empty() {
                println!("No links found.");
            } else {
                println!("{:<12} {:>8}  {}", "Code", "Clicks", "Destination");
                println!("{}", "-".repeat(80));
                for entry in links {
                    println!(
                        "{:<12} {:>8}  {}",
                        entry.link.code,
                        entry.clicks.unwrap_or(0),
                        entry.link.original_url
                    );
                }
            }
        }
        Commands::Stats { code: None } => {
            let stats = aggregator.global_stats().await.context("Failed to read stats")?;
            println!("Links:            {}", stats.total_links);
            println!("Visits:           {}", stats.total_visits);
            println!("Unique locations: {}", stats.unique_locations);
        }
        Commands::Stats { code: Some(code) } => {
            let stats = aggregator
                .link_stats(&code)
                .await
                .with_context(|| format!("Failed to read stats for '{code}'"))?;
            println!("Visits to {}: {}", stats.code, stats.visit_count);
            for location in stats.top_locations {
                println!(
                    "  {:<30} {:>6}",
                    match location.country {
                        Some(country) => format!("{}, {}", location.city, country),
                        None => location.city,
                    },
                    location.visits
                );
            }
        }
    }

    Ok(())
}
