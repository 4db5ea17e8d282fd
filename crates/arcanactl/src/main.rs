//! Arcana Control - CLI client for the arcana daemon
//!
//! Draws cards, submits reflections, and inspects reading history over the
//! daemon's HTTP API.

mod client;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client::ArcanaClient;

#[derive(Parser)]
#[command(name = "arcanactl")]
#[command(about = "Arcana - tarot reading session client", long_about = None)]
#[command(version)]
struct Cli {
    /// Daemon base URL
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon health
    Health,

    /// Draw a card
    Draw {
        /// Question to hold in mind for the reading
        #[arg(long, default_value = "")]
        question: String,
    },

    /// Submit a reflection on a drawn card and get the interpretation
    Interpret {
        /// Name of the drawn card, e.g. "The Fool"
        #[arg(long)]
        card: String,

        /// The original question, if any
        #[arg(long, default_value = "")]
        question: String,

        /// Your reflection on the card
        #[arg(long, default_value = "")]
        reflection: String,
    },

    /// List past readings for this device, newest first
    History,

    /// Show reading statistics for this device
    Stats,

    /// Remove threads inactive past the retention horizon
    Sweep {
        /// Inactivity horizon in days (daemon default when omitted)
        #[arg(long)]
        days: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = ArcanaClient::new(cli.url)?;

    match cli.command {
        Commands::Health => {
            let health = client.health().await?;
            println!(
                "{} v{} - up {}s, {} cards in catalog",
                health.status, health.version, health.uptime_seconds, health.cards_in_catalog
            );
        }
        Commands::Draw { question } => {
            let drawn = client.draw(&question).await?;
            println!("You drew: {}", drawn.card_name);
            println!("Image: {}", drawn.image_path);
            println!("\nReflect on the card, then run:");
            println!(
                "  arcanactl interpret --card \"{}\" --reflection \"...\"",
                drawn.card_name
            );
        }
        Commands::Interpret {
            card,
            question,
            reflection,
        } => {
            let response = client.interpret(&card, &question, &reflection).await?;
            println!("{}", response.interpretation);
        }
        Commands::History => {
            let history = client.history().await?;
            if history.readings.is_empty() {
                println!("No readings yet for this device.");
            }
            for reading in history.readings {
                let state = if reading.is_open() { "open" } else { "closed" };
                println!(
                    "[{}] {} ({})",
                    reading.created_at.format("%Y-%m-%d %H:%M"),
                    reading.card_drawn,
                    state
                );
                if !reading.question.is_empty() {
                    println!("  question: {}", reading.question);
                }
                if let Some(interpretation) = &reading.interpretation {
                    println!("  {interpretation}");
                }
            }
        }
        Commands::Stats => {
            let stats = client.stats().await?;
            println!("Readings: {}", stats.total_readings);
            match stats.last_reading_date {
                Some(date) => println!("Last reading: {}", date.format("%Y-%m-%d %H:%M")),
                None => println!("Last reading: never"),
            }
            println!(
                "Thread created: {}",
                stats.thread_created.format("%Y-%m-%d %H:%M")
            );
        }
        Commands::Sweep { days } => {
            let result = client.sweep(days).await?;
            println!("Removed {} inactive threads", result.threads_removed);
        }
    }

    Ok(())
}
