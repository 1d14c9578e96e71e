use std::path::PathBuf;

use anyhow::Context;
use binlob::config::AppConfig;
use binlob::engine::{Price, Qty, Side, TopOfBook};
use binlob::market_data::book_task::spawn_book_task;
use binlob::market_data::replay::{replay_to_task, ReplayOptions, ReplayStats};
use binlob::telemetry;
use clap::{Parser, Subcommand};
use tokio::fs::File;
use tokio::io::BufReader;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "binlob", version, about = "Price-level book for binary-outcome markets")]
struct Cli {
    /// Extra config file layered over binlob.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replay a recorded feed (one JSON frame per line) and print the final book
    Replay {
        file: PathBuf,
        /// Levels per side to print
        #[arg(long)]
        depth: Option<usize>,
        /// Stop at the first update that does not apply cleanly
        #[arg(long)]
        strict: bool,
        /// Market name used in logs
        #[arg(long, default_value = "replay")]
        market: String,
    },
}

fn print_ladder(label: &str, levels: &[(Price, Qty)]) {
    println!("{label}:");
    if levels.is_empty() {
        println!("  (empty)");
    }
    for (price, qty) in levels {
        println!("  {price:>3} x {qty}");
    }
}

fn print_top_of_book(tob: &TopOfBook) {
    println!("\n=== Top of Book ===");
    if tob.bid.quantity > 0 {
        println!("Best bid: {} @ {}", tob.bid.quantity, tob.bid.price);
    } else {
        println!("Best bid: None");
    }
    if tob.ask.quantity > 0 {
        println!("Best ask: {} @ {}", tob.ask.quantity, tob.ask.price);
    } else {
        println!("Best ask: None");
    }
}

fn print_stats(stats: &ReplayStats) {
    println!("\n=== Replay ===");
    println!(
        "frames: {}  snapshots: {}  deltas: {}  trades: {}  other: {}",
        stats.frames, stats.snapshots, stats.deltas, stats.trades, stats.unknown
    );
    println!(
        "decode errors: {}  ignored: {}  clamped: {}  saturated: {}  dropped levels: {}  sequence gaps: {}",
        stats.decode_errors,
        stats.ignored,
        stats.clamped,
        stats.saturated,
        stats.dropped_levels,
        stats.sequence_gaps
    );
    if !stats.latency.is_empty() {
        println!(
            "apply latency ns: p50 {}  p99 {}  max {}",
            stats.latency.value_at_quantile(0.50),
            stats.latency.value_at_quantile(0.99),
            stats.latency.max()
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env

    let cli = Cli::parse();
    let cfg = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;

    telemetry::init_tracing(&cfg.log_filter);
    telemetry::init_metrics(cfg.metrics_port)?;

    match cli.command {
        Command::Replay { file, depth, strict, market } => {
            let depth = depth.unwrap_or(cfg.depth);
            let options = ReplayOptions { strict: strict || cfg.strict };

            let feed = File::open(&file)
                .await
                .with_context(|| format!("opening {}", file.display()))?;

            let (handle, task) = spawn_book_task(market.clone(), cfg.channel_capacity);
            let stats = replay_to_task(BufReader::new(feed), &handle, options).await?;

            let tob = handle.top_of_book().await?;
            let bids = handle.top_n(Side::BID, depth).await?;
            let asks = handle.top_n(Side::ASK, depth).await?;
            drop(handle);
            let book = task.await.context("book task panicked")?;

            print_top_of_book(&tob);
            match book.spread() {
                Some(spread) => println!("Spread: {spread}"),
                None => println!("Spread: N/A"),
            }
            if book.is_crossed() {
                println!("Warning: book is crossed");
            }
            print_ladder("Bids", &bids);
            print_ladder("Asks", &asks);
            print_stats(&stats);

            info!(%market, bid_depth = book.depth(Side::BID), ask_depth = book.depth(Side::ASK), "Done");
        }
    }

    Ok(())
}
