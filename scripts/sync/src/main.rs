use clap::Parser;
use colored::*;
use std::fs;
use std::io::Write;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use wax_engine::remote::DiscogsClient;
use wax_engine::{sync_collection_limited, Config, PgStore};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "wax-sync", about = "Mirror a Discogs collection into the local catalog")]
struct Args {
    /// Owner (user id) whose catalog is synced
    #[arg(long)]
    owner: String,

    /// Stop after N collection pages (0 = all pages)
    #[arg(long, default_value = "0")]
    max_pages: u32,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    let args = Args::parse();
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Wax Collection Sync");
    println!("===================");
    println!();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    let store = match PgStore::connect(&config.database_url).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!(
                "{} Failed to connect to database. Is PostgreSQL running? ({})",
                "✗".red().bold(),
                e
            );
            std::process::exit(1);
        }
    };

    let mut remote = match DiscogsClient::new(&config.discogs) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    println!("Owner     : {}", args.owner.bright_cyan());
    println!("Remote    : {}", config.discogs.username.bright_cyan());
    if args.max_pages > 0 {
        println!("Page limit: {}", args.max_pages);
    }

    let max_pages = (args.max_pages > 0).then_some(args.max_pages);
    let start = Instant::now();

    let summary = match sync_collection_limited(&mut remote, &store, &args.owner, max_pages).await
    {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    let elapsed = start.elapsed();
    println!();
    println!("{}", "═".repeat(60).bright_black());
    println!();
    println!("{} {:.1}s", "Completed in:".white().bold(), elapsed.as_secs_f64());
    println!("  {} {}", "Created:".green(), summary.created);
    println!("  {} {}", "Updated:".cyan(), summary.updated);
    println!("  {} {}", "Skipped:".white(), summary.skipped);
    if summary.failed > 0 {
        println!("  {} {}", "Failed:".red(), summary.failed);
    }
    println!("  {} {}", "Pages:".white(), summary.pages);

    if !summary.errors.is_empty() {
        println!();
        println!("{}", "Errors (first 10):".red().bold());
        for err in &summary.errors {
            println!("  {} {}", "✗".red(), err);
        }
        if let Ok(mut f) = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open("errors.log")
        {
            for err in &summary.errors {
                writeln!(f, "[SYNC] {}", err).ok();
            }
        }
        println!();
        println!(
            "{} Run {} again to retry failed items.",
            "Tip:".yellow().bold(),
            "wax-sync".bright_cyan()
        );
    }
}
