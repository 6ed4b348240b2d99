use clap::Parser;
use colored::*;
use std::fs;
use std::io::Write;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use wax_engine::{consolidate_duplicates, Config, PgStore};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "wax-dedupe",
    about = "Collapse duplicate catalog records into one canonical record per item"
)]
struct Args {
    /// Owner (user id) whose catalog is cleaned up
    #[arg(long)]
    owner: String,

    /// Show what would be merged without persisting or deleting anything
    #[arg(long)]
    dry_run: bool,
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

    println!("Wax Duplicate Cleanup");
    println!("=====================");
    if args.dry_run {
        println!("Mode: {} (no changes will be made)", "DRY RUN".yellow().bold());
    }
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

    let start = Instant::now();

    let summary = match consolidate_duplicates(&store, &args.owner, args.dry_run).await {
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
    println!("  {} {}", "Merged groups:".green(), summary.merged_groups);
    println!("  {} {}", "Removed records:".cyan(), summary.removed_records);

    if !summary.errors.is_empty() {
        println!();
        println!("{}", "Errors (first 10):".red().bold());
        for err in &summary.errors {
            println!("  {} {}", "✗".red(), err);
        }
        if !args.dry_run {
            if let Ok(mut f) = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open("errors.log")
            {
                for err in &summary.errors {
                    writeln!(f, "[DEDUPE] {}", err).ok();
                }
            }
        }
    }
}
