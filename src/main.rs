mod config;
mod db;
mod error;
mod extract;
mod locator;
mod pipeline;
mod source;
mod summarizer;

use std::time::Instant;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};

use config::PipelineConfig;
use pipeline::Pipeline;
use source::HttpSource;
use summarizer::GeminiClient;

#[derive(Parser)]
#[command(
    name = "umschau_ingest",
    about = "Ingests Rathaus-Umschau bulletins into summarized citizen posts"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema and seed the tag vocabulary
    Init,
    /// Scan backward for bulletins, summarize and persist them
    Run {
        /// Starting date (YYYY-MM-DD, default: today)
        #[arg(short, long)]
        start_date: Option<String>,
        /// How many days to walk backward from the starting date
        #[arg(short, long, default_value = "7")]
        days: u32,
        /// Stop after this many bulletins were ingested
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
    },
    /// Persisted posts overview table
    Posts {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// Show ingestion statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let cfg = PipelineConfig::load()?;

    let result = match cli.command {
        Commands::Init => {
            let conn = db::connect(&cfg.db_path)?;
            db::init_schema(&conn)?;
            println!("Schema ready at {}", cfg.db_path.display());
            Ok(())
        }
        Commands::Run {
            start_date,
            days,
            count,
        } => {
            let start = match start_date {
                Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                    .with_context(|| format!("invalid start date: {}", s))?,
                None => Local::now().date_naive(),
            };

            let conn = db::connect(&cfg.db_path)?;
            db::init_schema(&conn)?;

            let api_key = std::env::var(&cfg.api_key_env).map_err(|_| {
                anyhow::anyhow!("{} environment variable must be set", cfg.api_key_env)
            })?;
            let provider = GeminiClient::new(
                api_key,
                cfg.text_model.clone(),
                cfg.image_model.clone(),
            )?;
            let source = HttpSource::new()?;

            println!(
                "Scanning {} days backward from {} (target: {})...",
                days, start, count
            );
            let pipeline = Pipeline::new(&conn, source, provider, cfg);
            let stats = pipeline.run_batch(start, days, count).await?;
            println!(
                "Done: {} ingested, {} dates without bulletin, {} failed ({} probed).",
                stats.ok, stats.skipped, stats.failed, stats.probed
            );
            Ok(())
        }
        Commands::Posts { limit } => {
            let conn = db::connect(&cfg.db_path)?;
            db::init_schema(&conn)?;
            let rows = db::fetch_posts(&conn, limit)?;
            if rows.is_empty() {
                println!("No posts yet. Run 'run' first.");
                return Ok(());
            }

            println!(
                "{:>4} | {:<10} | {:<44} | {:<5} | {:>8} | {}",
                "#", "Date", "Title", "Image", "Glossar", "Tags"
            );
            println!("{}", "-".repeat(100));
            for r in &rows {
                println!(
                    "{:>4} | {:<10} | {:<44} | {:<5} | {:>8} | {}",
                    r.id,
                    r.created_at,
                    truncate(&r.title, 44),
                    if r.has_image { "yes" } else { "-" },
                    r.glossary_count,
                    r.tags,
                );
            }
            println!("\n{} posts", rows.len());
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&cfg.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Posts:            {}", s.posts);
            println!("Glossary entries: {}", s.glossary_entries);
            println!("Tag links:        {}", s.tag_links);
            println!("Vocabulary size:  {}", s.hashtags);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    result
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}
