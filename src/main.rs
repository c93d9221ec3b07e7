use anyhow::Result;
use clap::Parser;
use price_radar::adjudicator::{Adjudicator, LlmAdjudicator, OfflineAdjudicator};
use price_radar::decision::{Category, Thresholds};
use price_radar::enrichment;
use price_radar::ingestion;
use price_radar::runner::{AnalysisRunner, RunState};
use price_radar::store::{DecisionStore, MemoryStore, SqliteStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "price-radar")]
#[command(about = "Competitive price analysis for merchant vs competitor catalogs")]
struct Args {
    /// Merchant catalog file (CSV or Parquet)
    merchant: PathBuf,

    /// Competitor catalog files (CSV or Parquet)
    #[arg(required = true)]
    competitors: Vec<PathBuf>,

    /// Resume a previous session by id
    #[arg(long)]
    session: Option<String>,

    /// Path to the SQLite decision store
    #[arg(long, default_value = "price_radar.db")]
    store: PathBuf,

    /// Adjudicator API key (or set ADJUDICATOR_API_KEY env var)
    #[arg(long)]
    api_key: Option<String>,

    /// Adjudicator endpoint (any OpenAI-compatible chat API)
    #[arg(long, default_value = "https://openrouter.ai/api/v1")]
    api_base_url: String,

    /// Adjudicator model
    #[arg(long, default_value = "google/gemini-2.0-flash-001")]
    model: String,

    /// Adjudicator request timeout in seconds
    #[arg(long, default_value_t = 30)]
    adjudicator_timeout: u64,

    /// Minimum similarity (0-100) to consider any match
    #[arg(long, default_value_t = 60)]
    match_threshold: u8,

    /// Merchant price below competitor by more than this percent -> raise
    #[arg(long, default_value_t = 10.0)]
    raise_pct: f64,

    /// Merchant price above competitor by more than this percent -> lower
    #[arg(long, default_value_t = 5.0)]
    lower_pct: f64,

    /// Confidence below this (0-100) -> medium risk
    #[arg(long, default_value_t = 85)]
    review_threshold: u8,

    /// Use the in-memory store and no external adjudicator
    #[arg(long)]
    dry_run: bool,

    /// How many decisions to print per category
    #[arg(long, default_value_t = 10)]
    show: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let (_, merchant_df) = ingestion::load_catalog(&args.merchant)?;
    let competitor_dfs = ingestion::load_catalogs(&args.competitors)?;
    info!(
        "Loaded merchant catalog ({} rows) and {} competitor catalogs",
        merchant_df.height(),
        competitor_dfs.len()
    );

    let thresholds = Thresholds {
        match_threshold: args.match_threshold,
        raise_pct: args.raise_pct / 100.0,
        lower_pct: args.lower_pct / 100.0,
        review_threshold: args.review_threshold,
        ..Thresholds::default()
    };

    let store: Arc<dyn DecisionStore> = if args.dry_run {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(SqliteStore::open(&args.store)?)
    };

    let api_key = args
        .api_key
        .or_else(|| std::env::var("ADJUDICATOR_API_KEY").ok());
    let adjudicator: Arc<dyn Adjudicator> = match api_key {
        Some(key) if !args.dry_run => Arc::new(LlmAdjudicator::new(
            key,
            args.api_base_url,
            args.model,
            Duration::from_secs(args.adjudicator_timeout),
        )?),
        _ => {
            info!("No adjudicator configured; ambiguous matches use the conservative fallback");
            Arc::new(OfflineAdjudicator)
        }
    };

    let mut state = match args.session {
        Some(id) => RunState::resume(id),
        None => RunState::new(),
    };
    info!("Session {}", state.session_id);

    let runner = AnalysisRunner::new(thresholds, adjudicator, store);
    let report = runner
        .run(&merchant_df, &competitor_dfs, &mut state, |index, total| {
            if index % 5 == 0 || index == total {
                info!("Processed {}/{}", index, total);
            }
        })
        .await?;

    println!("\n=== Analysis {} ===", report.session_id);
    println!("Processed: {}", report.processed_count);
    println!(
        "Raise: {} | Lower: {} | Approved: {} | Missing: {}",
        report.summary.raise_count,
        report.summary.lower_count,
        report.summary.approved_count,
        report.summary.missing_count
    );
    println!(
        "Risk - normal: {} | medium: {} | critical: {}",
        report.summary.normal_count, report.summary.medium_count, report.summary.critical_count
    );

    for category in [
        Category::Raise,
        Category::Lower,
        Category::Approved,
        Category::Missing,
    ] {
        let rows: Vec<_> = report
            .decisions
            .iter()
            .filter(|d| d.category == category)
            .take(args.show)
            .collect();
        if rows.is_empty() {
            continue;
        }
        println!("\n--- {} ---", category);
        for decision in rows {
            let name = &decision.merchant_record.display_name;
            let brand = enrichment::classify_brand(name);
            match &decision.matched_competitor {
                Some(competitor) => {
                    let recommended = decision
                        .recommended_price
                        .map(|p| format!(" -> recommend {:.2}", p))
                        .unwrap_or_default();
                    println!(
                        "  [{}] {} ({}) {:.2} vs '{}' {:.2} ({}% confidence, {} risk){}",
                        category,
                        name,
                        brand,
                        decision.merchant_record.price,
                        competitor.display_name,
                        competitor.price,
                        decision.confidence,
                        decision.risk,
                        recommended
                    );
                }
                None => {
                    let shelf = enrichment::classify_category(name, "");
                    println!(
                        "  [{}] {} ({}, {}) - no competitor match",
                        category, name, brand, shelf
                    );
                }
            }
            if let Some(reason) = &decision.adjudication_reason {
                println!("      adjudicator: {}", reason);
            }
        }
    }

    println!("\nResume later with: --session {}", report.session_id);

    Ok(())
}
