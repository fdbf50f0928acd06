//! SpeakScore - session scoring CLI.
//!
//! Scores a directory of recorded-answer fixtures as one session and
//! writes the final report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad arguments, bad taxonomy, unreadable items)

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use speakscore::analyzer::registry::RegistryBuilder;
use speakscore::analyzer::replay::ReplayAnalyzer;
use speakscore::cli::{Args, OutputFormat};
use speakscore::{
    AssessmentEngine, EngineConfig, Evidence, Metric, SessionResult, WeightTaxonomy,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Initialize logging
    init_logging(&args);

    info!("SpeakScore v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_session(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Scoring failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete scoring workflow.
async fn run_session(args: Args) -> Result<()> {
    let start_time = Instant::now();

    // Step 1: Load the weight taxonomy
    let taxonomy = match &args.weights {
        Some(path) => {
            println!("⚖️  Loading weight taxonomy: {}", path.display());
            WeightTaxonomy::load(path)?
        }
        None => WeightTaxonomy::default(),
    };

    // Step 2: Build the replay registry over every known metric
    let mut builder = RegistryBuilder::new();
    for metric in Metric::ALL.iter().copied() {
        builder = builder.register(Arc::new(ReplayAnalyzer::new(metric)))?;
    }
    let registry = builder.build();

    let config = EngineConfig {
        analyzer_timeout_seconds: args.timeout,
        pipeline_version: args.pipeline_version.clone(),
    };

    // Taxonomy validation happens here; a bad taxonomy aborts the run.
    let engine = AssessmentEngine::new(registry, taxonomy, config)?;

    // Step 3: Collect item fixtures, in name order
    let item_files = collect_item_files(&args.items)?;
    if item_files.is_empty() {
        anyhow::bail!("No item fixtures found in {}", args.items.display());
    }

    println!(
        "🔬 Scoring {} items as session '{}'...",
        item_files.len(),
        args.session
    );

    let progress = ProgressBar::new(item_files.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );

    // Step 4: Run every item through the engine
    for (index, path) in item_files.iter().enumerate() {
        let evidence = Evidence::Path(path.clone());
        engine
            .run_item(&args.session, index as u32, &evidence)
            .await
            .with_context(|| format!("Failed to score item {}", path.display()))?;
        progress.inc(1);
    }
    progress.finish_and_clear();

    // Step 5: Finalize and write the report
    let result = engine.finalize(&args.session).await?;

    let output = match args.format {
        OutputFormat::Json => speakscore::report::generate_json_report(&result)?,
        OutputFormat::Markdown => speakscore::report::generate_markdown_report(&result),
    };

    std::fs::write(&args.output, &output)
        .with_context(|| format!("Failed to write report to {}", args.output.display()))?;

    print_summary(&result, start_time.elapsed().as_secs_f64());
    println!("\n✅ Done! Report saved to: {}", args.output.display());

    Ok(())
}

/// Collect the per-item JSON fixture files in name order.
fn collect_item_files(dir: &PathBuf) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read items directory {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().map(|e| e == "json").unwrap_or(false) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn print_summary(result: &SessionResult, duration: f64) {
    println!("\n📊 Session Summary:");
    match &result.overall {
        Some(overall) => println!(
            "   Overall: {:.2} / 100 (confidence {:.2})",
            overall.score, overall.confidence
        ),
        None => println!("   Overall: unscored"),
    }
    for (name, category) in &result.categories {
        match category.score {
            Some(score) => println!("   - {}: {:.2}", name, score),
            None => println!("   - {}: unscored", name),
        }
    }
    println!("   Items: {}", result.meta.num_items);
    println!("   Duration: {:.1}s", duration);
}
