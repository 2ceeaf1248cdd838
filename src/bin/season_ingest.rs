use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use tracing_subscriber::EnvFilter;

use lineup_predictors::config::PipelineConfig;
use lineup_predictors::pipeline::LiveSeasonPipeline;
use lineup_predictors::season::league_today;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match arg_value("--config") {
        Some(path) => PipelineConfig::load(&PathBuf::from(path))?,
        None => PipelineConfig::default(),
    }
    .apply_env();

    let target = match arg_value("--date") {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid --date {raw:?}, expected YYYY-MM-DD"))?,
        None => league_today(),
    };

    let mut pipeline = LiveSeasonPipeline::from_config(&config)?;
    let run = pipeline.run(target)?;

    println!("Season run complete through {}", run.target);
    println!("Dates: {}", run.dates);
    println!("Predictor rows: {} (skipped matchups: {})", run.predictor_rows, run.skipped);
    println!("Game logs: {}", run.game_logs);
    for merge in &run.merges {
        println!(
            "outcome {}: rows={} dropped={}",
            merge.outcome,
            merge.rows.len(),
            merge.dropped
        );
    }
    if run.artifacts.is_empty() {
        return Err(anyhow!("no artifacts written"));
    }
    for artifact in &run.artifacts {
        println!("  {} @ {} ({} rows)", artifact.name, artifact.version, artifact.rows);
    }
    Ok(())
}

fn arg_value(flag: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.clone());
        }
    }
    None
}
