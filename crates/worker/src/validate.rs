use anyhow::Context;
use std::path::PathBuf;
use tipster_core::config::Settings;
use tipster_core::domain::fixture::Fixture;
use tipster_core::llm::json::parse_batch;
use tipster_core::validation::PredictionValidator;

#[derive(Debug, clap::Args)]
pub struct ValidateArgs {
    /// JSON array of fixtures, home/away order authoritative.
    #[arg(long)]
    pub fixtures: PathBuf,

    /// Prediction batch as produced by the model (raw reply or JSON).
    #[arg(long)]
    pub predictions: PathBuf,

    /// Odds floor. Defaults to MIN_ODDS.
    #[arg(long)]
    pub min_odds: Option<f64>,
}

/// Writes the corrected batch to stdout and the report to stderr.
pub fn validate(settings: &Settings, args: ValidateArgs) -> anyhow::Result<()> {
    let fixtures_text = std::fs::read_to_string(&args.fixtures)
        .with_context(|| format!("failed to read {}", args.fixtures.display()))?;
    let fixtures: Vec<Fixture> = serde_json::from_str(&fixtures_text)
        .with_context(|| format!("{} is not a JSON array of fixtures", args.fixtures.display()))?;

    let predictions_text = std::fs::read_to_string(&args.predictions)
        .with_context(|| format!("failed to read {}", args.predictions.display()))?;
    let batch = parse_batch(&predictions_text, settings.betting.max_predictions)
        .with_context(|| format!("invalid predictions in {}", args.predictions.display()))?;

    let min_odds = args.min_odds.unwrap_or(settings.betting.min_odds);
    let validator = PredictionValidator::new(&fixtures);
    let (batch, report) = validator.validate_batch(batch, min_odds);

    eprintln!("{report}");
    println!(
        "{}",
        serde_json::to_string_pretty(&batch).context("serialize corrected batch failed")?
    );
    Ok(())
}
