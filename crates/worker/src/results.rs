use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;
use tipster_core::config::Settings;
use tipster_core::ingest::{ApiFootballClient, FixtureProvider};
use tipster_core::learning::ErrorAnalysis;
use tipster_core::llm::anthropic::AnthropicClient;
use tipster_core::llm::LlmClient;
use tipster_core::settlement::{find_result, settle};
use tipster_core::storage;
use tipster_core::tracking::PredictionRecord;

#[derive(Debug, clap::Args)]
pub struct UpdateResultsArgs {
    /// Only settle; do not ask the LLM to analyse lost predictions.
    #[arg(long)]
    pub skip_analysis: bool,
}

pub async fn update_results(settings: &Settings, args: UpdateResultsArgs) -> anyhow::Result<()> {
    let pool = crate::connect(settings).await?;
    let provider = ApiFootballClient::from_settings(settings)?;

    let pending = storage::performance::list_pending(&pool).await?;
    let mut by_date: BTreeMap<NaiveDate, Vec<PredictionRecord>> = BTreeMap::new();
    for record in pending {
        by_date.entry(record.date).or_default().push(record);
    }

    let mut settled = 0usize;
    let mut still_pending = 0usize;
    for (date, records) in &by_date {
        let results = match provider.fetch_results(*date).await {
            Ok(results) => results,
            Err(err) => {
                sentry_anyhow::capture_anyhow(&err);
                tracing::warn!(%date, error = %err, "failed to fetch results; leaving predictions pending");
                still_pending += records.len();
                continue;
            }
        };

        for record in records {
            let Some(score) = find_result(&record.match_label, &results) else {
                still_pending += 1;
                continue;
            };
            let Some(outcome) = settle(&record.to_recommendation(), score) else {
                tracing::warn!(
                    id = %record.id,
                    bet_type = %record.bet_type,
                    prediction = %record.prediction,
                    score = %score.score(),
                    "could not settle prediction"
                );
                still_pending += 1;
                continue;
            };

            if storage::performance::record_result(&pool, &record.id, outcome.into(), &score.score())
                .await?
            {
                settled += 1;
                tracing::info!(id = %record.id, match_label = %record.match_label, %outcome, score = %score.score(), "prediction settled");
            }
        }
    }
    tracing::info!(settled, still_pending, "results update finished");

    if args.skip_analysis {
        return Ok(());
    }
    analyse_losses(settings, &pool).await
}

async fn analyse_losses(settings: &Settings, pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let losses = storage::performance::list_unanalysed_losses(pool).await?;
    if losses.is_empty() {
        return Ok(());
    }

    let llm = AnthropicClient::from_settings(settings)?;
    let mut analyses: Vec<ErrorAnalysis> = Vec::with_capacity(losses.len());
    for record in &losses {
        let analysis = match llm.analyze_loss(record).await {
            Ok(raw) => raw.validate_and_into_analysis(record, Utc::now()),
            Err(err) => Err(err),
        };
        match analysis {
            Ok(analysis) => analyses.push(analysis),
            Err(err) => {
                sentry_anyhow::capture_anyhow(&err);
                tracing::warn!(id = %record.id, error = %err, "error analysis failed");
            }
        }
    }

    if analyses.is_empty() {
        return Ok(());
    }

    let (stored, learnings) =
        storage::learnings::record_analyses(pool, analyses, Utc::now()).await?;
    tracing::info!(
        analysed = stored.len(),
        total = learnings.total_errors_analyzed,
        "learnings updated"
    );
    Ok(())
}
