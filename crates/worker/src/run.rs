use anyhow::Context;
use chrono::{NaiveDate, Utc};
use tipster_core::config::Settings;
use tipster_core::domain::fixture::Fixture;
use tipster_core::ingest::{
    collect_contexts, filter_fixtures, ApiFootballClient, CompetitionFilter, FixtureContext,
    FixtureProvider,
};
use tipster_core::llm::anthropic::AnthropicClient;
use tipster_core::llm::error::LlmDiagnosticsError;
use tipster_core::llm::{GenerateInput, LlmClient};
use tipster_core::storage;
use tipster_core::validation::PredictionValidator;

#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// Match day (YYYY-MM-DD). Defaults to today in the configured timezone.
    #[arg(long)]
    pub date: Option<String>,

    /// Fetch and filter fixtures, then stop: no LLM call, no database.
    #[arg(long)]
    pub dry_run: bool,

    /// Do not fetch recent form, head-to-head and absences for each fixture.
    #[arg(long)]
    pub skip_context: bool,
}

pub async fn run(settings: &Settings, args: RunArgs) -> anyhow::Result<()> {
    let analysis_date = crate::resolve_date(args.date.as_deref(), settings.timezone_offset_hours)?;

    let provider = ApiFootballClient::from_settings(settings)?;
    let all = provider.fetch_fixtures(analysis_date).await?;
    let total = all.len();
    let fixtures = filter_fixtures(all, &CompetitionFilter::default());
    tracing::info!(
        %analysis_date,
        provider = provider.provider_name(),
        total,
        kept = fixtures.len(),
        "fixtures loaded"
    );

    if fixtures.is_empty() {
        tracing::info!(%analysis_date, "no fixture in the selected competitions; nothing to do");
        return Ok(());
    }

    if args.dry_run {
        tracing::info!(%analysis_date, dry_run = true, fixtures = fixtures.len(), "dry run; stopping before the LLM call");
        return Ok(());
    }

    let pool = crate::connect(settings).await?;

    let mut lock_conn = pool
        .acquire()
        .await
        .context("failed to acquire a connection for the analysis_date lock")?;
    let acquired =
        storage::lock::try_acquire_analysis_date_lock(&mut lock_conn, analysis_date).await?;
    if !acquired {
        tracing::warn!(%analysis_date, "analysis_date lock not acquired; another run in progress");
        return Ok(());
    }

    let contexts = if args.skip_context {
        Vec::new()
    } else {
        collect_contexts(&provider, &fixtures).await
    };

    let outcome = generate_and_persist(settings, &pool, analysis_date, fixtures, contexts).await;

    match storage::lock::release_analysis_date_lock(&mut lock_conn, analysis_date).await {
        Ok(true) => {}
        Ok(false) => tracing::warn!(%analysis_date, "analysis_date lock was not held at release"),
        Err(err) => {
            tracing::warn!(%analysis_date, error = %err, "failed to release analysis_date lock")
        }
    }
    outcome
}

async fn generate_and_persist(
    settings: &Settings,
    pool: &sqlx::PgPool,
    analysis_date: NaiveDate,
    fixtures: Vec<Fixture>,
    contexts: Vec<FixtureContext>,
) -> anyhow::Result<()> {
    let learnings = storage::learnings::load_learnings(pool).await?;
    let llm = AnthropicClient::from_settings(settings)?;
    let provider = llm.provider().as_str();
    let input = GenerateInput::try_new(
        analysis_date,
        fixtures.clone(),
        settings.betting,
        learnings.summary(),
    )?;
    let input = if contexts.is_empty() {
        input
    } else {
        input.with_contexts(contexts)?
    };

    let generated_at = Utc::now();
    match llm.generate_predictions_with_raw(input).await {
        Ok((batch, raw)) => {
            let validator = PredictionValidator::new(&fixtures);
            let (batch, report) = validator.validate_batch(batch, settings.betting.min_odds);
            eprintln!("{report}");

            let batch_id = storage::predictions::persist_success(
                pool,
                analysis_date,
                generated_at,
                provider,
                &batch,
                &report,
                Some(raw),
            )
            .await?;

            tracing::info!(
                %analysis_date,
                %batch_id,
                kept = batch.recommendations.len(),
                corrections = report.corrections_count,
                rejected = report.rejected_low_odds_count,
                "persisted prediction batch"
            );
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            let raw_llm_response = err
                .downcast_ref::<LlmDiagnosticsError>()
                .and_then(LlmDiagnosticsError::raw_as_json);

            let batch_id = storage::predictions::persist_failure(
                pool,
                analysis_date,
                generated_at,
                provider,
                &format!("{err:#}"),
                raw_llm_response,
            )
            .await?;

            tracing::error!(%analysis_date, %batch_id, error = %err, "prediction run failed");
        }
    }
    Ok(())
}
