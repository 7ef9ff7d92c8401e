use anyhow::Context;
use clap::{Parser, Subcommand};
use tipster_core::config::Settings;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod results;
mod run;
mod validate;

#[derive(Debug, Parser)]
#[command(name = "tipster_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch fixtures, generate picks, validate them and persist the batch.
    Run(run::RunArgs),
    /// Validate a predictions file against a fixtures file, offline.
    Validate(validate::ValidateArgs),
    /// Settle pending predictions and analyse the ones that lost.
    UpdateResults(results::UpdateResultsArgs),
    /// Print performance statistics as JSON.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    match args.command {
        Command::Run(run_args) => run::run(&settings, run_args).await,
        Command::Validate(validate_args) => validate::validate(&settings, validate_args),
        Command::UpdateResults(results_args) => results::update_results(&settings, results_args).await,
        Command::Stats => stats(&settings).await,
    }
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

pub(crate) async fn connect(settings: &Settings) -> anyhow::Result<sqlx::PgPool> {
    let db_url = settings.require_database_url()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    tipster_core::storage::migrate(&pool).await?;
    Ok(pool)
}

/// `--date` when given, otherwise today in the configured timezone.
pub(crate) fn resolve_date(
    date_arg: Option<&str>,
    timezone_offset_hours: i32,
) -> anyhow::Result<chrono::NaiveDate> {
    if let Some(s) = date_arg {
        return chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid date {s}, expected YYYY-MM-DD"));
    }

    tipster_core::config::local_today(timezone_offset_hours)
}

async fn stats(settings: &Settings) -> anyhow::Result<()> {
    use tipster_core::tracking::{
        breakdown_by_bet_type, breakdown_by_competition, current_streak, weekly_stats,
        PerformanceStats,
    };

    let today = tipster_core::config::local_today(settings.timezone_offset_hours)?;
    let pool = connect(settings).await?;
    let records = tipster_core::storage::performance::list_all(&pool).await?;

    let out = serde_json::json!({
        "overall": PerformanceStats::compute(&records),
        "current_streak": current_streak(&records),
        "by_bet_type": breakdown_by_bet_type(&records),
        "by_competition": breakdown_by_competition(&records),
        "last_week": weekly_stats(&records, today),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&out).context("serialize stats failed")?
    );
    Ok(())
}
