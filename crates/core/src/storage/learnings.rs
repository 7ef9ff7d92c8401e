use crate::learning::{ErrorAnalysis, Learnings};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Stores a post-mortem. Returns false if the prediction was already analysed.
pub async fn insert_analysis<'e, E>(executor: E, analysis: &ErrorAnalysis) -> anyhow::Result<bool>
where
    E: sqlx::PgExecutor<'e>,
{
    let json = serde_json::to_value(analysis).context("serialize error analysis failed")?;
    let res = sqlx::query(
        "INSERT INTO error_analyses (prediction_id, error_category, analysis, created_at) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (prediction_id) DO NOTHING",
    )
    .bind(&analysis.prediction_id)
    .bind(analysis.error_category.as_str())
    .bind(json)
    .bind(analysis.analysis_date)
    .execute(executor)
    .await
    .with_context(|| {
        format!(
            "insert error_analyses failed (prediction_id={})",
            analysis.prediction_id
        )
    })?;
    Ok(res.rows_affected() == 1)
}

pub async fn list_analyses(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<Vec<ErrorAnalysis>> {
    let rows: Vec<(Value,)> =
        sqlx::query_as("SELECT analysis FROM error_analyses ORDER BY created_at DESC LIMIT $1")
            .bind(limit)
            .fetch_all(pool)
            .await
            .context("select error_analyses failed")?;
    rows.into_iter()
        .map(|(v,)| serde_json::from_value(v).context("error_analyses.analysis is invalid"))
        .collect()
}

/// The aggregate, or an empty one before the first analysis.
pub async fn load_learnings<'e, E>(executor: E) -> anyhow::Result<Learnings>
where
    E: sqlx::PgExecutor<'e>,
{
    load_learnings_with(executor, "SELECT data FROM learnings WHERE id = 1").await
}

async fn load_learnings_with<'e, E>(executor: E, sql: &'static str) -> anyhow::Result<Learnings>
where
    E: sqlx::PgExecutor<'e>,
{
    let row: Option<(Value,)> = sqlx::query_as(sql)
        .fetch_optional(executor)
        .await
        .context("select learnings failed")?;
    match row {
        Some((data,)) => serde_json::from_value(data).context("learnings.data is invalid"),
        None => Ok(Learnings::default()),
    }
}

pub async fn save_learnings<'e, E>(
    executor: E,
    learnings: &Learnings,
    updated_at: DateTime<Utc>,
) -> anyhow::Result<()>
where
    E: sqlx::PgExecutor<'e>,
{
    let data = serde_json::to_value(learnings).context("serialize learnings failed")?;
    sqlx::query(
        "INSERT INTO learnings (id, data, updated_at) VALUES (1, $1, $2) \
         ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data, updated_at = EXCLUDED.updated_at",
    )
    .bind(data)
    .bind(updated_at)
    .execute(executor)
    .await
    .context("upsert learnings failed")?;
    Ok(())
}

/// Stores post-mortems and folds the newly stored ones into the aggregate, in one
/// transaction: an analysis is never on record without being part of the learnings.
/// Returns the analyses that were new together with the updated aggregate.
pub async fn record_analyses(
    pool: &sqlx::PgPool,
    analyses: Vec<ErrorAnalysis>,
    now: DateTime<Utc>,
) -> anyhow::Result<(Vec<ErrorAnalysis>, Learnings)> {
    let mut tx = pool.begin().await.context("begin transaction failed")?;

    let mut stored = Vec::with_capacity(analyses.len());
    for analysis in analyses {
        if insert_analysis(&mut *tx, &analysis).await? {
            stored.push(analysis);
        }
    }

    let mut learnings =
        load_learnings_with(&mut *tx, "SELECT data FROM learnings WHERE id = 1 FOR UPDATE").await?;
    if !stored.is_empty() {
        learnings.absorb(&stored, now);
        save_learnings(&mut *tx, &learnings, now).await?;
    }

    tx.commit().await.context("commit transaction failed")?;
    Ok((stored, learnings))
}
