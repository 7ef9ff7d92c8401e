use crate::domain::recommendation::PredictionBatch;
use crate::storage::performance;
use crate::tracking::PredictionRecord;
use crate::validation::ValidationReport;
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;

/// A successful run as stored.
#[derive(Debug, Clone, Serialize)]
pub struct StoredBatch {
    pub id: uuid::Uuid,
    pub analysis_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub provider: String,
    pub batch: PredictionBatch,
    pub validation_report: Option<Value>,
}

type BatchRow = (
    uuid::Uuid,
    NaiveDate,
    DateTime<Utc>,
    String,
    Value,
    Option<Value>,
);

/// Stores the validated batch with its report and registers every recommendation as a
/// pending prediction, in one transaction.
pub async fn persist_success(
    pool: &sqlx::PgPool,
    analysis_date: NaiveDate,
    generated_at: DateTime<Utc>,
    provider: &str,
    batch: &PredictionBatch,
    report: &ValidationReport,
    raw_llm_response: Option<Value>,
) -> anyhow::Result<uuid::Uuid> {
    let batch_json = serde_json::to_value(batch).context("serialize prediction batch failed")?;
    let report_json = serde_json::to_value(report).context("serialize validation report failed")?;

    let mut tx = pool.begin().await.context("begin transaction failed")?;

    let batch_id: uuid::Uuid = sqlx::query_scalar(
        "INSERT INTO prediction_batches \
           (analysis_date, generated_at, provider, status, error, batch, validation_report, raw_llm_response) \
         VALUES ($1, $2, $3, 'success', NULL, $4, $5, $6) \
         RETURNING id",
    )
    .bind(analysis_date)
    .bind(generated_at)
    .bind(provider)
    .bind(batch_json)
    .bind(report_json)
    .bind(raw_llm_response)
    .fetch_one(&mut *tx)
    .await
    .context("insert prediction_batches failed")?;

    let records: Vec<PredictionRecord> = batch
        .recommendations
        .iter()
        .enumerate()
        .map(|(idx, rec)| PredictionRecord::pending(analysis_date, idx, rec))
        .collect();
    performance::register_pending(&mut tx, batch_id, analysis_date, &records).await?;

    tx.commit().await.context("commit transaction failed")?;
    Ok(batch_id)
}

pub async fn persist_failure(
    pool: &sqlx::PgPool,
    analysis_date: NaiveDate,
    generated_at: DateTime<Utc>,
    provider: &str,
    error: &str,
    raw_llm_response: Option<Value>,
) -> anyhow::Result<uuid::Uuid> {
    let batch_id: uuid::Uuid = sqlx::query_scalar(
        "INSERT INTO prediction_batches (analysis_date, generated_at, provider, status, error, raw_llm_response) \
         VALUES ($1, $2, $3, 'error', $4, $5) \
         RETURNING id",
    )
    .bind(analysis_date)
    .bind(generated_at)
    .bind(provider)
    .bind(error)
    .bind(raw_llm_response)
    .fetch_one(pool)
    .await
    .context("insert error prediction_batches failed")?;

    Ok(batch_id)
}

fn stored_from_row(row: BatchRow) -> anyhow::Result<StoredBatch> {
    let (id, analysis_date, generated_at, provider, batch, validation_report) = row;
    let batch = serde_json::from_value::<PredictionBatch>(batch)
        .with_context(|| format!("prediction_batches.batch is not a valid batch (id={id})"))?;
    Ok(StoredBatch {
        id,
        analysis_date,
        generated_at,
        provider,
        batch,
        validation_report,
    })
}

pub async fn load_latest(pool: &sqlx::PgPool) -> anyhow::Result<Option<StoredBatch>> {
    let row: Option<BatchRow> = sqlx::query_as(
        "SELECT id, analysis_date, generated_at, provider, batch, validation_report \
         FROM prediction_batches \
         WHERE status = 'success' \
         ORDER BY analysis_date DESC, generated_at DESC \
         LIMIT 1",
    )
    .fetch_optional(pool)
    .await
    .context("select latest prediction batch failed")?;
    row.map(stored_from_row).transpose()
}

pub async fn load_for_date(
    pool: &sqlx::PgPool,
    analysis_date: NaiveDate,
) -> anyhow::Result<Option<StoredBatch>> {
    let row: Option<BatchRow> = sqlx::query_as(
        "SELECT id, analysis_date, generated_at, provider, batch, validation_report \
         FROM prediction_batches \
         WHERE status = 'success' AND analysis_date = $1 \
         ORDER BY generated_at DESC \
         LIMIT 1",
    )
    .bind(analysis_date)
    .fetch_optional(pool)
    .await
    .context("select prediction batch by date failed")?;
    row.map(stored_from_row).transpose()
}
