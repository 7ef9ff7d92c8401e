use crate::tracking::{PredictionRecord, ResultStatus};
use anyhow::Context;
use chrono::{NaiveDate, Utc};

type RecordRow = (
    String,
    NaiveDate,
    String,
    Option<String>,
    String,
    String,
    f64,
    Option<f64>,
    String,
    Option<String>,
);

const SELECT_RECORDS: &str = "SELECT id, prediction_date, match_label, competition, bet_type, prediction, \
     odds, confidence, result, actual_score FROM prediction_records";

fn record_from_row(row: RecordRow) -> anyhow::Result<PredictionRecord> {
    let (id, date, match_label, competition, bet_type, prediction, odds, confidence, result, actual_score) =
        row;
    let result = result
        .parse::<ResultStatus>()
        .with_context(|| format!("prediction_records.result is invalid for {id}"))?;
    Ok(PredictionRecord {
        id,
        date,
        match_label,
        competition,
        bet_type,
        prediction,
        odds,
        confidence,
        result,
        actual_score,
    })
}

/// Registers freshly published recommendations as pending. A rerun for the same date
/// replaces rows that are still pending, drops pending rows the new batch no longer has,
/// and leaves settled ones untouched.
pub async fn register_pending(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    batch_id: uuid::Uuid,
    analysis_date: NaiveDate,
    records: &[PredictionRecord],
) -> anyhow::Result<()> {
    let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
    let dropped = sqlx::query(
        "DELETE FROM prediction_records \
         WHERE prediction_date = $1 AND result = 'pending' AND id <> ALL($2)",
    )
    .bind(analysis_date)
    .bind(&ids)
    .execute(&mut **tx)
    .await
    .with_context(|| format!("delete stale prediction_records failed (date={analysis_date})"))?
    .rows_affected();
    if dropped > 0 {
        tracing::info!(%analysis_date, dropped, "dropped pending predictions of a replaced batch");
    }

    for r in records {
        sqlx::query(
            "INSERT INTO prediction_records \
               (id, batch_id, prediction_date, match_label, competition, bet_type, prediction, odds, confidence, result) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending') \
             ON CONFLICT (id) DO UPDATE SET \
               batch_id = EXCLUDED.batch_id, match_label = EXCLUDED.match_label, \
               competition = EXCLUDED.competition, bet_type = EXCLUDED.bet_type, \
               prediction = EXCLUDED.prediction, odds = EXCLUDED.odds, confidence = EXCLUDED.confidence \
             WHERE prediction_records.result = 'pending'",
        )
        .bind(&r.id)
        .bind(batch_id)
        .bind(r.date)
        .bind(&r.match_label)
        .bind(&r.competition)
        .bind(&r.bet_type)
        .bind(&r.prediction)
        .bind(r.odds)
        .bind(r.confidence)
        .execute(&mut **tx)
        .await
        .with_context(|| format!("upsert prediction_records failed (id={})", r.id))?;
    }
    Ok(())
}

/// Settles a pending record. Returns false when the id is unknown or already settled.
pub async fn record_result(
    pool: &sqlx::PgPool,
    id: &str,
    result: ResultStatus,
    actual_score: &str,
) -> anyhow::Result<bool> {
    anyhow::ensure!(result.is_settled(), "cannot record a pending result for {id}");
    let res = sqlx::query(
        "UPDATE prediction_records SET result = $2, actual_score = $3, settled_at = $4 \
         WHERE id = $1 AND result = 'pending'",
    )
    .bind(id)
    .bind(result.as_str())
    .bind(actual_score)
    .bind(Utc::now())
    .execute(pool)
    .await
    .with_context(|| format!("update prediction_records failed (id={id})"))?;
    Ok(res.rows_affected() == 1)
}

pub async fn list_all(pool: &sqlx::PgPool) -> anyhow::Result<Vec<PredictionRecord>> {
    let rows: Vec<RecordRow> = sqlx::query_as(&format!("{SELECT_RECORDS} ORDER BY prediction_date, id"))
        .fetch_all(pool)
        .await
        .context("select prediction_records failed")?;
    rows.into_iter().map(record_from_row).collect()
}

pub async fn list_pending(pool: &sqlx::PgPool) -> anyhow::Result<Vec<PredictionRecord>> {
    let rows: Vec<RecordRow> = sqlx::query_as(&format!(
        "{SELECT_RECORDS} WHERE result = 'pending' ORDER BY prediction_date, id"
    ))
    .fetch_all(pool)
    .await
    .context("select pending prediction_records failed")?;
    rows.into_iter().map(record_from_row).collect()
}

/// Lost records that have no post-mortem yet.
pub async fn list_unanalysed_losses(pool: &sqlx::PgPool) -> anyhow::Result<Vec<PredictionRecord>> {
    let rows: Vec<RecordRow> = sqlx::query_as(&format!(
        "{SELECT_RECORDS} r WHERE r.result = 'loss' \
         AND NOT EXISTS (SELECT 1 FROM error_analyses e WHERE e.prediction_id = r.id) \
         ORDER BY r.prediction_date, r.id"
    ))
    .fetch_all(pool)
    .await
    .context("select unanalysed losses failed")?;
    rows.into_iter().map(record_from_row).collect()
}
