use anyhow::Context;
use chrono::{Datelike, NaiveDate};

// Session-scoped; guards against two pipeline runs for the same analysis date.
const LOCK_NAMESPACE: i64 = 0x5449_5053_5445; // "TIPSTE"

fn lock_key_for_date(analysis_date: NaiveDate) -> i64 {
    LOCK_NAMESPACE ^ i64::from(analysis_date.num_days_from_ce())
}

/// Session-level advisory locks belong to one connection, so the caller holds `conn` for
/// the whole run and releases through the same connection.
pub async fn try_acquire_analysis_date_lock(
    conn: &mut sqlx::PgConnection,
    analysis_date: NaiveDate,
) -> anyhow::Result<bool> {
    let key = lock_key_for_date(analysis_date);
    let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .persistent(false)
        .bind(key)
        .fetch_one(&mut *conn)
        .await
        .with_context(|| format!("failed to acquire advisory lock (key={key})"))?;
    Ok(acquired.0)
}

/// Returns false when `conn` did not hold the lock.
pub async fn release_analysis_date_lock(
    conn: &mut sqlx::PgConnection,
    analysis_date: NaiveDate,
) -> anyhow::Result<bool> {
    let key = lock_key_for_date(analysis_date);
    let released: (bool,) = sqlx::query_as("SELECT pg_advisory_unlock($1)")
        .persistent(false)
        .bind(key)
        .fetch_one(&mut *conn)
        .await
        .with_context(|| format!("failed to release advisory lock (key={key})"))?;
    Ok(released.0)
}
