//! Postgres round trips. Run with `DATABASE_URL` set: `cargo test -- --ignored`.

use chrono::{NaiveDate, Utc};
use serde_json::Map;
use tipster_core::domain::fixture::Fixture;
use tipster_core::domain::recommendation::{PredictionBatch, Recommendation};
use tipster_core::learning::{ErrorAnalysis, ErrorCategory};
use tipster_core::storage;
use tipster_core::tracking::ResultStatus;
use tipster_core::validation::PredictionValidator;

async fn pool() -> sqlx::PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .unwrap();
    storage::migrate(&pool).await.unwrap();
    pool
}

async fn publish(pool: &sqlx::PgPool, date: NaiveDate, labels: &[&str]) {
    let fixtures: Vec<Fixture> = labels
        .iter()
        .map(|l| {
            let (home, away) = l.split_once(" vs ").unwrap();
            Fixture::new(home, away)
        })
        .collect();
    let batch = PredictionBatch {
        analysis_date: Some(date),
        recommendations: labels.iter().map(|l| Recommendation::new(*l, 2.0)).collect(),
        combined_bet: None,
        extra: Map::new(),
    };
    let (batch, report) = PredictionValidator::new(&fixtures).validate_batch(batch, 1.5);
    storage::predictions::persist_success(pool, date, Utc::now(), "anthropic", &batch, &report, None)
        .await
        .unwrap();
}

#[tokio::test]
#[ignore] // Requires database
async fn rerun_with_fewer_picks_drops_stale_pending_rows() {
    let pool = pool().await;
    let date = NaiveDate::from_ymd_opt(2099, 1, 3).unwrap();
    sqlx::query("DELETE FROM prediction_records WHERE prediction_date = $1")
        .bind(date)
        .execute(&pool)
        .await
        .unwrap();

    publish(&pool, date, &["Lille vs Lens", "Ajax vs PSV", "Porto vs Braga"]).await;
    let first_id = format!("{date}_0");
    assert!(
        storage::performance::record_result(&pool, &first_id, ResultStatus::Win, "2-0")
            .await
            .unwrap()
    );

    publish(&pool, date, &["Roma vs Lazio", "Napoli vs Milan"]).await;

    let mut rows: Vec<_> = storage::performance::list_all(&pool)
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.date == date)
        .map(|r| (r.id, r.match_label, r.result))
        .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        rows,
        vec![
            (first_id, "Lille vs Lens".to_string(), ResultStatus::Win),
            (format!("{date}_1"), "Napoli vs Milan".to_string(), ResultStatus::Pending),
        ]
    );
}

#[tokio::test]
#[ignore] // Requires database
async fn analyses_and_learnings_are_stored_together() {
    let pool = pool().await;
    let date = NaiveDate::from_ymd_opt(2099, 1, 5).unwrap();
    // Cascades to the analyses of a previous run.
    sqlx::query("DELETE FROM prediction_records WHERE prediction_date = $1")
        .bind(date)
        .execute(&pool)
        .await
        .unwrap();
    publish(&pool, date, &["Lille vs Lens"]).await;
    let before = storage::learnings::load_learnings(&pool).await.unwrap();

    let analysis = ErrorAnalysis {
        prediction_id: format!("{date}_0"),
        match_label: "Lille vs Lens".to_string(),
        bet_type: "1X2".to_string(),
        bet_choice: "1".to_string(),
        final_score: Some("0-1".to_string()),
        main_cause: "Key striker missing".to_string(),
        missed_factors: vec!["absences".to_string()],
        actionable_conclusion: "Check the absence list before backing a home win.".to_string(),
        error_category: ErrorCategory::MissingPlayer,
        analysis_date: Utc::now(),
    };

    let (stored, learnings) =
        storage::learnings::record_analyses(&pool, vec![analysis.clone()], Utc::now())
            .await
            .unwrap();
    assert_eq!(stored, vec![analysis.clone()]);
    assert_eq!(learnings.total_errors_analyzed, before.total_errors_analyzed + 1);
    assert_eq!(storage::learnings::load_learnings(&pool).await.unwrap(), learnings);

    // Already on record: nothing new is stored and the aggregate does not move.
    let (stored, again) = storage::learnings::record_analyses(&pool, vec![analysis], Utc::now())
        .await
        .unwrap();
    assert!(stored.is_empty());
    assert_eq!(again.total_errors_analyzed, learnings.total_errors_analyzed);
}

#[tokio::test]
#[ignore] // Requires database
async fn date_lock_is_released_by_the_connection_holding_it() {
    let pool = pool().await;
    let date = NaiveDate::from_ymd_opt(2099, 1, 4).unwrap();

    let mut holder = pool.acquire().await.unwrap();
    let mut other = pool.acquire().await.unwrap();

    assert!(storage::lock::try_acquire_analysis_date_lock(&mut holder, date).await.unwrap());
    assert!(!storage::lock::try_acquire_analysis_date_lock(&mut other, date).await.unwrap());
    assert!(!storage::lock::release_analysis_date_lock(&mut other, date).await.unwrap());

    assert!(storage::lock::release_analysis_date_lock(&mut holder, date).await.unwrap());
    assert!(storage::lock::try_acquire_analysis_date_lock(&mut other, date).await.unwrap());
    assert!(storage::lock::release_analysis_date_lock(&mut other, date).await.unwrap());
}
