use crate::config::Settings;
use crate::domain::fixture::{FinalScore, Fixture};
use crate::ingest::stats::{self, FixtureContext, FORM_MATCHES, H2H_MATCHES};
use crate::ingest::types::{ApiResponse, FixtureItem, FixturesResponse, InjuryItem};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const DEFAULT_BASE_URL: &str = "https://v3.football.api-sports.io";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;
const MAX_BACKOFF_EXPONENT: u32 = 6;

#[async_trait::async_trait]
pub trait FixtureProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Every fixture scheduled on `date`, in provider order.
    async fn fetch_fixtures(&self, date: NaiveDate) -> Result<Vec<Fixture>>;

    /// Final scores of the fixtures on `date` that are over.
    async fn fetch_results(&self, date: NaiveDate) -> Result<Vec<FinalScore>>;

    /// Recent form, head-to-head and absences for one fixture.
    async fn fetch_context(&self, _fixture: &Fixture) -> Result<FixtureContext> {
        Ok(FixtureContext::default())
    }
}

#[derive(Debug, Clone)]
pub struct ApiFootballClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    timezone: String,
    retries: u32,
    // One `/fixtures?date=` call serves both fixtures and results for that day.
    cache: Arc<Mutex<HashMap<NaiveDate, Arc<FixturesResponse>>>>,
}

/// Query of the day's fixtures. Without `timezone` API-Football groups days in UTC.
fn day_query(date: NaiveDate, timezone: &str) -> Vec<(&'static str, String)> {
    vec![("date", date.to_string()), ("timezone", timezone.to_string())]
}

/// 1s, 2s, 4s, ... capped at 64s.
fn backoff(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
    Duration::from_secs(1u64 << exponent)
}

impl ApiFootballClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.require_api_football_key()?.to_string();
        let base_url = std::env::var("API_FOOTBALL_BASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("API_FOOTBALL_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("API_FOOTBALL_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES)
            .max(1);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build API-Football http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            timezone: settings.timezone.clone(),
            retries,
            cache: Arc::default(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-apisports-key", HeaderValue::from_str(&self.api_key)?);
        Ok(headers)
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<ApiResponse<T>> {
        let res = self
            .http
            .get(self.url(path))
            .headers(self.headers()?)
            .query(query)
            .send()
            .await
            .with_context(|| format!("API-Football request failed (/{path})"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read API-Football response")?;

        if !status.is_success() {
            anyhow::bail!("API-Football HTTP {status} (/{path}): {text}");
        }

        let parsed = serde_json::from_str::<ApiResponse<T>>(&text)
            .with_context(|| format!("failed to parse API-Football response (/{path}): {text}"))?;
        if let Some(errors) = parsed.error_message() {
            anyhow::bail!("API-Football returned errors (/{path}): {errors}");
        }
        Ok(parsed)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<ApiResponse<T>> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.get_once(path, query).await {
                Ok(parsed) => return Ok(parsed),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let delay = backoff(attempt);
                    tracing::warn!(path, attempt, ?delay, error = %err, "API-Football fetch failed; retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn fetch_day(&self, date: NaiveDate) -> Result<Arc<FixturesResponse>> {
        if let Some(hit) = self.cache.lock().await.get(&date) {
            tracing::debug!(%date, "API-Football cache hit");
            return Ok(Arc::clone(hit));
        }

        let parsed: Arc<FixturesResponse> = Arc::new(
            self.get::<FixtureItem>("fixtures", &day_query(date, &self.timezone))
                .await?,
        );

        tracing::info!(%date, fixtures = parsed.response.len(), "fetched fixtures from API-Football");
        self.cache.lock().await.insert(date, Arc::clone(&parsed));
        Ok(parsed)
    }

    async fn team_form(&self, team_id: i64) -> Result<Vec<FixtureItem>> {
        let query = [
            ("team", team_id.to_string()),
            ("last", FORM_MATCHES.to_string()),
            ("timezone", self.timezone.clone()),
        ];
        Ok(self.get::<FixtureItem>("fixtures", &query).await?.response)
    }
}

#[async_trait::async_trait]
impl FixtureProvider for ApiFootballClient {
    fn provider_name(&self) -> &'static str {
        "api_football"
    }

    async fn fetch_fixtures(&self, date: NaiveDate) -> Result<Vec<Fixture>> {
        let day = self.fetch_day(date).await?;
        Ok(day.response.iter().map(|item| item.to_fixture()).collect())
    }

    async fn fetch_results(&self, date: NaiveDate) -> Result<Vec<FinalScore>> {
        let day = self.fetch_day(date).await?;
        Ok(day
            .response
            .iter()
            .filter_map(|item| item.to_final_score())
            .collect())
    }

    async fn fetch_context(&self, fixture: &Fixture) -> Result<FixtureContext> {
        let (Some(home_id), Some(away_id)) = (fixture.home_team_id, fixture.away_team_id) else {
            return Ok(FixtureContext::default());
        };

        let home_form = self.team_form(home_id).await?;
        let away_form = self.team_form(away_id).await?;
        let h2h = self
            .get::<FixtureItem>(
                "fixtures/headtohead",
                &[
                    ("h2h", format!("{home_id}-{away_id}")),
                    ("last", H2H_MATCHES.to_string()),
                    ("timezone", self.timezone.clone()),
                ],
            )
            .await?
            .response;
        let injuries: Vec<InjuryItem> = match fixture.fixture_id {
            Some(fixture_id) => {
                self.get::<InjuryItem>("injuries", &[("fixture", fixture_id.to_string())])
                    .await?
                    .response
            }
            None => Vec::new(),
        };

        Ok(FixtureContext {
            home_form: stats::recent_form(home_id, &home_form),
            away_form: stats::recent_form(away_id, &away_form),
            head_to_head: stats::head_to_head(&h2h),
            home_absences: stats::absences(home_id, &injuries),
            away_absences: stats::absences(away_id, &injuries),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{backoff, day_query, FixtureProvider};
    use crate::domain::fixture::Fixture;
    use crate::ingest::stats::FixtureContext;
    use crate::ingest::types::{filter_fixtures, CompetitionFilter, FixturesResponse};
    use chrono::NaiveDate;
    use serde_json::json;
    use std::time::Duration;

    fn sample_response() -> FixturesResponse {
        serde_json::from_value(json!({
            "get": "fixtures",
            "errors": [],
            "results": 3,
            "response": [
                {
                    "fixture": {"id": 101, "date": "2026-10-15T18:45:00+00:00", "status": {"short": "FT"}},
                    "league": {"id": 3, "name": "UEFA Europa League", "country": "World"},
                    "teams": {"home": {"id": 497, "name": "AS Roma"}, "away": {"id": 566, "name": "Plzen"}},
                    "goals": {"home": 2, "away": 1}
                },
                {
                    "fixture": {"id": 102, "date": "2026-10-15T21:00:00+00:00", "status": {"short": "NS"}},
                    "league": {"id": 61, "name": "Ligue 1", "country": "France"},
                    "teams": {"home": {"id": 79, "name": "Lille"}, "away": {"id": 116, "name": "Lens"}},
                    "goals": {"home": null, "away": null}
                },
                {
                    "fixture": {"id": 103, "date": null, "status": {"short": "PEN"}},
                    "league": {"id": 667, "name": "Friendlies Clubs", "country": "World"},
                    "teams": {"home": {"id": 1, "name": "Ajax"}, "away": {"id": 2, "name": "PSV"}},
                    "goals": {"home": 1, "away": 1}
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn converts_items_to_fixtures_in_provider_order() {
        let resp = sample_response();
        assert!(resp.error_message().is_none());

        let fixtures: Vec<Fixture> = resp.response.iter().map(|i| i.to_fixture()).collect();
        assert_eq!(fixtures.len(), 3);
        assert_eq!(fixtures[0].label(), "AS Roma vs Plzen");
        assert_eq!(fixtures[0].league_id, Some(3));
        assert_eq!(fixtures[0].home_team_id, Some(497));
        assert_eq!(fixtures[1].kickoff.as_deref(), Some("2026-10-15T21:00:00+00:00"));
        assert_eq!(fixtures[1].extra["status"], json!("NS"));
    }

    #[test]
    fn only_finished_fixtures_produce_scores() {
        let resp = sample_response();
        let scores: Vec<_> = resp.response.iter().filter_map(|i| i.to_final_score()).collect();

        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].score(), "2-1");
        assert_eq!(scores[1].status, "PEN");
    }

    #[test]
    fn surfaces_provider_errors_object() {
        let resp: FixturesResponse = serde_json::from_value(json!({
            "errors": {"token": "Error/Missing application key"},
            "response": []
        }))
        .unwrap();
        assert!(resp.error_message().unwrap().contains("Missing application key"));
    }

    #[test]
    fn filters_by_league_id_and_excluded_keywords() {
        let resp = sample_response();
        let fixtures: Vec<Fixture> = resp.response.iter().map(|i| i.to_fixture()).collect();
        let kept = filter_fixtures(fixtures, &CompetitionFilter::default());

        let labels: Vec<_> = kept.iter().map(|f| f.label()).collect();
        assert_eq!(labels, vec!["AS Roma vs Plzen", "Lille vs Lens"]);
    }

    #[test]
    fn falls_back_to_competition_name_and_country() {
        let filter = CompetitionFilter::default();
        let mut named = Fixture::new("Arsenal", "Chelsea").with_competition("Premier League");
        assert!(filter.accepts(&named));

        named.country = Some("England".to_string());
        assert!(filter.accepts(&named));

        // Same league name elsewhere is a different competition.
        named.country = Some("Egypt".to_string());
        assert!(!filter.accepts(&named));

        let youth = Fixture::new("Arsenal U21", "Chelsea U21").with_competition("Premier League U21");
        assert!(!filter.accepts(&youth));

        let unnamed = Fixture::new("A", "B");
        assert!(!filter.accepts(&unnamed));
    }

    #[test]
    fn day_query_carries_the_local_timezone() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        assert_eq!(
            day_query(date, "Europe/Brussels"),
            vec![
                ("date", "2026-10-15".to_string()),
                ("timezone", "Europe/Brussels".to_string()),
            ]
        );
    }

    #[test]
    fn backoff_doubles_then_stays_capped() {
        assert_eq!(backoff(1), Duration::from_secs(1));
        assert_eq!(backoff(3), Duration::from_secs(4));
        assert_eq!(backoff(7), Duration::from_secs(64));
        assert_eq!(backoff(100), Duration::from_secs(64));
        assert_eq!(backoff(u32::MAX), Duration::from_secs(64));
    }

    struct NoContext;

    #[async_trait::async_trait]
    impl FixtureProvider for NoContext {
        fn provider_name(&self) -> &'static str {
            "none"
        }

        async fn fetch_fixtures(&self, _date: NaiveDate) -> anyhow::Result<Vec<Fixture>> {
            Ok(Vec::new())
        }

        async fn fetch_results(
            &self,
            _date: NaiveDate,
        ) -> anyhow::Result<Vec<crate::domain::fixture::FinalScore>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn providers_without_context_return_an_empty_one() {
        let ctx = NoContext
            .fetch_context(&Fixture::new("Lille", "Lens"))
            .await
            .unwrap();
        assert_eq!(ctx, FixtureContext::default());
    }
}
