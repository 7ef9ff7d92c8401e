pub mod domain;
pub mod ingest;
pub mod learning;
pub mod llm;
pub mod matching;
pub mod settlement;
pub mod storage;
pub mod tracking;
pub mod validation;

pub mod config {
    use anyhow::Context;

    const DEFAULT_MIN_ODDS: f64 = 1.50;
    const DEFAULT_MAX_ODDS: f64 = 4.00;
    const DEFAULT_MIN_CONFIDENCE: u32 = 75;
    const DEFAULT_MAX_PREDICTIONS: usize = 8;
    const DEFAULT_TIMEZONE: &str = "Europe/Brussels";
    // Europe/Brussels outside daylight saving time.
    const DEFAULT_TIMEZONE_OFFSET_HOURS: i32 = 1;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub anthropic_api_key: Option<String>,
        pub api_football_key: Option<String>,
        pub sentry_dsn: Option<String>,
        pub betting: BettingRules,
        /// IANA name sent to the fixtures provider so match days follow local time.
        pub timezone: String,
        pub timezone_offset_hours: i32,
    }

    /// Limits handed to the LLM and enforced again by the validator.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct BettingRules {
        pub min_odds: f64,
        pub max_odds: f64,
        pub min_confidence: u32,
        pub max_predictions: usize,
    }

    impl Default for BettingRules {
        fn default() -> Self {
            Self {
                min_odds: DEFAULT_MIN_ODDS,
                max_odds: DEFAULT_MAX_ODDS,
                min_confidence: DEFAULT_MIN_CONFIDENCE,
                max_predictions: DEFAULT_MAX_PREDICTIONS,
            }
        }
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let betting = BettingRules {
                min_odds: parse_env("MIN_ODDS")?.unwrap_or(DEFAULT_MIN_ODDS),
                max_odds: parse_env("MAX_ODDS")?.unwrap_or(DEFAULT_MAX_ODDS),
                min_confidence: parse_env("MIN_CONFIDENCE")?.unwrap_or(DEFAULT_MIN_CONFIDENCE),
                max_predictions: parse_env("MAX_PREDICTIONS")?.unwrap_or(DEFAULT_MAX_PREDICTIONS),
            };

            anyhow::ensure!(
                betting.min_odds > 1.0 && betting.min_odds <= betting.max_odds,
                "MIN_ODDS must be > 1.0 and <= MAX_ODDS (got {} / {})",
                betting.min_odds,
                betting.max_odds
            );
            anyhow::ensure!(
                betting.max_predictions >= 1,
                "MAX_PREDICTIONS must be >= 1"
            );

            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
                api_football_key: std::env::var("API_FOOTBALL_KEY").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                betting,
                timezone: std::env::var("TIMEZONE")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
                timezone_offset_hours: parse_env("TIMEZONE_OFFSET_HOURS")?
                    .unwrap_or(DEFAULT_TIMEZONE_OFFSET_HOURS),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }

        pub fn require_api_football_key(&self) -> anyhow::Result<&str> {
            self.api_football_key
                .as_deref()
                .context("API_FOOTBALL_KEY is required")
        }
    }

    /// Today's date at a fixed UTC offset.
    pub fn local_today(timezone_offset_hours: i32) -> anyhow::Result<chrono::NaiveDate> {
        let offset = timezone_offset_hours
            .checked_mul(3600)
            .and_then(chrono::FixedOffset::east_opt)
            .with_context(|| format!("invalid TIMEZONE_OFFSET_HOURS={timezone_offset_hours}"))?;
        Ok(chrono::Utc::now().with_timezone(&offset).date_naive())
    }

    fn parse_env<T>(key: &str) -> anyhow::Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match std::env::var(key) {
            Ok(s) if !s.trim().is_empty() => {
                let v = s
                    .trim()
                    .parse::<T>()
                    .with_context(|| format!("invalid value for {key}: {s}"))?;
                Ok(Some(v))
            }
            _ => Ok(None),
        }
    }
}
