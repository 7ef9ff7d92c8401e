use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A scheduled match as published by the fixtures provider. Home/away order is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub home: String,
    pub away: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub league_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kickoff: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixture_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_team_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub away_team_id: Option<i64>,

    /// Provider metadata the pipeline does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Fixture {
    pub fn new(home: impl Into<String>, away: impl Into<String>) -> Self {
        Self {
            home: home.into(),
            away: away.into(),
            competition: None,
            country: None,
            league_id: None,
            kickoff: None,
            fixture_id: None,
            home_team_id: None,
            away_team_id: None,
            extra: Map::new(),
        }
    }

    pub fn with_competition(mut self, competition: impl Into<String>) -> Self {
        self.competition = Some(competition.into());
        self
    }

    pub fn label(&self) -> String {
        format!("{} vs {}", self.home, self.away)
    }
}

/// Final score of a finished fixture, used to settle bets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalScore {
    pub home: String,
    pub away: String,
    pub home_goals: u32,
    pub away_goals: u32,
    /// Provider status code (`FT`, `AET`, `PEN`).
    pub status: String,
}

impl FinalScore {
    pub fn score(&self) -> String {
        format!("{}-{}", self.home_goals, self.away_goals)
    }

    pub fn total_goals(&self) -> u32 {
        self.home_goals + self.away_goals
    }
}
