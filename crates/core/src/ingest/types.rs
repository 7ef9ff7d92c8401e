use crate::domain::fixture::{FinalScore, Fixture};
use crate::settlement::FINISHED_STATUSES;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Envelope shared by every API-Football v3 endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub errors: Value,
    #[serde(default)]
    pub results: Option<u32>,
    #[serde(default = "Vec::new")]
    pub response: Vec<T>,
}

pub type FixturesResponse = ApiResponse<FixtureItem>;

impl<T> ApiResponse<T> {
    /// API-Football reports quota and key problems with a 200 and a non-empty `errors`.
    pub fn error_message(&self) -> Option<String> {
        match &self.errors {
            Value::Object(m) if !m.is_empty() => Some(Value::Object(m.clone()).to_string()),
            Value::Array(a) if !a.is_empty() => Some(Value::Array(a.clone()).to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureItem {
    pub fixture: FixtureInfo,
    pub league: LeagueInfo,
    pub teams: Teams,
    #[serde(default)]
    pub goals: Goals,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureInfo {
    pub id: i64,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub status: Option<FixtureStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureStatus {
    #[serde(default)]
    pub short: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeagueInfo {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Teams {
    pub home: Team,
    pub away: Team,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub winner: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Goals {
    #[serde(default)]
    pub home: Option<u32>,
    #[serde(default)]
    pub away: Option<u32>,
}

/// One entry of `/injuries`: a player missing a fixture, injured or suspended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjuryItem {
    pub player: InjuredPlayer,
    pub team: Team,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjuredPlayer {
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl FixtureItem {
    pub fn status(&self) -> Option<&str> {
        self.fixture.status.as_ref()?.short.as_deref()
    }

    pub fn to_fixture(&self) -> Fixture {
        let mut extra = Map::new();
        if let Some(status) = self.status() {
            extra.insert("status".to_string(), Value::String(status.to_string()));
        }
        Fixture {
            home: self.teams.home.name.clone(),
            away: self.teams.away.name.clone(),
            competition: Some(self.league.name.clone()),
            country: self.league.country.clone(),
            league_id: Some(self.league.id),
            kickoff: self.fixture.date.clone(),
            fixture_id: Some(self.fixture.id),
            home_team_id: Some(self.teams.home.id),
            away_team_id: Some(self.teams.away.id),
            extra,
        }
    }

    /// `Some` only for finished fixtures with both goal counts present.
    pub fn to_final_score(&self) -> Option<FinalScore> {
        let status = self.status()?;
        if !FINISHED_STATUSES.contains(&status) {
            return None;
        }
        Some(FinalScore {
            home: self.teams.home.name.clone(),
            away: self.teams.away.name.clone(),
            home_goals: self.goals.home?,
            away_goals: self.goals.away?,
            status: status.to_string(),
        })
    }
}

/// Which competitions are worth analysing.
#[derive(Debug, Clone, PartialEq)]
pub struct CompetitionFilter {
    pub included_league_ids: Vec<i64>,
    pub included_competitions: Vec<String>,
    pub excluded_keywords: Vec<String>,
    /// Countries accepted when a fixture only matches by competition name.
    pub allowed_countries: Vec<String>,
}

impl Default for CompetitionFilter {
    fn default() -> Self {
        let strings = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect();
        Self {
            // API-Football ids: UCL, UEL, UECL, top five leagues, Championship, Primeira,
            // Eredivisie, Belgian Pro League.
            included_league_ids: vec![2, 3, 848, 39, 140, 135, 78, 61, 40, 94, 88, 144],
            included_competitions: strings(&[
                "Champions League",
                "Europa League",
                "Conference League",
                "Premier League",
                "La Liga",
                "Serie A",
                "Bundesliga",
                "Ligue 1",
                "Championship",
                "Liga Portugal",
                "Eredivisie",
                "Belgian Pro League",
                "World Cup Qualification",
                "Euro Qualification",
            ]),
            excluded_keywords: strings(&["Friendly", "Amical", "U21", "U19", "Youth"]),
            allowed_countries: strings(&[
                "England", "Spain", "Italy", "Germany", "France", "Belgium", "Portugal",
                "Netherlands", "World", "Europe",
            ]),
        }
    }
}

impl CompetitionFilter {
    pub fn accepts(&self, fixture: &Fixture) -> bool {
        let competition = fixture.competition.as_deref().unwrap_or_default().to_lowercase();

        if self
            .excluded_keywords
            .iter()
            .any(|k| competition.contains(&k.to_lowercase()))
        {
            return false;
        }

        if let Some(league_id) = fixture.league_id {
            return self.included_league_ids.contains(&league_id);
        }

        let named = self
            .included_competitions
            .iter()
            .any(|c| competition.contains(&c.to_lowercase()));
        let country_ok = match fixture.country.as_deref() {
            None | Some("") => true,
            Some(country) => self.allowed_countries.iter().any(|c| c == country),
        };
        named && country_ok
    }
}

pub fn filter_fixtures(fixtures: Vec<Fixture>, filter: &CompetitionFilter) -> Vec<Fixture> {
    let before = fixtures.len();
    let kept: Vec<Fixture> = fixtures.into_iter().filter(|f| filter.accepts(f)).collect();
    tracing::debug!(before, after = kept.len(), "filtered fixtures by competition");
    kept
}
