use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sections of `detailed_analysis` that describe each side separately and therefore follow
/// the home/away orientation of the match label.
pub const ORIENTED_SECTIONS: [&str; 3] = ["recent_form", "injuries_suspensions", "schedule_fatigue"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionBatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_date: Option<NaiveDate>,
    pub recommendations: Vec<Recommendation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combined_bet: Option<CombinedBet>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Free-text "Home vs Away" label as written by the model.
    #[serde(rename = "match")]
    pub match_label: String,
    pub odds: f64,
    #[serde(default)]
    pub bet_type: String,
    #[serde(default)]
    pub prediction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kickoff: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_analysis: Option<DetailedAnalysis>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Recommendation {
    pub fn new(match_label: impl Into<String>, odds: f64) -> Self {
        Self {
            match_label: match_label.into(),
            odds,
            bet_type: String::new(),
            prediction: String::new(),
            competition: None,
            kickoff: None,
            confidence: None,
            risk_level: None,
            detailed_analysis: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedBet {
    #[serde(default)]
    pub matches: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_odds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// Free-form analysis written by the model. Only the oriented sections are interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DetailedAnalysis(pub Map<String, Value>);

impl DetailedAnalysis {
    /// Swaps `home_team` and `away_team` in every oriented section that carries both.
    /// Sections that are missing, not an object, or hold only one side are left alone.
    /// Returns the number of sections swapped.
    pub fn swap_sides(&mut self) -> usize {
        let mut swapped = 0;
        for section in ORIENTED_SECTIONS {
            let Some(Value::Object(fields)) = self.0.get_mut(section) else {
                continue;
            };
            let (Some(home), Some(away)) = (
                fields.get("home_team").cloned(),
                fields.get("away_team").cloned(),
            ) else {
                continue;
            };
            fields.insert("home_team".to_string(), away);
            fields.insert("away_team".to_string(), home);
            swapped += 1;
        }
        swapped
    }
}
