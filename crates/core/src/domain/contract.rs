use crate::domain::recommendation::{CombinedBet, DetailedAnalysis, PredictionBatch, Recommendation};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];

/// Batch exactly as the model emitted it. Fields stay raw JSON here so that one badly typed
/// value cannot sink the whole batch; the shape is checked once in
/// [`LlmPredictionBatch::validate_and_into_batch`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmPredictionBatch {
    #[serde(default)]
    pub analysis_date: Option<Value>,
    #[serde(default)]
    pub recommendations: Option<Value>,
    #[serde(default)]
    pub combined_bet: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmRecommendation {
    #[serde(default, rename = "match")]
    pub match_label: Option<Value>,
    #[serde(default)]
    pub odds: Option<Value>,
    #[serde(default)]
    pub bet_type: Option<Value>,
    #[serde(default)]
    pub prediction: Option<Value>,
    #[serde(default)]
    pub competition: Option<Value>,
    #[serde(default)]
    pub kickoff: Option<Value>,
    #[serde(default)]
    pub confidence: Option<Value>,
    #[serde(default)]
    pub risk_level: Option<Value>,
    #[serde(default)]
    pub detailed_analysis: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The batch does not have the shape of a prediction batch at all. Per-item problems never
/// produce this error; they surface in the validation report or in a warning instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputContractError {
    MissingRecommendations,
    RecommendationsNotAList,
    MissingOdds { items: usize },
}

impl fmt::Display for InputContractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRecommendations => {
                write!(f, "input contract violation: `recommendations` key is missing")
            }
            Self::RecommendationsNotAList => {
                write!(f, "input contract violation: `recommendations` is not a list")
            }
            Self::MissingOdds { items } => write!(
                f,
                "input contract violation: none of the {items} recommendations carries `odds`"
            ),
        }
    }
}

impl std::error::Error for InputContractError {}

impl LlmPredictionBatch {
    pub fn validate_and_into_batch(
        self,
        max_predictions: usize,
    ) -> Result<PredictionBatch, InputContractError> {
        let raw_items = match self.recommendations {
            None => return Err(InputContractError::MissingRecommendations),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(InputContractError::RecommendationsNotAList),
        };

        let items: Vec<LlmRecommendation> = raw_items
            .into_iter()
            .enumerate()
            .filter_map(|(idx, raw)| match raw {
                Value::Object(_) => serde_json::from_value(raw).ok(),
                other => {
                    tracing::warn!(idx, value = %other, "recommendation is not an object; skipped");
                    None
                }
            })
            .collect();

        if !items.is_empty() && items.iter().all(|item| item.odds.is_none()) {
            return Err(InputContractError::MissingOdds { items: items.len() });
        }

        let total = items.len();
        let mut recommendations: Vec<Recommendation> =
            items.into_iter().map(LlmRecommendation::into_recommendation).collect();

        if recommendations.len() > max_predictions {
            tracing::warn!(
                total,
                max_predictions,
                "LLM returned more recommendations than allowed; keeping the first ones"
            );
            recommendations.truncate(max_predictions);
        }

        let mut extra = self.extra;
        let analysis_date = match self.analysis_date.map(parse_date) {
            None | Some(Ok(None)) => None,
            Some(Ok(Some(date))) => Some(date),
            Some(Err(raw)) => {
                keep_raw(&mut extra, "analysis_date", raw);
                None
            }
        };
        let combined_bet = match self.combined_bet {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(combined_bet_from(map)),
            Some(other) => {
                keep_raw(&mut extra, "combined_bet", other);
                None
            }
        };

        Ok(PredictionBatch {
            analysis_date,
            recommendations,
            combined_bet,
            extra,
        })
    }
}

impl LlmRecommendation {
    fn into_recommendation(self) -> Recommendation {
        let mut extra = self.extra;

        let match_label = read_string("match", self.match_label)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());

        let detailed_analysis = match self.detailed_analysis {
            Some(Value::Object(map)) => Some(DetailedAnalysis(map)),
            Some(Value::Null) | None => None,
            Some(other) => {
                // Not a mapping; carry it through untouched.
                extra.insert("detailed_analysis".to_string(), other);
                None
            }
        };

        Recommendation {
            match_label,
            // A missing or unreadable price can never clear the odds floor.
            odds: read_number("odds", self.odds).unwrap_or(0.0),
            bet_type: read_string("bet_type", self.bet_type).unwrap_or_default(),
            prediction: read_string("prediction", self.prediction).unwrap_or_default(),
            competition: optional_string(&mut extra, "competition", self.competition),
            kickoff: optional_string(&mut extra, "kickoff", self.kickoff),
            confidence: optional_number(&mut extra, "confidence", self.confidence),
            risk_level: optional_string(&mut extra, "risk_level", self.risk_level),
            detailed_analysis,
            extra,
        }
    }
}

fn combined_bet_from(mut map: Map<String, Value>) -> CombinedBet {
    let matches = match map.remove("matches") {
        Some(Value::Array(legs)) => legs
            .into_iter()
            .filter_map(|leg| match leg {
                Value::String(s) => Some(s),
                other => {
                    tracing::warn!(value = %other, "combined_bet leg is not a string; dropped");
                    None
                }
            })
            .collect(),
        None | Some(Value::Null) => Vec::new(),
        Some(other) => {
            tracing::warn!(value = %other, "combined_bet.matches is not a list; dropped");
            Vec::new()
        }
    };
    CombinedBet {
        matches,
        total_odds: read_number("combined_bet.total_odds", map.remove("total_odds")),
        confidence: read_number("combined_bet.confidence", map.remove("confidence")),
        reasoning: read_string("combined_bet.reasoning", map.remove("reasoning")),
    }
}

/// `Ok(None)` for absent or null, `Err(raw)` when the value is there but unreadable.
fn lenient_number(value: Option<Value>) -> Result<Option<f64>, Value> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_f64().map(Some).ok_or(Value::Number(n)),
        Some(Value::String(s)) => {
            // "78%", "2,10" and " 1.9 " all show up in model output.
            let cleaned = s.trim().trim_end_matches('%').trim().replace(',', ".");
            cleaned.parse::<f64>().map(Some).map_err(|_| Value::String(s))
        }
        Some(other) => Err(other),
    }
}

fn lenient_string(value: Option<Value>) -> Result<Option<String>, Value> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(other),
    }
}

fn parse_date(value: Value) -> Result<Option<NaiveDate>, Value> {
    let Some(s) = lenient_string(Some(value))? else {
        return Ok(None);
    };
    let trimmed = s.trim();
    // Tolerate a full timestamp by looking at the date part only.
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    let parsed = DATE_FORMATS.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(trimmed, fmt)
            .or_else(|_| NaiveDate::parse_from_str(date_part, fmt))
            .ok()
    });
    match parsed {
        Some(date) => Ok(Some(date)),
        None => Err(Value::String(s)),
    }
}

fn read_number(field: &'static str, value: Option<Value>) -> Option<f64> {
    lenient_number(value).unwrap_or_else(|raw| {
        tracing::warn!(field, value = %raw, "unreadable number in LLM output; dropped");
        None
    })
}

fn read_string(field: &'static str, value: Option<Value>) -> Option<String> {
    lenient_string(value).unwrap_or_else(|raw| {
        tracing::warn!(field, value = %raw, "unreadable text in LLM output; dropped");
        None
    })
}

fn optional_number(extra: &mut Map<String, Value>, field: &str, value: Option<Value>) -> Option<f64> {
    lenient_number(value).unwrap_or_else(|raw| {
        keep_raw(extra, field, raw);
        None
    })
}

fn optional_string(
    extra: &mut Map<String, Value>,
    field: &str,
    value: Option<Value>,
) -> Option<String> {
    lenient_string(value).unwrap_or_else(|raw| {
        keep_raw(extra, field, raw);
        None
    })
}

/// Keeps an unreadable value under its own key. Only used for fields that are skipped when
/// empty, so the key is never serialized twice.
fn keep_raw(extra: &mut Map<String, Value>, field: &str, raw: Value) {
    tracing::warn!(field, value = %raw, "unreadable field in LLM output; kept as is");
    extra.insert(field.to_string(), raw);
}
