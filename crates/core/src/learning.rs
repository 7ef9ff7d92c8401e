//! Post-mortems of lost predictions, aggregated into a short text fed back into the next
//! generation prompt.

use crate::tracking::PredictionRecord;
use anyhow::ensure;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const EXAMPLES_PER_CATEGORY: usize = 5;
const KEY_LEARNINGS_KEPT: usize = 20;
const SUMMARY_TOP_CATEGORIES: usize = 3;
const SUMMARY_RECENT_CONCLUSIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    MissingPlayer,
    RecentForm,
    MatchContext,
    MisleadingStats,
    FavouriteOverrated,
    UnderdogUnderrated,
    #[serde(other)]
    Other,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 7] = [
        Self::MissingPlayer,
        Self::RecentForm,
        Self::MatchContext,
        Self::MisleadingStats,
        Self::FavouriteOverrated,
        Self::UnderdogUnderrated,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingPlayer => "missing_player",
            Self::RecentForm => "recent_form",
            Self::MatchContext => "match_context",
            Self::MisleadingStats => "misleading_stats",
            Self::FavouriteOverrated => "favourite_overrated",
            Self::UnderdogUnderrated => "underdog_underrated",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Post-mortem as returned by the model, before it is tied to a prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmErrorAnalysis {
    pub main_cause: String,
    #[serde(default)]
    pub missed_factors: Vec<String>,
    pub actionable_conclusion: String,
    #[serde(default = "default_category")]
    pub error_category: ErrorCategory,
}

fn default_category() -> ErrorCategory {
    ErrorCategory::Other
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorAnalysis {
    pub prediction_id: String,
    #[serde(rename = "match")]
    pub match_label: String,
    pub bet_type: String,
    pub bet_choice: String,
    pub final_score: Option<String>,
    pub main_cause: String,
    pub missed_factors: Vec<String>,
    pub actionable_conclusion: String,
    pub error_category: ErrorCategory,
    pub analysis_date: DateTime<Utc>,
}

impl LlmErrorAnalysis {
    pub fn validate_and_into_analysis(
        self,
        record: &PredictionRecord,
        analysis_date: DateTime<Utc>,
    ) -> anyhow::Result<ErrorAnalysis> {
        let main_cause = self.main_cause.trim().to_string();
        ensure!(!main_cause.is_empty(), "main_cause must be non-empty");
        let actionable_conclusion = self.actionable_conclusion.trim().to_string();
        ensure!(
            !actionable_conclusion.is_empty(),
            "actionable_conclusion must be non-empty"
        );

        let missed_factors = self
            .missed_factors
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(ErrorAnalysis {
            prediction_id: record.id.clone(),
            match_label: record.match_label.clone(),
            bet_type: record.bet_type.clone(),
            bet_choice: record.prediction.clone(),
            final_score: record.actual_score.clone(),
            main_cause,
            missed_factors,
            actionable_conclusion,
            error_category: self.error_category,
            analysis_date,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningExample {
    #[serde(rename = "match")]
    pub match_label: String,
    pub conclusion: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub count: usize,
    /// Most recent examples, oldest first.
    pub examples: Vec<LearningExample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyLearning {
    pub date: DateTime<Utc>,
    pub category: ErrorCategory,
    pub conclusion: String,
}

/// Running aggregate of every post-mortem so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Learnings {
    pub last_updated: Option<DateTime<Utc>>,
    pub total_errors_analyzed: usize,
    pub categories: BTreeMap<ErrorCategory, CategoryStats>,
    pub key_learnings: Vec<KeyLearning>,
}

impl Learnings {
    pub fn absorb(&mut self, analyses: &[ErrorAnalysis], now: DateTime<Utc>) {
        if analyses.is_empty() {
            return;
        }

        self.total_errors_analyzed += analyses.len();
        self.last_updated = Some(now);

        for a in analyses {
            let stats = self.categories.entry(a.error_category).or_default();
            stats.count += 1;
            stats.examples.push(LearningExample {
                match_label: a.match_label.clone(),
                conclusion: a.actionable_conclusion.clone(),
            });
            keep_last(&mut stats.examples, EXAMPLES_PER_CATEGORY);

            self.key_learnings.push(KeyLearning {
                date: a.analysis_date,
                category: a.error_category,
                conclusion: a.actionable_conclusion.clone(),
            });
        }
        keep_last(&mut self.key_learnings, KEY_LEARNINGS_KEPT);
    }

    /// Prompt section listing the most frequent error causes and the latest conclusions.
    /// Empty when nothing has been analysed yet.
    pub fn summary(&self) -> String {
        if self.total_errors_analyzed == 0 {
            return String::new();
        }

        let mut ranked: Vec<(&ErrorCategory, &CategoryStats)> = self.categories.iter().collect();
        // Stable sort keeps category order on ties.
        ranked.sort_by(|a, b| b.1.count.cmp(&a.1.count));

        let mut out = String::from("### LESSONS FROM PAST ERRORS\n\n");
        out.push_str(&format!(
            "{} errors analysed\n\nMain causes:\n",
            self.total_errors_analyzed
        ));
        for (category, stats) in ranked.into_iter().take(SUMMARY_TOP_CATEGORIES) {
            out.push_str(&format!("- {category}: {} times\n", stats.count));
        }

        out.push_str("\nRecent conclusions to apply:\n");
        let skip = self
            .key_learnings
            .len()
            .saturating_sub(SUMMARY_RECENT_CONCLUSIONS);
        for learning in &self.key_learnings[skip..] {
            out.push_str(&format!("- {}\n", learning.conclusion));
        }
        out
    }
}

fn keep_last<T>(items: &mut Vec<T>, n: usize) {
    if items.len() > n {
        items.drain(..items.len() - n);
    }
}
