use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Issue {
    OddsTooLow,
    HomeAwayInverted,
    MatchNotFound,
    UnparseableMatch,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OddsTooLow => "ODDS_TOO_LOW",
            Self::HomeAwayInverted => "HOME_AWAY_INVERTED",
            Self::MatchNotFound => "MATCH_NOT_FOUND",
            Self::UnparseableMatch => "UNPARSEABLE_MATCH",
        };
        f.write_str(s)
    }
}

/// One decision taken during a validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationEvent {
    OddsTooLow {
        #[serde(rename = "match")]
        match_label: String,
        odds: f64,
        min_odds: f64,
    },
    HomeAwayInverted {
        #[serde(rename = "match")]
        original_match: String,
        corrected_match: String,
        swapped_sections: usize,
    },
    MatchNotFound {
        #[serde(rename = "match")]
        match_label: String,
    },
    UnparseableMatch {
        #[serde(rename = "match")]
        match_label: String,
    },
}

impl ValidationEvent {
    pub fn issue(&self) -> Issue {
        match self {
            Self::OddsTooLow { .. } => Issue::OddsTooLow,
            Self::HomeAwayInverted { .. } => Issue::HomeAwayInverted,
            Self::MatchNotFound { .. } => Issue::MatchNotFound,
            Self::UnparseableMatch { .. } => Issue::UnparseableMatch,
        }
    }

    pub fn match_label(&self) -> &str {
        match self {
            Self::OddsTooLow { match_label, .. }
            | Self::MatchNotFound { match_label }
            | Self::UnparseableMatch { match_label } => match_label,
            Self::HomeAwayInverted { original_match, .. } => original_match,
        }
    }

    pub fn action(&self) -> String {
        match self {
            Self::OddsTooLow { odds, min_odds, .. } => {
                format!("REJECTED: odds {odds:.2} < {min_odds:.2} (minimum required)")
            }
            Self::HomeAwayInverted {
                original_match,
                corrected_match,
                ..
            } => format!("CORRECTED: {original_match} -> {corrected_match}"),
            Self::MatchNotFound { .. } => {
                "WARNING: match not found in source data; left unchanged".to_string()
            }
            Self::UnparseableMatch { .. } => {
                "WARNING: match label could not be parsed; left unchanged".to_string()
            }
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, Self::MatchNotFound { .. } | Self::UnparseableMatch { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    #[serde(rename = "match")]
    pub match_label: String,
    pub issue: Issue,
    pub action: String,
}

impl From<&ValidationEvent> for ReportEntry {
    fn from(event: &ValidationEvent) -> Self {
        Self {
            match_label: event.match_label().to_string(),
            issue: event.issue(),
            action: event.action(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    #[serde(rename = "match")]
    pub match_label: String,
    pub odds: f64,
    pub reason: String,
}

/// Outcome of one validation run. Built once from the ordered events and not changed after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub corrections_count: usize,
    pub corrections: Vec<ReportEntry>,
    pub rejected_low_odds_count: usize,
    pub rejected_low_odds: Vec<Rejection>,
    pub warnings: Vec<ReportEntry>,
    /// Every event in the order it was encountered.
    pub events: Vec<ValidationEvent>,
}

impl ValidationReport {
    pub fn from_events(events: Vec<ValidationEvent>) -> Self {
        let corrections: Vec<ReportEntry> = events
            .iter()
            .filter(|e| e.issue() == Issue::HomeAwayInverted)
            .map(ReportEntry::from)
            .collect();

        let rejected_low_odds: Vec<Rejection> = events
            .iter()
            .filter_map(|e| match e {
                ValidationEvent::OddsTooLow {
                    match_label,
                    odds,
                    min_odds,
                } => Some(Rejection {
                    match_label: match_label.clone(),
                    odds: *odds,
                    reason: format!("odds {odds:.2} < minimum {min_odds:.2}"),
                }),
                _ => None,
            })
            .collect();

        let warnings = events
            .iter()
            .filter(|e| e.is_warning())
            .map(ReportEntry::from)
            .collect();

        Self {
            corrections_count: corrections.len(),
            corrections,
            rejected_low_odds_count: rejected_low_odds.len(),
            rejected_low_odds,
            warnings,
            events,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.events.is_empty()
    }
}

const RULE: &str = "-----------------------------------";

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{RULE}")?;
        writeln!(f, "VALIDATION REPORT")?;
        writeln!(f, "{RULE}")?;
        writeln!(f)?;

        if self.corrections.is_empty() {
            writeln!(f, "No corrections needed")?;
        } else {
            writeln!(f, "{} correction(s) applied", self.corrections_count)?;
            writeln!(f)?;
            for (i, entry) in self.corrections.iter().enumerate() {
                write_entry(f, i + 1, entry)?;
            }
        }

        if !self.rejected_low_odds.is_empty() {
            writeln!(f)?;
            writeln!(f, "{} rejected for low odds", self.rejected_low_odds_count)?;
            for r in &self.rejected_low_odds {
                writeln!(f, "   {} ({})", r.match_label, r.reason)?;
            }
        }

        if !self.warnings.is_empty() {
            writeln!(f)?;
            writeln!(f, "{} warning(s)", self.warnings.len())?;
            writeln!(f)?;
            for (i, entry) in self.warnings.iter().enumerate() {
                write_entry(f, i + 1, entry)?;
            }
        }

        Ok(())
    }
}

fn write_entry(f: &mut fmt::Formatter<'_>, n: usize, entry: &ReportEntry) -> fmt::Result {
    writeln!(f, "{n}. {}", entry.issue)?;
    writeln!(f, "   Match: {}", entry.match_label)?;
    writeln!(f, "   Action: {}", entry.action)?;
    writeln!(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_events() -> Vec<ValidationEvent> {
        vec![
            ValidationEvent::OddsTooLow {
                match_label: "Lille vs Lens".to_string(),
                odds: 1.5,
                min_odds: 1.7,
            },
            ValidationEvent::HomeAwayInverted {
                original_match: "Plzen vs AS Roma".to_string(),
                corrected_match: "AS Roma vs Plzen".to_string(),
                swapped_sections: 2,
            },
            ValidationEvent::UnparseableMatch {
                match_label: "Some Weird Label".to_string(),
            },
        ]
    }

    #[test]
    fn splits_events_into_sections_preserving_order() {
        let report = ValidationReport::from_events(sample_events());

        assert_eq!(report.corrections_count, 1);
        assert_eq!(report.corrections[0].issue, Issue::HomeAwayInverted);
        assert_eq!(report.rejected_low_odds_count, 1);
        assert_eq!(report.rejected_low_odds[0].odds, 1.5);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.events.len(), 3);
        assert_eq!(report.events[0].issue(), Issue::OddsTooLow);
    }

    #[test]
    fn serializes_issue_tags() {
        let report = ValidationReport::from_events(sample_events());
        let v = serde_json::to_value(&report).unwrap();

        assert_eq!(v["corrections"][0]["issue"], json!("HOME_AWAY_INVERTED"));
        assert_eq!(v["corrections"][0]["match"], json!("Plzen vs AS Roma"));
        assert_eq!(v["events"][2]["issue"], json!("UNPARSEABLE_MATCH"));
        assert_eq!(v["rejected_low_odds"][0]["match"], json!("Lille vs Lens"));
    }

    #[test]
    fn renders_no_corrections_header() {
        let text = ValidationReport::from_events(Vec::new()).to_string();
        assert!(text.contains("VALIDATION REPORT"));
        assert!(text.contains("No corrections needed"));
    }

    #[test]
    fn renders_itemized_corrections() {
        let text = ValidationReport::from_events(sample_events()).to_string();
        assert!(text.contains("1 correction(s) applied"));
        assert!(text.contains("1. HOME_AWAY_INVERTED"));
        assert!(text.contains("CORRECTED: Plzen vs AS Roma -> AS Roma vs Plzen"));
        assert!(text.contains("1 rejected for low odds"));
        assert!(text.contains("1 warning(s)"));
    }
}
