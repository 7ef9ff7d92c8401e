//! Performance history of published recommendations.

use crate::domain::recommendation::Recommendation;
use crate::settlement::BetOutcome;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Pending,
    Win,
    Loss,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Win => "win",
            Self::Loss => "loss",
        }
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "win" => Ok(Self::Win),
            "loss" => Ok(Self::Loss),
            other => anyhow::bail!("unknown result status: {other}"),
        }
    }
}

impl From<BetOutcome> for ResultStatus {
    fn from(outcome: BetOutcome) -> Self {
        match outcome {
            BetOutcome::Win => Self::Win,
            BetOutcome::Loss => Self::Loss,
        }
    }
}

/// Stable identifier of the `idx`-th recommendation published on `date`.
pub fn prediction_id(date: NaiveDate, idx: usize) -> String {
    format!("{date}_{idx}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: String,
    pub date: NaiveDate,
    #[serde(rename = "match")]
    pub match_label: String,
    pub competition: Option<String>,
    pub bet_type: String,
    pub prediction: String,
    pub odds: f64,
    pub confidence: Option<f64>,
    pub result: ResultStatus,
    pub actual_score: Option<String>,
}

impl PredictionRecord {
    pub fn pending(date: NaiveDate, idx: usize, rec: &Recommendation) -> Self {
        Self {
            id: prediction_id(date, idx),
            date,
            match_label: rec.match_label.clone(),
            competition: rec.competition.clone(),
            bet_type: rec.bet_type.clone(),
            prediction: rec.prediction.clone(),
            odds: rec.odds,
            confidence: rec.confidence,
            result: ResultStatus::Pending,
            actual_score: None,
        }
    }

    /// Rebuilds the recommendation fields needed for settlement.
    pub fn to_recommendation(&self) -> Recommendation {
        let mut rec = Recommendation::new(self.match_label.clone(), self.odds);
        rec.bet_type = self.bet_type.clone();
        rec.prediction = self.prediction.clone();
        rec.competition = self.competition.clone();
        rec.confidence = self.confidence;
        rec
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub total_predictions: usize,
    pub completed: usize,
    pub total_wins: usize,
    pub total_losses: usize,
    pub pending: usize,
    /// Percentage of completed predictions that won.
    pub win_rate: f64,
    pub avg_odds: f64,
    pub avg_confidence: f64,
}

impl PerformanceStats {
    pub fn compute(records: &[PredictionRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let total_wins = records.iter().filter(|r| r.result == ResultStatus::Win).count();
        let total_losses = records.iter().filter(|r| r.result == ResultStatus::Loss).count();
        let completed = total_wins + total_losses;

        let confidences: Vec<f64> = records.iter().filter_map(|r| r.confidence).collect();

        Self {
            total_predictions: records.len(),
            completed,
            total_wins,
            total_losses,
            pending: records.len() - completed,
            win_rate: percentage(total_wins, completed),
            avg_odds: records.iter().map(|r| r.odds).sum::<f64>() / records.len() as f64,
            avg_confidence: if confidences.is_empty() {
                0.0
            } else {
                confidences.iter().sum::<f64>() / confidences.len() as f64
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    pub wins: usize,
    pub losses: usize,
    pub total: usize,
    pub win_rate: f64,
}

/// Settled records grouped by bet type.
pub fn breakdown_by_bet_type(records: &[PredictionRecord]) -> BTreeMap<String, Breakdown> {
    breakdown_by(records, |r| r.bet_type.clone())
}

/// Settled records grouped by competition; records without one fall under "Unknown".
pub fn breakdown_by_competition(records: &[PredictionRecord]) -> BTreeMap<String, Breakdown> {
    breakdown_by(records, |r| {
        r.competition.clone().unwrap_or_else(|| "Unknown".to_string())
    })
}

fn breakdown_by<F>(records: &[PredictionRecord], key: F) -> BTreeMap<String, Breakdown>
where
    F: Fn(&PredictionRecord) -> String,
{
    let mut out: BTreeMap<String, Breakdown> = BTreeMap::new();
    for r in records.iter().filter(|r| r.result.is_settled()) {
        let entry = out.entry(key(r)).or_default();
        entry.total += 1;
        if r.result == ResultStatus::Win {
            entry.wins += 1;
        } else {
            entry.losses += 1;
        }
    }
    for b in out.values_mut() {
        b.win_rate = percentage(b.wins, b.total);
    }
    out
}

/// Run of identical results ending with the most recent settled prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    pub result: ResultStatus,
    pub length: usize,
}

/// Publication order: by date, then by position within the day's batch.
fn publication_key(r: &PredictionRecord) -> (NaiveDate, usize) {
    let idx = r
        .id
        .rsplit_once('_')
        .and_then(|(_, idx)| idx.parse().ok())
        .unwrap_or(0);
    (r.date, idx)
}

pub fn current_streak(records: &[PredictionRecord]) -> Option<Streak> {
    let mut settled: Vec<&PredictionRecord> =
        records.iter().filter(|r| r.result.is_settled()).collect();
    settled.sort_by_key(|r| publication_key(r));

    let last = settled.last()?.result;
    let length = settled.iter().rev().take_while(|r| r.result == last).count();
    Some(Streak {
        result: last,
        length,
    })
}

/// The winning pick with the highest odds.
pub fn best_bet(records: &[PredictionRecord]) -> Option<&PredictionRecord> {
    records
        .iter()
        .filter(|r| r.result == ResultStatus::Win)
        .max_by(|a, b| a.odds.total_cmp(&b.odds))
}

pub const REPORT_WINDOW_DAYS: i64 = 7;

/// Statistics of the predictions published in the last week, `today` included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyStats {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub overall: PerformanceStats,
    pub by_bet_type: BTreeMap<String, Breakdown>,
    pub by_competition: BTreeMap<String, Breakdown>,
    pub best_bet: Option<PredictionRecord>,
    pub current_streak: Option<Streak>,
}

pub fn weekly_stats(records: &[PredictionRecord], today: NaiveDate) -> WeeklyStats {
    let from = today - chrono::Duration::days(REPORT_WINDOW_DAYS);
    let week: Vec<PredictionRecord> = records
        .iter()
        .filter(|r| r.date >= from && r.date <= today)
        .cloned()
        .collect();

    WeeklyStats {
        from,
        to: today,
        overall: PerformanceStats::compute(&week),
        by_bet_type: breakdown_by_bet_type(&week),
        by_competition: breakdown_by_competition(&week),
        best_bet: best_bet(&week).cloned(),
        current_streak: current_streak(&week),
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(idx: usize, bet_type: &str, competition: Option<&str>, result: ResultStatus) -> PredictionRecord {
        let date = NaiveDate::from_ymd_opt(2026, 10, 11).unwrap();
        let mut rec = Recommendation::new(format!("Home{idx} vs Away{idx}"), 2.0 + idx as f64 * 0.5);
        rec.bet_type = bet_type.to_string();
        rec.competition = competition.map(str::to_string);
        rec.confidence = Some(70.0 + idx as f64);
        let mut r = PredictionRecord::pending(date, idx, &rec);
        r.result = result;
        r
    }

    fn history() -> Vec<PredictionRecord> {
        vec![
            record(0, "1X2", Some("Ligue 1"), ResultStatus::Win),
            record(1, "1X2", Some("Serie A"), ResultStatus::Loss),
            record(2, "BTTS", Some("Ligue 1"), ResultStatus::Win),
            record(3, "BTTS", None, ResultStatus::Pending),
        ]
    }

    #[test]
    fn computes_global_statistics() {
        let stats = PerformanceStats::compute(&history());
        assert_eq!(stats.total_predictions, 4);
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.total_wins, 2);
        assert_eq!(stats.total_losses, 1);
        assert_eq!(stats.pending, 1);
        assert!((stats.win_rate - 66.666).abs() < 0.01);
        assert!((stats.avg_odds - 2.75).abs() < 1e-9);
        assert!((stats.avg_confidence - 71.5).abs() < 1e-9);
    }

    #[test]
    fn empty_history_yields_zeroes() {
        assert_eq!(PerformanceStats::compute(&[]), PerformanceStats::default());
    }

    #[test]
    fn breakdowns_only_count_settled_records() {
        let by_type = breakdown_by_bet_type(&history());
        assert_eq!(by_type["1X2"].total, 2);
        assert_eq!(by_type["1X2"].win_rate, 50.0);
        assert_eq!(by_type["BTTS"].total, 1);

        let by_comp = breakdown_by_competition(&history());
        assert_eq!(by_comp["Ligue 1"].wins, 2);
        assert_eq!(by_comp["Serie A"].losses, 1);
        assert!(!by_comp.contains_key("Unknown"));
    }

    fn on(day: u32, idx: usize, odds: f64, result: ResultStatus) -> PredictionRecord {
        let date = NaiveDate::from_ymd_opt(2026, 10, day).unwrap();
        let mut r = PredictionRecord::pending(date, idx, &Recommendation::new("A vs B", odds));
        r.result = result;
        r
    }

    #[test]
    fn streak_counts_back_from_the_latest_settled_pick() {
        let records = vec![
            on(12, 0, 1.8, ResultStatus::Loss),
            on(10, 0, 2.0, ResultStatus::Win),
            on(12, 10, 2.2, ResultStatus::Win),
            on(12, 2, 1.7, ResultStatus::Win),
            on(13, 0, 1.9, ResultStatus::Pending),
        ];
        // Day 12 in batch order: 0 loss, 2 win, 10 win.
        assert_eq!(
            current_streak(&records),
            Some(Streak {
                result: ResultStatus::Win,
                length: 2
            })
        );
        assert_eq!(current_streak(&records[4..]), None);
    }

    #[test]
    fn best_bet_is_the_highest_winning_price() {
        let records = vec![
            on(10, 0, 3.5, ResultStatus::Loss),
            on(10, 1, 2.4, ResultStatus::Win),
            on(11, 0, 1.9, ResultStatus::Win),
        ];
        assert_eq!(best_bet(&records).map(|r| r.odds), Some(2.4));
        assert!(best_bet(&records[..1]).is_none());
    }

    #[test]
    fn weekly_stats_only_look_at_the_last_seven_days() {
        let records = vec![
            on(1, 0, 4.0, ResultStatus::Win),
            on(8, 0, 2.0, ResultStatus::Loss),
            on(14, 0, 2.5, ResultStatus::Win),
            on(15, 0, 1.8, ResultStatus::Pending),
            on(16, 0, 1.6, ResultStatus::Win),
        ];
        let today = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        let week = weekly_stats(&records, today);

        assert_eq!(week.from, NaiveDate::from_ymd_opt(2026, 10, 8).unwrap());
        assert_eq!(week.overall.total_predictions, 3);
        assert_eq!(week.overall.completed, 2);
        assert_eq!(week.best_bet.as_ref().map(|r| r.odds), Some(2.5));
        assert_eq!(
            week.current_streak,
            Some(Streak {
                result: ResultStatus::Win,
                length: 1
            })
        );
    }

    #[test]
    fn ids_follow_date_and_position() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 11).unwrap();
        assert_eq!(prediction_id(date, 3), "2026-10-11_3");
        assert_eq!("WIN".parse::<ResultStatus>().unwrap(), ResultStatus::Win);
        assert!("void".parse::<ResultStatus>().is_err());
    }
}
