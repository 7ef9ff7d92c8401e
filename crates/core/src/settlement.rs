//! Settling recommendations against final scores.

use crate::domain::fixture::FinalScore;
use crate::domain::recommendation::Recommendation;
use crate::matching::{matches_loosely, normalize};
use crate::validation::parse_match_label;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider statuses for a match that is over (full time, extra time, penalties).
pub const FINISHED_STATUSES: [&str; 3] = ["FT", "AET", "PEN"];

const DEFAULT_TOTAL_LINE: f64 = 2.5;
const DEFAULT_HANDICAP_LINE: f64 = -1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetOutcome {
    Win,
    Loss,
}

impl fmt::Display for BetOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Win => f.write_str("win"),
            Self::Loss => f.write_str("loss"),
        }
    }
}

impl From<bool> for BetOutcome {
    fn from(won: bool) -> Self {
        if won {
            Self::Win
        } else {
            Self::Loss
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Market {
    MatchResult,
    Handicap,
    Totals,
    BothTeamsToScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Home,
    Draw,
    Away,
}

fn market_of(bet_type: &str) -> Option<Market> {
    let t = bet_type.to_lowercase();
    if t.contains("handicap") {
        Some(Market::Handicap)
    } else if t.contains("btts") || t.contains("both teams") {
        Some(Market::BothTeamsToScore)
    } else if t.contains("over") || t.contains("under") || t.contains("o/u") || t.trim() == "ou" {
        Some(Market::Totals)
    } else if t.contains("1x2") || t.contains("match result") {
        Some(Market::MatchResult)
    } else {
        None
    }
}

/// Whether `rec` won given the final `score`. `None` when the bet type or the pick cannot be
/// interpreted, or when the bet is a push.
pub fn settle(rec: &Recommendation, score: &FinalScore) -> Option<BetOutcome> {
    let pick = rec.prediction.to_lowercase();
    let home = score.home_goals as f64;
    let away = score.away_goals as f64;

    match market_of(&rec.bet_type)? {
        Market::MatchResult => {
            let side = picked_side(&pick, &rec.match_label)?;
            let won = match side {
                Side::Home => home > away,
                Side::Away => away > home,
                Side::Draw => home == away,
            };
            Some(won.into())
        }
        Market::Handicap => {
            let side = picked_side(&pick, &rec.match_label)?;
            let line = first_signed_number(&pick)
                .or_else(|| first_signed_number(&rec.bet_type.to_lowercase()))
                .unwrap_or(DEFAULT_HANDICAP_LINE);
            let margin = match side {
                Side::Home => home - away,
                Side::Away => away - home,
                Side::Draw => return None,
            };
            let adjusted = margin + line;
            if adjusted == 0.0 {
                return None;
            }
            Some((adjusted > 0.0).into())
        }
        Market::Totals => {
            let line = first_number(&pick).unwrap_or(DEFAULT_TOTAL_LINE);
            let total = home + away;
            if total == line {
                return None;
            }
            if pick.contains("over") || pick.contains("plus") {
                Some((total > line).into())
            } else if pick.contains("under") || pick.contains("moins") {
                Some((total < line).into())
            } else {
                None
            }
        }
        Market::BothTeamsToScore => {
            let both_scored = score.home_goals > 0 && score.away_goals > 0;
            let first = pick.split_whitespace().next().unwrap_or_default();
            match first.trim_matches(|c: char| !c.is_alphanumeric()) {
                "yes" | "oui" => Some(both_scored.into()),
                "no" | "non" => Some((!both_scored).into()),
                _ => None,
            }
        }
    }
}

/// Reads the picked side from "1", "X", "2" (optionally followed by a comment such as
/// "1 (Home win)") or from a team named in the pick.
fn picked_side(pick: &str, match_label: &str) -> Option<Side> {
    let first = pick
        .split(|c: char| c.is_whitespace() || c == '(')
        .find(|t| !t.is_empty())
        .unwrap_or_default();
    match first {
        "1" => return Some(Side::Home),
        "x" => return Some(Side::Draw),
        "2" => return Some(Side::Away),
        _ => {}
    }

    if pick.contains("draw") || pick.contains("nul") {
        return Some(Side::Draw);
    }

    let (home, away) = parse_match_label(match_label)?;
    let (home, away) = (normalize(home), normalize(away));
    match (pick.contains(home.as_str()), pick.contains(away.as_str())) {
        (true, false) => Some(Side::Home),
        (false, true) => Some(Side::Away),
        _ => None,
    }
}

fn first_number(text: &str) -> Option<f64> {
    text.split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .filter(|t| !t.is_empty())
        .find_map(|t| t.parse::<f64>().ok())
}

fn first_signed_number(text: &str) -> Option<f64> {
    text.split(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .filter(|t| t.starts_with('-') || t.starts_with('+'))
        .find_map(|t| t.parse::<f64>().ok())
}

/// Finds the final score of the fixture named by `match_label`, in either orientation.
pub fn find_result<'a>(match_label: &str, results: &'a [FinalScore]) -> Option<&'a FinalScore> {
    let (team1, team2) = parse_match_label(match_label)?;
    results.iter().find(|r| {
        (matches_loosely(team1, &r.home) && matches_loosely(team2, &r.away))
            || (matches_loosely(team1, &r.away) && matches_loosely(team2, &r.home))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(home_goals: u32, away_goals: u32) -> FinalScore {
        FinalScore {
            home: "Lille".to_string(),
            away: "Lens".to_string(),
            home_goals,
            away_goals,
            status: "FT".to_string(),
        }
    }

    fn bet(bet_type: &str, prediction: &str) -> Recommendation {
        let mut rec = Recommendation::new("Lille vs Lens", 2.0);
        rec.bet_type = bet_type.to_string();
        rec.prediction = prediction.to_string();
        rec
    }

    #[test]
    fn settles_match_result() {
        assert_eq!(settle(&bet("1X2", "1 (Victoire Lille)"), &score(2, 1)), Some(BetOutcome::Win));
        assert_eq!(settle(&bet("1X2", "1"), &score(1, 1)), Some(BetOutcome::Loss));
        assert_eq!(settle(&bet("1X2", "X"), &score(1, 1)), Some(BetOutcome::Win));
        assert_eq!(settle(&bet("1X2", "2"), &score(0, 3)), Some(BetOutcome::Win));
        assert_eq!(settle(&bet("1X2", "Victoire Lens"), &score(0, 3)), Some(BetOutcome::Win));
        assert_eq!(settle(&bet("1X2", "Match nul"), &score(2, 0)), Some(BetOutcome::Loss));
    }

    #[test]
    fn settles_handicap() {
        assert_eq!(
            settle(&bet("Handicap -1.5", "Lille -1.5"), &score(3, 1)),
            Some(BetOutcome::Win)
        );
        assert_eq!(
            settle(&bet("Handicap", "1 -1.5"), &score(2, 1)),
            Some(BetOutcome::Loss)
        );
        assert_eq!(
            settle(&bet("Handicap", "2 +1.5"), &score(2, 1)),
            Some(BetOutcome::Win)
        );
        // Whole line landing exactly is a push.
        assert_eq!(settle(&bet("Handicap", "1 -1"), &score(2, 1)), None);
    }

    #[test]
    fn settles_totals() {
        assert_eq!(settle(&bet("Over/Under 2.5", "Over 2.5"), &score(2, 1)), Some(BetOutcome::Win));
        assert_eq!(settle(&bet("OU", "Under 2.5"), &score(2, 1)), Some(BetOutcome::Loss));
        assert_eq!(settle(&bet("Over/Under", "Over 1.5"), &score(1, 0)), Some(BetOutcome::Loss));
        assert_eq!(settle(&bet("Over/Under", "Over 3"), &score(2, 1)), None);
    }

    #[test]
    fn settles_btts() {
        assert_eq!(settle(&bet("BTTS", "Yes"), &score(1, 1)), Some(BetOutcome::Win));
        assert_eq!(settle(&bet("BTTS", "No"), &score(1, 1)), Some(BetOutcome::Loss));
        assert_eq!(settle(&bet("BTTS", "Oui"), &score(0, 1)), Some(BetOutcome::Loss));
    }

    #[test]
    fn unknown_markets_are_not_settled() {
        assert_eq!(settle(&bet("Corners", "Over 9.5"), &score(1, 1)), None);
        assert_eq!(settle(&bet("1X2", "maybe"), &score(1, 1)), None);
    }

    #[test]
    fn finds_result_in_either_orientation() {
        let results = vec![score(1, 0)];
        assert!(find_result("Lille vs Lens", &results).is_some());
        assert!(find_result("Lens - Lille", &results).is_some());
        assert!(find_result("Ajax vs PSV", &results).is_none());
        assert!(find_result("garbage", &results).is_none());
    }
}
