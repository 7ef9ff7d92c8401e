//! Per-fixture context handed to the model: recent form, head-to-head history and absences.
//! The `detailed_analysis` sections the validator reorients are written from this data.

use crate::domain::fixture::Fixture;
use crate::ingest::provider::FixtureProvider;
use crate::ingest::types::{FixtureItem, InjuryItem};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Matches of recent form fetched per team.
pub const FORM_MATCHES: u32 = 10;
/// Previous meetings fetched per fixture.
pub const H2H_MATCHES: u32 = 10;

const RENDERED_H2H: usize = 5;
const RENDERED_ABSENCES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormResult {
    Win,
    Draw,
    Loss,
}

impl FormResult {
    fn from_goals(scored: u32, conceded: u32) -> Self {
        match scored.cmp(&conceded) {
            std::cmp::Ordering::Greater => Self::Win,
            std::cmp::Ordering::Equal => Self::Draw,
            std::cmp::Ordering::Less => Self::Loss,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            Self::Win => 'W',
            Self::Draw => 'D',
            Self::Loss => 'L',
        }
    }
}

/// A played match seen from one team's side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentMatch {
    pub date: Option<String>,
    pub opponent: String,
    pub at_home: bool,
    pub scored: u32,
    pub conceded: u32,
    pub result: FormResult,
    pub competition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadToHead {
    pub date: Option<String>,
    pub home: String,
    pub away: String,
    pub home_goals: u32,
    pub away_goals: u32,
}

impl HeadToHead {
    pub fn winner(&self) -> Option<&str> {
        match self.home_goals.cmp(&self.away_goals) {
            std::cmp::Ordering::Greater => Some(&self.home),
            std::cmp::Ordering::Less => Some(&self.away),
            std::cmp::Ordering::Equal => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Absence {
    pub player: String,
    pub kind: Option<String>,
    pub reason: Option<String>,
}

impl fmt::Display for Absence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.player)?;
        match (self.kind.as_deref(), self.reason.as_deref()) {
            (Some(kind), Some(reason)) => write!(f, " ({kind}: {reason})"),
            (Some(only), None) | (None, Some(only)) => write!(f, " ({only})"),
            (None, None) => Ok(()),
        }
    }
}

/// Facts about one fixture, oriented like the fixture itself. Newest entries come first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureContext {
    pub home_form: Vec<RecentMatch>,
    pub away_form: Vec<RecentMatch>,
    pub head_to_head: Vec<HeadToHead>,
    pub home_absences: Vec<Absence>,
    pub away_absences: Vec<Absence>,
}

impl FixtureContext {
    pub fn is_empty(&self) -> bool {
        self.home_form.is_empty()
            && self.away_form.is_empty()
            && self.head_to_head.is_empty()
            && self.home_absences.is_empty()
            && self.away_absences.is_empty()
    }

    /// Indented lines placed under the fixture in the prompt. Empty when there is nothing to say.
    pub fn render(&self, fixture: &Fixture) -> String {
        let mut out = String::new();
        for (team, form) in [(&fixture.home, &self.home_form), (&fixture.away, &self.away_form)] {
            if form.is_empty() {
                continue;
            }
            let letters: String = form.iter().map(|m| m.result.as_char()).collect();
            let scored: u32 = form.iter().map(|m| m.scored).sum();
            let conceded: u32 = form.iter().map(|m| m.conceded).sum();
            let home_games = form.iter().filter(|m| m.at_home).count();
            out.push_str(&format!(
                "   {team} form (last {}, newest first): {letters}, goals {scored}-{conceded}, {home_games} at home\n",
                form.len()
            ));
        }

        if !self.head_to_head.is_empty() {
            let meetings: Vec<String> = self
                .head_to_head
                .iter()
                .take(RENDERED_H2H)
                .map(|m| {
                    format!(
                        "{} {} {}-{} {}",
                        m.date.as_deref().map(day_of).unwrap_or("?"),
                        m.home,
                        m.home_goals,
                        m.away_goals,
                        m.away
                    )
                })
                .collect();
            out.push_str(&format!("   Head-to-head: {}\n", meetings.join("; ")));
        }

        for (team, absences) in [
            (&fixture.home, &self.home_absences),
            (&fixture.away, &self.away_absences),
        ] {
            if absences.is_empty() {
                continue;
            }
            let mut names: Vec<String> = absences
                .iter()
                .take(RENDERED_ABSENCES)
                .map(Absence::to_string)
                .collect();
            if absences.len() > RENDERED_ABSENCES {
                names.push(format!("+{} more", absences.len() - RENDERED_ABSENCES));
            }
            out.push_str(&format!("   {team} absences: {}\n", names.join(", ")));
        }
        out
    }
}

fn day_of(timestamp: &str) -> &str {
    timestamp.get(..10).unwrap_or(timestamp)
}

fn newest_first<T>(items: &mut [T], date: impl Fn(&T) -> Option<&String>) {
    // RFC 3339 timestamps from one provider sort chronologically as strings.
    items.sort_by(|a, b| date(b).cmp(&date(a)));
}

/// Played matches of `team_id`, newest first. Fixtures without a final score are skipped.
pub fn recent_form(team_id: i64, items: &[FixtureItem]) -> Vec<RecentMatch> {
    let mut out: Vec<RecentMatch> = items
        .iter()
        .filter_map(|item| {
            let (home_goals, away_goals) = (item.goals.home?, item.goals.away?);
            let at_home = item.teams.home.id == team_id;
            if !at_home && item.teams.away.id != team_id {
                return None;
            }
            let (scored, conceded, opponent) = if at_home {
                (home_goals, away_goals, &item.teams.away.name)
            } else {
                (away_goals, home_goals, &item.teams.home.name)
            };
            Some(RecentMatch {
                date: item.fixture.date.clone(),
                opponent: opponent.clone(),
                at_home,
                scored,
                conceded,
                result: FormResult::from_goals(scored, conceded),
                competition: item.league.name.clone(),
            })
        })
        .collect();
    newest_first(&mut out, |m| m.date.as_ref());
    out
}

/// Previous meetings with a final score, newest first.
pub fn head_to_head(items: &[FixtureItem]) -> Vec<HeadToHead> {
    let mut out: Vec<HeadToHead> = items
        .iter()
        .filter_map(|item| {
            Some(HeadToHead {
                date: item.fixture.date.clone(),
                home: item.teams.home.name.clone(),
                away: item.teams.away.name.clone(),
                home_goals: item.goals.home?,
                away_goals: item.goals.away?,
            })
        })
        .collect();
    newest_first(&mut out, |m| m.date.as_ref());
    out
}

/// Absences reported for `team_id`, deduplicated by player.
pub fn absences(team_id: i64, items: &[InjuryItem]) -> Vec<Absence> {
    let mut out: Vec<Absence> = Vec::new();
    for item in items.iter().filter(|i| i.team.id == team_id) {
        if out.iter().any(|a| a.player == item.player.name) {
            continue;
        }
        out.push(Absence {
            player: item.player.name.clone(),
            kind: item.player.kind.clone(),
            reason: item.player.reason.clone(),
        });
    }
    out
}

/// One context per fixture, in fixture order. A fixture whose context cannot be fetched gets
/// an empty one; missing context never blocks a run.
pub async fn collect_contexts<P>(provider: &P, fixtures: &[Fixture]) -> Vec<FixtureContext>
where
    P: FixtureProvider + ?Sized,
{
    let mut out = Vec::with_capacity(fixtures.len());
    for fixture in fixtures {
        let context = match provider.fetch_context(fixture).await {
            Ok(context) => context,
            Err(err) => {
                tracing::warn!(
                    fixture = %fixture.label(),
                    error = %err,
                    "failed to fetch fixture context; continuing without it"
                );
                FixtureContext::default()
            }
        };
        out.push(context);
    }
    let enriched = out.iter().filter(|c| !c.is_empty()).count();
    tracing::info!(fixtures = fixtures.len(), enriched, "fixture context collected");
    out
}
