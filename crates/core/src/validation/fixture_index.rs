use crate::domain::fixture::Fixture;
use crate::matching::{matches_loosely, normalize};
use std::collections::HashMap;

/// A fixture found for a pair of team labels.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionResult {
    pub resolved_home: String,
    pub resolved_away: String,
    /// The labels named the away side first.
    pub is_inverted: bool,
    pub source_fixture: Fixture,
}

impl ResolutionResult {
    fn new(fixture: &Fixture, is_inverted: bool) -> Self {
        Self {
            resolved_home: fixture.home.clone(),
            resolved_away: fixture.away.clone(),
            is_inverted,
            source_fixture: fixture.clone(),
        }
    }

    pub fn corrected_label(&self) -> String {
        format!("{} vs {}", self.resolved_home, self.resolved_away)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FixtureIndex {
    fixtures: Vec<Fixture>,
    // (normalized home, normalized away) -> position in `fixtures`.
    by_key: HashMap<(String, String), usize>,
}

impl FixtureIndex {
    /// Fixtures normalizing to the same key overwrite each other; the last one wins.
    pub fn build(fixtures: &[Fixture]) -> Self {
        let mut by_key = HashMap::with_capacity(fixtures.len());
        for (pos, fixture) in fixtures.iter().enumerate() {
            by_key.insert((normalize(&fixture.home), normalize(&fixture.away)), pos);
        }
        Self {
            fixtures: fixtures.to_vec(),
            by_key,
        }
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    pub fn fixtures(&self) -> &[Fixture] {
        &self.fixtures
    }

    /// Finds the fixture played between `team_x` and `team_y`, in either order.
    ///
    /// Exact normalized keys are tried first (as given, then swapped). Otherwise fixtures are
    /// scanned in order and the first one whose two teams both loosely match wins, checking
    /// the given orientation before the swapped one.
    pub fn lookup(&self, team_x: &str, team_y: &str) -> Option<ResolutionResult> {
        let x = normalize(team_x);
        let y = normalize(team_y);

        if let Some(&pos) = self.by_key.get(&(x.clone(), y.clone())) {
            return Some(ResolutionResult::new(&self.fixtures[pos], false));
        }
        if let Some(&pos) = self.by_key.get(&(y, x)) {
            return Some(ResolutionResult::new(&self.fixtures[pos], true));
        }

        for fixture in &self.fixtures {
            if matches_loosely(team_x, &fixture.home) && matches_loosely(team_y, &fixture.away) {
                return Some(ResolutionResult::new(fixture, false));
            }
            if matches_loosely(team_x, &fixture.away) && matches_loosely(team_y, &fixture.home) {
                return Some(ResolutionResult::new(fixture, true));
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> FixtureIndex {
        FixtureIndex::build(&[
            Fixture::new("AS Roma", "Viktoria Plzen"),
            Fixture::new("FSV Mainz 05", "Bayer Leverkusen"),
            Fixture::new("PSG", "Bayern Munich"),
        ])
    }

    #[test]
    fn exact_key_in_given_order() {
        let r = index().lookup("Roma", "Viktoria Plzen").unwrap();
        assert!(!r.is_inverted);
        assert_eq!(r.resolved_home, "AS Roma");
        assert_eq!(r.resolved_away, "Viktoria Plzen");
    }

    #[test]
    fn exact_key_swapped_is_inverted() {
        let r = index().lookup("Bayern Munich", "PSG").unwrap();
        assert!(r.is_inverted);
        assert_eq!(r.corrected_label(), "PSG vs Bayern Munich");
    }

    #[test]
    fn falls_back_to_loose_matching() {
        let r = index().lookup("Mainz", "Leverkusen").unwrap();
        assert!(!r.is_inverted);
        assert_eq!(r.source_fixture.home, "FSV Mainz 05");

        let r = index().lookup("Plzen", "Roma").unwrap();
        assert!(r.is_inverted);
        assert_eq!(r.resolved_home, "AS Roma");
    }

    #[test]
    fn requires_both_teams_to_match() {
        assert!(index().lookup("PSG", "Leverkusen").is_none());
        assert!(index().lookup("Lille", "Lens").is_none());
    }

    #[test]
    fn last_fixture_wins_on_key_collision() {
        let mut second = Fixture::new("Roma", "Plzen");
        second.fixture_id = Some(2);
        let mut first = Fixture::new("AS Roma", "Plzen");
        first.fixture_id = Some(1);

        let idx = FixtureIndex::build(&[first, second]);
        let r = idx.lookup("Roma", "Plzen").unwrap();
        assert_eq!(r.source_fixture.fixture_id, Some(2));
    }
}
