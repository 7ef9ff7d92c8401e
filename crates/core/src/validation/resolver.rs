use crate::domain::fixture::Fixture;
use crate::validation::fixture_index::{FixtureIndex, ResolutionResult};

/// Separators accepted between the two team names, in order of preference.
const LABEL_SEPARATORS: [&str; 2] = [" vs ", " - "];

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(ResolutionResult),
    /// The label named two teams but no fixture matches them.
    NotFound { team1: String, team2: String },
    /// The label does not split into exactly two team names.
    Unparseable,
}

/// Splits "Team A vs Team B" (or "Team A - Team B") into its two trimmed team names.
///
/// The first separator present in the label is used; the label must split into exactly two
/// non-empty parts.
pub fn parse_match_label(label: &str) -> Option<(&str, &str)> {
    let sep = LABEL_SEPARATORS.iter().find(|sep| label.contains(*sep))?;
    let mut parts = label.split(sep);
    let team1 = parts.next()?.trim();
    let team2 = parts.next()?.trim();
    if parts.next().is_some() || team1.is_empty() || team2.is_empty() {
        return None;
    }
    Some((team1, team2))
}

#[derive(Debug, Clone, Default)]
pub struct MatchResolver {
    index: FixtureIndex,
}

impl MatchResolver {
    pub fn new(fixtures: &[Fixture]) -> Self {
        Self {
            index: FixtureIndex::build(fixtures),
        }
    }

    pub fn index(&self) -> &FixtureIndex {
        &self.index
    }

    pub fn resolve(&self, match_label: &str) -> Resolution {
        let Some((team1, team2)) = parse_match_label(match_label) else {
            return Resolution::Unparseable;
        };

        match self.index.lookup(team1, team2) {
            Some(found) => Resolution::Found(found),
            None => Resolution::NotFound {
                team1: team1.to_string(),
                team2: team2.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_separators() {
        assert_eq!(parse_match_label("Lille vs Lens"), Some(("Lille", "Lens")));
        assert_eq!(parse_match_label(" Lille  -  Lens "), Some(("Lille", "Lens")));
        assert_eq!(
            parse_match_label("Paris Saint-Germain vs Bayern"),
            Some(("Paris Saint-Germain", "Bayern"))
        );
    }

    #[test]
    fn prefers_vs_over_dash() {
        assert_eq!(
            parse_match_label("Lille - B vs Lens"),
            Some(("Lille - B", "Lens"))
        );
    }

    #[test]
    fn rejects_labels_without_two_teams() {
        assert_eq!(parse_match_label("Some Weird Label"), None);
        assert_eq!(parse_match_label("A vs B vs C"), None);
        assert_eq!(parse_match_label("A vs  "), None);
        assert_eq!(parse_match_label("Lille-Lens"), None);
    }

    #[test]
    fn distinguishes_not_found_from_unparseable() {
        let resolver = MatchResolver::new(&[Fixture::new("Lille", "Lens")]);

        assert!(matches!(resolver.resolve("Lens vs Lille"), Resolution::Found(r) if r.is_inverted));
        assert_eq!(resolver.resolve("Lille Lens"), Resolution::Unparseable);
        assert_eq!(
            resolver.resolve("Ajax vs PSV"),
            Resolution::NotFound {
                team1: "Ajax".to_string(),
                team2: "PSV".to_string()
            }
        );
    }
}
