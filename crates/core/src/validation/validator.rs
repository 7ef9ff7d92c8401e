use crate::domain::fixture::Fixture;
use crate::domain::recommendation::{PredictionBatch, Recommendation};
use crate::validation::report::{ValidationEvent, ValidationReport};
use crate::validation::resolver::{MatchResolver, Resolution};

/// Filters and corrects model recommendations against the fixtures they were generated from.
#[derive(Debug, Clone, Default)]
pub struct PredictionValidator {
    resolver: MatchResolver,
}

impl PredictionValidator {
    pub fn new(fixtures: &[Fixture]) -> Self {
        Self {
            resolver: MatchResolver::new(fixtures),
        }
    }

    pub fn resolver(&self) -> &MatchResolver {
        &self.resolver
    }

    /// Drops recommendations priced below `min_odds`, then rewrites the label (and the
    /// per-side analysis sections) of every survivor whose home/away order is inverted with
    /// respect to its fixture. Labels that cannot be parsed or resolved are kept unchanged
    /// and reported as warnings.
    pub fn validate_and_fix(
        &self,
        recommendations: Vec<Recommendation>,
        min_odds: f64,
    ) -> (Vec<Recommendation>, ValidationReport) {
        let mut events = Vec::new();

        // Odds first: rejected items never reach resolution.
        let mut kept = Vec::with_capacity(recommendations.len());
        for rec in recommendations {
            // Written so that a NaN price is rejected too.
            if !(rec.odds >= min_odds) {
                tracing::info!(
                    match_label = %rec.match_label,
                    odds = rec.odds,
                    min_odds,
                    "rejecting recommendation below odds floor"
                );
                events.push(ValidationEvent::OddsTooLow {
                    match_label: rec.match_label,
                    odds: rec.odds,
                    min_odds,
                });
                continue;
            }
            kept.push(rec);
        }

        for rec in &mut kept {
            if let Some(event) = self.fix_orientation(rec) {
                events.push(event);
            }
        }

        (kept, ValidationReport::from_events(events))
    }

    /// [`Self::validate_and_fix`] over a whole batch. Combined-bet legs that quoted a
    /// corrected label are rewritten as well.
    pub fn validate_batch(
        &self,
        mut batch: PredictionBatch,
        min_odds: f64,
    ) -> (PredictionBatch, ValidationReport) {
        let recommendations = std::mem::take(&mut batch.recommendations);
        let (kept, report) = self.validate_and_fix(recommendations, min_odds);
        batch.recommendations = kept;

        if let Some(combined) = batch.combined_bet.as_mut() {
            for event in &report.events {
                if let ValidationEvent::HomeAwayInverted {
                    original_match,
                    corrected_match,
                    ..
                } = event
                {
                    for leg in combined.matches.iter_mut() {
                        if *leg == *original_match {
                            *leg = corrected_match.clone();
                        }
                    }
                }
            }
        }

        (batch, report)
    }

    fn fix_orientation(&self, rec: &mut Recommendation) -> Option<ValidationEvent> {
        match self.resolver.resolve(&rec.match_label) {
            Resolution::Unparseable => {
                tracing::warn!(match_label = %rec.match_label, "match label could not be parsed");
                Some(ValidationEvent::UnparseableMatch {
                    match_label: rec.match_label.clone(),
                })
            }
            Resolution::NotFound { team1, team2 } => {
                tracing::warn!(
                    match_label = %rec.match_label,
                    %team1,
                    %team2,
                    "match not found in source data"
                );
                Some(ValidationEvent::MatchNotFound {
                    match_label: rec.match_label.clone(),
                })
            }
            Resolution::Found(found) if !found.is_inverted => None,
            Resolution::Found(found) => {
                let corrected_match = found.corrected_label();
                let original_match = std::mem::replace(&mut rec.match_label, corrected_match.clone());
                let swapped_sections = rec
                    .detailed_analysis
                    .as_mut()
                    .map(|analysis| analysis.swap_sides())
                    .unwrap_or(0);

                tracing::info!(
                    %original_match,
                    %corrected_match,
                    swapped_sections,
                    "corrected inverted home/away order"
                );
                Some(ValidationEvent::HomeAwayInverted {
                    original_match,
                    corrected_match,
                    swapped_sections,
                })
            }
        }
    }
}
