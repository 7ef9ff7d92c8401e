pub mod anthropic;
pub mod error;
pub mod json;

use crate::config::BettingRules;
use crate::domain::fixture::Fixture;
use crate::domain::recommendation::PredictionBatch;
use crate::ingest::stats::FixtureContext;
use crate::learning::LlmErrorAnalysis;
use crate::tracking::PredictionRecord;
use chrono::NaiveDate;

#[derive(Debug, Clone)]
pub struct GenerateInput {
    pub analysis_date: NaiveDate,
    pub fixtures: Vec<Fixture>,
    pub rules: BettingRules,
    /// Output of `Learnings::summary`; may be empty.
    pub learnings_summary: String,
    /// Either empty or one entry per fixture, in the same order.
    pub contexts: Vec<FixtureContext>,
}

impl GenerateInput {
    pub fn try_new(
        analysis_date: NaiveDate,
        fixtures: Vec<Fixture>,
        rules: BettingRules,
        learnings_summary: String,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(
            !fixtures.is_empty(),
            "no fixtures to analyse for {analysis_date}"
        );
        Ok(Self {
            analysis_date,
            fixtures,
            rules,
            learnings_summary,
            contexts: Vec::new(),
        })
    }

    pub fn with_contexts(mut self, contexts: Vec<FixtureContext>) -> anyhow::Result<Self> {
        anyhow::ensure!(
            contexts.len() == self.fixtures.len(),
            "got {} fixture contexts for {} fixtures",
            contexts.len(),
            self.fixtures.len()
        );
        self.contexts = contexts;
        Ok(self)
    }

    /// Numbered fixture list in authoritative home/away order.
    pub fn fixtures_prompt(&self) -> String {
        let mut out = String::new();
        for (i, f) in self.fixtures.iter().enumerate() {
            out.push_str(&format!("{}. {} vs {}", i + 1, f.home, f.away));
            if let Some(c) = &f.competition {
                out.push_str(&format!(" | {c}"));
            }
            if let Some(k) = &f.kickoff {
                out.push_str(&format!(" | {k}"));
            }
            out.push('\n');
            if let Some(context) = self.contexts.get(i) {
                out.push_str(&context.render(f));
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
        }
    }
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn generate_predictions(&self, input: GenerateInput) -> anyhow::Result<PredictionBatch>;

    /// Post-mortem of a lost prediction.
    async fn analyze_loss(&self, record: &PredictionRecord) -> anyhow::Result<LlmErrorAnalysis>;
}
