use crate::llm::Provider;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmStage {
    Http,
    ParseAfterRepair,
}

impl fmt::Display for LlmStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => f.write_str("http"),
            Self::ParseAfterRepair => f.write_str("parse_after_repair"),
        }
    }
}

/// Failure carrying what the provider actually returned, so it can be stored with the
/// failed run.
#[derive(Debug, Clone)]
pub struct LlmDiagnosticsError {
    pub provider: Provider,
    pub stage: LlmStage,
    pub detail: String,
    pub raw_output: Option<String>,
    pub raw_response_json: Option<Value>,
}

impl LlmDiagnosticsError {
    /// Best JSON rendition of the raw output: the parsed response if there is one, else the
    /// text wrapped as `{"raw_text": ...}`.
    pub fn raw_as_json(&self) -> Option<Value> {
        if let Some(v) = &self.raw_response_json {
            return Some(v.clone());
        }
        let raw = self.raw_output.as_deref()?;
        serde_json::from_str(raw)
            .ok()
            .or_else(|| Some(serde_json::json!({ "raw_text": raw })))
    }
}

impl fmt::Display for LlmDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LLM error (provider={}, stage={}): {}",
            self.provider.as_str(),
            self.stage,
            self.detail
        )
    }
}

impl std::error::Error for LlmDiagnosticsError {}
