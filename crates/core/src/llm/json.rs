use crate::domain::contract::LlmPredictionBatch;
use crate::domain::recommendation::PredictionBatch;
use anyhow::Context;
use serde::de::DeserializeOwned;

/// Pulls the JSON object out of a model reply: the body of a Markdown fence if there is one,
/// otherwise the span from the first `{` to the last `}`. Zero-width characters are dropped.
pub fn extract_json(text: &str) -> Option<String> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '\u{200b}' | '\u{feff}'))
        .collect();
    let trimmed = cleaned.trim();

    if let Some(fence_start) = trimmed.find("```") {
        let after_fence = &trimmed[fence_start + 3..];
        // Skip the info string ("json") up to the end of the line.
        let body = after_fence
            .split_once('\n')
            .map(|(_, rest)| rest)
            .unwrap_or(after_fence);
        let body = match body.find("```") {
            Some(end) => &body[..end],
            None => body,
        };
        return Some(body.trim().to_string());
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

pub fn parse_json<T: DeserializeOwned>(text: &str) -> anyhow::Result<T> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    serde_json::from_str::<T>(&json_str)
        .with_context(|| format!("LLM output is not valid JSON for the expected schema: {json_str}"))
}

pub fn parse_batch(text: &str, max_predictions: usize) -> anyhow::Result<PredictionBatch> {
    let parsed: LlmPredictionBatch = parse_json(text)?;
    Ok(parsed.validate_and_into_batch(max_predictions)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contract::InputContractError;
    use serde_json::json;

    fn valid_batch_json() -> String {
        json!({
            "analysis_date": "2026-10-15",
            "total_analyzed": 14,
            "recommendations": [
                {
                    "match": "AS Roma vs Viktoria Plzen",
                    "competition": "Europa League",
                    "bet_type": "1X2",
                    "prediction": "1",
                    "odds": 1.85,
                    "confidence": 78,
                },
                {
                    "match": "Lille vs Lens",
                    "bet_type": "BTTS",
                    "prediction": "Yes",
                    "odds": 1.72,
                },
            ],
        })
        .to_string()
    }

    #[test]
    fn extract_json_handles_fenced_blocks() {
        let body = "{\"a\":1}";
        let fenced = format!("Here you go:\n```json\n{body}\n```\n");
        assert_eq!(extract_json(&fenced), Some(body.to_string()));
    }

    #[test]
    fn extract_json_falls_back_to_braces() {
        let s = "prefix {\"a\":1} suffix";
        assert_eq!(extract_json(s), Some("{\"a\":1}".to_string()));
    }

    #[test]
    fn extract_json_drops_zero_width_characters() {
        let s = "\u{feff}{\"a\":\u{200b}1}";
        assert_eq!(extract_json(s), Some("{\"a\":1}".to_string()));
    }

    #[test]
    fn parse_batch_accepts_valid_json() {
        let batch = parse_batch(&valid_batch_json(), 8).unwrap();
        assert_eq!(batch.recommendations.len(), 2);
        assert_eq!(batch.recommendations[0].confidence, Some(78.0));
        assert_eq!(batch.extra["total_analyzed"], json!(14));
    }

    #[test]
    fn parse_batch_surfaces_contract_violation() {
        let err = parse_batch("{\"analysis_date\": \"2026-10-15\"}", 8).unwrap_err();
        assert_eq!(
            err.downcast_ref::<InputContractError>(),
            Some(&InputContractError::MissingRecommendations)
        );
    }

    #[test]
    fn parse_batch_tolerates_badly_typed_fields() {
        let batch = parse_batch(
            r#"{"analysis_date":"15/10/2026","recommendations":[{"match":"Lille vs Lens","odds":2.0,"confidence":"78%"}]}"#,
            8,
        )
        .unwrap();
        assert_eq!(batch.analysis_date.map(|d| d.to_string()).as_deref(), Some("2026-10-15"));
        assert_eq!(batch.recommendations[0].confidence, Some(78.0));
    }

    #[test]
    fn parse_batch_rejects_non_json() {
        assert!(parse_batch("no picks today", 8).is_err());
    }
}
