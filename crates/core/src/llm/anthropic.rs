use crate::config::Settings;
use crate::domain::contract::LlmPredictionBatch;
use crate::domain::recommendation::PredictionBatch;
use crate::learning::{ErrorCategory, LlmErrorAnalysis};
use crate::llm::error::{LlmDiagnosticsError, LlmStage};
use crate::llm::json;
use crate::llm::{GenerateInput, LlmClient, Provider};
use crate::tracking::PredictionRecord;
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const REPAIR_ATTEMPTS: u32 = 2;

const TOOL_NAME_EMIT_PREDICTIONS: &str = "emit_predictions";
const TOOL_NAME_EMIT_ERROR_ANALYSIS: &str = "emit_error_analysis";

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

/// One structured-output exchange: the system prompt, the tool the model is forced to call,
/// and the reminder sent when it answers with invalid JSON anyway.
struct Exchange {
    system: String,
    tool: Tool,
    repair_rules: String,
}

impl AnthropicClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_anthropic_api_key()?.to_string();
        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_tokens = std::env::var("ANTHROPIC_MAX_TOKENS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);

        let timeout_secs = std::env::var("ANTHROPIC_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            max_tokens,
        })
    }

    async fn create_message(
        &self,
        req: CreateMessageRequest,
    ) -> anyhow::Result<(Value, CreateMessageResponse)> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(&req)
            .send()
            .await
            .context("Anthropic request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Anthropic response body")?;
        if !status.is_success() {
            let raw_response_json = serde_json::from_str::<Value>(&text).ok();
            return Err(LlmDiagnosticsError {
                provider: Provider::Anthropic,
                stage: LlmStage::Http,
                detail: format!("status={status}"),
                raw_output: Some(text),
                raw_response_json,
            }
            .into());
        }

        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("failed to parse Anthropic response JSON: {text}"))?;
        let parsed = serde_json::from_value::<CreateMessageResponse>(raw_json.clone())
            .context("failed to decode Anthropic response into CreateMessageResponse")?;
        Ok((raw_json, parsed))
    }

    fn request(&self, exchange: &Exchange, content: String, max_tokens: u32) -> CreateMessageRequest {
        CreateMessageRequest {
            model: self.model.clone(),
            max_tokens,
            system: Some(exchange.system.clone()),
            messages: vec![Message {
                role: "user",
                content,
            }],
            tools: Some(vec![exchange.tool.clone()]),
            tool_choice: Some(ToolChoice::Tool {
                name: exchange.tool.name,
            }),
        }
    }

    fn predictions_exchange(input: &GenerateInput) -> Exchange {
        let schema = serde_json::json!({
            "type": "object",
            "required": ["analysis_date", "recommendations"],
            "properties": {
                "analysis_date": {"type": "string"},
                "total_analyzed": {"type": "integer"},
                "recommendations": {
                    "type": "array",
                    "maxItems": input.rules.max_predictions,
                    "items": {
                        "type": "object",
                        "required": ["match", "bet_type", "prediction", "odds", "confidence"],
                        "properties": {
                            "match": {"type": "string"},
                            "competition": {"type": "string"},
                            "kickoff": {"type": "string"},
                            "bet_type": {"type": "string"},
                            "prediction": {"type": "string"},
                            "odds": {"type": "number"},
                            "confidence": {"type": "number"},
                            "risk_level": {"type": "string"},
                            "critical_factors": {"type": "array", "items": {"type": "string"}},
                            "detailed_analysis": {
                                "type": "object",
                                "properties": {
                                    "recent_form": {"$ref": "#/$defs/sides"},
                                    "injuries_suspensions": {"$ref": "#/$defs/sides"},
                                    "schedule_fatigue": {"$ref": "#/$defs/sides"}
                                }
                            }
                        }
                    }
                },
                "combined_bet": {
                    "type": ["object", "null"],
                    "properties": {
                        "matches": {"type": "array", "items": {"type": "string"}},
                        "total_odds": {"type": "number"},
                        "confidence": {"type": "number"},
                        "reasoning": {"type": "string"}
                    }
                }
            },
            "$defs": {
                "sides": {
                    "type": "object",
                    "properties": {
                        "home_team": {"type": "string"},
                        "away_team": {"type": "string"}
                    }
                }
            }
        });

        Exchange {
            system: Self::predictions_system_prompt(input),
            tool: Tool {
                name: TOOL_NAME_EMIT_PREDICTIONS,
                description: "Emit the day's betting recommendations as structured JSON",
                input_schema: schema,
            },
            repair_rules: format!(
                "- The JSON MUST have analysis_date=\"{}\".\n\
- The JSON MUST have a \"recommendations\" array with at most {} items.\n\
- Each item MUST include keys: match, bet_type, prediction, odds, confidence.\n\
- \"match\" MUST be written \"Home vs Away\" exactly as in the fixture list.",
                input.analysis_date, input.rules.max_predictions
            ),
        }
    }

    fn predictions_system_prompt(input: &GenerateInput) -> String {
        let rules = &input.rules;
        [
            "You are an expert football betting analyst.".to_string(),
            "Return ONLY valid JSON through the provided tool. Do not wrap in markdown.".to_string(),
            "Rules:".to_string(),
            format!(
                "- odds must be between {:.2} and {:.2}",
                rules.min_odds, rules.max_odds
            ),
            format!("- confidence is a percentage and must be >= {}", rules.min_confidence),
            format!("- at most {} recommendations", rules.max_predictions),
            "- only use fixtures from the provided list".to_string(),
            "- write each match as \"Home vs Away\" with the home team FIRST, exactly as listed"
                .to_string(),
            "- in detailed_analysis, home_team always describes the home side".to_string(),
            "- when a fixture lists form, head-to-head or absences, base detailed_analysis on those facts"
                .to_string(),
            "- an empty recommendations array is a valid answer".to_string(),
        ]
        .join("\n")
    }

    fn predictions_user_prompt(input: &GenerateInput) -> String {
        let mut prompt = format!(
            "Task: Analyse the fixtures for analysis_date={} and pick the best value bets.\n\nFixtures (home vs away):\n{}",
            input.analysis_date,
            input.fixtures_prompt()
        );
        if !input.learnings_summary.trim().is_empty() {
            prompt.push('\n');
            prompt.push_str(&input.learnings_summary);
        }
        prompt
    }

    fn analysis_exchange() -> Exchange {
        let categories: Vec<&str> = ErrorCategory::ALL.iter().map(ErrorCategory::as_str).collect();
        let schema = serde_json::json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["main_cause", "missed_factors", "actionable_conclusion", "error_category"],
            "properties": {
                "main_cause": {"type": "string"},
                "missed_factors": {"type": "array", "items": {"type": "string"}},
                "actionable_conclusion": {"type": "string"},
                "error_category": {"type": "string", "enum": categories}
            }
        });

        Exchange {
            system: [
                "You review football bets that lost and explain what the analysis missed.",
                "Return ONLY valid JSON through the provided tool. Do not wrap in markdown.",
                "actionable_conclusion must be one sentence that can be applied to future picks.",
            ]
            .join("\n"),
            tool: Tool {
                name: TOOL_NAME_EMIT_ERROR_ANALYSIS,
                description: "Emit the post-mortem of a lost prediction as structured JSON",
                input_schema: schema,
            },
            repair_rules: format!(
                "- Keys: main_cause, missed_factors, actionable_conclusion, error_category.\n\
- error_category MUST be one of: {}.",
                categories.join(", ")
            ),
        }
    }

    fn analysis_user_prompt(record: &PredictionRecord) -> String {
        let mut prompt = format!(
            "Lost prediction:\n- match: {}\n- bet type: {}\n- pick: {}\n- odds: {:.2}\n",
            record.match_label, record.bet_type, record.prediction, record.odds
        );
        if let Some(c) = record.confidence {
            prompt.push_str(&format!("- confidence: {c:.0}%\n"));
        }
        if let Some(comp) = &record.competition {
            prompt.push_str(&format!("- competition: {comp}\n"));
        }
        if let Some(score) = &record.actual_score {
            prompt.push_str(&format!("- final score: {score}\n"));
        }
        prompt.push_str("\nExplain why this bet lost.");
        prompt
    }

    fn repair_prompt(exchange: &Exchange, previous_output: &str) -> String {
        format!(
            "Your previous message was NOT valid JSON.\n\n\
TASK: Output ONLY a single JSON object that matches the tool schema and rules.\n\
- Do NOT include any markdown, prose, or code fences.\n\
- Do NOT include trailing commas, comments, or semicolons.\n\
- Use double quotes for all JSON strings.\n\
{}\n\n\
INVALID OUTPUT (for reference only; DO NOT copy verbatim):\n{previous_output}",
            exchange.repair_rules
        )
    }

    fn response_text(res: &CreateMessageResponse) -> String {
        let mut out = String::new();
        for block in &res.content {
            if let ContentBlock::Text { text } = block {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(text);
            }
        }
        out
    }

    fn response_tool_input<T: DeserializeOwned>(
        res: &CreateMessageResponse,
        tool_name: &str,
    ) -> anyhow::Result<Option<T>> {
        for block in &res.content {
            if let ContentBlock::ToolUse { name, input } = block {
                if name == tool_name {
                    let parsed = serde_json::from_value::<T>(input.clone())
                        .with_context(|| format!("failed to decode tool_use.input of {tool_name}"))?;
                    return Ok(Some(parsed));
                }
            }
        }
        Ok(None)
    }

    /// Sends `content`, retrying once with a larger budget if the model ran out of tokens,
    /// then reads the forced tool call. Falls back to the text blocks, with repair prompts,
    /// when the model answered in prose.
    async fn structured_call<T, P>(
        &self,
        exchange: &Exchange,
        content: String,
        parse_text: P,
    ) -> anyhow::Result<(T, Value)>
    where
        T: DeserializeOwned,
        P: Fn(&str) -> anyhow::Result<T>,
    {
        let (mut raw_json, mut res) = self
            .create_message(self.request(exchange, content.clone(), self.max_tokens))
            .await?;

        if matches!(res.stop_reason.as_deref(), Some("max_tokens")) {
            let bumped = self.max_tokens.saturating_mul(2).max(8192);
            tracing::warn!(
                tool = exchange.tool.name,
                from = self.max_tokens,
                to = bumped,
                "Anthropic stop_reason=max_tokens; retrying once with higher max_tokens"
            );
            let (rj, r) = self
                .create_message(self.request(exchange, content, bumped))
                .await?;
            raw_json = rj;
            res = r;
        }

        if let Some(tool_output) = Self::response_tool_input::<T>(&res, exchange.tool.name)? {
            return Ok((tool_output, raw_json));
        }

        // Rare: the model ignored the forced tool.
        let mut last_text = Self::response_text(&res);
        let mut last_raw_json = raw_json;
        let mut last_err = match parse_text(&last_text) {
            Ok(parsed) => return Ok((parsed, last_raw_json)),
            Err(err) => err,
        };

        for attempt in 1..=REPAIR_ATTEMPTS {
            let repair_req = self.request(
                exchange,
                Self::repair_prompt(exchange, &last_text),
                self.max_tokens,
            );
            let (repair_raw_json, repair_res) = self.create_message(repair_req).await?;

            let repaired = match Self::response_tool_input::<T>(&repair_res, exchange.tool.name) {
                Ok(Some(parsed)) => Ok(parsed),
                _ => parse_text(&Self::response_text(&repair_res)),
            };
            match repaired {
                Ok(parsed) => return Ok((parsed, repair_raw_json)),
                Err(err) => {
                    tracing::warn!(
                        attempt,
                        tool = exchange.tool.name,
                        error = %err,
                        "LLM output still invalid after repair attempt"
                    );
                    last_err = err;
                    last_text = Self::response_text(&repair_res);
                    last_raw_json = repair_raw_json;
                }
            }
        }

        Err(LlmDiagnosticsError {
            provider: Provider::Anthropic,
            stage: LlmStage::ParseAfterRepair,
            detail: format!("final_error={last_err}"),
            raw_output: Some(last_text),
            raw_response_json: Some(last_raw_json),
        }
        .into())
    }

    /// Generates the day's batch and returns it together with the raw provider response.
    pub async fn generate_predictions_with_raw(
        &self,
        input: GenerateInput,
    ) -> anyhow::Result<(PredictionBatch, Value)> {
        let exchange = Self::predictions_exchange(&input);
        let max_predictions = input.rules.max_predictions;
        let (batch, raw) = self
            .structured_call(
                &exchange,
                Self::predictions_user_prompt(&input),
                json::parse_json::<LlmPredictionBatch>,
            )
            .await?;
        let batch = batch.validate_and_into_batch(max_predictions)?;
        Ok((batch, raw))
    }
}

#[async_trait::async_trait]
impl LlmClient for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn generate_predictions(&self, input: GenerateInput) -> anyhow::Result<PredictionBatch> {
        let (batch, _raw) = self.generate_predictions_with_raw(input).await?;
        Ok(batch)
    }

    async fn analyze_loss(&self, record: &PredictionRecord) -> anyhow::Result<LlmErrorAnalysis> {
        let exchange = Self::analysis_exchange();
        let (analysis, _raw) = self
            .structured_call(
                &exchange,
                Self::analysis_user_prompt(record),
                json::parse_json::<LlmErrorAnalysis>,
            )
            .await?;
        Ok(analysis)
    }
}

#[derive(Debug, Clone, Serialize)]
struct CreateMessageRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,

    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CreateMessageResponse {
    content: Vec<ContentBlock>,

    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct Tool {
    name: &'static str,
    description: &'static str,
    input_schema: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
enum ToolChoice {
    #[serde(rename = "tool")]
    Tool { name: &'static str },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: Value,
    },

    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BettingRules;
    use crate::domain::fixture::Fixture;
    use crate::domain::recommendation::Recommendation;
    use chrono::NaiveDate;
    use serde_json::json;

    fn input(learnings_summary: &str) -> GenerateInput {
        GenerateInput::try_new(
            NaiveDate::from_ymd_opt(2026, 10, 15).unwrap(),
            vec![Fixture::new("AS Roma", "Viktoria Plzen").with_competition("Europa League")],
            BettingRules::default(),
            learnings_summary.to_string(),
        )
        .unwrap()
    }

    #[test]
    fn parses_tool_use_prediction_input() {
        let res: CreateMessageResponse = serde_json::from_value(json!({
            "content": [
                {"type": "thinking", "thinking": "...", "signature": "sig"},
                {
                    "type": "tool_use",
                    "id": "toolu_1",
                    "name": TOOL_NAME_EMIT_PREDICTIONS,
                    "input": {
                        "analysis_date": "2026-10-15",
                        "recommendations": [
                            {"match": "Viktoria Plzen vs AS Roma", "bet_type": "1X2", "prediction": "2", "odds": 1.9, "confidence": 80}
                        ]
                    }
                }
            ],
            "stop_reason": "tool_use"
        }))
        .unwrap();

        let parsed = AnthropicClient::response_tool_input::<LlmPredictionBatch>(
            &res,
            TOOL_NAME_EMIT_PREDICTIONS,
        )
        .unwrap()
        .unwrap();
        let batch = parsed.validate_and_into_batch(8).unwrap();
        assert_eq!(batch.recommendations.len(), 1);
        assert_eq!(batch.recommendations[0].match_label, "Viktoria Plzen vs AS Roma");
    }

    #[test]
    fn ignores_tool_calls_with_another_name() {
        let res = CreateMessageResponse {
            content: vec![ContentBlock::ToolUse {
                name: "something_else".to_string(),
                input: json!({}),
            }],
            stop_reason: None,
        };
        let parsed = AnthropicClient::response_tool_input::<LlmErrorAnalysis>(
            &res,
            TOOL_NAME_EMIT_ERROR_ANALYSIS,
        )
        .unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn joins_text_blocks() {
        let res = CreateMessageResponse {
            content: vec![
                ContentBlock::Text {
                    text: "{\"a\":".to_string(),
                },
                ContentBlock::Unknown,
                ContentBlock::Text {
                    text: "1}".to_string(),
                },
            ],
            stop_reason: None,
        };
        assert_eq!(AnthropicClient::response_text(&res), "{\"a\":\n1}");
    }

    #[test]
    fn user_prompt_appends_learnings_only_when_present() {
        let without = AnthropicClient::predictions_user_prompt(&input("  "));
        assert!(without.contains("1. AS Roma vs Viktoria Plzen | Europa League"));
        assert!(!without.contains("LESSONS"));

        let with = AnthropicClient::predictions_user_prompt(&input("### LESSONS FROM PAST ERRORS\n"));
        assert!(with.ends_with("### LESSONS FROM PAST ERRORS\n"));
    }

    #[test]
    fn system_prompt_states_betting_rules() {
        let prompt = AnthropicClient::predictions_system_prompt(&input(""));
        assert!(prompt.contains("between 1.50 and 4.00"));
        assert!(prompt.contains(">= 75"));
        assert!(prompt.contains("at most 8 recommendations"));
    }

    #[test]
    fn analysis_schema_lists_every_category() {
        let exchange = AnthropicClient::analysis_exchange();
        let categories = &exchange.tool.input_schema["properties"]["error_category"]["enum"];
        assert_eq!(categories.as_array().unwrap().len(), ErrorCategory::ALL.len());
        assert!(exchange.repair_rules.contains("missing_player"));
    }

    #[test]
    fn analysis_prompt_includes_final_score() {
        let mut rec = Recommendation::new("Lille vs Lens", 2.1);
        rec.bet_type = "1X2".to_string();
        rec.prediction = "1".to_string();
        let mut record =
            PredictionRecord::pending(NaiveDate::from_ymd_opt(2026, 10, 11).unwrap(), 0, &rec);
        record.actual_score = Some("0-2".to_string());

        let prompt = AnthropicClient::analysis_user_prompt(&record);
        assert!(prompt.contains("- match: Lille vs Lens"));
        assert!(prompt.contains("- odds: 2.10"));
        assert!(prompt.contains("- final score: 0-2"));
    }
}
