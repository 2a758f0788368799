//! Language-model oracle adapter and strict response parsing.
//!
//! The oracle is an untrusted text source. Everything it returns is parsed
//! into plain candidate strings here and validated again by the caller.

use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::gate::{Dimension, Guidance, GuidanceRequest, PriorityOption};
use crate::model::CountryCode;
use crate::traits::{GatewayOracle, GuidanceOracle};

/// Upper bound on gateway candidates taken from one oracle answer.
pub const MAX_GATEWAY_CANDIDATES: usize = 3;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request timed out")]
    Timeout,
    #[error("oracle transport failure: {0}")]
    Transport(String),
    #[error("oracle returned HTTP status {0}")]
    Status(u16),
    #[error("oracle response was malformed: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OracleError::Timeout
        } else if let Some(status) = err.status() {
            OracleError::Status(status.as_u16())
        } else {
            OracleError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpOracleConfig {
    /// Base URL of an OpenAI-compatible API, e.g. "http://localhost:11434/v1".
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for HttpOracleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            model: "llama3.1".to_string(),
            api_key: None,
            timeout_secs: 10,
        }
    }
}

impl HttpOracleConfig {
    /// Defaults overridden by `TRIP_ORACLE_URL`, `TRIP_ORACLE_MODEL`,
    /// `TRIP_ORACLE_API_KEY` and `TRIP_ORACLE_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("TRIP_ORACLE_URL") {
            config.base_url = url;
        }
        if let Ok(model) = std::env::var("TRIP_ORACLE_MODEL") {
            config.model = model;
        }
        if let Ok(key) = std::env::var("TRIP_ORACLE_API_KEY") {
            config.api_key = Some(key);
        }
        if let Some(secs) = std::env::var("TRIP_ORACLE_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse().ok())
        {
            config.timeout_secs = secs;
        }
        config
    }
}

#[derive(Debug, Clone)]
pub struct HttpOracle {
    config: HttpOracleConfig,
    client: reqwest::blocking::Client,
}

impl HttpOracle {
    pub fn new(config: HttpOracleConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    /// Raw completion text for a prompt.
    pub fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.config.model,
            temperature: 0.0,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let mut request = self.client.post(url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response: ChatResponse = request.send()?.error_for_status()?.json()?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| OracleError::Malformed("no completion content".to_string()))
    }

    /// Single classification token from `allowed`, or `None` on any failure.
    pub fn classify(&self, prompt: &str, allowed: &[&str]) -> Option<String> {
        match self.complete(prompt) {
            Ok(text) => parse_classification(&text, allowed),
            Err(err) => {
                warn!(error = %err, "oracle classification failed");
                None
            }
        }
    }

    /// Yes/no answer, or `None` on any failure.
    pub fn confirm(&self, prompt: &str) -> Option<bool> {
        match self.complete(prompt) {
            Ok(text) => parse_boolean(&text),
            Err(err) => {
                warn!(error = %err, "oracle confirmation failed");
                None
            }
        }
    }
}

impl GatewayOracle for HttpOracle {
    fn suggest(&self, prompt: &str) -> Result<Vec<String>, OracleError> {
        let text = self.complete(prompt)?;
        Ok(parse_candidate_list(&text, MAX_GATEWAY_CANDIDATES))
    }
}

impl GuidanceOracle for HttpOracle {
    fn guidance(&self, request: &GuidanceRequest) -> Result<Guidance, OracleError> {
        let text = self.complete(&guidance_prompt(request))?;
        parse_guidance(&text)
    }
}

const SYSTEM_PROMPT: &str = "You answer travel-planning lookups. Reply with data only, no prose.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Debug, Deserialize)]
struct ChatContent {
    content: Option<String>,
}

/// Prompt asking for gateway airport cities near `city`.
pub fn gateway_prompt(city: &str, allowed: &BTreeSet<CountryCode>, max: usize) -> String {
    let mut prompt = format!(
        "List up to {} cities with an international airport that are closest to {}.",
        max, city
    );
    if !allowed.is_empty() {
        let codes = allowed
            .iter()
            .map(CountryCode::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        prompt.push_str(&format!(" Only cities in these countries: {}.", codes));
    }
    prompt.push_str(" Answer as a JSON array of city names.");
    prompt
}

fn guidance_prompt(request: &GuidanceRequest) -> String {
    let dimensions = request
        .differing
        .iter()
        .map(|dimension| dimension.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{} {:?} options differ in: {}. Offer at most {} priorities. Answer as JSON \
         {{\"explanation\": string, \"priorities\": [{{\"dimension\": string, \"label\": string}}]}}.",
        request.option_count, request.kind, dimensions, request.max_priorities
    )
}

fn list_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:[-*\u{2022}]|\d{1,2}[.)])\s*").expect("valid regex"))
}

fn place_name() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\p{L}[\p{L}\p{M} .'\-]{0,59}$").expect("valid regex"))
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line, if any.
    let inner = inner.split_once('\n').map_or(inner, |(_, rest)| rest);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Keep only plausible, distinct place names, at most `max` of them.
pub fn sanitize_candidates<I, S>(candidates: I, max: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut accepted = Vec::new();
    for candidate in candidates {
        let cleaned = list_marker().replace(candidate.as_ref(), "");
        let cleaned = cleaned.trim().trim_matches(|c| c == '"' || c == '\'' || c == '.');
        if !place_name().is_match(cleaned) {
            continue;
        }
        if seen.insert(cleaned.to_lowercase()) {
            accepted.push(cleaned.to_string());
        }
        if accepted.len() == max {
            break;
        }
    }
    accepted
}

/// Parse an oracle answer into candidate city names.
///
/// Accepts a JSON array of strings or a newline/comma/semicolon separated
/// list. Non-string JSON entries and implausible names are dropped.
pub fn parse_candidate_list(text: &str, max: usize) -> Vec<String> {
    let body = strip_code_fence(text);
    if body.starts_with('[') {
        return match serde_json::from_str::<Vec<serde_json::Value>>(body) {
            Ok(values) => sanitize_candidates(
                values.iter().filter_map(serde_json::Value::as_str),
                max,
            ),
            Err(err) => {
                warn!(error = %err, "discarding malformed oracle candidate array");
                Vec::new()
            }
        };
    }
    sanitize_candidates(body.split(['\n', ',', ';']), max)
}

/// Match an answer against a closed token set, case-insensitively.
pub fn parse_classification(text: &str, allowed: &[&str]) -> Option<String> {
    let token = strip_code_fence(text)
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    allowed
        .iter()
        .find(|candidate| candidate.to_lowercase() == token)
        .map(|candidate| candidate.to_string())
}

pub fn parse_boolean(text: &str) -> Option<bool> {
    match parse_classification(text, &["yes", "true", "y", "no", "false", "n"])?.as_str() {
        "yes" | "true" | "y" => Some(true),
        _ => Some(false),
    }
}

#[derive(Debug, Deserialize)]
struct RawGuidance {
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    priorities: Vec<RawPriority>,
}

#[derive(Debug, Deserialize)]
struct RawPriority {
    dimension: String,
    #[serde(default)]
    label: Option<String>,
}

/// Parse a guidance answer. Priorities naming unknown dimensions are dropped.
pub fn parse_guidance(text: &str) -> Result<Guidance, OracleError> {
    let raw: RawGuidance = serde_json::from_str(strip_code_fence(text))
        .map_err(|err| OracleError::Malformed(err.to_string()))?;
    let priorities = raw
        .priorities
        .into_iter()
        .filter_map(|priority| {
            let dimension = Dimension::parse(&priority.dimension)?;
            let label = priority
                .label
                .filter(|label| !label.trim().is_empty())
                .unwrap_or_else(|| dimension.as_str().to_string());
            Some(PriorityOption { dimension, label })
        })
        .collect();
    Ok(Guidance {
        explanation: raw.explanation.filter(|text| !text.trim().is_empty()),
        priorities,
    })
}
