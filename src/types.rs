use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing_error::SpanTrace;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ToolCallId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

impl fmt::Display for ToolCallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToolCallId {
    pub fn new() -> Self {
        Self(format!("call_{}", Uuid::new_v4().simple()))
    }

    pub fn short(&self) -> &str {
        crate::str_utils::prefix_chars(&self.0, 13)
    }
}

impl Default for ToolCallId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for ToolCallId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Error, Debug)]
pub enum BetwiseError {
    /// Caller input is malformed or arrives in the wrong turn phase.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Sequencing violation by the caller (double begin, out-of-order tool transition).
    #[error("Logic error: {0}")]
    Logic(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Upstream error (status {0}): {1}")]
    Upstream(reqwest::StatusCode, String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BetwiseError {
    /// Failures of the model collaborator, as opposed to caller mistakes.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            BetwiseError::Transport(_)
                | BetwiseError::Upstream(_, _)
                | BetwiseError::Network(_)
                | BetwiseError::Io(_)
                | BetwiseError::Serialization(_)
        )
    }
}

#[derive(Debug)]
pub struct ObservedError {
    pub inner: BetwiseError,
    pub span_trace: SpanTrace,
}

impl std::fmt::Display for ObservedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\n\nSpan Trace:\n{}", self.inner, self.span_trace)
    }
}

impl std::error::Error for ObservedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.inner)
    }
}

impl<E> From<E> for ObservedError
where
    E: Into<BetwiseError>,
{
    fn from(error: E) -> Self {
        Self {
            inner: error.into(),
            span_trace: SpanTrace::capture(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ObservedError>;

/// --- CORE ROLES ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// --- BETTING PAYLOAD ---

/// A citation backing a claim. The title falls back to the URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "RawSource")]
pub struct Source {
    pub title: String,
    pub url: String,
}

#[derive(Deserialize)]
struct RawSource {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl Source {
    pub fn new(url: impl Into<String>, title: Option<String>) -> Result<Self> {
        let url = url.into();
        let url = url.trim();
        if url.is_empty() {
            return Err(BetwiseError::Validation("source url is required".to_string()).into());
        }
        let title = match title.map(|t| t.trim().to_string()) {
            Some(t) if !t.is_empty() => t,
            _ => url.to_string(),
        };
        Ok(Self {
            title,
            url: url.to_string(),
        })
    }
}

impl TryFrom<RawSource> for Source {
    type Error = String;

    fn try_from(raw: RawSource) -> std::result::Result<Self, Self::Error> {
        let url = raw.url.unwrap_or_default();
        Source::new(url, raw.title).map_err(|e| e.inner.to_string())
    }
}

/// One selection within a (possibly multi-leg) wager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "RawBetLeg")]
pub struct BetLeg {
    pub game: String,
    pub pick: String,
    pub odds: String,
    pub reasoning: String,
}

#[derive(Deserialize)]
struct RawBetLeg {
    game: String,
    pick: String,
    odds: String,
    reasoning: String,
}

impl TryFrom<RawBetLeg> for BetLeg {
    type Error = String;

    fn try_from(raw: RawBetLeg) -> std::result::Result<Self, Self::Error> {
        for (field, value) in [
            ("game", &raw.game),
            ("pick", &raw.pick),
            ("odds", &raw.odds),
            ("reasoning", &raw.reasoning),
        ] {
            if value.trim().is_empty() {
                return Err(format!("bet leg field '{}' is empty", field));
            }
        }
        Ok(Self {
            game: raw.game,
            pick: raw.pick,
            odds: raw.odds,
            reasoning: raw.reasoning,
        })
    }
}

/// A model-declared wager with its legs and reasoning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "RawBetRecommendation", rename_all = "camelCase")]
pub struct BetRecommendation {
    pub title: String,
    #[serde(rename = "type")]
    pub bet_type: String,
    pub legs: Vec<BetLeg>,
    pub total_odds: String,
    pub payout: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stake: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBetRecommendation {
    title: String,
    #[serde(rename = "type")]
    bet_type: String,
    legs: Vec<BetLeg>,
    total_odds: String,
    payout: String,
    #[serde(default)]
    stake: Option<String>,
    #[serde(default)]
    confidence: Option<String>,
}

impl TryFrom<RawBetRecommendation> for BetRecommendation {
    type Error = String;

    fn try_from(raw: RawBetRecommendation) -> std::result::Result<Self, Self::Error> {
        if raw.legs.is_empty() {
            return Err(format!("bet '{}' has no legs", raw.title));
        }
        Ok(Self {
            title: raw.title,
            bet_type: raw.bet_type,
            legs: raw.legs,
            total_odds: raw.total_odds,
            payout: raw.payout,
            stake: raw.stake,
            confidence: raw.confidence,
        })
    }
}

/// The object the model emits through the `betting_analysis` tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BettingAnalysis {
    pub bets: Vec<BetRecommendation>,
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl BettingAnalysis {
    /// Strict parse: schema conformance plus a non-empty bets list.
    pub fn parse_strict(raw: &str) -> Result<Self> {
        let analysis: BettingAnalysis = serde_json::from_str(raw)?;
        if analysis.bets.is_empty() {
            return Err(BetwiseError::Validation("bets list is empty".to_string()).into());
        }
        Ok(analysis)
    }
}

/// --- PROVIDER WIRE TYPES ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_search_options: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlCitation {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default)]
    pub url_citation: Option<UrlCitation>,
}

impl Annotation {
    pub fn to_source(&self) -> Option<Source> {
        let citation = self.url_citation.as_ref()?;
        Source::new(citation.url.clone(), citation.title.clone()).ok()
    }
}

#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
pub struct RawFunction {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
pub struct ProviderToolCallDelta {
    /// Absent in non-streamed bodies, where position identifies the call.
    #[serde(default)]
    pub index: Option<u32>,
    pub id: Option<String>,
    pub function: Option<RawFunction>,
}

#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, Default)]
pub struct PulseDelta {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ProviderToolCallDelta>>,
    pub annotations: Option<Vec<Annotation>>,
}

#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
pub struct ProviderPulseChoice {
    #[serde(default, alias = "message")]
    pub delta: PulseDelta,
    pub finish_reason: Option<String>,
}

/// One SSE chunk, or (with `message` in place of `delta`) a whole non-streamed body.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
pub struct ProviderPulse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<ProviderPulseChoice>,
    pub usage: Option<Usage>,
}

#[derive(serde::Deserialize, serde::Serialize, Debug)]
pub struct ProviderError {
    pub error: ProviderErrorDetails,
}

#[derive(serde::Deserialize, serde::Serialize, Debug)]
pub struct ProviderErrorDetails {
    pub message: String,
    #[serde(default)]
    pub code: Option<serde_json::Value>,
}

#[derive(Debug)]
pub enum LineEvent {
    Pulse(ProviderPulse),
    Error(ProviderError),
    Unknown(String),
}

pub fn parse_provider_line(data: &str) -> LineEvent {
    // Try Error first as it's more specific (requires "error" key)
    if let Ok(err) = serde_json::from_str::<ProviderError>(data) {
        return LineEvent::Error(err);
    }
    if let Ok(pulse) = serde_json::from_str::<ProviderPulse>(data) {
        if !pulse.choices.is_empty() || pulse.usage.is_some() {
            return LineEvent::Pulse(pulse);
        }
    }
    tracing::debug!(
        "[STREAM] Unknown line format: {}",
        crate::str_utils::first_n_chars_lossy(data, 200)
    );
    LineEvent::Unknown(data.to_string())
}
