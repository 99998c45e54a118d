use crate::types::{BetwiseError, Result, ToolCallId};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Capability a tool call invokes. Web search calls are bookkeeping only and
/// never shown in the structured display.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    WebSearch,
    BettingAnalysis,
    Other(String),
}

impl ToolKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "web_search" | "web_search_preview" | "web_search_call" => Self::WebSearch,
            crate::constants::BETTING_ANALYSIS_TOOL => Self::BettingAnalysis,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::WebSearch => "web_search",
            Self::BettingAnalysis => crate::constants::BETTING_ANALYSIS_TOOL,
            Self::Other(name) => name,
        }
    }

    pub fn is_web_search(&self) -> bool {
        matches!(self, Self::WebSearch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCallStatus {
    InputStreaming,
    InputAvailable,
    OutputAvailable,
    OutputError,
}

impl fmt::Display for ToolCallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InputStreaming => "input-streaming",
            Self::InputAvailable => "input-available",
            Self::OutputAvailable => "output-available",
            Self::OutputError => "output-error",
        };
        write!(f, "{}", s)
    }
}

/// Lifecycle of a tool call. Each state carries exactly the payloads it may have.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum ToolCallState {
    InputStreaming { partial_input: String },
    InputAvailable { input: Value },
    OutputAvailable { input: Value, output: Value },
    OutputError { input: Value, error_text: String },
}

impl ToolCallState {
    pub fn status(&self) -> ToolCallStatus {
        match self {
            Self::InputStreaming { .. } => ToolCallStatus::InputStreaming,
            Self::InputAvailable { .. } => ToolCallStatus::InputAvailable,
            Self::OutputAvailable { .. } => ToolCallStatus::OutputAvailable,
            Self::OutputError { .. } => ToolCallStatus::OutputError,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolCall {
    pub id: ToolCallId,
    pub kind: ToolKind,
    state: ToolCallState,
}

impl ToolCall {
    pub fn new(id: ToolCallId, kind: ToolKind) -> Self {
        Self {
            id,
            kind,
            state: ToolCallState::InputStreaming {
                partial_input: String::new(),
            },
        }
    }

    pub fn state(&self) -> &ToolCallState {
        &self.state
    }

    pub fn status(&self) -> ToolCallStatus {
        self.state.status()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status(),
            ToolCallStatus::OutputAvailable | ToolCallStatus::OutputError
        )
    }

    pub fn input(&self) -> Option<&Value> {
        match &self.state {
            ToolCallState::InputStreaming { .. } => None,
            ToolCallState::InputAvailable { input }
            | ToolCallState::OutputAvailable { input, .. }
            | ToolCallState::OutputError { input, .. } => Some(input),
        }
    }

    pub fn output(&self) -> Option<&Value> {
        match &self.state {
            ToolCallState::OutputAvailable { output, .. } => Some(output),
            _ => None,
        }
    }

    pub fn error_text(&self) -> Option<&str> {
        match &self.state {
            ToolCallState::OutputError { error_text, .. } => Some(error_text),
            _ => None,
        }
    }

    fn illegal(&self, target: ToolCallStatus) -> BetwiseError {
        BetwiseError::Logic(format!(
            "tool call {} ({}) cannot move from {} to {}",
            self.id,
            self.kind.name(),
            self.status(),
            target
        ))
    }

    fn available_input(&self, target: ToolCallStatus) -> Result<Value> {
        match &self.state {
            ToolCallState::InputAvailable { input } => Ok(input.clone()),
            _ => Err(self.illegal(target).into()),
        }
    }

    /// Appends a streamed fragment of the call's JSON arguments.
    pub fn push_input(&mut self, delta: &str) -> Result<()> {
        if let ToolCallState::InputStreaming { partial_input } = &mut self.state {
            partial_input.push_str(delta);
            return Ok(());
        }
        Err(self.illegal(ToolCallStatus::InputStreaming).into())
    }

    /// Closes the argument stream. Arguments that are not valid JSON are kept
    /// verbatim as a string so the executor can report them.
    pub fn finish_input(&mut self) -> Result<()> {
        let partial = match &self.state {
            ToolCallState::InputStreaming { partial_input } => partial_input.trim().to_string(),
            _ => return Err(self.illegal(ToolCallStatus::InputAvailable).into()),
        };
        let input = if partial.is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            match serde_json::from_str::<Value>(&partial) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(
                        "[TOOL] {} ({}) arguments are not valid JSON: {}",
                        self.id.short(),
                        self.kind.name(),
                        e
                    );
                    Value::String(partial)
                }
            }
        };
        self.state = ToolCallState::InputAvailable { input };
        Ok(())
    }

    pub fn set_output(&mut self, output: Value) -> Result<()> {
        let input = self.available_input(ToolCallStatus::OutputAvailable)?;
        self.state = ToolCallState::OutputAvailable { input, output };
        Ok(())
    }

    pub fn set_error(&mut self, error_text: impl Into<String>) -> Result<()> {
        let input = self.available_input(ToolCallStatus::OutputError)?;
        self.state = ToolCallState::OutputError {
            input,
            error_text: error_text.into(),
        };
        Ok(())
    }
}
