use crate::redaction_layer::RedactingWriter;
use crate::types::{ChatRequest, ProviderPulse, Role};
use colored::*;
use std::panic;
use std::path::Path;
use tracing::{error, info, warn, Span};
use tracing_appender::non_blocking::WorkerGuard;

pub const LOG_FILE_NAME: &str = "betwise.log";
const DEFAULT_FILTER: &str = "betwise=info";

/// Installs the global subscriber: env filter, a daily rolling file with
/// secrets redacted, and span traces for `ObservedError`. Logs never go to
/// the terminal, which belongs to the chat.
pub fn init_tracing(log_dir: &Path, json: bool) -> std::io::Result<WorkerGuard> {
    use tracing_subscriber::prelude::*;

    std::fs::create_dir_all(log_dir)?;

    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => DEFAULT_FILTER.into(),
    };

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let make_writer = move || RedactingWriter::new(non_blocking.clone());

    let (json_layer, text_layer) = if json {
        (
            Some(tracing_subscriber::fmt::layer().json().with_writer(make_writer)),
            None,
        )
    } else {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(make_writer)
                    .with_ansi(false),
            ),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(tracing_error::ErrorLayer::default())
        .init();

    Ok(guard)
}

/// Sets up a global panic hook that logs panics through tracing before the
/// default hook prints them.
pub fn setup_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let backtrace = std::backtrace::Backtrace::capture();

        let payload = panic_info.payload();
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            *s
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.as_str()
        } else {
            "Unknown panic payload"
        };

        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown location".to_string());

        error!(
            target: "panic",
            message = %message,
            location = %location,
            backtrace = %backtrace,
            "FATAL: Application panicked"
        );

        original_hook(panic_info);
    }));
}

pub fn log_request_summary(request: &ChatRequest) {
    let last_role = match request.messages.last() {
        Some(m) => m.role.to_string(),
        None => "NONE".into(),
    };
    let user_turns = request
        .messages
        .iter()
        .filter(|m| m.role == Role::User)
        .count();
    info!(
        target: "flight_recorder",
        "[REQ] Model: {} | Messages: {} | User turns: {} | Last Role: {} | Stream: {} | Tools: {} | Web search: {}",
        request.model,
        request.messages.len(),
        user_turns,
        last_role,
        request.stream,
        request.tools.len(),
        request.web_search_options.is_some()
    );
}

/// Summary of a non-streamed body.
pub fn log_response_summary(body: &ProviderPulse) {
    let first_choice = match body.choices.first() {
        Some(c) => c,
        None => {
            warn!(target: "flight_recorder", "[RES] Response carried no choices");
            return;
        }
    };
    let finish_reason = first_choice.finish_reason.as_deref().unwrap_or("UNKNOWN");
    let tool_count = first_choice
        .delta
        .tool_calls
        .as_ref()
        .map(|tc| tc.len())
        .unwrap_or(0);
    let content_status = match first_choice.delta.content.as_deref() {
        None => "NULL".to_string(),
        Some("") => "EMPTY".to_string(),
        Some(s) => format!("TEXT[{}]", s.len()),
    };

    if finish_reason == "stop" && tool_count > 0 {
        warn!(
            target: "flight_recorder",
            "{}", "[PROTOCOL MISMATCH] finish_reason='stop' but tool_calls present".bold().red()
        );
    }

    info!(
        target: "flight_recorder",
        "[RES] Finish: {} | Tools: {} | Content: {}",
        finish_reason, tool_count, content_status
    );
}

#[derive(Debug, Default)]
pub struct StreamMetric {
    pub chunks: usize,
    pub tokens: usize,
    pub tool_parts: usize,
    pub text_chars: usize,
    pub citations: usize,
    pub tool_names: Vec<String>,
}

impl StreamMetric {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_chunk(&mut self, pulse: &ProviderPulse) {
        self.chunks += 1;
        if let Some(usage) = &pulse.usage {
            self.tokens = usage.total_tokens as usize;
        }
        for choice in &pulse.choices {
            if let Some(content) = &choice.delta.content {
                self.text_chars += content.len();
            }
            if let Some(annotations) = &choice.delta.annotations {
                self.citations += annotations.len();
            }
            if let Some(tools) = &choice.delta.tool_calls {
                self.tool_parts += tools.len();
                for t in tools {
                    if let Some(name) = t.function.as_ref().and_then(|f| f.name.as_ref()) {
                        if !name.is_empty() {
                            self.tool_names.push(name.clone());
                        }
                    }
                }
            }
        }
    }

    pub fn log_summary(&self) {
        let turn_id = get_turn_id();
        let tools_str = if self.tool_names.is_empty() {
            format!("{}", self.tool_parts)
        } else {
            format!("{} ({})", self.tool_parts, self.tool_names.join(", "))
        };

        info!(
            target: "flight_recorder",
            "[STREAM END] TurnID: {} | Chunks: {} | Tools: {} | Text: {} chars | Citations: {} | Tokens: {}",
            turn_id, self.chunks, tools_str, self.text_chars, self.citations, self.tokens
        );
    }
}

pub fn get_turn_id() -> String {
    match Span::current().field("turn_id").map(|v| v.to_string()) {
        Some(id) => id,
        None => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_provider_line;
    use crate::types::LineEvent;

    #[test]
    fn test_stream_metric_counts_parts() {
        let mut metric = StreamMetric::new();
        let lines = [
            r#"{"choices":[{"delta":{"content":"Hello"}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"betting_analysis","arguments":""}}]}}]}"#,
            r#"{"choices":[{"delta":{"annotations":[{"type":"url_citation","url_citation":{"url":"https://a.io"}}]}}],"usage":{"prompt_tokens":3,"completion_tokens":4,"total_tokens":7}}"#,
        ];
        for line in lines {
            match parse_provider_line(line) {
                LineEvent::Pulse(pulse) => metric.record_chunk(&pulse),
                other => panic!("unexpected line event {:?}", other),
            }
        }
        assert_eq!(metric.chunks, 3);
        assert_eq!(metric.text_chars, 5);
        assert_eq!(metric.tool_parts, 1);
        assert_eq!(metric.tool_names, vec!["betting_analysis"]);
        assert_eq!(metric.citations, 1);
        assert_eq!(metric.tokens, 7);
    }
}
