//! Provider response decoding.
//!
//! Streamed bodies arrive as SSE `data:` lines; non-streamed bodies are one
//! JSON document with `message` in place of `delta`. Both reduce to the same
//! [`StreamEvent`] batches so the engine handles them identically.

use crate::constants::{MAX_LINE_LENGTH, MAX_STREAM_LINES};
use crate::logging::StreamMetric;
use crate::types::{parse_provider_line, BetwiseError, LineEvent, ProviderPulse, Result, Source};
use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Text(String),
    /// A fragment of a tool call. `id` and `name` usually arrive only with the
    /// first fragment for an index.
    ToolCallDelta {
        index: u32,
        id: Option<String>,
        name: Option<String>,
        arguments: String,
    },
    Citations(Vec<Source>),
    Finished { reason: String },
}

pub type EventStream = BoxStream<'static, Result<Vec<StreamEvent>>>;

pub fn events_from_pulse(pulse: &ProviderPulse) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    for choice in &pulse.choices {
        let delta = &choice.delta;
        if let Some(content) = &delta.content {
            if !content.is_empty() {
                events.push(StreamEvent::Text(content.clone()));
            }
        }
        if let Some(tool_calls) = &delta.tool_calls {
            for (pos, tc) in tool_calls.iter().enumerate() {
                let function = tc.function.as_ref();
                events.push(StreamEvent::ToolCallDelta {
                    index: tc.index.unwrap_or(pos as u32),
                    id: tc.id.clone(),
                    name: function.and_then(|f| f.name.clone()),
                    arguments: function
                        .and_then(|f| f.arguments.clone())
                        .unwrap_or_default(),
                });
            }
        }
        if let Some(annotations) = &delta.annotations {
            let sources: Vec<Source> = annotations.iter().filter_map(|a| a.to_source()).collect();
            if !sources.is_empty() {
                events.push(StreamEvent::Citations(sources));
            }
        }
        if let Some(reason) = &choice.finish_reason {
            events.push(StreamEvent::Finished {
                reason: reason.clone(),
            });
        }
    }
    events
}

/// Line-oriented SSE decoder over a byte stream.
pub struct SseReader<R>
where
    R: Stream<Item = std::io::Result<Bytes>> + Unpin,
{
    lines: FramedRead<StreamReader<R, Bytes>, LinesCodec>,
    line_count: usize,
    done: bool,
    metrics: StreamMetric,
}

impl<R> SseReader<R>
where
    R: Stream<Item = std::io::Result<Bytes>> + Unpin,
{
    pub fn new(body: R) -> Self {
        Self {
            lines: FramedRead::new(
                StreamReader::new(body),
                LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
            ),
            line_count: 0,
            done: false,
            metrics: StreamMetric::new(),
        }
    }

    pub fn metrics(&self) -> &StreamMetric {
        &self.metrics
    }

    fn finish(&mut self) {
        if !self.done {
            self.done = true;
            self.metrics.log_summary();
        }
    }

    fn fail(&mut self, err: BetwiseError) -> Option<Result<Vec<StreamEvent>>> {
        tracing::error!("[STREAM] {}", err);
        self.finish();
        Some(Err(err.into()))
    }

    /// Next non-empty batch of events. `None` once `[DONE]` arrives, the body
    /// ends, or an error has been returned.
    pub async fn next_batch(&mut self) -> Option<Result<Vec<StreamEvent>>> {
        if self.done {
            return None;
        }
        loop {
            let line = match self.lines.next().await {
                Some(Ok(line)) => line,
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    return self.fail(BetwiseError::Io(std::io::Error::other(
                        "Max line length exceeded",
                    )));
                }
                Some(Err(LinesCodecError::Io(e))) => return self.fail(BetwiseError::Io(e)),
                None => {
                    tracing::debug!("[STREAM] Body ended after {} lines", self.line_count);
                    self.finish();
                    return None;
                }
            };

            self.line_count += 1;
            if self.line_count > MAX_STREAM_LINES {
                return self.fail(BetwiseError::Transport(format!(
                    "stream exceeded max line limit ({})",
                    MAX_STREAM_LINES
                )));
            }

            let data = match line.strip_prefix("data:") {
                Some(d) => d.trim(),
                None => continue,
            };
            if data == "[DONE]" {
                tracing::debug!("[STREAM] End marker [DONE] received");
                self.finish();
                return None;
            }
            if data.is_empty() {
                continue;
            }

            match parse_provider_line(data) {
                LineEvent::Pulse(pulse) => {
                    self.metrics.record_chunk(&pulse);
                    let events = events_from_pulse(&pulse);
                    if !events.is_empty() {
                        return Some(Ok(events));
                    }
                }
                LineEvent::Error(err) => {
                    return self.fail(BetwiseError::Transport(format!(
                        "provider error mid-stream: {}",
                        err.error.message
                    )));
                }
                LineEvent::Unknown(_) => {}
            }
        }
    }
}

pub fn sse_event_stream<R>(body: R) -> EventStream
where
    R: Stream<Item = std::io::Result<Bytes>> + Unpin + Send + 'static,
{
    stream::unfold(SseReader::new(body), |mut reader| async move {
        reader.next_batch().await.map(|batch| (batch, reader))
    })
    .boxed()
}

/// A complete non-streamed body as a single batch.
pub fn body_event_stream(body: &ProviderPulse) -> EventStream {
    let mut metrics = StreamMetric::new();
    metrics.record_chunk(body);
    metrics.log_summary();
    let events = events_from_pulse(body);
    stream::iter(vec![Ok(events)]).boxed()
}
