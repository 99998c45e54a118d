//! Turn driver: records the user turn, opens a model response, folds events
//! into the conversation, and always leaves the conversation idle.

use crate::client::ChatTransport;
use crate::session::Conversation;
use crate::streaming::StreamEvent;
use crate::tool_call::{ToolCallStatus, ToolKind};
use crate::tool_schema::execute_betting_analysis;
use crate::types::{BettingAnalysis, MessageId, Result, ToolCallId};
use crate::view::{MessageView, ViewCache};
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::Instrument;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed(MessageId),
    /// The turn failed after the user message was recorded; `apology` is the
    /// fallback assistant message that replaced the reply.
    Failed { apology: MessageId, error: String },
}

pub struct AssistantEngine<T: ChatTransport> {
    transport: T,
    conversation: Conversation,
    views: ViewCache,
}

impl<T: ChatTransport> AssistantEngine<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            conversation: Conversation::new(),
            views: ViewCache::new(),
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn view(&mut self, id: MessageId) -> Option<Arc<MessageView>> {
        let message = self.conversation.message(id)?;
        Some(self.views.view(&self.conversation, message))
    }

    pub fn reset(&mut self) {
        self.conversation = Conversation::new();
        self.views.clear();
    }

    fn emit<F>(&mut self, id: MessageId, on_update: &mut F)
    where
        F: FnMut(&MessageView),
    {
        if let Some(view) = self.view(id) {
            on_update(view.as_ref());
        }
    }

    /// Runs one user turn. A rejected submission is returned as an error
    /// after the fallback reply is appended (unless another turn is still
    /// streaming); anything failing later ends in the fallback reply too.
    pub async fn submit<F>(&mut self, text: &str, mut on_update: F) -> Result<TurnOutcome>
    where
        F: FnMut(&MessageView),
    {
        let user_id = match self.conversation.start_user_turn(text) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("[ENGINE] Submission rejected: {}", e.inner);
                if !self.conversation.is_streaming() {
                    let apology = self.conversation.fail_turn();
                    self.emit(apology, &mut on_update);
                }
                return Err(e);
            }
        };
        self.emit(user_id, &mut on_update);

        let span = tracing::info_span!("turn", turn_id = %uuid::Uuid::new_v4());
        let result = self.run_turn(&mut on_update).instrument(span).await;

        match result {
            Ok(id) => {
                self.emit(id, &mut on_update);
                Ok(TurnOutcome::Completed(id))
            }
            Err(e) => {
                tracing::error!("[ENGINE] Turn failed: {}", e);
                let apology = self.conversation.fail_turn();
                self.emit(apology, &mut on_update);
                Ok(TurnOutcome::Failed {
                    apology,
                    error: e.inner.to_string(),
                })
            }
        }
    }

    async fn run_turn<F>(&mut self, on_update: &mut F) -> Result<MessageId>
    where
        F: FnMut(&MessageView),
    {
        let request = self.transport.build_request(self.conversation.history());
        let mut events = self.transport.open(&request).await?;
        let id = self.conversation.begin_assistant_turn()?;

        let mut tool_ids: BTreeMap<u32, ToolCallId> = BTreeMap::new();
        while let Some(batch) = events.next().await {
            for event in batch? {
                self.apply(event, &mut tool_ids)?;
            }
            self.emit(id, on_update);
        }
        self.settle_tool_calls(&tool_ids)?;
        self.conversation.end_turn();
        tracing::info!(
            target: "flight_recorder",
            "[TURN END] {} | Tool calls: {}",
            id,
            tool_ids.len()
        );
        Ok(id)
    }

    fn apply(&mut self, event: StreamEvent, tool_ids: &mut BTreeMap<u32, ToolCallId>) -> Result<()> {
        match event {
            StreamEvent::Text(text) => self.conversation.append_chunk(&text),
            StreamEvent::ToolCallDelta {
                index,
                id,
                name,
                arguments,
            } => {
                let call_id = match tool_ids.get(&index) {
                    Some(existing) => existing.clone(),
                    None => {
                        let call_id = id.map(ToolCallId::from).unwrap_or_default();
                        let kind = ToolKind::from_name(name.as_deref().unwrap_or_default());
                        tracing::debug!(
                            "[ENGINE] Tool call {} ({}) opened at index {}",
                            call_id.short(),
                            kind.name(),
                            index
                        );
                        self.conversation.open_tool_call(call_id.clone(), kind)?;
                        tool_ids.insert(index, call_id.clone());
                        call_id
                    }
                };
                if arguments.is_empty() {
                    return Ok(());
                }
                self.conversation.tool_call_mut(&call_id)?.push_input(&arguments)
            }
            StreamEvent::Citations(sources) => self.conversation.add_sources(sources),
            StreamEvent::Finished { reason } => {
                tracing::debug!("[ENGINE] finish_reason={}", reason);
                self.settle_tool_calls(tool_ids)
            }
        }
    }

    /// Closes argument streams and runs local tools. Calls already past
    /// `input-available` are left alone, so this is safe to repeat.
    fn settle_tool_calls(&mut self, tool_ids: &BTreeMap<u32, ToolCallId>) -> Result<()> {
        for call_id in tool_ids.values() {
            let analysis = {
                let tc = self.conversation.tool_call_mut(call_id)?;
                if tc.status() == ToolCallStatus::InputStreaming {
                    tc.finish_input()?;
                }
                if tc.status() != ToolCallStatus::InputAvailable {
                    continue;
                }
                match tc.kind.clone() {
                    ToolKind::BettingAnalysis => {
                        let input = tc.input().cloned().unwrap_or(Value::Null);
                        match execute_betting_analysis(&input) {
                            Ok(analysis) => {
                                tc.set_output(serde_json::to_value(&analysis)?)?;
                                Some(analysis)
                            }
                            Err(e) => {
                                tracing::warn!(
                                    "[ENGINE] {} rejected: {}",
                                    call_id.short(),
                                    e.inner
                                );
                                tc.set_error(e.inner.to_string())?;
                                None
                            }
                        }
                    }
                    ToolKind::WebSearch => {
                        tc.set_output(json!({ "status": "completed" }))?;
                        None
                    }
                    ToolKind::Other(name) => {
                        tc.set_error(format!("tool '{}' is not available", name))?;
                        None
                    }
                }
            };
            if let Some(analysis) = analysis {
                self.publish_analysis(analysis)?;
            }
        }
        Ok(())
    }

    /// Embeds the analysis in the reply text so it survives as conversation
    /// history and is picked up by the structured display.
    fn publish_analysis(&mut self, analysis: BettingAnalysis) -> Result<()> {
        let payload = serde_json::to_string_pretty(&analysis)?;
        self.conversation.add_sources(analysis.sources)?;
        self.conversation
            .append_chunk(&format!("\n\n```json\n{}\n```\n", payload))
    }
}
