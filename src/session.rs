//! Conversation state and stream accumulation.
//!
//! `Conversation` is the single writer of the message list. At most one
//! assistant message is active (receiving chunks) at a time; every other
//! message is stable and may be cached by readers.

use crate::constants::FALLBACK_REPLY;
use crate::tool_call::{ToolCall, ToolKind};
use crate::types::{BetwiseError, MessageId, Result, Role, Source, ToolCallId, WireMessage};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    id: MessageId,
    role: Role,
    content: String,
    sources: Vec<Source>,
    tool_calls: Vec<ToolCall>,
    created_at: DateTime<Utc>,
}

impl Message {
    fn new(id: MessageId, role: Role, content: String) -> Self {
        Self {
            id,
            role,
            content,
            sources: Vec::new(),
            tool_calls: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    active: Option<MessageId>,
    next_id: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn is_streaming(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_message(&self) -> Option<&Message> {
        let id = self.active?;
        self.message(id)
    }

    /// A message no longer receives chunks once its turn has ended.
    pub fn is_stable(&self, id: MessageId) -> bool {
        self.active != Some(id)
    }

    fn allocate_id(&mut self) -> MessageId {
        self.next_id += 1;
        MessageId(self.next_id)
    }

    fn active_mut(&mut self, operation: &str) -> Result<&mut Message> {
        let id = match self.active {
            Some(id) => id,
            None => {
                return Err(BetwiseError::Logic(format!(
                    "{} called with no active assistant turn",
                    operation
                ))
                .into())
            }
        };
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(m) => Ok(m),
            None => Err(BetwiseError::Logic(format!("active message {} is missing", id)).into()),
        }
    }

    pub fn start_user_turn(&mut self, text: &str) -> Result<MessageId> {
        if text.trim().is_empty() {
            return Err(BetwiseError::Validation("message text is empty".to_string()).into());
        }
        if self.is_streaming() {
            return Err(BetwiseError::Validation(
                "a response is still streaming; wait for it to finish".to_string(),
            )
            .into());
        }
        let id = self.allocate_id();
        self.messages
            .push(Message::new(id, Role::User, text.to_string()));
        tracing::debug!("[SESSION] User turn {} ({} chars)", id, text.len());
        Ok(id)
    }

    pub fn begin_assistant_turn(&mut self) -> Result<MessageId> {
        if let Some(active) = self.active {
            return Err(BetwiseError::Logic(format!(
                "assistant turn {} is already active",
                active
            ))
            .into());
        }
        let id = self.allocate_id();
        self.messages
            .push(Message::new(id, Role::Assistant, String::new()));
        self.active = Some(id);
        tracing::debug!("[SESSION] Assistant turn {} started", id);
        Ok(id)
    }

    /// Appends a streamed chunk to the active assistant message, in arrival order.
    pub fn append_chunk(&mut self, text: &str) -> Result<()> {
        let message = self.active_mut("append_chunk")?;
        message.content.push_str(text);
        Ok(())
    }

    /// Clears the active marker. Safe to call when nothing is active.
    pub fn end_turn(&mut self) -> Option<MessageId> {
        let ended = self.active.take();
        if let Some(id) = ended {
            tracing::debug!("[SESSION] Assistant turn {} ended", id);
        }
        ended
    }

    /// Closes out a turn whose transport failed. An assistant message that
    /// never received content is dropped; the fixed apology is appended.
    pub fn fail_turn(&mut self) -> MessageId {
        if let Some(id) = self.end_turn() {
            let empty = self
                .message(id)
                .map(|m| m.content.is_empty())
                .unwrap_or(false);
            if empty {
                self.messages.retain(|m| m.id != id);
            }
        }
        let id = self.allocate_id();
        self.messages.push(Message::new(
            id,
            Role::Assistant,
            FALLBACK_REPLY.to_string(),
        ));
        tracing::warn!("[SESSION] Turn failed; apology {} appended", id);
        id
    }

    pub fn open_tool_call(&mut self, id: ToolCallId, kind: ToolKind) -> Result<()> {
        let message = self.active_mut("open_tool_call")?;
        if message.tool_calls.iter().any(|tc| tc.id == id) {
            return Err(BetwiseError::Logic(format!("tool call {} already exists", id)).into());
        }
        message.tool_calls.push(ToolCall::new(id, kind));
        Ok(())
    }

    pub fn tool_call_mut(&mut self, id: &ToolCallId) -> Result<&mut ToolCall> {
        let message = self.active_mut("tool_call_mut")?;
        match message.tool_calls.iter_mut().find(|tc| &tc.id == id) {
            Some(tc) => Ok(tc),
            None => Err(BetwiseError::Logic(format!("unknown tool call {}", id)).into()),
        }
    }

    /// Attaches citations to the active message, skipping URLs already present.
    pub fn add_sources<I>(&mut self, sources: I) -> Result<()>
    where
        I: IntoIterator<Item = Source>,
    {
        let message = self.active_mut("add_sources")?;
        for source in sources {
            if !message.sources.iter().any(|s| s.url == source.url) {
                message.sources.push(source);
            }
        }
        Ok(())
    }

    /// Role/content pairs for the model request; sources and tool calls are not sent.
    pub fn history(&self) -> Vec<WireMessage> {
        self.messages
            .iter()
            .filter(|m| !m.content.is_empty())
            .map(|m| WireMessage {
                role: m.role,
                content: m.content.clone(),
            })
            .collect()
    }
}
