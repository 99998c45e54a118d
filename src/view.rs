//! Per-message display derivation.
//!
//! Re-derived from the message text on every render. The structured payload
//! wins when present; otherwise heuristic rows ride alongside the segments.

use crate::heuristic::{parse_bet_rows, BetRow, BetSummary};
use crate::payload::{clean_text, extract_structured_payload, has_bets_clause};
use crate::segment::{segment, Segment, SegmentKind};
use crate::session::{Conversation, Message};
use crate::str_utils::strip_urls;
use crate::tool_call::ToolCall;
use crate::types::{BetRecommendation, MessageId, Role, Source};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BetDisplay {
    Structured { bets: Vec<BetRecommendation> },
    Heuristic { rows: Vec<BetRow>, summary: BetSummary },
    Empty,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MessageView {
    pub message_id: MessageId,
    pub role: Role,
    pub segments: Vec<Segment>,
    pub bets: BetDisplay,
    /// Payload sources first, then citations attached to the message.
    pub sources: Vec<Source>,
    /// Tool calls minus web search bookkeeping.
    pub tool_calls: Vec<ToolCall>,
    /// A bets object has started streaming but is not complete yet.
    pub payload_pending: bool,
}

/// Segments with links removed line by line, so block structure survives.
fn display_segments(text: &str) -> Vec<Segment> {
    segment(text)
        .into_iter()
        .filter_map(|seg| {
            let content = seg
                .content
                .lines()
                .map(strip_urls)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            if content.is_empty() {
                None
            } else {
                Some(Segment {
                    kind: seg.kind,
                    content,
                })
            }
        })
        .collect()
}

fn merge_sources(first: &[Source], second: &[Source]) -> Vec<Source> {
    let mut merged: Vec<Source> = Vec::with_capacity(first.len() + second.len());
    for source in first.iter().chain(second) {
        if !merged.iter().any(|s| s.url == source.url) {
            merged.push(source.clone());
        }
    }
    merged
}

pub fn derive_view(message: &Message) -> MessageView {
    let tool_calls: Vec<ToolCall> = message
        .tool_calls()
        .iter()
        .filter(|tc| !tc.kind.is_web_search())
        .cloned()
        .collect();

    if message.role() != Role::Assistant {
        return MessageView {
            message_id: message.id(),
            role: message.role(),
            segments: vec![Segment {
                kind: SegmentKind::Regular,
                content: message.content().to_string(),
            }],
            bets: BetDisplay::Empty,
            sources: message.sources().to_vec(),
            tool_calls,
            payload_pending: false,
        };
    }

    let content = message.content();
    match extract_structured_payload(content) {
        Some(payload) => {
            let prose = clean_text(content, &payload);
            MessageView {
                message_id: message.id(),
                role: message.role(),
                segments: display_segments(&prose),
                sources: merge_sources(&payload.analysis.sources, message.sources()),
                bets: BetDisplay::Structured {
                    bets: payload.analysis.bets,
                },
                tool_calls,
                payload_pending: false,
            }
        }
        None => {
            let rows = parse_bet_rows(content);
            let bets = if rows.is_empty() {
                BetDisplay::Empty
            } else {
                BetDisplay::Heuristic {
                    summary: BetSummary::of(&rows),
                    rows,
                }
            };
            MessageView {
                message_id: message.id(),
                role: message.role(),
                segments: display_segments(content),
                bets,
                sources: message.sources().to_vec(),
                tool_calls,
                payload_pending: has_bets_clause(content),
            }
        }
    }
}

/// Views of messages whose turn has ended. The active message is always
/// re-derived.
#[derive(Debug, Default)]
pub struct ViewCache {
    views: HashMap<MessageId, Arc<MessageView>>,
}

impl ViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn view(&mut self, conversation: &Conversation, message: &Message) -> Arc<MessageView> {
        if !conversation.is_stable(message.id()) {
            return Arc::new(derive_view(message));
        }
        self.views
            .entry(message.id())
            .or_insert_with(|| Arc::new(derive_view(message)))
            .clone()
    }

    pub fn clear(&mut self) {
        self.views.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool_call::ToolKind;
    use crate::types::ToolCallId;

    const PAYLOAD: &str = r#"{"bets":[{"title":"Lakers cover","type":"Single Bet","legs":[{"game":"Lakers vs Suns","pick":"Lakers -5.5","odds":"-110","reasoning":"Suns on a back-to-back"}],"totalOdds":"-110","payout":"$95.45","stake":"$50"}],"sources":[{"title":"NBA odds","url":"https://example.com/odds"}]}"#;

    fn assistant_with(text: &str) -> (Conversation, MessageId) {
        let mut convo = Conversation::new();
        let id = match convo.begin_assistant_turn() {
            Ok(id) => id,
            Err(e) => panic!("{}", e),
        };
        assert!(convo.append_chunk(text).is_ok());
        (convo, id)
    }

    #[test]
    fn test_structured_payload_takes_priority() {
        let text = format!("1. Lakers -5.5 looks best.\n\n{}\n\nBet $50 on Lakers -5.5 for winnings of $95", PAYLOAD);
        let (convo, id) = assistant_with(&text);
        let message = convo.message(id).expect("message exists");
        let view = derive_view(message);
        match &view.bets {
            BetDisplay::Structured { bets } => assert_eq!(bets[0].title, "Lakers cover"),
            other => panic!("expected structured display, got {:?}", other),
        }
        assert_eq!(view.sources.len(), 1);
        assert!(view.segments.iter().all(|s| !s.content.contains("\"bets\"")));
        assert_eq!(view.segments[0].kind, SegmentKind::Numbered);
    }

    #[test]
    fn test_heuristic_fallback_alongside_segments() {
        let (convo, id) = assistant_with("My pick:\n\nWarriors +3 ($25)");
        let view = derive_view(convo.message(id).expect("message exists"));
        match &view.bets {
            BetDisplay::Heuristic { rows, summary } => {
                assert_eq!(rows.len(), 1);
                assert_eq!(summary.count, 1);
            }
            other => panic!("expected heuristic display, got {:?}", other),
        }
        assert_eq!(view.segments.len(), 2);
    }

    #[test]
    fn test_urls_stripped_from_segments_only() {
        let (convo, id) = assistant_with("Per https://espn.com/nba the line moved.\nSecond line");
        let view = derive_view(convo.message(id).expect("message exists"));
        assert_eq!(view.segments[0].content, "Per the line moved.\nSecond line");
    }

    #[test]
    fn test_web_search_calls_filtered_from_view() {
        let (mut convo, id) = assistant_with("Researching...");
        assert!(convo
            .open_tool_call(ToolCallId("ws".to_string()), ToolKind::WebSearch)
            .is_ok());
        assert!(convo
            .open_tool_call(ToolCallId("ba".to_string()), ToolKind::BettingAnalysis)
            .is_ok());
        let message = convo.message(id).expect("message exists");
        let view = derive_view(message);
        assert_eq!(message.tool_calls().len(), 2);
        assert_eq!(view.tool_calls.len(), 1);
        assert_eq!(view.tool_calls[0].kind, ToolKind::BettingAnalysis);
    }

    #[test]
    fn test_pending_payload_flag_mid_stream() {
        let (convo, id) = assistant_with(&PAYLOAD[..60]);
        let view = derive_view(convo.message(id).expect("message exists"));
        assert!(view.payload_pending);
        assert_eq!(view.bets, BetDisplay::Empty);
    }

    #[test]
    fn test_cache_only_holds_stable_messages() {
        let (mut convo, id) = assistant_with("Streaming");
        let mut cache = ViewCache::new();
        {
            let message = convo.message(id).expect("message exists");
            cache.view(&convo, message);
        }
        assert!(cache.is_empty());
        convo.end_turn();
        let message = convo.message(id).expect("message exists");
        let first = cache.view(&convo, message);
        let second = cache.view(&convo, message);
        assert_eq!(cache.len(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }
}
