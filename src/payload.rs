//! Structured payload extraction.
//!
//! Finds a `{ "bets": [...], "sources": [...] }` object embedded anywhere in
//! assistant text. Streaming text is routinely truncated mid-object, so every
//! failure is local: a candidate that does not parse is skipped and the caller
//! just sees `None`.

use crate::types::BettingAnalysis;
use lazy_static::lazy_static;
use regex::Regex;
use std::ops::Range;

lazy_static! {
    static ref BETS_CLAUSE: Regex = Regex::new(r#""bets"\s*:\s*\["#).expect("Invalid bets regex");
    static ref FENCE_OPEN_TAIL: Regex =
        Regex::new(r"```[A-Za-z]*\s*$").expect("Invalid fence open regex");
    static ref FENCE_CLOSE_HEAD: Regex =
        Regex::new(r"^\s*```").expect("Invalid fence close regex");
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPayload {
    pub analysis: BettingAnalysis,
    /// Byte range of the object within the source text.
    pub span: Range<usize>,
}

/// Returns the exclusive end of the object opening at `start`, or `None` when
/// the text ends before its braces balance.
fn object_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (offset, ch) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(start + offset + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

/// Candidate object spans declaring a `"bets": [` clause, ordered by start
/// position. The string-aware scan gives each start a single bound, the
/// shortest balanced one.
pub fn candidate_spans(text: &str) -> Vec<Range<usize>> {
    text.char_indices()
        .filter(|(_, ch)| *ch == '{')
        .filter_map(|(start, _)| object_end(text, start).map(|end| start..end))
        .filter(|span| BETS_CLAUSE.is_match(&text[span.clone()]))
        .collect()
}

pub fn extract_structured_payload(text: &str) -> Option<ExtractedPayload> {
    if !text.contains("\"bets\"") {
        return None;
    }
    for span in candidate_spans(text) {
        match BettingAnalysis::parse_strict(&text[span.clone()]) {
            Ok(analysis) => {
                tracing::debug!(
                    "[PAYLOAD] Structured payload at {}..{} ({} bets, {} sources)",
                    span.start,
                    span.end,
                    analysis.bets.len(),
                    analysis.sources.len()
                );
                return Some(ExtractedPayload { analysis, span });
            }
            Err(e) => {
                tracing::trace!(
                    "[PAYLOAD] Candidate at {}..{} rejected: {}",
                    span.start,
                    span.end,
                    e.inner
                );
            }
        }
    }
    None
}

/// True once a bets clause has started streaming. Only meaningful after
/// [`extract_structured_payload`] found no complete object.
pub fn has_bets_clause(text: &str) -> bool {
    BETS_CLAUSE.is_match(text)
}

/// The prose around the payload, with the object taken out. A code fence is
/// removed too when it wraps exactly the object.
pub fn clean_text(text: &str, payload: &ExtractedPayload) -> String {
    let mut before = &text[..payload.span.start];
    let mut after = &text[payload.span.end..];
    if let (Some(open), Some(close)) = (FENCE_OPEN_TAIL.find(before), FENCE_CLOSE_HEAD.find(after)) {
        before = &before[..open.start()];
        after = &after[close.end()..];
    }
    let mut remaining = String::with_capacity(before.len() + after.len());
    remaining.push_str(before);
    remaining.push_str(after);
    remaining.trim().to_string()
}
