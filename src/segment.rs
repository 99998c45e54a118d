//! Prose segmentation for assistant messages.
//!
//! Splits assistant text into typed blocks so numbered items, parlay legs and
//! per-game breakdowns can be styled differently. The function is pure and is
//! re-run on every streamed chunk.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref NUMBERED_MARKER: Regex = Regex::new(r"\d+\. ").expect("Invalid numbered regex");
    static ref LEG_MARKER: Regex = Regex::new(r"(?i)\bleg\s+\d+:").expect("Invalid leg regex");
    static ref GAME_MARKER: Regex = Regex::new(r"(?i)\bgame\s+\d+:").expect("Invalid game regex");
    static ref BLANK_LINE: Regex = Regex::new(r"\n\s*\n").expect("Invalid blank line regex");
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Regular,
    Numbered,
    Leg,
    Game,
}

impl SegmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Numbered => "numbered",
            Self::Leg => "leg",
            Self::Game => "game",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub content: String,
}

/// Byte offsets where a marker forces a paragraph break, with the tag the
/// following block inherits. Sorted by offset, one entry per offset.
fn marker_breaks(text: &str) -> Vec<(usize, SegmentKind)> {
    let mut breaks: Vec<(usize, SegmentKind)> = Vec::new();
    for (regex, kind) in [
        (&*NUMBERED_MARKER, SegmentKind::Numbered),
        (&*LEG_MARKER, SegmentKind::Leg),
        (&*GAME_MARKER, SegmentKind::Game),
    ] {
        breaks.extend(regex.find_iter(text).map(|m| (m.start(), kind)));
    }
    // Stable sort keeps pattern priority for markers sharing an offset.
    breaks.sort_by_key(|(offset, _)| *offset);
    breaks.dedup_by_key(|(offset, _)| *offset);
    breaks
}

pub fn segment(text: &str) -> Vec<Segment> {
    let mut bounds = vec![(0usize, SegmentKind::Regular)];
    for (offset, kind) in marker_breaks(text) {
        if offset == 0 {
            bounds[0] = (0, kind);
        } else {
            bounds.push((offset, kind));
        }
    }

    let mut segments = Vec::new();
    for (i, (start, kind)) in bounds.iter().enumerate() {
        let end = match bounds.get(i + 1) {
            Some((next, _)) => *next,
            None => text.len(),
        };
        for (j, piece) in BLANK_LINE.split(&text[*start..end]).enumerate() {
            let content = piece.trim();
            if content.is_empty() {
                continue;
            }
            // Only the block that opens with the marker carries its tag.
            let kind = if j == 0 { *kind } else { SegmentKind::Regular };
            segments.push(Segment {
                kind,
                content: content.to_string(),
            });
        }
    }
    segments
}
