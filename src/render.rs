//! Terminal rendering of message views.

use crate::heuristic::{BetRow, BetSummary};
use crate::segment::{Segment, SegmentKind};
use crate::tool_call::{ToolCall, ToolCallStatus};
use crate::types::{BetRecommendation, Role, Source};
use crate::view::{BetDisplay, MessageView};
use colored::*;
use std::collections::HashSet;

const TABLE_HEADERS: [&str; 4] = [
    "Team/Player",
    "Player Prop/Line",
    "Amount Bet",
    "Possible Winnings",
];

/// Expand/collapse state for one message's bet cards. The first card starts
/// expanded and the sources list starts collapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BetCardState {
    expanded: HashSet<usize>,
    sources_open: bool,
}

impl Default for BetCardState {
    fn default() -> Self {
        Self {
            expanded: HashSet::from([0]),
            sources_open: false,
        }
    }
}

impl BetCardState {
    pub fn is_expanded(&self, index: usize) -> bool {
        self.expanded.contains(&index)
    }

    pub fn toggle_bet(&mut self, index: usize) {
        if !self.expanded.remove(&index) {
            self.expanded.insert(index);
        }
    }

    pub fn sources_open(&self) -> bool {
        self.sources_open
    }

    pub fn toggle_sources(&mut self) {
        self.sources_open = !self.sources_open;
    }
}

/// US dollars with thousands separators and at most two fraction digits.
pub fn format_currency(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let frac = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let frac = match frac {
        0 => String::new(),
        f if f % 10 == 0 => format!(".{}", f / 10),
        f => format!(".{:02}", f),
    };
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}{}", sign, grouped, frac)
}

fn styled_segment(seg: &Segment) -> String {
    match seg.kind {
        SegmentKind::Regular => seg.content.clone(),
        SegmentKind::Numbered => format!("{}", seg.content.bold()),
        SegmentKind::Leg => format!("  {} {}", "▸".cyan(), seg.content.cyan()),
        SegmentKind::Game => format!("  {} {}", "●".yellow(), seg.content.yellow()),
    }
}

pub fn render_segments(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(styled_segment)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_bet_card(index: usize, bet: &BetRecommendation, expanded: bool) -> String {
    let marker = if expanded { "▾" } else { "▸" };
    let mut out = format!(
        "{} [{}] {}  {}\n    Odds: {}  Payout: {}",
        marker,
        index + 1,
        bet.title.bold(),
        bet.bet_type.dimmed(),
        bet.total_odds,
        bet.payout.green()
    );
    if let Some(stake) = &bet.stake {
        out.push_str(&format!("  Stake: {}", stake));
    }
    if let Some(confidence) = &bet.confidence {
        out.push_str(&format!("  Confidence: {}", confidence));
    }
    if expanded {
        for (i, leg) in bet.legs.iter().enumerate() {
            out.push_str(&format!(
                "\n    Leg {}: {} ({})\n      {} {}\n      {}",
                i + 1,
                leg.game,
                leg.odds,
                "Pick:".dimmed(),
                leg.pick.bold(),
                leg.reasoning.italic()
            ));
        }
    } else {
        out.push_str(&format!(
            "\n    {} legs hidden",
            bet.legs.len()
        ));
    }
    out
}

pub fn render_bet_cards(bets: &[BetRecommendation], state: &BetCardState) -> String {
    bets.iter()
        .enumerate()
        .map(|(i, bet)| render_bet_card(i, bet, state.is_expanded(i)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn render_sources(sources: &[Source], open: bool) -> String {
    if sources.is_empty() {
        return String::new();
    }
    let marker = if open { "▾" } else { "▸" };
    let mut out = format!("{} Sources ({})", marker, sources.len());
    if open {
        for source in sources {
            out.push_str(&format!("\n    {} {}", source.title, source.url.dimmed()));
        }
    }
    out
}

fn pad(text: &str, width: usize) -> String {
    let len = text.chars().count();
    format!("{}{}", text, " ".repeat(width.saturating_sub(len)))
}

/// The heuristic bet table with a totals footer. Padding is computed on the
/// plain text before styling.
pub fn render_bet_table(rows: &[BetRow], summary: &BetSummary) -> String {
    if rows.is_empty() {
        return "No betting recommendations available.".to_string();
    }

    let body: Vec<[String; 4]> = rows
        .iter()
        .map(|row| {
            let winnings = if row.estimated {
                format!("{} (est.)", format_currency(row.potential_winnings))
            } else {
                format_currency(row.potential_winnings)
            };
            [
                row.team_player.clone(),
                row.line_prop.clone(),
                format_currency(row.stake),
                winnings,
            ]
        })
        .collect();
    let footer = [
        format!("Total ({} bets)", summary.count),
        String::new(),
        format_currency(summary.total_stake),
        format_currency(summary.total_potential),
    ];

    let mut widths = TABLE_HEADERS.map(|h| h.chars().count());
    for cells in body.iter().chain(std::iter::once(&footer)) {
        for (w, cell) in widths.iter_mut().zip(cells) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: [String; 4]| -> String {
        cells
            .iter()
            .zip(widths)
            .map(|(c, w)| pad(c, w))
            .collect::<Vec<_>>()
            .join(" | ")
    };
    let rule = widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>()
        .join("-+-");

    let mut out = vec![
        line(TABLE_HEADERS.map(String::from)).bold().to_string(),
        rule.clone(),
    ];
    for cells in body {
        out.push(line(cells));
    }
    out.push(rule);
    out.push(line(footer).bold().to_string());
    out.join("\n")
}

fn render_tool_call(tc: &ToolCall) -> String {
    let status = match tc.status() {
        ToolCallStatus::InputStreaming | ToolCallStatus::InputAvailable => {
            tc.status().to_string().yellow()
        }
        ToolCallStatus::OutputAvailable => tc.status().to_string().green(),
        ToolCallStatus::OutputError => tc.status().to_string().red(),
    };
    match tc.error_text() {
        Some(err) => format!("⚙ {} [{}] {}", tc.kind.name(), status, err),
        None => format!("⚙ {} [{}]", tc.kind.name(), status),
    }
}

/// Segment text without styling, as streamed to the terminal.
pub fn plain_prose(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Everything below the prose: bets, sources, and tool call status.
pub fn render_attachments(view: &MessageView, state: &BetCardState) -> String {
    let mut blocks = Vec::new();
    match &view.bets {
        BetDisplay::Structured { bets } => blocks.push(render_bet_cards(bets, state)),
        BetDisplay::Heuristic { rows, summary } => blocks.push(render_bet_table(rows, summary)),
        BetDisplay::Empty => {}
    }
    let sources = render_sources(&view.sources, state.sources_open());
    if !sources.is_empty() {
        blocks.push(sources);
    }
    if !view.tool_calls.is_empty() {
        blocks.push(
            view.tool_calls
                .iter()
                .map(render_tool_call)
                .collect::<Vec<_>>()
                .join("\n"),
        );
    }
    blocks.join("\n\n")
}

pub fn role_label(role: Role) -> ColoredString {
    match role {
        Role::User => "you".blue().bold(),
        Role::Assistant => "advisor".green().bold(),
        other => other.to_string().dimmed(),
    }
}

pub fn render_view(view: &MessageView, state: &BetCardState) -> String {
    let mut blocks = vec![role_label(view.role).to_string()];

    let prose = render_segments(&view.segments);
    if !prose.is_empty() {
        blocks.push(prose);
    }
    if view.payload_pending {
        blocks.push("Preparing recommendations...".dimmed().to_string());
    }
    let attachments = render_attachments(view, state);
    if !attachments.is_empty() {
        blocks.push(attachments);
    }
    blocks.join("\n\n")
}
