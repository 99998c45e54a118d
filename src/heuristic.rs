//! Best-effort recovery of bet recommendations from free prose.
//!
//! Used only when the model did not emit a structured payload. Each matcher
//! targets one phrasing and runs over the whole text on its own; results are
//! concatenated in matcher order. The same wager phrased two ways (say, a
//! table row and a parenthetical recap) yields two rows; duplicates are not
//! merged.

use crate::constants::ESTIMATED_PAYOUT_MULTIPLIER;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::Serialize;

const AMOUNT: &str = r"(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)";
const TEAM: &str = r"([A-Z][\w.'&]*(?:[ \t]+[A-Z][\w.'&]*)*)";
const LINE: &str = r"([+-]\d+(?:\.\d+)?|(?:[Oo]ver|[Uu]nder)[ \t]+\d+(?:\.\d+)?|ML\b|[Mm]oneyline\b)";

lazy_static! {
    static ref NARRATIVE: Regex = Regex::new(&format!(
        r"(?i)\bbet\s+\${AMOUNT}\s+on\s+(.+?)\s+for\s+(?:(?:potential|possible)\s+)?(?:winnings|payout)\s+of\s+\${AMOUNT}"
    ))
    .expect("Invalid narrative regex");
    static ref ARROW: Regex = Regex::new(&format!(
        r"(?m)(?:^|[.!?]\s+)((?:[^:\n$.!?]|\.[^\s:$])+?):\s*\${AMOUNT}\s*bet\s*(?:→|->|=>)\s*\${AMOUNT}"
    ))
    .expect("Invalid arrow regex");
    static ref TABLE: Regex = Regex::new(&format!(
        r"(?m)^[ \t]*\|\s*([^|\n]+?)\s*\|\s*([^|\n]+?)\s*\|\s*\$?\s*{AMOUNT}\s*\|\s*\$?\s*{AMOUNT}\s*\|"
    ))
    .expect("Invalid table regex");
    static ref TERSE: Regex =
        Regex::new(&format!(r"\${AMOUNT}[ \t]+{TEAM}[ \t]+{LINE}")).expect("Invalid terse regex");
    static ref PARENTHETICAL: Regex = Regex::new(&format!(
        r"{TEAM}[ \t]+{LINE}\s*\(\s*\${AMOUNT}\s*\)"
    ))
    .expect("Invalid parenthetical regex");
    static ref TRAILING_LINE: Regex = Regex::new(
        r"(?i)([+-]\d+(?:\.\d+)?|(?:over|under|o|u)\s*\d+(?:\.\d+)?|ml|moneyline)$"
    )
    .expect("Invalid trailing line regex");
}

/// The phrasings recognised, in priority order.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BetMatcher {
    /// "Bet $50 on Lakers -5.5 for potential winnings of $95"
    Narrative,
    /// "Lakers -5.5: $50 bet → $95 potential"
    Arrow,
    /// "| Lakers | -5.5 | $50 | $95 |"
    Table,
    /// "$50 Lakers -5.5"
    Terse,
    /// "Warriors +3 ($25)"
    Parenthetical,
}

impl BetMatcher {
    pub const ALL: [BetMatcher; 5] = [
        BetMatcher::Narrative,
        BetMatcher::Arrow,
        BetMatcher::Table,
        BetMatcher::Terse,
        BetMatcher::Parenthetical,
    ];

    fn regex(&self) -> &'static Regex {
        match self {
            Self::Narrative => &NARRATIVE,
            Self::Arrow => &ARROW,
            Self::Table => &TABLE,
            Self::Terse => &TERSE,
            Self::Parenthetical => &PARENTHETICAL,
        }
    }

    fn candidate<'t>(&self, caps: &Captures<'t>) -> Option<Candidate<'t>> {
        let group = |i: usize| caps.get(i).map(|m| m.as_str());
        match self {
            Self::Narrative => {
                let selection = clean_label(group(2)?);
                Some(Candidate {
                    line_prop: trailing_line(&selection),
                    team_player: selection,
                    stake: group(1)?,
                    payout: group(3),
                })
            }
            Self::Arrow => {
                let selection = clean_label(group(1)?);
                Some(Candidate {
                    line_prop: trailing_line(&selection),
                    team_player: selection,
                    stake: group(2)?,
                    payout: group(3),
                })
            }
            Self::Table => Some(Candidate {
                team_player: clean_label(group(1)?),
                line_prop: group(2)?.trim().to_string(),
                stake: group(3)?,
                payout: group(4),
            }),
            Self::Terse => Some(Candidate {
                team_player: clean_label(group(2)?),
                line_prop: group(3)?.to_string(),
                stake: group(1)?,
                payout: None,
            }),
            Self::Parenthetical => Some(Candidate {
                team_player: clean_label(group(1)?),
                line_prop: group(2)?.to_string(),
                stake: group(3)?,
                payout: None,
            }),
        }
    }
}

struct Candidate<'t> {
    team_player: String,
    line_prop: String,
    stake: &'t str,
    payout: Option<&'t str>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BetRow {
    /// `bet-{n}`; unique within one parse only.
    pub id: String,
    pub team_player: String,
    pub line_prop: String,
    pub stake: f64,
    pub potential_winnings: f64,
    /// Winnings were not stated and come from the fixed multiplier.
    pub estimated: bool,
    pub matcher: BetMatcher,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Default)]
pub struct BetSummary {
    pub count: usize,
    pub total_stake: f64,
    pub total_potential: f64,
}

impl BetSummary {
    pub fn of(rows: &[BetRow]) -> Self {
        rows.iter().fold(Self::default(), |acc, row| Self {
            count: acc.count + 1,
            total_stake: acc.total_stake + row.stake,
            total_potential: acc.total_potential + row.potential_winnings,
        })
    }
}

/// Drops a list bullet and bold markers. A bullet counts only when followed by
/// whitespace, so a leading sign stays.
fn clean_label(raw: &str) -> String {
    let mut label = raw.trim();
    for bullet in ['-', '*', '•'] {
        if let Some(rest) = label.strip_prefix(bullet) {
            if rest.starts_with(char::is_whitespace) {
                label = rest.trim_start();
                break;
            }
        }
    }
    label
        .trim_start_matches('*')
        .trim_end_matches(|c: char| c == '*' || c == ',' || c.is_whitespace())
        .to_string()
}

fn trailing_line(selection: &str) -> String {
    match TRAILING_LINE.captures(selection).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().to_string(),
        None => String::new(),
    }
}

/// Parses a dollar amount; `None` unless finite and positive.
fn parse_amount(raw: &str) -> Option<f64> {
    let value: f64 = raw.replace(',', "").parse().ok()?;
    if value.is_finite() && value > 0.0 {
        Some(value)
    } else {
        None
    }
}

pub fn parse_bet_rows(text: &str) -> Vec<BetRow> {
    let mut rows: Vec<BetRow> = Vec::new();
    for matcher in BetMatcher::ALL {
        for caps in matcher.regex().captures_iter(text) {
            let candidate = match matcher.candidate(&caps) {
                Some(c) => c,
                None => continue,
            };
            let stake = match parse_amount(candidate.stake) {
                Some(s) => s,
                None => continue,
            };
            let (potential_winnings, estimated) = match candidate.payout {
                Some(raw) => match parse_amount(raw) {
                    Some(p) => (p, false),
                    None => continue,
                },
                None => (stake * ESTIMATED_PAYOUT_MULTIPLIER, true),
            };
            if !potential_winnings.is_finite() {
                continue;
            }
            rows.push(BetRow {
                id: format!("bet-{}", rows.len()),
                team_player: candidate.team_player,
                line_prop: candidate.line_prop,
                stake,
                potential_winnings,
                estimated,
                matcher,
            });
        }
    }
    if !rows.is_empty() {
        tracing::debug!("[HEURISTIC] Recovered {} bet rows from prose", rows.len());
    }
    rows
}
