//! Tool definitions advertised to the model and their local execution.
//!
//! `betting_analysis` is a pure formatter: the model fills the schema and the
//! client validates it into a [`BettingAnalysis`]. Web search is hosted by the
//! provider and has no local executor.

use crate::constants::BETTING_ANALYSIS_TOOL;
use crate::types::{BettingAnalysis, BetwiseError, Result};
use serde_json::{json, Value};

/// Parameter requirements read back from a function tool definition.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub required_params: Vec<String>,
    pub optional_params: Vec<String>,
}

impl ToolSchema {
    pub fn from_tool_definition(tool: &Value) -> Option<Self> {
        let function = tool.get("function")?;
        let name = function.get("name")?.as_str()?.to_string();

        let parameters = function.get("parameters")?;
        let properties = parameters.get("properties")?.as_object()?;
        let required = parameters
            .get("required")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(|s| s.to_string()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let optional_params = properties
            .keys()
            .filter(|p| !required.contains(p))
            .cloned()
            .collect();

        Some(ToolSchema {
            name,
            required_params: required,
            optional_params,
        })
    }

    /// Required top-level parameters absent from `args`.
    pub fn missing_params(&self, args: &Value) -> Vec<&str> {
        self.required_params
            .iter()
            .filter(|p| args.get(p.as_str()).is_none())
            .map(|p| p.as_str())
            .collect()
    }
}

pub fn betting_analysis_tool() -> Value {
    let leg = json!({
        "type": "object",
        "properties": {
            "game": {"type": "string", "description": "Matchup, e.g. 'Lakers vs Suns'"},
            "pick": {"type": "string", "description": "Selection, e.g. 'Lakers -5.5'"},
            "odds": {"type": "string", "description": "American odds, e.g. '-110'"},
            "reasoning": {"type": "string", "description": "Why this leg was chosen"}
        },
        "required": ["game", "pick", "odds", "reasoning"]
    });
    let bet = json!({
        "type": "object",
        "properties": {
            "title": {"type": "string"},
            "type": {"type": "string", "description": "Single Bet, Parlay, Teaser, ..."},
            "legs": {"type": "array", "items": leg, "minItems": 1},
            "totalOdds": {"type": "string"},
            "payout": {"type": "string", "description": "Potential payout, e.g. '$95.45'"},
            "stake": {"type": "string"},
            "confidence": {"type": "string", "description": "Low, Medium or High"}
        },
        "required": ["title", "type", "legs", "totalOdds", "payout"]
    });
    json!({
        "type": "function",
        "function": {
            "name": BETTING_ANALYSIS_TOOL,
            "description": "Format final betting recommendations for display. Call once the user has given a stake, bet type, number of legs and sport.",
            "parameters": {
                "type": "object",
                "properties": {
                    "bets": {"type": "array", "items": bet, "minItems": 1},
                    "sources": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "title": {"type": "string"},
                                "url": {"type": "string"}
                            },
                            "required": ["url"]
                        }
                    }
                },
                "required": ["bets"]
            }
        }
    })
}

/// Validates tool arguments into an analysis. A missing `sources` array is
/// treated as empty.
pub fn execute_betting_analysis(input: &Value) -> Result<BettingAnalysis> {
    if let Value::String(raw) = input {
        return Err(BetwiseError::Validation(format!(
            "{} arguments are not valid JSON ({} chars)",
            BETTING_ANALYSIS_TOOL,
            raw.len()
        ))
        .into());
    }

    let tool = betting_analysis_tool();
    if let Some(schema) = ToolSchema::from_tool_definition(&tool) {
        let missing = schema.missing_params(input);
        if !missing.is_empty() {
            return Err(BetwiseError::Validation(format!(
                "{} is missing required parameters: {}",
                schema.name,
                missing.join(", ")
            ))
            .into());
        }
    }

    let analysis: BettingAnalysis = serde_json::from_value(input.clone())?;
    if analysis.bets.is_empty() {
        return Err(BetwiseError::Validation("bets list is empty".to_string()).into());
    }
    tracing::debug!(
        "[TOOL] {} produced {} bets, {} sources",
        BETTING_ANALYSIS_TOOL,
        analysis.bets.len(),
        analysis.sources.len()
    );
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> Value {
        json!({
            "bets": [{
                "title": "Lakers cover",
                "type": "Single Bet",
                "legs": [{"game": "Lakers vs Suns", "pick": "Lakers -5.5", "odds": "-110", "reasoning": "Rest edge"}],
                "totalOdds": "-110",
                "payout": "$95.45"
            }]
        })
    }

    #[test]
    fn test_schema_round_trips_through_analysis() {
        let tool = betting_analysis_tool();
        let schema = match ToolSchema::from_tool_definition(&tool) {
            Some(s) => s,
            None => panic!("tool definition unreadable"),
        };
        assert_eq!(schema.name, "betting_analysis");
        assert_eq!(schema.required_params, vec!["bets"]);
        assert_eq!(schema.optional_params, vec!["sources"]);
    }

    #[test]
    fn test_sources_default_to_empty() {
        let analysis = match execute_betting_analysis(&valid_input()) {
            Ok(a) => a,
            Err(e) => panic!("{}", e),
        };
        assert_eq!(analysis.bets[0].bet_type, "Single Bet");
        assert!(analysis.sources.is_empty());
    }

    #[test]
    fn test_missing_bets_reported() {
        match execute_betting_analysis(&json!({"sources": []})) {
            Err(e) => match e.inner {
                BetwiseError::Validation(msg) => assert!(msg.contains("bets")),
                other => panic!("unexpected error {:?}", other),
            },
            Ok(_) => panic!("missing bets accepted"),
        }
    }

    #[test]
    fn test_unparsed_arguments_rejected() {
        assert!(execute_betting_analysis(&json!("{\"bets\": [")).is_err());
        assert!(execute_betting_analysis(&json!({"bets": []})).is_err());
    }

    #[test]
    fn test_missing_params_lists_absent_keys() {
        let tool = json!({
            "type": "function",
            "function": {
                "name": "odds_lookup",
                "parameters": {
                    "type": "object",
                    "properties": {"team": {"type": "string"}, "book": {"type": "string"}},
                    "required": ["team"]
                }
            }
        });
        let schema = match ToolSchema::from_tool_definition(&tool) {
            Some(s) => s,
            None => panic!("tool definition unreadable"),
        };
        assert_eq!(schema.missing_params(&json!({"book": "dk"})), vec!["team"]);
        assert!(schema.missing_params(&json!({"team": "LAL"})).is_empty());
    }
}
