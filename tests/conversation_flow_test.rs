use betwise::client::ChatTransport;
use betwise::engine::{AssistantEngine, TurnOutcome};
use betwise::heuristic::BetMatcher;
use betwise::render::{render_view, BetCardState};
use betwise::streaming::{sse_event_stream, EventStream};
use betwise::types::*;
use betwise::view::BetDisplay;
use bytes::Bytes;
use futures_util::stream;
use std::sync::Mutex;

/// Replays canned SSE bodies, one per turn, and records the requests it saw.
struct ReplayTransport {
    bodies: Mutex<Vec<&'static str>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ReplayTransport {
    fn new(mut bodies: Vec<&'static str>) -> Self {
        bodies.reverse();
        Self {
            bodies: Mutex::new(bodies),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl ChatTransport for ReplayTransport {
    fn build_request(&self, history: Vec<WireMessage>) -> ChatRequest {
        ChatRequest {
            model: "replay".to_string(),
            messages: betwise::prompt::build_messages(history),
            stream: true,
            tools: vec![betwise::tool_schema::betting_analysis_tool()],
            web_search_options: None,
        }
    }

    async fn open(&self, request: &ChatRequest) -> Result<EventStream> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }
        let body = match self.bodies.lock().ok().and_then(|mut b| b.pop()) {
            Some(body) => body,
            None => {
                return Err(BetwiseError::Upstream(
                    reqwest::StatusCode::SERVICE_UNAVAILABLE,
                    "no more replies".to_string(),
                )
                .into())
            }
        };
        // Split mid-line to exercise reassembly.
        let chunks: Vec<std::io::Result<Bytes>> = body
            .as_bytes()
            .chunks(11)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(sse_event_stream(stream::iter(chunks)))
    }
}

const QUESTION_REPLY: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"content\":\"Great! How much would you \"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"like to stake?\"},\"finish_reason\":\"stop\"}]}\n\n",
    "data: [DONE]\n\n",
);

const PROSE_PICKS_REPLY: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"content\":\"1. Bet $50 on Lakers -5.5 for potential winnings of $95\\n\\n\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"2. Warriors +3 ($25) per https://espn.com/nba\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"annotations\":[{\"type\":\"url_citation\",\"url_citation\":{\"url\":\"https://espn.com/nba\",\"title\":\"ESPN NBA\"}}]},\"finish_reason\":\"stop\"}]}\n\n",
    "data: [DONE]\n\n",
);

const TOOL_REPLY: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"content\":\"Here is your parlay.\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_ws\",\"function\":{\"name\":\"web_search\",\"arguments\":\"{\\\"query\\\":\\\"nfl odds\\\"}\"}}]}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":1,\"id\":\"call_ba\",\"function\":{\"name\":\"betting_analysis\",\"arguments\":\"{\\\"bets\\\":[{\\\"title\\\":\\\"Sunday Parlay\\\",\\\"type\\\":\\\"Parlay\\\",\"}}]}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":1,\"function\":{\"arguments\":\"\\\"legs\\\":[{\\\"game\\\":\\\"Chiefs vs Bills\\\",\\\"pick\\\":\\\"Chiefs -2.5\\\",\\\"odds\\\":\\\"-110\\\",\\\"reasoning\\\":\\\"Injuries\\\"},{\\\"game\\\":\\\"Eagles vs Giants\\\",\\\"pick\\\":\\\"Over 44.5\\\",\\\"odds\\\":\\\"-105\\\",\\\"reasoning\\\":\\\"Pace\\\"}],\\\"totalOdds\\\":\\\"+264\\\",\\\"payout\\\":\\\"$36.40\\\"}]}\"}}]}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n",
    "data: [DONE]\n\n",
);

async fn completed<T: ChatTransport>(engine: &mut AssistantEngine<T>, text: &str) -> MessageId {
    match engine.submit(text, |_| {}).await {
        Ok(TurnOutcome::Completed(id)) => id,
        Ok(TurnOutcome::Failed { error, .. }) => panic!("turn failed: {}", error),
        Err(e) => panic!("turn rejected: {}", e),
    }
}

#[tokio::test]
async fn test_multi_turn_history_is_sent() {
    let mut engine = AssistantEngine::new(ReplayTransport::new(vec![QUESTION_REPLY, PROSE_PICKS_REPLY]));
    completed(&mut engine, "I want an NBA bet").await;
    completed(&mut engine, "$75 total").await;

    let requests = match engine.transport().requests.lock() {
        Ok(r) => r.clone(),
        Err(_) => panic!("request log poisoned"),
    };
    assert_eq!(requests.len(), 2);
    let second: Vec<(Role, &str)> = requests[1]
        .messages
        .iter()
        .map(|m| (m.role, m.content.as_str()))
        .collect();
    assert_eq!(second[0].0, Role::System);
    assert_eq!(
        &second[1..],
        &[
            (Role::User, "I want an NBA bet"),
            (Role::Assistant, "Great! How much would you like to stake?"),
            (Role::User, "$75 total"),
        ]
    );
}

#[tokio::test]
async fn test_prose_picks_fall_back_to_heuristic_table() {
    let mut engine = AssistantEngine::new(ReplayTransport::new(vec![PROSE_PICKS_REPLY]));
    let id = completed(&mut engine, "Two NBA singles").await;
    let view = match engine.view(id) {
        Some(v) => v,
        None => panic!("missing view"),
    };

    match &view.bets {
        BetDisplay::Heuristic { rows, summary } => {
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0].team_player, "Lakers -5.5");
            assert_eq!(rows[0].line_prop, "-5.5");
            assert_eq!(rows[0].matcher, BetMatcher::Narrative);
            assert_eq!(rows[1].team_player, "Warriors");
            assert!(rows[1].estimated);
            assert_eq!(summary.total_stake, 75.0);
        }
        other => panic!("expected heuristic rows, got {:?}", other),
    }
    assert_eq!(view.sources.len(), 1);
    assert!(view.segments.iter().all(|s| !s.content.contains("espn.com")));

    colored::control::set_override(false);
    let rendered = render_view(&view, &BetCardState::default());
    assert!(rendered.contains("Possible Winnings"));
    assert!(rendered.contains("Sources (1)"));
}

#[tokio::test]
async fn test_tool_reply_renders_cards_and_hides_web_search() {
    let mut engine = AssistantEngine::new(ReplayTransport::new(vec![TOOL_REPLY]));
    let id = completed(&mut engine, "$10 two-leg NFL parlay").await;

    let message = match engine.conversation().message(id) {
        Some(m) => m,
        None => panic!("missing message"),
    };
    assert_eq!(message.tool_calls().len(), 2);

    let view = match engine.view(id) {
        Some(v) => v,
        None => panic!("missing view"),
    };
    assert_eq!(view.tool_calls.len(), 1);
    assert_eq!(view.tool_calls[0].id, ToolCallId("call_ba".to_string()));
    match &view.bets {
        BetDisplay::Structured { bets } => {
            assert_eq!(bets[0].title, "Sunday Parlay");
            assert_eq!(bets[0].legs.len(), 2);
        }
        other => panic!("expected structured bets, got {:?}", other),
    }

    colored::control::set_override(false);
    let mut cards = BetCardState::default();
    let rendered = render_view(&view, &cards);
    assert!(rendered.contains("Pick: Over 44.5"));
    cards.toggle_bet(0);
    let collapsed = render_view(&view, &cards);
    assert!(collapsed.contains("2 legs hidden"));
}

#[tokio::test]
async fn test_upstream_failure_recovers_on_next_turn() {
    let mut engine = AssistantEngine::new(ReplayTransport::new(vec![QUESTION_REPLY]));
    completed(&mut engine, "Hi").await;

    match engine.submit("Still there?", |_| {}).await {
        Ok(TurnOutcome::Failed { apology, .. }) => {
            let message = engine.conversation().message(apology).map(|m| m.content().to_string());
            assert_eq!(message.as_deref(), Some(betwise::constants::FALLBACK_REPLY));
        }
        other => panic!("unexpected outcome {:?}", other.map_err(|e| e.to_string())),
    }
    assert!(!engine.conversation().is_streaming());
    assert_eq!(engine.conversation().messages().len(), 4);
}
