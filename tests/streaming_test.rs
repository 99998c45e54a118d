use betwise::streaming::*;
use bytes::Bytes;
use futures_util::{stream, StreamExt};

const SSE_BODY: &str = concat!(
    "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"Bet $50 on \"}}]}\n\n",
    "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Lakers -5.5 — ok\"}}]}\n\n",
    ": keep-alive\n\n",
    "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_abc\",\"type\":\"function\",\"function\":{\"name\":\"betting_analysis\",\"arguments\":\"{\\\"bets\\\"\"}}]}}]}\n\n",
    "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\":[]}\"}}]}}]}\n\n",
    "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"annotations\":[{\"type\":\"url_citation\",\"url_citation\":{\"url\":\"https://espn.com/nba\",\"title\":\"ESPN\"}}]}}]}\n\n",
    "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n",
    "data: [DONE]\n\n",
);

async fn collect(chunks: Vec<Bytes>) -> Vec<StreamEvent> {
    let body = stream::iter(chunks.into_iter().map(Ok::<_, std::io::Error>));
    let mut events = Vec::new();
    let mut batches = sse_event_stream(body);
    while let Some(batch) = batches.next().await {
        match batch {
            Ok(mut b) => events.append(&mut b),
            Err(e) => panic!("stream failed: {}", e),
        }
    }
    events
}

fn split_every(body: &[u8], size: usize) -> Vec<Bytes> {
    body.chunks(size).map(Bytes::copy_from_slice).collect()
}

#[tokio::test]
async fn test_events_in_order() {
    let events = collect(vec![Bytes::from_static(SSE_BODY.as_bytes())]).await;
    assert_eq!(events.len(), 6);
    assert_eq!(events[0], StreamEvent::Text("Bet $50 on ".to_string()));
    match &events[2] {
        StreamEvent::ToolCallDelta {
            index,
            id,
            name,
            arguments,
        } => {
            assert_eq!(*index, 0);
            assert_eq!(id.as_deref(), Some("call_abc"));
            assert_eq!(name.as_deref(), Some("betting_analysis"));
            assert_eq!(arguments, "{\"bets\"");
        }
        other => panic!("unexpected event {:?}", other),
    }
    match &events[4] {
        StreamEvent::Citations(sources) => assert_eq!(sources[0].url, "https://espn.com/nba"),
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(
        events[5],
        StreamEvent::Finished {
            reason: "tool_calls".to_string()
        }
    );
}

#[tokio::test]
async fn test_arbitrary_chunk_boundaries_give_same_events() {
    let whole = collect(vec![Bytes::from_static(SSE_BODY.as_bytes())]).await;
    // Sizes that split lines, JSON strings and the multi-byte dash.
    for size in [1, 2, 3, 7, 13, 64, 200] {
        let split = collect(split_every(SSE_BODY.as_bytes(), size)).await;
        assert_eq!(split, whole, "chunk size {}", size);
    }
}

#[tokio::test]
async fn test_body_without_done_marker_ends_cleanly() {
    let body = "data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n";
    let events = collect(vec![Bytes::from_static(body.as_bytes())]).await;
    assert_eq!(events, vec![StreamEvent::Text("partial".to_string())]);
}

#[tokio::test]
async fn test_io_error_surfaces_once() {
    let chunks = vec![
        Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n")),
        Err(std::io::Error::other("connection reset")),
    ];
    let mut batches = sse_event_stream(stream::iter(chunks));
    let mut errors = 0;
    let mut texts = 0;
    while let Some(batch) = batches.next().await {
        match batch {
            Ok(events) => texts += events.len(),
            Err(e) => {
                assert!(e.inner.is_transport_failure());
                errors += 1;
            }
        }
    }
    assert_eq!(texts, 1);
    assert_eq!(errors, 1);
}
