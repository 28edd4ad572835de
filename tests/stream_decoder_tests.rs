use tidechat::api::{normalize, ChatEvent, EventType, FrameDecoder};

#[test]
fn test_fragmented_frame_across_chunks() {
    let mut decoder = FrameDecoder::new();

    let events1 = decoder.feed(b"event: message\ndata: {\"content");
    assert_eq!(events1.len(), 0);

    let events2 = decoder.feed(b"\":\"Hi\"}\n\n");
    assert_eq!(events2.len(), 1);
    assert_eq!(events2[0].event_type, EventType::Message);
}

#[test]
fn test_parse_error_does_not_poison_decoder() {
    let mut decoder = FrameDecoder::new();

    let events = decoder.feed(b"event: message\ndata: {invalid json}\n\n");
    assert_eq!(events.len(), 0);

    let events = decoder.feed(b"event: message\ndata: {\"content\":\"ok\"}\n\n");
    assert_eq!(events.len(), 1);
}

#[test]
fn test_chunk_boundary_invariance() {
    let wire = b"event: start\ndata: {\"status\":\"processing\"}\n\n\
event: thinking\ndata: {\"content\":\"hmm\"}\n\n\
event: tool_call\ndata: {\"id\":\"9\",\"name\":\"query\",\"input\":{\"sql\":\"select 1\"}}\n\n\
event: tool_result\ndata: {\"id\":\"9\"}\noutput: col\n1\n\n\
event: message\ndata: {\"content\":\"All done\"}\n\n\
event: done\ndata: {\"status\":\"completed\"}\n\n";

    let mut whole = FrameDecoder::new();
    let baseline: Vec<ChatEvent> = whole.feed(wire).into_iter().map(normalize).collect();
    assert_eq!(baseline.len(), 6);

    for split in 1..wire.len() {
        let mut decoder = FrameDecoder::new();
        let mut events: Vec<ChatEvent> = decoder
            .feed(&wire[..split])
            .into_iter()
            .map(normalize)
            .collect();
        events.extend(decoder.feed(&wire[split..]).into_iter().map(normalize));
        assert_eq!(events, baseline, "split at byte {split} changed the events");
    }
}

#[test]
fn test_byte_at_a_time_delivery() {
    let wire = b"event: message\ndata: {\"content\":\"Hello\"}\n\nevent: done\n\n";

    let mut decoder = FrameDecoder::new();
    let mut events = Vec::new();
    for byte in wire.iter() {
        events.extend(decoder.feed(std::slice::from_ref(byte)));
    }

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_type, EventType::Message);
    assert_eq!(events[1].event_type, EventType::Done);
}

#[test]
fn test_multiline_tool_output_survives_decoding() {
    let wire = b"event: tool_result\ndata: {\"id\":\"3\",\"name\":\"query\"}\noutput: a | b\n--- | ---\n1 | 2\n\n";

    let mut decoder = FrameDecoder::new();
    let records = decoder.feed(wire);
    assert_eq!(records.len(), 1);

    match normalize(records.into_iter().next().unwrap()) {
        ChatEvent::ToolResult { id, output, .. } => {
            assert_eq!(id.as_deref(), Some("3"));
            assert_eq!(output, "a | b\n--- | ---\n1 | 2");
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn test_id_backfilled_from_json_payload() {
    let wire = b"event: tool_error\ndata: {\"id\":\"err-1\",\"error\":\"denied\"}\n\n";

    let mut decoder = FrameDecoder::new();
    let records = decoder.feed(wire);
    assert_eq!(records.len(), 1);

    match normalize(records.into_iter().next().unwrap()) {
        ChatEvent::ToolError { id, error, .. } => {
            assert_eq!(id.as_deref(), Some("err-1"));
            assert_eq!(error, "denied");
        }
        other => panic!("unexpected event: {other:?}"),
    }
}
