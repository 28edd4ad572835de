use crate::api::logging::emit_dropped_frame;
use serde_json::Value;

/// Event types carried on the chat stream. Frames with any other type are
/// dropped by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Start,
    Message,
    Thinking,
    ToolCall,
    ToolResult,
    ToolError,
    Error,
    Done,
    End,
}

impl EventType {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "start" => Some(Self::Start),
            "message" => Some(Self::Message),
            "thinking" => Some(Self::Thinking),
            "tool_call" => Some(Self::ToolCall),
            "tool_result" => Some(Self::ToolResult),
            "tool_error" => Some(Self::ToolError),
            "error" => Some(Self::Error),
            "done" => Some(Self::Done),
            "end" => Some(Self::End),
            _ => None,
        }
    }
}

/// One decoded frame: the event type, the parsed `data:` payload, and any
/// raw-line field the line scan recovered.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub event_type: EventType,
    pub data: Option<Value>,
    /// Verbatim remainder of an `output:` line, newlines included.
    pub raw_output: Option<String>,
    /// Verbatim remainder of an `error:` line, newlines included.
    pub raw_error: Option<String>,
}

/// Reassembles raw transport chunks into discrete event records. Frames are
/// delimited by a blank line; the tail after the last separator stays in the
/// buffer until the next chunk completes it. The buffer holds raw bytes so a
/// multi-byte character split across chunks reassembles intact; text decoding
/// happens per complete frame.
#[derive(Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<EventRecord> {
        self.buffer.extend_from_slice(chunk);
        let mut records = Vec::new();
        let mut start = 0;

        while let Some(end) = find_frame_separator(&self.buffer[start..]) {
            let frame_end = start + end;
            let frame = String::from_utf8_lossy(&self.buffer[start..frame_end]);
            start = frame_end + 2;

            if frame.trim().is_empty() {
                continue;
            }
            match decode_frame(&frame) {
                Some(record) => records.push(record),
                None => emit_dropped_frame(&frame),
            }
        }

        if start > 0 {
            self.buffer.drain(..start);
        }

        records
    }
}

fn find_frame_separator(bytes: &[u8]) -> Option<usize> {
    bytes.windows(2).position(|pair| pair == b"\n\n")
}

fn decode_frame(frame: &str) -> Option<EventRecord> {
    let mut lines = frame.lines();
    let event_type = lines
        .next()
        .and_then(|line| line.strip_prefix("event:"))
        .map(str::trim_start)
        .and_then(EventType::parse)?;

    let mut data = None;
    if let Some(json_line) = lines.next().and_then(|line| line.strip_prefix("data:")) {
        // An unparseable payload drops the whole frame; later frames still
        // decode.
        match serde_json::from_str::<Value>(json_line.trim()) {
            Ok(value) => data = Some(value),
            Err(_) => return None,
        }
    }

    let raw_output = match event_type {
        EventType::ToolResult => raw_line_remainder(frame, "output:"),
        _ => None,
    };
    let raw_error = match event_type {
        EventType::ToolError => raw_line_remainder(frame, "error:"),
        _ => None,
    };

    Some(EventRecord {
        event_type,
        data,
        raw_output,
        raw_error,
    })
}

/// Remainder of the first line starting with `prefix`, taken through the end
/// of the frame so a multi-line value survives intact.
fn raw_line_remainder(frame: &str, prefix: &str) -> Option<String> {
    let mut search_from = 0;
    loop {
        let candidate = frame[search_from..].find(prefix)? + search_from;
        let at_line_start = candidate == 0 || frame.as_bytes()[candidate - 1] == b'\n';
        if at_line_start {
            let value = &frame[candidate + prefix.len()..];
            return Some(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
        search_from = candidate + prefix.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame_decodes() {
        let mut decoder = FrameDecoder::new();
        let records = decoder.feed(b"event: message\ndata: {\"content\":\"hi\"}\n\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type, EventType::Message);
        assert_eq!(
            records[0].data.as_ref().and_then(|d| d["content"].as_str()),
            Some("hi")
        );
    }

    #[test]
    fn test_partial_frame_is_buffered_across_chunks() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"event: message\ndata: {\"con").is_empty());
        let records = decoder.feed(b"tent\":\"hi\"}\n\n");
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_frame_without_event_line_is_dropped() {
        let mut decoder = FrameDecoder::new();
        let records = decoder.feed(b"data: {\"content\":\"hi\"}\n\nevent: done\n\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type, EventType::Done);
    }

    #[test]
    fn test_unknown_event_type_is_dropped() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"event: ping\ndata: {}\n\n").is_empty());
    }

    #[test]
    fn test_invalid_json_drops_frame_but_not_stream() {
        let mut decoder = FrameDecoder::new();
        let records = decoder.feed(b"event: message\ndata: {broken\n\nevent: end\n\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type, EventType::End);
    }

    #[test]
    fn test_tool_result_output_line_keeps_embedded_newlines() {
        let mut decoder = FrameDecoder::new();
        let records =
            decoder.feed(b"event: tool_result\ndata: {\"id\":\"1\"}\noutput: row one\nrow two\n\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].raw_output.as_deref(), Some("row one\nrow two"));
    }

    #[test]
    fn test_tool_error_error_line_is_extracted() {
        let mut decoder = FrameDecoder::new();
        let records = decoder.feed(b"event: tool_error\ndata: {\"id\":\"1\"}\nerror: timeout\n\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].raw_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_missing_output_line_leaves_raw_field_empty() {
        let mut decoder = FrameDecoder::new();
        let records = decoder.feed(b"event: tool_result\ndata: {\"output\":\"from json\"}\n\n");
        assert_eq!(records.len(), 1);
        assert!(records[0].raw_output.is_none());
    }

    #[test]
    fn test_multiple_frames_in_one_chunk_keep_order() {
        let mut decoder = FrameDecoder::new();
        let records = decoder.feed(
            b"event: start\ndata: {}\n\nevent: message\ndata: {\"content\":\"a\"}\n\nevent: done\n\n",
        );
        let types: Vec<EventType> = records.iter().map(|r| r.event_type).collect();
        assert_eq!(
            types,
            vec![EventType::Start, EventType::Message, EventType::Done]
        );
    }

    #[test]
    fn test_multibyte_char_survives_any_chunk_split() {
        let wire = "event: message\ndata: {\"content\":\"héllo — 你好\"}\n\n".as_bytes();

        for split in 1..wire.len() {
            let mut decoder = FrameDecoder::new();
            let mut records = decoder.feed(&wire[..split]);
            records.extend(decoder.feed(&wire[split..]));
            assert_eq!(records.len(), 1, "split at byte {split}");
            assert_eq!(
                records[0].data.as_ref().and_then(|d| d["content"].as_str()),
                Some("héllo — 你好"),
                "split at byte {split}"
            );
        }
    }

    #[test]
    fn test_frame_without_data_line_is_accepted() {
        let mut decoder = FrameDecoder::new();
        let records = decoder.feed(b"event: done\n\n");
        assert_eq!(records.len(), 1);
        assert!(records[0].data.is_none());
    }
}
