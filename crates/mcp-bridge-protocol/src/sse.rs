use serde_json::Value;

/// Soft cap on a single SSE event's serialized payload. Exceeding it is logged
/// by the caller as a warning; the event is still written.
pub const SSE_SOFT_CAP_BYTES: usize = 64 * 1024;

/// One Server-Sent Event frame carrying a JSON-RPC message.
#[derive(Debug, Clone)]
pub struct SseFrame {
    /// Monotonic id, unique within the stream's session.
    pub id: u64,
    pub data: Value,
}

impl SseFrame {
    pub fn new(id: u64, data: Value) -> Self {
        Self { id, data }
    }

    /// Render as wire bytes: `id:`, `event: message`, one `data:` line per
    /// line of the serialized payload, then a blank line.
    pub fn format(&self) -> String {
        let payload = serde_json::to_string(&self.data).unwrap_or_else(|_| "{}".to_string());
        let mut out = String::with_capacity(payload.len() + 32);
        out.push_str(&format!("id: {}\n", self.id));
        out.push_str("event: message\n");
        for line in payload.split('\n') {
            out.push_str("data: ");
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        out
    }
}

/// A comment line (`:text`), used for the initial header-flush and keep-alives.
/// Comments carry no event id and are invisible to `EventSource` listeners.
pub fn comment(text: &str) -> String {
    format!(":{text}\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn formats_id_event_and_data_lines() {
        let frame = SseFrame::new(7, json!({"hello": "world"}));
        let rendered = frame.format();
        assert!(rendered.starts_with("id: 7\n"));
        assert!(rendered.contains("event: message\n"));
        assert!(rendered.contains("data: {\"hello\":\"world\"}\n"));
        assert!(rendered.ends_with("\n\n"));
    }

    #[test]
    fn multiline_payload_gets_one_data_line_per_source_line() {
        let frame = SseFrame::new(1, json!("a\nb"));
        // serde_json never emits literal newlines inside a JSON string, so this
        // exercises the split-on-\n contract against the *serialized* payload,
        // which for a plain string is always a single line.
        let rendered = frame.format();
        assert_eq!(rendered.matches("data: ").count(), 1);
    }

    #[test]
    fn comment_has_no_event_id() {
        let c = comment("ok");
        assert_eq!(c, ":ok\n\n");
    }
}
