//! Serialized audit log lines.
//!
//! A line is `[timestamp] [channel] payload\n`. Sizes are UTF-8 byte counts
//! of the whole line, newline included.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Longest channel name kept in the prefix.
pub const MAX_CHANNEL_BYTES: usize = 64;
/// Oversized payloads are trimmed from the end in steps of this many bytes.
pub const TRUNCATE_CHUNK_BYTES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    seq: u64,
    timestamp: DateTime<Utc>,
    channel: String,
    prefix_len: usize,
    line: String,
}

impl LogEntry {
    /// Build a line that fits in `capacity` bytes. Returns the entry and
    /// whether the payload had to be truncated.
    pub(crate) fn build(
        seq: u64,
        timestamp: DateTime<Utc>,
        channel: &str,
        payload: String,
        capacity: usize,
    ) -> (Self, bool) {
        let channel = sanitize_channel(channel);
        let prefix = format!(
            "[{}] [{}] ",
            timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            channel
        );

        let budget = capacity.saturating_sub(prefix.len() + 1);
        let (payload, truncated) = truncate_payload(payload, budget);

        let mut line = String::with_capacity(prefix.len() + payload.len() + 1);
        line.push_str(&prefix);
        line.push_str(&payload);
        line.push('\n');

        (
            Self {
                seq,
                timestamp,
                channel,
                prefix_len: prefix.len(),
                line,
            },
            truncated,
        )
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Serialized payload (without prefix and newline).
    pub fn payload(&self) -> &str {
        &self.line[self.prefix_len..self.line.len() - 1]
    }

    /// Full line including the trailing newline.
    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn byte_size(&self) -> usize {
        self.line.len()
    }
}

/// Deterministic text form: JSON with object keys in sorted order.
pub fn serialize_payload<T: Serialize + ?Sized>(payload: &T) -> String {
    match serde_json::to_value(payload) {
        Ok(v) => v.to_string(),
        Err(e) => serde_json::Value::String(format!("<unserializable: {e}>")).to_string(),
    }
}

fn sanitize_channel(channel: &str) -> String {
    let mut out: String = channel
        .chars()
        .map(|c| if c.is_control() || c == ']' { '_' } else { c })
        .collect();
    if out.len() > MAX_CHANNEL_BYTES {
        let mut cut = MAX_CHANNEL_BYTES;
        while !out.is_char_boundary(cut) {
            cut -= 1;
        }
        out.truncate(cut);
    }
    out
}

fn truncate_payload(mut payload: String, budget: usize) -> (String, bool) {
    if payload.len() <= budget {
        return (payload, false);
    }
    while payload.len() > budget {
        let mut cut = payload.len().saturating_sub(TRUNCATE_CHUNK_BYTES);
        while !payload.is_char_boundary(cut) {
            cut -= 1;
        }
        payload.truncate(cut);
    }
    (payload, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn line_layout() {
        let (e, truncated) = LogEntry::build(7, ts(), "audit", "{\"a\":1}".into(), 1024);
        assert!(!truncated);
        assert_eq!(e.line(), "[2026-01-02T03:04:05.000Z] [audit] {\"a\":1}\n");
        assert_eq!(e.payload(), "{\"a\":1}");
        assert_eq!(e.byte_size(), e.line().len());
        assert_eq!(e.seq(), 7);
    }

    #[test]
    fn multibyte_sizes_count_bytes() {
        let (e, _) = LogEntry::build(0, ts(), "log", "\"ж€\"".into(), 1024);
        // 2 + 3 bytes for the two characters, plus quotes
        assert_eq!(e.payload().len(), 7);
        assert_eq!(e.byte_size(), "[2026-01-02T03:04:05.000Z] [log] ".len() + 7 + 1);
    }

    #[test]
    fn truncation_keeps_prefix_and_char_boundaries() {
        let payload: String = "é".repeat(1000);
        let (e, truncated) = LogEntry::build(0, ts(), "log", payload, 300);
        assert!(truncated);
        assert!(e.byte_size() <= 300);
        assert!(e.line().starts_with("[2026-01-02T03:04:05.000Z] [log] "));
        assert!(e.line().ends_with('\n'));
        assert!(!e.payload().is_empty());
    }

    #[test]
    fn channel_is_capped_and_sanitized() {
        let long = "c".repeat(200);
        let (e, _) = LogEntry::build(0, ts(), &long, "1".into(), 1024);
        assert_eq!(e.channel().len(), MAX_CHANNEL_BYTES);
        let (e, _) = LogEntry::build(0, ts(), "a]\nb", "1".into(), 1024);
        assert_eq!(e.channel(), "a__b");
    }

    #[test]
    fn serialization_sorts_keys() {
        let v = serde_json::json!({"b": 1, "a": [true, null]});
        assert_eq!(serialize_payload(&v), "{\"a\":[true,null],\"b\":1}");
        assert_eq!(serialize_payload("x"), "\"x\"");
    }
}
