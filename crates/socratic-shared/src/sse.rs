//! Incremental Server-Sent-Events framing.
//!
//! The mentor endpoints stream records of the form `data: <token>` separated
//! by blank lines and end with a `data: [DONE]` record. Network reads can
//! split anywhere (inside a record, inside the sentinel, inside a UTF-8
//! sequence), so the decoder buffers until a full record is available. The
//! frames produced are the same however the byte stream is chunked, and
//! `Done` is produced exactly once.

use tracing::debug;

/// Payload marking the end of a mentor stream
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// Payload of one record; multiple `data:` lines are joined with `\n`
    Data(String),
    /// Sentinel received, or the body ended
    Done,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Bytes of an incomplete UTF-8 sequence from the previous read
    pending: Vec<u8>,
    /// Decoded text not yet terminated by a blank line
    buffer: String,
    finished: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one network read; returns the frames it completed.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        if self.finished {
            return frames;
        }

        self.pending.extend_from_slice(bytes);
        self.decode_pending();
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        while let Some(pos) = self.buffer.find("\n\n") {
            let record: String = self.buffer.drain(..pos + 2).collect();
            if let Some(frame) = parse_record(&record[..pos]) {
                let done = frame == SseFrame::Done;
                frames.push(frame);
                if done {
                    self.finished = true;
                    self.buffer.clear();
                    self.pending.clear();
                    break;
                }
            }
        }
        frames
    }

    /// Flush at end of body. Always yields `Done` unless it was already seen.
    pub fn finish(&mut self) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        if self.finished {
            return frames;
        }

        if !self.pending.is_empty() {
            self.buffer.push_str(&String::from_utf8_lossy(&self.pending));
            self.pending.clear();
        }
        let rest = std::mem::take(&mut self.buffer).replace("\r\n", "\n");
        if !rest.trim().is_empty() {
            debug!("Flushing unterminated SSE record at end of stream");
            if let Some(frame) = parse_record(rest.trim_end_matches('\n')) {
                if frame != SseFrame::Done {
                    frames.push(frame);
                }
            }
        }

        self.finished = true;
        frames.push(SseFrame::Done);
        frames
    }

    /// Move the longest valid UTF-8 prefix of `pending` into `buffer`.
    fn decode_pending(&mut self) {
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.pending.clear();
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            // Incomplete sequence at the end; wait for more bytes
                            self.pending.drain(..valid);
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Parse one record (without its terminating blank line).
fn parse_record(record: &str) -> Option<SseFrame> {
    let mut data: Vec<&str> = Vec::new();
    for line in record.split('\n') {
        let line = line.trim_start();
        if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        }
        // Comments (":") and other fields (event, id, retry) carry no text
    }

    if data.is_empty() {
        return None;
    }
    let payload = data.join("\n");
    if payload.trim_end() == DONE_SENTINEL {
        debug!("SSE sentinel received");
        return Some(SseFrame::Done);
    }
    Some(SseFrame::Data(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_read() {
        let mut d = SseDecoder::new();
        let frames = d.push(b"data: Hello\n\ndata: [DONE]\n\n");
        assert_eq!(frames, vec![SseFrame::Data("Hello".into()), SseFrame::Done]);
        assert!(d.is_finished());
        assert!(d.finish().is_empty());
    }

    #[test]
    fn test_split_mid_record() {
        let mut d = SseDecoder::new();
        assert!(d.push(b"data: Hel").is_empty());
        let frames = d.push(b"lo\n\ndata: [DONE]\n\n");
        assert_eq!(frames, vec![SseFrame::Data("Hello".into()), SseFrame::Done]);
    }

    #[test]
    fn test_crlf_records() {
        let mut d = SseDecoder::new();
        let mut frames = d.push(b"data: a \r");
        frames.extend(d.push(b"\n\r\ndata: [DONE]\r\n\r\n"));
        assert_eq!(frames, vec![SseFrame::Data("a ".into()), SseFrame::Done]);
    }

    #[test]
    fn test_token_whitespace_preserved() {
        let mut d = SseDecoder::new();
        let frames = d.push(b"data: word \n\ndata:next\n\n");
        assert_eq!(
            frames,
            vec![SseFrame::Data("word ".into()), SseFrame::Data("next".into())]
        );
    }

    #[test]
    fn test_multi_line_record_joined() {
        let mut d = SseDecoder::new();
        let frames = d.push(b"event: token\ndata: line one\ndata: line two\n\n");
        assert_eq!(frames, vec![SseFrame::Data("line one\nline two".into())]);
    }

    #[test]
    fn test_comment_record_skipped() {
        let mut d = SseDecoder::new();
        assert!(d.push(b": ping\n\n").is_empty());
    }

    #[test]
    fn test_utf8_split_across_reads() {
        let bytes = "data: caf\u{e9}\n\n".as_bytes();
        let split = bytes.len() - 3; // inside the two-byte é
        let mut d = SseDecoder::new();
        assert!(d.push(&bytes[..split]).is_empty());
        assert_eq!(d.push(&bytes[split..]), vec![SseFrame::Data("caf\u{e9}".into())]);
    }

    #[test]
    fn test_eof_without_sentinel_flushes() {
        let mut d = SseDecoder::new();
        assert!(d.push(b"data: tail").is_empty());
        assert_eq!(d.finish(), vec![SseFrame::Data("tail".into()), SseFrame::Done]);
        assert!(d.finish().is_empty());
    }

    #[test]
    fn test_input_after_done_ignored() {
        let mut d = SseDecoder::new();
        d.push(b"data: [DONE]\n\ndata: late\n\n");
        assert!(d.push(b"data: later\n\n").is_empty());
    }
}
