//! Server-Sent Events frame parsing
//!
//! Incremental parser over the raw response byte stream. Extracts the `data`
//! payload of each event; comments (heartbeats) and other fields are skipped.
//! Multi-line `data` fields are joined with `\n` per the SSE format, and an
//! event is dispatched on the blank line that terminates it.

/// Incremental SSE frame parser
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    data_lines: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of response bytes; returns the data payloads of all
    /// events completed by this chunk, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut payloads = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let mut line: String = self.buffer.drain(..=newline).collect();
            line.pop(); // trailing \n
            if line.ends_with('\r') {
                line.pop();
            }

            if line.is_empty() {
                // Blank line terminates the event.
                if !self.data_lines.is_empty() {
                    payloads.push(self.data_lines.join("\n"));
                    self.data_lines.clear();
                }
            } else if line.starts_with(':') {
                // Comment (heartbeat), skipped.
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data_lines
                    .push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
            // Other fields (event:, id:, retry:) carry no payload; message
            // classification lives in the pipeline core.
        }
        payloads
    }
}
