/// Incremental Server-Sent Events decoder.
///
/// Bytes are pushed as they arrive; consecutive `data:` lines are joined until
/// a blank line ends the event.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data_acc: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every event payload it completed.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let mut line = String::from_utf8_lossy(&raw[..pos]).into_owned();
            if line.ends_with('\r') {
                line.pop();
            }

            if line.is_empty() {
                if let Some(data) = self.data_acc.take() {
                    events.push(data);
                }
                continue;
            }

            if let Some(rest) = line.strip_prefix("data:") {
                let fragment = rest.strip_prefix(' ').unwrap_or(rest);
                match &mut self.data_acc {
                    Some(existing) => {
                        existing.push('\n');
                        existing.push_str(fragment);
                    }
                    None => self.data_acc = Some(fragment.to_string()),
                }
            }
        }
        events
    }

    /// Flushes an event left unterminated when the body ended.
    pub fn finish(&mut self) -> Option<String> {
        let tail = std::mem::take(&mut self.buffer);
        let tail = String::from_utf8_lossy(&tail);
        let tail = tail.trim_end_matches(['\r', '\n']);
        if let Some(rest) = tail.strip_prefix("data:") {
            let fragment = rest.strip_prefix(' ').unwrap_or(rest);
            match &mut self.data_acc {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(fragment);
                }
                None => self.data_acc = Some(fragment.to_string()),
            }
        }
        self.data_acc.take().filter(|data| !data.trim().is_empty())
    }
}
