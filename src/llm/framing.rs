// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Incremental frame decoding for streamed response bodies
//!
//! Network chunks are split on `\n` over a byte buffer that survives between
//! chunks, so a JSON object (or a UTF-8 sequence) cut in half by the network
//! is reassembled before it is handed on.

const EVENT_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// How a response body is divided into frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `data: <json>` lines terminated by a `data: [DONE]` sentinel
    EventStream,
    /// One JSON object per non-blank line
    NewlineDelimited,
}

/// A decoded unit of the body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Raw JSON text of one frame
    Payload(String),
    /// The end-of-stream sentinel; nothing after it is read
    EndOfStream,
}

/// Stateful line splitter + frame classifier
#[derive(Debug)]
pub struct FrameDecoder {
    framing: Framing,
    buffer: Vec<u8>,
    finished: bool,
}

impl FrameDecoder {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            buffer: Vec::new(),
            finished: false,
        }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// True once the sentinel has been produced
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one network chunk and return every complete frame it closed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        if self.finished {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        // One pass over the buffer; consumed lines are drained once at the end.
        let mut buffer = std::mem::take(&mut self.buffer);
        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            let done = self.classify_into(&buffer[start..end], &mut frames);
            start = end + 1;
            if done {
                return frames;
            }
        }
        buffer.drain(..start);
        self.buffer = buffer;
        frames
    }

    /// Decode whatever is left once the body ends without a trailing newline.
    pub fn finish(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        if !self.finished && !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.classify_into(&rest, &mut frames);
        }
        frames
    }

    /// Returns true when the line was the end-of-stream sentinel.
    fn classify_into(&mut self, raw: &[u8], frames: &mut Vec<Frame>) -> bool {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim_end_matches('\r');

        match self.framing {
            Framing::NewlineDelimited => {
                if !line.trim().is_empty() {
                    frames.push(Frame::Payload(line.trim().to_string()));
                }
                false
            }
            Framing::EventStream => {
                let Some(data) = line.strip_prefix(EVENT_PREFIX) else {
                    // Blank separators, `:` comments and `event:` lines carry no payload.
                    return false;
                };
                let data = data.trim();
                if data == DONE_SENTINEL {
                    self.finished = true;
                    frames.push(Frame::EndOfStream);
                    return true;
                }
                if !data.is_empty() {
                    frames.push(Frame::Payload(data.to_string()));
                }
                false
            }
        }
    }
}

/// Parse a frame and read the provider-specific token path.
///
/// Returns `None` for malformed JSON, a missing path, or empty text; callers
/// skip such frames without ending the stream.
pub fn extract_token(payload: &str, pointer: &str) -> Option<String> {
    let value: serde_json::Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            tracing::trace!(error = %e, "skipping malformed frame");
            return None;
        }
    };
    value
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
