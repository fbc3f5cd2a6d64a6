use log::debug;
use serde_json::Value;

pub const DATA_PREFIX: &str = "data: ";
pub const DONE_SENTINEL: &str = "[DONE]";

/// One decoded event from the workflow service's streaming response.
///
/// Chunks are immutable and kept in arrival order. The service may repeat
/// payloads across chunks; the decoder does not deduplicate.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Incremental text fragment (`event: text_chunk`, payload at `data.text`).
    TextDelta { text: String },
    /// A single workflow node completed (`data.outputs` carried along).
    NodeFinished { outputs: Value },
    /// The whole workflow completed. Its `data.outputs` is authoritative.
    WorkflowFinished { outputs: Value },
    /// End-of-stream marker. `finished` is true only when the frame was a
    /// `done` event object carrying `data.finished: true`; the bare
    /// `[DONE]` sentinel has no payload.
    DoneMarker { finished: bool },
    /// Explicit service-side failure. Aborts the current attempt.
    ErrorEvent { message: String },
    /// Any other event value. Stored but not specially interpreted.
    Unknown { event: String, data: Value },
}

impl StreamChunk {
    /// The `outputs` object this chunk carries, if any. `Unknown` chunks
    /// keep the raw frame, so the usual `data.outputs` path is probed.
    pub fn outputs(&self) -> Option<&Value> {
        match self {
            StreamChunk::NodeFinished { outputs } | StreamChunk::WorkflowFinished { outputs } => {
                Some(outputs)
            }
            StreamChunk::Unknown { data, .. } => data.pointer("/data/outputs"),
            _ => None,
        }
    }
}

/// Decode one line of the response body into a chunk.
///
/// Returns `None` for blank lines and for anything that cannot be decoded:
/// partial frames at network-chunk boundaries are expected, so a corrupt
/// line must never abort an otherwise healthy stream.
pub fn decode_line(line: &str) -> Option<StreamChunk> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Non-prefixed lines are attempted as raw JSON below; garbled frames
    // fall through and are dropped either way.
    let payload = trimmed.strip_prefix(DATA_PREFIX).unwrap_or(trimmed).trim();
    if payload.is_empty() || payload == "null" {
        return None;
    }
    if payload == DONE_SENTINEL {
        return Some(StreamChunk::DoneMarker { finished: false });
    }

    let value: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            debug!("dropping undecodable frame: {} ({})", e, payload);
            return None;
        }
    };

    Some(classify(value))
}

fn classify(value: Value) -> StreamChunk {
    let event = value
        .get("event")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    match event.as_str() {
        "text_chunk" => StreamChunk::TextDelta {
            text: value
                .pointer("/data/text")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
        },
        "node_finished" => StreamChunk::NodeFinished {
            outputs: value
                .pointer("/data/outputs")
                .cloned()
                .unwrap_or(Value::Null),
        },
        "workflow_finished" => StreamChunk::WorkflowFinished {
            outputs: value
                .pointer("/data/outputs")
                .cloned()
                .unwrap_or(Value::Null),
        },
        "done" => StreamChunk::DoneMarker {
            finished: value
                .pointer("/data/finished")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        },
        "error" => StreamChunk::ErrorEvent {
            message: value
                .pointer("/data/message")
                .or_else(|| value.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("unspecified error")
                .to_string(),
        },
        _ => StreamChunk::Unknown { event, data: value },
    }
}

/// Reassembles newline-delimited frames out of arbitrary network chunks.
///
/// One decoder instance is owned by one streaming call and consumed once.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    buf: Vec<u8>,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk; returns every chunk whose frame completed.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamChunk> {
        self.buf.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            out.extend(Self::decode_bytes(&line[..line.len() - 1]));
        }
        out
    }

    /// Flush a trailing unterminated line once the stream ends.
    pub fn finish(&mut self) -> Option<StreamChunk> {
        if self.buf.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buf);
        Self::decode_bytes(&line)
    }

    fn decode_bytes(line: &[u8]) -> Option<StreamChunk> {
        match std::str::from_utf8(line) {
            Ok(s) => decode_line(s),
            Err(e) => {
                debug!("dropping frame with invalid encoding: {}", e);
                None
            }
        }
    }
}
