use crate::chunk::StreamChunk;
use crate::error::GenerationError;
use crate::stream::StreamState;
use log::debug;
use serde_json::Value;

/// Which priority rule produced the final text. Returned to the caller so
/// tests and callers can assert which path fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionRule {
    /// `workflow_finished` terminal carried a non-empty `outputs.result` string.
    WorkflowResult,
    /// Same field, but list-shaped; serialized to JSON text.
    WorkflowResultList,
    /// A lower-ranked terminal chunk carried `outputs.result`.
    TerminalResult,
    /// Concatenation of text deltas up to the last non-empty one.
    DeltaFallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub text: String,
    pub rule: ExtractionRule,
}

/// Pull the final Markdown answer out of an aggregated stream.
///
/// The service sometimes puts the authoritative result only in the terminal
/// event and sometimes only in the incremental deltas, so the rules are
/// tried in priority order. Exhausting them is an explicit failure; an
/// empty string is never returned silently.
pub fn extract(state: &StreamState) -> Result<Extraction, GenerationError> {
    if let Some(chunk) = state.terminal_chunk() {
        let workflow_terminal = matches!(chunk, StreamChunk::WorkflowFinished { .. });
        if let Some((text, list_shaped)) = result_field(chunk) {
            let rule = match (workflow_terminal, list_shaped) {
                (true, false) => ExtractionRule::WorkflowResult,
                (true, true) => ExtractionRule::WorkflowResultList,
                (false, _) => ExtractionRule::TerminalResult,
            };
            debug!("extracted result via {:?} ({} chars)", rule, text.chars().count());
            return Ok(Extraction { text, rule });
        }
    }

    if let Some(text) = delta_fallback(&state.chunks) {
        debug!(
            "extracted result via {:?} ({} chars)",
            ExtractionRule::DeltaFallback,
            text.chars().count()
        );
        return Ok(Extraction {
            text,
            rule: ExtractionRule::DeltaFallback,
        });
    }

    Err(GenerationError::Extraction)
}

/// `outputs.result` as text, with a flag telling whether the field was the
/// known list-shaped variant of the service.
fn result_field(chunk: &StreamChunk) -> Option<(String, bool)> {
    let result = chunk.outputs()?.get("result")?;
    match result {
        Value::String(s) if !s.is_empty() => Some((s.clone(), false)),
        Value::Array(_) => serde_json::to_string(result).ok().map(|s| (s, true)),
        _ => None,
    }
}

/// Concatenate delta payloads up to and including the last non-empty one.
fn delta_fallback(chunks: &[StreamChunk]) -> Option<String> {
    let last = chunks.iter().rposition(|c| match c {
        StreamChunk::TextDelta { text } => !text.is_empty(),
        _ => false,
    })?;

    let mut text = String::new();
    for chunk in &chunks[..=last] {
        if let StreamChunk::TextDelta { text: delta } = chunk {
            text.push_str(delta);
        }
    }
    Some(text)
}
