use crate::chunk::{ChunkDecoder, StreamChunk};
use crate::error::GenerationError;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use log::debug;
use std::pin::Pin;

/// Byte stream of one streaming workflow call.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, GenerationError>> + Send>>;

/// Precedence of terminal-chunk candidates. A higher rank always wins;
/// equal rank is resolved in favor of the later chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TerminalRank {
    NodeFinished,
    DoneFinished,
    WorkflowFinished,
}

/// Aggregation state owned by exactly one streaming call.
///
/// Created empty, mutated chunk by chunk, discarded once the call returns.
/// A retry never reuses this; it starts over from an empty state.
#[derive(Debug, Default)]
pub struct StreamState {
    /// Text deltas concatenated in arrival order. The only order-sensitive
    /// mutation in the pipeline.
    pub accumulated_text: String,
    /// The current authoritative-result candidate, if any.
    pub terminal: Option<(TerminalRank, StreamChunk)>,
    /// Full history, kept because extraction may need to fall back to
    /// scanning all text deltas.
    pub chunks: Vec<StreamChunk>,
}

impl StreamState {
    /// Record one chunk. Returns true when aggregation may stop early.
    fn observe(&mut self, chunk: StreamChunk) -> bool {
        if let StreamChunk::TextDelta { text } = &chunk {
            self.accumulated_text.push_str(text);
        }

        let rank = match &chunk {
            StreamChunk::WorkflowFinished { .. } => Some(TerminalRank::WorkflowFinished),
            StreamChunk::DoneMarker { finished: true } => Some(TerminalRank::DoneFinished),
            StreamChunk::NodeFinished { .. } => Some(TerminalRank::NodeFinished),
            _ => None,
        };

        if let Some(rank) = rank {
            let replace = match &self.terminal {
                Some((current, _)) => rank >= *current,
                None => true,
            };
            if replace {
                self.terminal = Some((rank, chunk.clone()));
            }
        }

        self.chunks.push(chunk);
        matches!(self.terminal, Some((TerminalRank::WorkflowFinished, _)))
    }

    /// The terminal chunk itself, without its rank.
    pub fn terminal_chunk(&self) -> Option<&StreamChunk> {
        self.terminal.as_ref().map(|(_, c)| c)
    }
}

/// Consume a streaming response body to completion (or until the workflow
/// unambiguously finished) and return the aggregated state.
///
/// An explicit `error` event aborts immediately with a typed failure;
/// decode-level garbage is dropped inside the decoder.
pub async fn aggregate(mut stream: ByteStream) -> Result<StreamState, GenerationError> {
    let mut decoder = ChunkDecoder::new();
    let mut state = StreamState::default();

    'read: while let Some(item) = stream.next().await {
        let bytes = item?;
        for chunk in decoder.feed(&bytes) {
            if let StreamChunk::ErrorEvent { message } = chunk {
                return Err(GenerationError::Stream { message });
            }
            if state.observe(chunk) {
                // Authoritative result seen; dropping the connection stops
                // further chunk delivery.
                break 'read;
            }
        }
    }

    if let Some(chunk) = decoder.finish() {
        if let StreamChunk::ErrorEvent { message } = chunk {
            return Err(GenerationError::Stream { message });
        }
        state.observe(chunk);
    }

    debug!(
        "stream aggregated: {} chunks, {} delta chars, terminal {:?}",
        state.chunks.len(),
        state.accumulated_text.chars().count(),
        state.terminal.as_ref().map(|(rank, _)| rank)
    );
    Ok(state)
}

#[cfg(test)]
pub(crate) fn bytes_stream_from(frames: Vec<&str>) -> ByteStream {
    let owned: Vec<Result<Bytes, GenerationError>> = frames
        .into_iter()
        .map(|f| Ok(Bytes::from(f.to_string())))
        .collect();
    Box::pin(futures_util::stream::iter(owned))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_frame(text: &str) -> String {
        format!("data: {{\"event\": \"text_chunk\", \"data\": {{\"text\": \"{}\"}}}}\n", text)
    }

    #[tokio::test]
    async fn test_deltas_accumulate_in_arrival_order() {
        let body = format!("{}{}{}", delta_frame("春は"), delta_frame("あけぼの"), "data: [DONE]\n");
        let state = aggregate(bytes_stream_from(vec![&body])).await.unwrap();
        assert_eq!(state.accumulated_text, "春はあけぼの");
        assert_eq!(state.chunks.len(), 3);
    }

    #[tokio::test]
    async fn test_workflow_finished_overrides_node_finished() {
        let body = concat!(
            "data: {\"event\": \"node_finished\", \"data\": {\"outputs\": {\"result\": \"partial\"}}}\n",
            "data: {\"event\": \"workflow_finished\", \"data\": {\"outputs\": {\"result\": \"final\"}}}\n",
        );
        let state = aggregate(bytes_stream_from(vec![body])).await.unwrap();
        match state.terminal_chunk() {
            Some(StreamChunk::WorkflowFinished { outputs }) => {
                assert_eq!(outputs["result"], "final");
            }
            other => panic!("unexpected terminal: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_later_node_finished_wins_at_equal_rank() {
        let body = concat!(
            "data: {\"event\": \"node_finished\", \"data\": {\"outputs\": {\"result\": \"first\"}}}\n",
            "data: {\"event\": \"node_finished\", \"data\": {\"outputs\": {\"result\": \"second\"}}}\n",
        );
        let state = aggregate(bytes_stream_from(vec![body])).await.unwrap();
        match state.terminal_chunk() {
            Some(StreamChunk::NodeFinished { outputs }) => {
                assert_eq!(outputs["result"], "second");
            }
            other => panic!("unexpected terminal: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_done_with_flag_outranks_node_finished() {
        let body = concat!(
            "data: {\"event\": \"done\", \"data\": {\"finished\": true}}\n",
            "data: {\"event\": \"node_finished\", \"data\": {\"outputs\": {}}}\n",
        );
        let state = aggregate(bytes_stream_from(vec![body])).await.unwrap();
        assert!(matches!(
            state.terminal,
            Some((TerminalRank::DoneFinished, _))
        ));
    }

    #[tokio::test]
    async fn test_bare_done_sentinel_is_not_terminal() {
        let state = aggregate(bytes_stream_from(vec!["data: [DONE]\n"]))
            .await
            .unwrap();
        assert!(state.terminal.is_none());
        assert_eq!(state.chunks.len(), 1);
    }

    #[tokio::test]
    async fn test_error_event_aborts_aggregation() {
        let body = concat!(
            "data: {\"event\": \"text_chunk\", \"data\": {\"text\": \"x\"}}\n",
            "data: {\"event\": \"error\", \"data\": {\"message\": \"workflow crashed\"}}\n",
        );
        let err = aggregate(bytes_stream_from(vec![body])).await.unwrap_err();
        match err {
            GenerationError::Stream { message } => assert_eq!(message, "workflow crashed"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stops_early_after_workflow_finished() {
        let body = concat!(
            "data: {\"event\": \"workflow_finished\", \"data\": {\"outputs\": {\"result\": \"done\"}}}\n",
            "data: {\"event\": \"error\", \"data\": {\"message\": \"never read\"}}\n",
        );
        // Both frames arrive in one network chunk, but the error sits after
        // the authoritative result and is never observed.
        let state = aggregate(bytes_stream_from(vec![body])).await.unwrap();
        assert_eq!(state.chunks.len(), 1);
    }

    #[tokio::test]
    async fn test_frames_split_across_network_chunks() {
        let state = aggregate(bytes_stream_from(vec![
            "data: {\"event\": \"text_chunk\", \"da",
            "ta\": {\"text\": \"ab\"}}\ndata: [DONE]\n",
        ]))
        .await
        .unwrap();
        assert_eq!(state.accumulated_text, "ab");
    }
}
