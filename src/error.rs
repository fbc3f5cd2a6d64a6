use thiserror::Error;

/// Failure modes of one generation attempt.
///
/// Decode-level problems (garbled frames, bad UTF-8) never show up here;
/// they are logged and dropped inside the decoder. Only errors that end
/// the attempt are surfaced.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The service emitted an explicit `error` event mid-stream.
    #[error("workflow stream reported an error: {message}")]
    Stream { message: String },

    /// Transport failure while opening or reading the streaming response.
    #[error("workflow request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service rejected the request outright.
    #[error("workflow request rejected with status {status}: {body}")]
    Request { status: u16, body: String },

    /// Every extraction rule came up empty.
    #[error("no usable result found in workflow stream")]
    Extraction,

    /// The generated text produced zero entities even under the fallback
    /// split. A content-generation failure, not a parser bug.
    #[error("expected {expected} entities but the generated text yielded none")]
    Split { expected: usize },
}

impl GenerationError {
    /// Whether a fresh attempt against the service could plausibly succeed.
    /// `Split` is excluded: the caller decides how to handle bad content.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationError::Stream { .. }
                | GenerationError::Http(_)
                | GenerationError::Request { .. }
                | GenerationError::Extraction
        )
    }
}
