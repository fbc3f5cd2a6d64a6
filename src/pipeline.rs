use crate::client::WorkflowStreamer;
use crate::config::Config;
use crate::error::GenerationError;
use crate::extract::{extract, Extraction};
use crate::sectionize::{sectionize, ParsedDocument};
use crate::split::{split, Entity, EntityKind};
use crate::stream::aggregate;
use log::{debug, warn};
use serde_json::Value;
use tokio::time::{sleep, Duration};

/// Retry knobs for one generation operation. Each attempt starts from an
/// empty stream state; nothing is resumed across attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub count: usize,
    pub delay_seconds: u64,
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            count: 0,
            delay_seconds: 0,
        }
    }
}

impl From<&Config> for RetryPolicy {
    fn from(config: &Config) -> Self {
        Self {
            count: config.retry_count,
            delay_seconds: config.retry_delay_seconds,
        }
    }
}

/// Run one workflow call end to end: decode, aggregate, extract.
pub async fn generate_markdown(
    streamer: &dyn WorkflowStreamer,
    inputs: Value,
) -> Result<Extraction, GenerationError> {
    let stream = streamer.run_workflow(inputs).await?;
    let state = aggregate(stream).await?;
    extract(&state)
}

/// Generate an artifact and parse it into its named sections.
pub async fn generate_and_parse_document(
    streamer: &dyn WorkflowStreamer,
    inputs: Value,
) -> Result<ParsedDocument, GenerationError> {
    let extraction = generate_markdown(streamer, inputs).await?;
    debug!("parsing document extracted via {:?}", extraction.rule);
    Ok(sectionize(&extraction.text))
}

/// Generate an artifact and split it into numbered entities.
///
/// An empty split result is a content-generation failure and surfaces as
/// `GenerationError::Split`; the parser itself never fails.
pub async fn generate_and_split_entities(
    streamer: &dyn WorkflowStreamer,
    inputs: Value,
    expected_count: usize,
    kind: EntityKind,
) -> Result<Vec<Entity>, GenerationError> {
    let extraction = generate_markdown(streamer, inputs).await?;
    let outcome = split(&extraction.text, expected_count, kind);
    debug!(
        "split produced {} entities via {:?}",
        outcome.entities.len(),
        outcome.strategy
    );
    if outcome.entities.is_empty() {
        return Err(GenerationError::Split {
            expected: expected_count,
        });
    }
    Ok(outcome.entities)
}

/// Retried variant of [`generate_and_parse_document`].
pub async fn generate_and_parse_document_with_retry(
    streamer: &dyn WorkflowStreamer,
    inputs: &Value,
    retry: RetryPolicy,
) -> Result<ParsedDocument, GenerationError> {
    with_retry(retry, || generate_and_parse_document(streamer, inputs.clone())).await
}

/// Retried variant of [`generate_and_split_entities`].
pub async fn generate_and_split_entities_with_retry(
    streamer: &dyn WorkflowStreamer,
    inputs: &Value,
    expected_count: usize,
    kind: EntityKind,
    retry: RetryPolicy,
) -> Result<Vec<Entity>, GenerationError> {
    with_retry(retry, || {
        generate_and_split_entities(streamer, inputs.clone(), expected_count, kind)
    })
    .await
}

async fn with_retry<T, F, Fut>(retry: RetryPolicy, mut attempt: F) -> Result<T, GenerationError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, GenerationError>>,
{
    let mut last_error: Option<GenerationError> = None;
    for i in 0..=retry.count {
        if i > 0 {
            warn!(
                "generation failed (attempt {}/{}), retrying...",
                i,
                retry.count + 1
            );
            sleep(Duration::from_secs(retry.delay_seconds)).await;
        }
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => last_error = Some(e),
            Err(e) => return Err(e),
        }
    }
    Err(last_error.unwrap_or(GenerationError::Extraction))
}
