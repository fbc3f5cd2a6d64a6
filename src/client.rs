use crate::config::{ArtifactKind, Config};
use crate::error::GenerationError;
use crate::stream::ByteStream;
use anyhow::Result;
use async_trait::async_trait;
use futures_util::StreamExt;
use log::debug;
use serde_json::{json, Value};
use std::time::Duration;

/// Seam between the pipeline and the network. Production code uses
/// `DifyClient`; tests substitute scripted byte streams.
#[async_trait]
pub trait WorkflowStreamer: Send + Sync {
    /// Open one streaming workflow run. The returned stream is consumed
    /// exactly once; dropping it closes the connection and stops chunk
    /// delivery.
    async fn run_workflow(&self, inputs: Value) -> Result<ByteStream, GenerationError>;
}

/// Client for one workflow app of the generation service. The artifact
/// kind discriminator selects the API key from the injected configuration;
/// there is one client type for every artifact, not one type per artifact.
#[derive(Debug, Clone)]
pub struct DifyClient {
    base_url: String,
    api_key: String,
    user: String,
    kind: ArtifactKind,
    client: reqwest::Client,
}

impl DifyClient {
    pub fn new(config: &Config, kind: ArtifactKind) -> Result<Self> {
        let workflow = config.workflow(kind)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: workflow.api_key.clone(),
            user: config.user.clone(),
            kind,
            client,
        })
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }
}

#[async_trait]
impl WorkflowStreamer for DifyClient {
    async fn run_workflow(&self, inputs: Value) -> Result<ByteStream, GenerationError> {
        let url = format!("{}/v1/workflows/run", self.base_url);
        let body = json!({
            "inputs": inputs,
            "response_mode": "streaming",
            "user": self.user,
        });

        debug!("starting {} workflow run", self.kind.as_str());
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerationError::Request { status, body });
        }

        let stream = resp
            .bytes_stream()
            .map(|item| item.map_err(GenerationError::from));
        Ok(Box::pin(stream))
    }
}
