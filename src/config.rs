use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// The artifact types the workflow service can generate. Each kind maps to
/// its own workflow app (and API key) on the service side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    BasicSetting,
    Character,
    PlotDetail,
    Episode,
    Title,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::BasicSetting,
        ArtifactKind::Character,
        ArtifactKind::PlotDetail,
        ArtifactKind::Episode,
        ArtifactKind::Title,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::BasicSetting => "basic_setting",
            ArtifactKind::Character => "character",
            ArtifactKind::PlotDetail => "plot_detail",
            ArtifactKind::Episode => "episode",
            ArtifactKind::Title => "title",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        ArtifactKind::ALL.iter().copied().find(|k| k.as_str() == s)
    }
}

/// Per-artifact workflow settings. One entry per `ArtifactKind`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WorkflowConfig {
    pub api_key: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Base URL of the workflow service, e.g. "https://api.dify.example".
    pub base_url: String,

    /// Value sent as the `user` field of workflow runs.
    #[serde(default = "default_user")]
    pub user: String,

    /// Caller-owned request-level timeout. The aggregator itself has no
    /// internal timers.
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,

    #[serde(default = "default_retry_count")]
    pub retry_count: usize,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,

    /// Keyed by artifact kind; replaces the hardcoded per-artifact key
    /// constants of earlier revisions.
    pub workflows: HashMap<ArtifactKind, WorkflowConfig>,
}

fn default_user() -> String {
    "saga-pipeline".to_string()
}
fn default_timeout() -> u64 {
    300
}
fn default_retry_count() -> usize {
    2
}
fn default_retry_delay() -> u64 {
    5
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from("config.yml")
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            bail!("{} not found. Please create one.", path.display());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Validate at startup so a missing key fails the process, not the
    /// first generation request hours later.
    pub fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            bail!("base_url must be an http(s) URL, got '{}'", self.base_url);
        }
        for kind in ArtifactKind::ALL {
            let workflow = self
                .workflows
                .get(&kind)
                .with_context(|| format!("workflows.{} is missing", kind.as_str()))?;
            if workflow.api_key.trim().is_empty() {
                bail!("workflows.{}.api_key is empty", kind.as_str());
            }
        }
        Ok(())
    }

    pub fn workflow(&self, kind: ArtifactKind) -> Result<&WorkflowConfig> {
        self.workflows
            .get(&kind)
            .with_context(|| format!("no workflow configured for {}", kind.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_yaml() -> String {
        let mut yaml = String::from("base_url: https://api.dify.example\n");
        yaml.push_str("workflows:\n");
        for kind in ArtifactKind::ALL {
            yaml.push_str(&format!(
                "  {}:\n    api_key: app-{}\n",
                kind.as_str(),
                kind.as_str()
            ));
        }
        yaml
    }

    #[test]
    fn test_load_from_file_with_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.yml");
        fs::write(&path, full_yaml())?;

        let config = Config::load_from(&path)?;
        config.validate()?;
        assert_eq!(config.base_url, "https://api.dify.example");
        assert_eq!(config.retry_count, 2);
        assert_eq!(config.retry_delay_seconds, 5);
        assert_eq!(config.request_timeout_seconds, 300);
        assert_eq!(
            config.workflow(ArtifactKind::Episode)?.api_key,
            "app-episode"
        );
        Ok(())
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Config::load_from("/nonexistent/config.yml").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_validate_rejects_missing_workflow() {
        let yaml =
            "base_url: https://api.dify.example\nworkflows:\n  title:\n    api_key: app-title\n";
        let config: Config = serde_yaml_ng::from_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("is missing"));
    }

    #[test]
    fn test_validate_rejects_empty_key() {
        let yaml = full_yaml().replace("app-episode", "\"\"");
        let config: Config = serde_yaml_ng::from_str(&yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("api_key is empty"));
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let yaml = full_yaml().replace("https://api.dify.example", "dify.example");
        let config: Config = serde_yaml_ng::from_str(&yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_artifact_kind_parse_round_trip() {
        for kind in ArtifactKind::ALL {
            assert_eq!(ArtifactKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ArtifactKind::parse("poem"), None);
    }
}
