use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::matcher::catalog::{ItunesCatalog, SpotifyCatalog, YoutubeSearch};
use crate::matcher::{EpisodeMatcher, MatchWeights, PairThresholds};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Article store (PostgREST-style API)
    pub store: StoreConfig,

    /// LLM provider settings
    pub llm: LlmConfig,

    /// Cross-platform episode matching
    pub matcher: MatcherConfig,

    /// Orchestration settings
    pub pipeline: PipelineConfig,

    /// Backoff for external calls
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the table API, without the /rest/v1 suffix
    pub base_url: String,

    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible endpoint base URL
    pub base_url: String,

    pub api_key: String,

    /// Per-request timeout; LLM calls run long on full transcripts
    pub timeout_secs: u64,

    /// Workflow/model ids keyed by `channel.language` or plain `language`
    pub workflows: HashMap<String, String>,

    /// Workflow used when no key matches
    pub default_workflow: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    pub title_weight: f64,
    pub show_weight: f64,
    pub duration_weight: f64,

    /// Acceptance threshold between two catalog platforms
    pub catalog_threshold: f64,

    /// Acceptance threshold between a catalog and a video platform
    pub video_threshold: f64,

    /// Candidates requested per search
    pub search_limit: usize,

    pub youtube_api_key: String,
    pub spotify_client_id: String,
    pub spotify_client_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Concurrent LLM chunk calls per batch
    pub chunk_concurrency: usize,

    /// Time window for transcript chunking, in seconds
    pub polish_window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                base_url: String::new(),
                api_key: String::new(),
            },
            llm: LlmConfig {
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: String::new(),
                timeout_secs: 600,
                workflows: HashMap::new(),
                default_workflow: "gpt-4o-mini".to_string(),
            },
            matcher: MatcherConfig {
                title_weight: 0.5,
                show_weight: 0.3,
                duration_weight: 0.2,
                catalog_threshold: 0.8,
                video_threshold: 0.5,
                search_limit: 5,
                youtube_api_key: String::new(),
                spotify_client_id: String::new(),
                spotify_client_secret: String::new(),
            },
            pipeline: PipelineConfig {
                chunk_concurrency: 15,
                polish_window_secs: 420,
            },
            retry: RetryConfig {
                max_retries: 5,
                base_delay_secs: 1,
                max_delay_secs: 30,
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content =
                fs_err::read_to_string(&config_path).context("Failed to read config file")?;

            let config: Config =
                serde_yaml::from_str(&content).context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<std::path::PathBuf> {
        // First try current directory for easy testing
        let local_config = std::path::PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("keepup").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.store.base_url.is_empty() {
            anyhow::bail!("store base URL must be configured");
        }
        if self.llm.base_url.is_empty() {
            anyhow::bail!("LLM base URL must be configured");
        }

        let sum = self.matcher.title_weight + self.matcher.show_weight + self.matcher.duration_weight;
        if (sum - 1.0).abs() > 1e-6 {
            anyhow::bail!("matcher weights must sum to 1, got {sum}");
        }

        if self.pipeline.chunk_concurrency == 0 {
            anyhow::bail!("chunk concurrency must be at least 1");
        }

        Ok(())
    }

    /// Display current configuration; secrets are masked
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Store URL: {}", self.store.base_url);
        println!("  LLM URL: {}", self.llm.base_url);
        println!("  Default Workflow: {}", self.llm.default_workflow);
        println!("  Workflows: {}", self.llm.workflows.len());
        println!("  Chunk Concurrency: {}", self.pipeline.chunk_concurrency);
        println!("  Polish Window: {}s", self.pipeline.polish_window_secs);
        println!("  Max Retries: {}", self.retry.max_retries);
        println!("  YouTube Key Set: {}", !self.matcher.youtube_api_key.is_empty());
        println!("  Spotify Creds Set: {}", !self.matcher.spotify_client_id.is_empty());
    }
}

impl MatcherConfig {
    /// Build the production matcher with the configured catalog clients
    pub fn build_matcher(
        &self,
        http: reqwest::Client,
        retry: RetryPolicy,
    ) -> Result<EpisodeMatcher> {
        let weights = MatchWeights::new(self.title_weight, self.show_weight, self.duration_weight)?;
        let thresholds = PairThresholds {
            catalog_to_catalog: self.catalog_threshold,
            catalog_to_video: self.video_threshold,
        };

        Ok(EpisodeMatcher::new(
            Box::new(ItunesCatalog::new(http.clone(), retry)),
            Box::new(SpotifyCatalog::new(
                http.clone(),
                self.spotify_client_id.clone(),
                self.spotify_client_secret.clone(),
                retry,
            )),
            Box::new(YoutubeSearch::new(
                http,
                self.youtube_api_key.clone(),
                retry,
            )),
            weights,
            thresholds,
            self.search_limit,
        ))
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_secs(self.base_delay_secs),
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}
