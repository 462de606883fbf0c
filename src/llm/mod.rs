//! LLM summarization collaborator.
//!
//! The pipeline only depends on the `Summarizer` trait; the default
//! implementation is an OpenAI-compatible chat client. Callers are required
//! to validate minimum output length — a too-short completion is a hard
//! failure for that language/artifact, never silently accepted.

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::resolver::ContentChannel;
use crate::Result;

/// Minimum acceptable output: characters for CJK text, words otherwise
const MIN_OUTPUT_UNITS: usize = 100;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Run one prompt over the content, selecting the provider-side workflow
    async fn summarize(&self, workflow_id: &str, prompt: &str, content: &str) -> Result<String>;
}

/// OpenAI-compatible chat-completion client
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl ChatClient {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Result<Self> {
        // LLM calls run for minutes on long transcripts
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build LLM HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl Summarizer for ChatClient {
    async fn summarize(&self, workflow_id: &str, prompt: &str, content: &str) -> Result<String> {
        let request = ChatRequest {
            model: workflow_id,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompt,
                },
                ChatMessage {
                    role: "user",
                    content,
                },
            ],
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()
            .context("LLM call failed")?;

        let body: ChatResponse = response.json().await?;
        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("LLM returned no completion"))?;
        Ok(text)
    }
}

/// Maps (content channel, language) to a provider workflow/model id
#[derive(Debug, Clone, Default)]
pub struct WorkflowSelector {
    workflows: HashMap<String, String>,
    fallback: String,
}

impl WorkflowSelector {
    pub fn new(workflows: HashMap<String, String>, fallback: String) -> Self {
        Self {
            workflows,
            fallback,
        }
    }

    /// Lookup order: `channel.language`, then `language`, then the fallback
    pub fn workflow_id(&self, channel: ContentChannel, language: &str) -> &str {
        let keyed = format!("{}.{}", channel.as_str(), language);
        self.workflows
            .get(&keyed)
            .or_else(|| self.workflows.get(language))
            .unwrap_or(&self.fallback)
    }
}

/// Reject LLM output below the minimum length.
///
/// CJK text is measured in non-whitespace characters; space-delimited text in
/// words. The threshold is 100 units either way.
pub fn validate_min_length(text: &str) -> Result<()> {
    let units = if contains_cjk(text) {
        text.chars().filter(|c| !c.is_whitespace()).count()
    } else {
        text.split_whitespace().count()
    };

    if units < MIN_OUTPUT_UNITS {
        return Err(crate::IngestError::OutputTooShort(format!(
            "{units} units, minimum is {MIN_OUTPUT_UNITS}"
        ))
        .into());
    }
    Ok(())
}

fn contains_cjk(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c as u32,
            0x4E00..=0x9FFF      // CJK unified ideographs
            | 0x3400..=0x4DBF    // extension A
            | 0x3040..=0x30FF    // hiragana + katakana
            | 0xAC00..=0xD7AF    // hangul syllables
        )
    })
}
