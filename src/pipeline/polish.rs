//! Subtitle-polish batch.
//!
//! Long transcripts are split into fixed time windows keyed off the
//! `[HH:MM:SS]` line stamps, polished concurrently under a bounded gate, and
//! reassembled in original order before being stored as one section.

use std::sync::Arc;

use anyhow::Context;
use regex::Regex;
use tokio::sync::Semaphore;

use super::{LanguageTaskResult, Orchestrator, TaskKind, SECTION_SUBTITLE, SKIP_LANGUAGE};
use crate::llm::Summarizer;
use crate::retry::{retry_all, retry_with_policy, RetryPolicy};
use crate::store::NewSection;
use crate::timecode::parse_timestamp;
use crate::Result;

const SUBTITLE_SORT_ORDER: i32 = 400;

impl Orchestrator {
    pub(crate) async fn subtitle_batch(
        &self,
        request_id: i64,
        content: &str,
        languages: &[String],
    ) -> Vec<LanguageTaskResult> {
        if languages.iter().any(|l| l == SKIP_LANGUAGE) {
            return vec![LanguageTaskResult::skipped(TaskKind::Subtitle)];
        }

        let mut results = Vec::with_capacity(languages.len());
        for language in languages {
            let outcome = self
                .steps
                .with_step(request_id, "subtitle", || {
                    self.polish_language(request_id, content, language)
                })
                .await;
            results.push(LanguageTaskResult::from_result(
                TaskKind::Subtitle,
                language,
                outcome,
            ));
        }
        results
    }

    async fn polish_language(
        &self,
        request_id: i64,
        content: &str,
        language: &str,
    ) -> Result<String> {
        let ctx = self.task_context(request_id).await?;
        let workflow = self.workflows.workflow_id(ctx.channel, language).to_string();
        let prompt = polish_prompt(language);

        let chunks = split_into_windows(content, self.options.polish_window_secs);
        let chunk_count = chunks.len();
        let polished = run_gated_chunks(
            self.llm.clone(),
            &workflow,
            &prompt,
            chunks,
            self.options.chunk_gate,
            self.options.retry,
        )
        .await?;

        self.store
            .delete_sections(ctx.article_id, SECTION_SUBTITLE, language)
            .await?;
        self.store
            .create_sections(
                ctx.article_id,
                &[NewSection {
                    section_type: SECTION_SUBTITLE.to_string(),
                    content: polished.join("\n\n"),
                    language: language.to_string(),
                    sort_order: SUBTITLE_SORT_ORDER,
                }],
            )
            .await?;

        Ok(format!(
            "{language} subtitle polished across {chunk_count} chunks"
        ))
    }
}

fn polish_prompt(language: &str) -> String {
    format!(
        "Polish the following transcript segment into fluent, readable \
         {language} subtitles. Fix recognition errors and punctuation but \
         keep every timestamp marker unchanged."
    )
}

/// Split timestamped content into fixed time windows.
///
/// Lines without a leading stamp stick to the window of the preceding
/// stamped line; content with no stamps at all becomes a single window.
pub(crate) fn split_into_windows(content: &str, window_secs: u64) -> Vec<String> {
    let stamp = Regex::new(r"^\[(\d{1,2}:\d{2}:\d{2})\]").expect("static regex");
    let window_secs = window_secs.max(1);

    let mut windows: Vec<(u64, String)> = Vec::new();
    for line in content.lines() {
        let bucket = stamp
            .captures(line)
            .and_then(|c| parse_timestamp(&c[1]))
            .map(|secs| secs / window_secs);
        match (bucket, windows.last_mut()) {
            (Some(b), Some((current, text))) if *current == b => {
                text.push('\n');
                text.push_str(line);
            }
            (Some(b), _) => windows.push((b, line.to_string())),
            (None, Some((_, text))) => {
                text.push('\n');
                text.push_str(line);
            }
            (None, None) => windows.push((0, line.to_string())),
        }
    }
    windows.into_iter().map(|(_, text)| text).collect()
}

/// Run one LLM call per chunk under a bounded concurrency gate and
/// reassemble the outputs in the chunks' original order.
pub(crate) async fn run_gated_chunks(
    llm: Arc<dyn Summarizer>,
    workflow: &str,
    prompt: &str,
    chunks: Vec<String>,
    gate: usize,
    retry: RetryPolicy,
) -> Result<Vec<String>> {
    let semaphore = Arc::new(Semaphore::new(gate.max(1)));
    let mut handles = Vec::with_capacity(chunks.len());

    for (index, chunk) in chunks.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let llm = llm.clone();
        let workflow = workflow.to_string();
        let prompt = prompt.to_string();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .context("chunk gate closed")?;
            let text = retry_with_policy(retry, retry_all, || {
                llm.summarize(&workflow, &prompt, &chunk)
            })
            .await
            .with_context(|| format!("chunk {index} failed"))?;
            Ok::<_, anyhow::Error>((index, text))
        }));
    }

    let joined = futures_util::future::try_join_all(handles)
        .await
        .context("chunk task panicked")?;
    let mut indexed = joined.into_iter().collect::<Result<Vec<_>>>()?;
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, text)| text).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 0,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_windows_split_on_fixed_time_boundaries() {
        let content = "[00:00:05] early\n\
                       continuation without stamp\n\
                       [00:03:00] still first window\n\
                       [00:07:30] second window\n\
                       [00:14:10] third window";
        let windows = split_into_windows(content, 420);

        assert_eq!(windows.len(), 3);
        assert!(windows[0].contains("early"));
        assert!(windows[0].contains("continuation without stamp"));
        assert!(windows[0].contains("still first window"));
        assert_eq!(windows[1], "[00:07:30] second window");
        assert_eq!(windows[2], "[00:14:10] third window");
    }

    #[test]
    fn test_unstamped_content_becomes_single_window() {
        let windows = split_into_windows("plain article text\nsecond line", 420);
        assert_eq!(windows, vec!["plain article text\nsecond line"]);
    }

    /// Echoes its input after a delay inverse to the chunk index, so later
    /// chunks finish first and reassembly order is actually exercised
    #[derive(Default)]
    struct SlowEcho {
        inflight: AtomicUsize,
        max_inflight: AtomicUsize,
    }

    #[async_trait]
    impl Summarizer for SlowEcho {
        async fn summarize(&self, _workflow: &str, _prompt: &str, content: &str) -> Result<String> {
            let now = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_inflight.fetch_max(now, Ordering::SeqCst);

            let index: u64 = content.trim_start_matches("chunk-").parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis((24 - index) * 3)).await;

            self.inflight.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("polished {content}"))
        }
    }

    #[tokio::test]
    async fn test_chunks_reassemble_in_order_under_bounded_gate() {
        let echo = Arc::new(SlowEcho::default());
        let llm: Arc<dyn Summarizer> = echo.clone();
        let chunks: Vec<String> = (0..20).map(|i| format!("chunk-{i}")).collect();

        let outputs = run_gated_chunks(llm, "wf", "prompt", chunks, 4, fast_retry())
            .await
            .unwrap();

        let expected: Vec<String> = (0..20).map(|i| format!("polished chunk-{i}")).collect();
        assert_eq!(outputs, expected);
        assert!(echo.max_inflight.load(Ordering::SeqCst) <= 4);
    }

    struct FailOnThird;

    #[async_trait]
    impl Summarizer for FailOnThird {
        async fn summarize(&self, _workflow: &str, _prompt: &str, content: &str) -> Result<String> {
            if content == "chunk-3" {
                anyhow::bail!("provider rejected segment")
            }
            Ok(content.to_string())
        }
    }

    #[tokio::test]
    async fn test_single_chunk_failure_fails_the_whole_reassembly() {
        let chunks: Vec<String> = (0..5).map(|i| format!("chunk-{i}")).collect();
        let result = run_gated_chunks(
            Arc::new(FailOnThird),
            "wf",
            "prompt",
            chunks,
            4,
            fast_retry(),
        )
        .await;

        let err = format!("{:#}", result.unwrap_err());
        assert!(err.contains("chunk 3"));
    }
}
