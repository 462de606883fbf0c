//! Orchestration engine.
//!
//! Drives one ingestion run end to end: resolve the URL, fetch content and
//! metadata through the strategy registry, persist, then fan out the
//! per-language derived-artifact tasks and finalize. A failure before the
//! fan-out marks the request failed; failures inside the fan-out are
//! captured as per-task outcomes and never cancel sibling tasks — the
//! request still finishes `processed`.

use std::sync::Arc;
use std::time::Duration;

use crate::fetcher::FetcherRegistry;
use crate::llm::{Summarizer, WorkflowSelector};
use crate::resolver::{is_local_path, ContentChannel, ContentResolver, Platform, Resolution};
use crate::retry::RetryPolicy;
use crate::steplog::StepLogger;
use crate::store::{ArticleStore, NewArticle, NewAuthor, NewRequest};
use crate::{Config, IngestError, Result};

pub mod detail;
pub mod polish;
pub mod summary;

pub use crate::store::RequestStatus;

/// Sentinel language that short-circuits an entire artifact batch
pub const SKIP_LANGUAGE: &str = "na";

pub const SECTION_SUMMARY: &str = "summary";
pub const SECTION_SUBTITLE: &str = "subtitle";
pub const SECTION_DETAIL: &str = "detail";

/// Kind of derived artifact produced per language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Summary,
    Subtitle,
    Detail,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Summary => "summary",
            TaskKind::Subtitle => "subtitle",
            TaskKind::Detail => "detail",
        }
    }
}

/// Outcome of one (language, artifact-kind) task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Success(String),
    Failure(String),
    Skipped,
}

#[derive(Debug, Clone)]
pub struct LanguageTaskResult {
    pub language: String,
    pub kind: TaskKind,
    pub outcome: TaskOutcome,
}

impl LanguageTaskResult {
    fn from_result(kind: TaskKind, language: &str, result: Result<String>) -> Self {
        let outcome = match result {
            Ok(message) => TaskOutcome::Success(message),
            Err(err) => TaskOutcome::Failure(format!("{err:#}")),
        };
        Self {
            language: language.to_string(),
            kind,
            outcome,
        }
    }

    fn skipped(kind: TaskKind) -> Self {
        Self {
            language: SKIP_LANGUAGE.to_string(),
            kind,
            outcome: TaskOutcome::Skipped,
        }
    }
}

/// Tri-state completion of one ingestion run.
///
/// Externally both succeeded states collapse to the `processed` request
/// status; the distinction is kept internally so callers can inspect which
/// artifacts failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    FullySucceeded,
    PartiallyFailed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct CompletionRecord {
    pub completion: Completion,
    pub results: Vec<LanguageTaskResult>,
    pub error: Option<String>,
}

impl CompletionRecord {
    pub fn from_results(results: Vec<LanguageTaskResult>) -> Self {
        let any_failed = results
            .iter()
            .any(|r| matches!(r.outcome, TaskOutcome::Failure(_)));
        Self {
            completion: if any_failed {
                Completion::PartiallyFailed
            } else {
                Completion::FullySucceeded
            },
            results,
            error: None,
        }
    }

    pub fn failed(message: String) -> Self {
        Self {
            completion: Completion::Failed,
            results: Vec::new(),
            error: Some(message),
        }
    }

    /// Status reported to the outside world
    pub fn external_status(&self) -> RequestStatus {
        match self.completion {
            Completion::Failed => RequestStatus::Failed,
            _ => RequestStatus::Processed,
        }
    }
}

/// One ingestion submission
#[derive(Debug, Clone)]
pub struct IngestSubmission {
    pub url: String,
    pub summary_languages: Vec<String>,
    pub subtitle_languages: Vec<String>,
    pub detailed_languages: Vec<String>,
}

/// Tuning knobs for the orchestrator
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorOptions {
    pub retry: RetryPolicy,
    /// Bounded concurrency gate for chunk-level sub-fan-out, scoped per batch
    pub chunk_gate: usize,
    /// Fixed time window for subtitle-polish chunking
    pub polish_window_secs: u64,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            chunk_gate: 15,
            polish_window_secs: 420,
        }
    }
}

/// Orchestration engine; owns the request for the duration of one run
pub struct Orchestrator {
    resolver: ContentResolver,
    fetchers: FetcherRegistry,
    store: Arc<dyn ArticleStore>,
    llm: Arc<dyn Summarizer>,
    workflows: WorkflowSelector,
    steps: StepLogger,
    options: OrchestratorOptions,
}

impl Orchestrator {
    pub fn new(
        resolver: ContentResolver,
        fetchers: FetcherRegistry,
        store: Arc<dyn ArticleStore>,
        llm: Arc<dyn Summarizer>,
        workflows: WorkflowSelector,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            resolver,
            fetchers,
            store,
            llm,
            workflows,
            steps: StepLogger::new(),
            options,
        }
    }

    /// Wire up the full production stack from a loaded config
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let retry = config.retry.to_policy();
        let matcher = Arc::new(config.matcher.build_matcher(http.clone(), retry)?);
        let resolver = ContentResolver::new(http.clone(), matcher);
        let fetchers = FetcherRegistry::new(http.clone());
        let store: Arc<dyn ArticleStore> = Arc::new(crate::store::rest::RestStore::new(
            http,
            config.store.base_url.clone(),
            config.store.api_key.clone(),
        ));
        let llm: Arc<dyn Summarizer> = Arc::new(crate::llm::ChatClient::new(
            config.llm.base_url.clone(),
            config.llm.api_key.clone(),
            Duration::from_secs(config.llm.timeout_secs),
        )?);
        let workflows = WorkflowSelector::new(
            config.llm.workflows.clone(),
            config.llm.default_workflow.clone(),
        );

        Ok(Self::new(
            resolver,
            fetchers,
            store,
            llm,
            workflows,
            OrchestratorOptions {
                retry,
                chunk_gate: config.pipeline.chunk_concurrency,
                polish_window_secs: config.pipeline.polish_window_secs,
            },
        ))
    }

    pub fn resolver(&self) -> &ContentResolver {
        &self.resolver
    }

    /// Run the whole pipeline for one submission.
    ///
    /// Hard failures before the fan-out mark the request `failed` and are
    /// reported through the completion record, never as `Err`; an `Err` here
    /// means even the initial request record could not be created.
    pub async fn process(&self, submission: &IngestSubmission) -> Result<CompletionRecord> {
        let request = self
            .store
            .create_request(&NewRequest {
                original_url: submission.url.clone(),
                resolved_url: None,
                platform: None,
            })
            .await?;
        let request_id = request.id;

        match self.run_pipeline(request_id, submission).await {
            Ok(record) => Ok(record),
            Err(err) => {
                let message = format!("{err:#}");
                self.steps.error(request_id, "pipeline", "ingestion failed", &err);
                // the status write is the outermost boundary; its own failure
                // is logged and swallowed so the process survives
                if let Err(store_err) = self
                    .store
                    .update_status(request_id, RequestStatus::Failed, Some(&message))
                    .await
                {
                    self.steps
                        .error(request_id, "finalize", "failed to record failure", &store_err);
                }
                Ok(CompletionRecord::failed(message))
            }
        }
    }

    async fn run_pipeline(
        &self,
        request_id: i64,
        submission: &IngestSubmission,
    ) -> Result<CompletionRecord> {
        self.store
            .update_status(request_id, RequestStatus::Processing, None)
            .await?;

        // 1. classify the URL
        let resolution = self
            .steps
            .with_step(request_id, "resolve", || self.resolve_input(&submission.url))
            .await?;
        self.store
            .update_resolution(request_id, resolution.platform, &resolution.resolved_url)
            .await?;

        // 2. mandatory metadata
        let url = resolution.resolved_url.clone();
        let metadata = self
            .steps
            .with_step(request_id, "metadata", || self.fetchers.fetch_metadata(&url))
            .await?
            .ok_or_else(|| IngestError::FetchFailed(format!("no metadata for {url}")))?;

        // 3. optional enrichments; a fault here degrades, never aborts
        let chapters = match self.fetchers.fetch_chapters(&url).await {
            Ok(chapters) => chapters,
            Err(err) => {
                self.steps
                    .error(request_id, "chapters", "chapter fetch failed, continuing", &err);
                None
            }
        };
        let author_id = self.upsert_author(request_id, &url).await;

        // 4. article record
        let article = self
            .store
            .create_article(&NewArticle {
                request_id,
                title: metadata.title.clone(),
                cover_url: metadata.cover_url.clone(),
                publish_date: metadata.publish_date,
                author_id,
                channel: resolution.platform.channel().as_str().to_string(),
            })
            .await?;

        // 5. mandatory transcript/content
        let content = self
            .steps
            .with_step(request_id, "content", || self.fetchers.fetch_content(&url))
            .await?
            .ok_or_else(|| IngestError::FetchFailed(format!("no content for {url}")))?;
        self.store.update_content(request_id, &content).await?;

        // 6. multilingual fan-out
        let results = self
            .run_multilingual_tasks(
                request_id,
                &content,
                chapters.as_deref(),
                &submission.summary_languages,
                &submission.subtitle_languages,
                &submission.detailed_languages,
            )
            .await;

        // 7. finalize: the request reads `processed` regardless of how many
        // fan-out tasks failed
        self.store.publish_article(article.id).await?;
        self.store
            .update_status(request_id, RequestStatus::Processed, None)
            .await?;

        Ok(CompletionRecord::from_results(results))
    }

    async fn resolve_input(&self, input: &str) -> Result<Resolution> {
        if is_local_path(input) {
            return Ok(Resolution::same_url(Platform::File, input));
        }
        self.resolver
            .resolve(input)
            .await?
            .ok_or_else(|| IngestError::ResolutionFailed(input.to_string()).into())
    }

    /// Look up or create the author record; failures only cost attribution
    async fn upsert_author(&self, request_id: i64, url: &str) -> Option<i64> {
        let author = match self.fetchers.fetch_author(url).await {
            Ok(Some(author)) => author,
            Ok(None) => return None,
            Err(err) => {
                self.steps
                    .error(request_id, "author", "author fetch failed, continuing", &err);
                return None;
            }
        };

        let existing = match self.store.find_author_by_name(&author.name).await {
            Ok(existing) => existing,
            Err(err) => {
                self.steps
                    .error(request_id, "author", "author lookup failed, continuing", &err);
                return None;
            }
        };
        if let Some(record) = existing {
            return Some(record.id);
        }

        match self
            .store
            .create_author(&NewAuthor {
                name: author.name,
                icon: author.icon,
                platform: author.platform,
            })
            .await
        {
            Ok(record) => Some(record.id),
            Err(err) => {
                self.steps
                    .error(request_id, "author", "author create failed, continuing", &err);
                None
            }
        }
    }

    /// Fan out the three artifact batches.
    ///
    /// Summary and subtitle run concurrently; the detail batch starts only
    /// after the summary batch settles. The barrier is kept deliberately from
    /// the source behavior even though detail does not consume the summary
    /// output. Every per-language error is captured as an outcome record and
    /// never cancels a sibling batch.
    pub async fn run_multilingual_tasks(
        &self,
        request_id: i64,
        content: &str,
        chapters: Option<&str>,
        summary_languages: &[String],
        subtitle_languages: &[String],
        detailed_languages: &[String],
    ) -> Vec<LanguageTaskResult> {
        let summary_then_detail = async {
            let mut results = self.summary_batch(request_id, content, summary_languages).await;
            results.extend(
                self.detail_batch(request_id, content, chapters, detailed_languages)
                    .await,
            );
            results
        };
        let subtitle = self.subtitle_batch(request_id, content, subtitle_languages);

        let (mut results, subtitle_results) = tokio::join!(summary_then_detail, subtitle);
        results.extend(subtitle_results);

        let failed = results
            .iter()
            .filter(|r| matches!(r.outcome, TaskOutcome::Failure(_)))
            .count();
        self.steps.info(
            request_id,
            "fanout",
            &format!("multilingual tasks settled: {} total, {} failed", results.len(), failed),
        );
        results
    }

    /// Load the article and request records one task depends on
    pub(crate) async fn task_context(&self, request_id: i64) -> Result<TaskContext> {
        let article = self
            .store
            .get_article_by_request_id(request_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("article record missing for request {request_id}"))?;
        let request = self
            .store
            .get_request_by_article_id(article.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("request record missing for article {}", article.id))?;
        let channel = request
            .platform
            .map(|p| p.channel())
            .unwrap_or(ContentChannel::Article);
        Ok(TaskContext {
            article_id: article.id,
            channel,
        })
    }
}

/// Per-task view of the records a language task needs
pub(crate) struct TaskContext {
    pub article_id: i64,
    pub channel: ContentChannel,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{AuthorInfo, ContentFetcher, ContentMetadata};
    use crate::llm::MockSummarizer;
    use crate::resolver::PlatformParser;
    use crate::store::{ArticleRecord, MockArticleStore, RequestRecord};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn long_text() -> String {
        vec!["word"; 120].join(" ")
    }

    fn request_record(id: i64) -> RequestRecord {
        RequestRecord {
            id,
            original_url: "https://example.com/a".into(),
            resolved_url: Some("https://example.com/a".into()),
            platform: Some(Platform::Youtube),
            status: RequestStatus::Processing,
            error_message: None,
            content: None,
            article_id: Some(7),
        }
    }

    fn article_record() -> ArticleRecord {
        ArticleRecord {
            id: 7,
            request_id: 1,
            title: "t".into(),
            visible: false,
        }
    }

    /// Store mock with the lookups and section writes every batch needs
    fn batch_store() -> MockArticleStore {
        let mut store = MockArticleStore::new();
        store
            .expect_get_article_by_request_id()
            .returning(|_| Ok(Some(article_record())));
        store
            .expect_get_request_by_article_id()
            .returning(|_| Ok(Some(request_record(1))));
        store.expect_delete_sections().returning(|_, _, _| Ok(()));
        store.expect_create_sections().returning(|_, _| Ok(()));
        store.expect_update_status().returning(|_, _, _| Ok(()));
        store
    }

    fn orchestrator(store: MockArticleStore, llm: MockSummarizer) -> Orchestrator {
        Orchestrator::new(
            ContentResolver::empty(),
            FetcherRegistry::empty(),
            Arc::new(store),
            Arc::new(llm),
            WorkflowSelector::new(Default::default(), "wf-default".into()),
            OrchestratorOptions {
                retry: RetryPolicy {
                    max_retries: 0,
                    base_delay: Duration::from_millis(1),
                    max_delay: Duration::from_millis(1),
                },
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_sibling_failure_does_not_cancel_other_tasks() {
        let mut llm = MockSummarizer::new();
        // the subtitle batch polishes chunks; everything else succeeds
        llm.expect_summarize().returning(|_, prompt, _| {
            if prompt.contains("Polish") {
                anyhow::bail!("polish provider down")
            }
            Ok(long_text())
        });

        let orch = orchestrator(batch_store(), llm);
        let results = orch
            .run_multilingual_tasks(
                1,
                &long_text(),
                None,
                &["en".into()],
                &["en".into()],
                &["en".into()],
            )
            .await;

        assert_eq!(results.len(), 3);
        let failures: Vec<_> = results
            .iter()
            .filter(|r| matches!(r.outcome, TaskOutcome::Failure(_)))
            .collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, TaskKind::Subtitle);

        let record = CompletionRecord::from_results(results);
        assert_eq!(record.completion, Completion::PartiallyFailed);
        // partial failure still reads processed externally
        assert_eq!(record.external_status(), RequestStatus::Processed);
    }

    #[tokio::test]
    async fn test_na_sentinel_short_circuits_batches_without_external_calls() {
        let mut llm = MockSummarizer::new();
        llm.expect_summarize().times(0);
        let mut store = MockArticleStore::new();
        store.expect_get_article_by_request_id().times(0);

        let orch = orchestrator(store, llm);
        let results = orch
            .run_multilingual_tasks(
                1,
                "irrelevant",
                None,
                &[SKIP_LANGUAGE.into()],
                &[SKIP_LANGUAGE.into()],
                &[SKIP_LANGUAGE.into()],
            )
            .await;

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.outcome == TaskOutcome::Skipped));
    }

    #[tokio::test]
    async fn test_per_language_failures_are_isolated_within_a_batch() {
        let mut llm = MockSummarizer::new();
        llm.expect_summarize().returning(|_, prompt, _| {
            if prompt.contains(" zh") {
                anyhow::bail!("zh workflow unavailable")
            }
            Ok(long_text())
        });

        let orch = orchestrator(batch_store(), llm);
        let results = orch
            .summary_batch(1, &long_text(), &["en".into(), "zh".into(), "ja".into()])
            .await;

        assert_eq!(results.len(), 3);
        assert!(matches!(results[0].outcome, TaskOutcome::Success(_)));
        assert!(matches!(results[1].outcome, TaskOutcome::Failure(_)));
        assert!(matches!(results[2].outcome, TaskOutcome::Success(_)));
    }

    struct StubParser;

    #[async_trait]
    impl PlatformParser for StubParser {
        fn can_handle(&self, _url: &str) -> bool {
            true
        }
        async fn parse(&self, url: &str) -> Result<Option<Resolution>> {
            Ok(Some(Resolution::same_url(Platform::Youtube, url)))
        }
        fn platform_name(&self) -> &'static str {
            "stub"
        }
    }

    struct StubFetcher {
        content: Option<String>,
    }

    #[async_trait]
    impl ContentFetcher for StubFetcher {
        fn can_handle(&self, _url: &str) -> bool {
            true
        }
        fn platform_name(&self) -> &'static str {
            "stub"
        }
        async fn fetch_content(&self, _url: &str) -> Result<Option<String>> {
            Ok(self.content.clone())
        }
        async fn fetch_metadata(&self, _url: &str) -> Result<Option<ContentMetadata>> {
            Ok(Some(ContentMetadata {
                title: "A Talk".into(),
                ..Default::default()
            }))
        }
        async fn fetch_author(&self, _url: &str) -> Result<Option<AuthorInfo>> {
            Ok(None)
        }
    }

    fn full_run_orchestrator(
        content: Option<String>,
        statuses: Arc<Mutex<Vec<RequestStatus>>>,
        expect_publish: bool,
    ) -> Orchestrator {
        let mut store = MockArticleStore::new();
        store
            .expect_create_request()
            .returning(|_| Ok(request_record(1)));
        store.expect_update_resolution().returning(|_, _, _| Ok(()));
        store.expect_update_content().returning(|_, _| Ok(()));
        store
            .expect_create_article()
            .returning(|_| Ok(article_record()));
        store
            .expect_publish_article()
            .times(usize::from(expect_publish))
            .returning(|_| Ok(()));
        store
            .expect_get_article_by_request_id()
            .returning(|_| Ok(Some(article_record())));
        store
            .expect_get_request_by_article_id()
            .returning(|_| Ok(Some(request_record(1))));
        store.expect_delete_sections().returning(|_, _, _| Ok(()));
        store.expect_create_sections().returning(|_, _| Ok(()));
        let recorded = statuses;
        store.expect_update_status().returning(move |_, status, _| {
            recorded.lock().unwrap().push(status);
            Ok(())
        });

        let mut llm = MockSummarizer::new();
        llm.expect_summarize().returning(|_, _, _| Ok(long_text()));

        let mut orch = orchestrator(store, llm);
        orch.resolver.register(Box::new(StubParser));
        orch.fetchers.register(Box::new(StubFetcher { content }));
        orch
    }

    #[tokio::test]
    async fn test_full_run_marks_request_processed() {
        let statuses = Arc::new(Mutex::new(Vec::new()));
        let orch = full_run_orchestrator(Some(long_text()), statuses.clone(), true);

        let record = orch
            .process(&IngestSubmission {
                url: "https://www.youtube.com/watch?v=abc".into(),
                summary_languages: vec!["en".into()],
                subtitle_languages: vec![SKIP_LANGUAGE.into()],
                detailed_languages: vec![SKIP_LANGUAGE.into()],
            })
            .await
            .unwrap();

        assert_eq!(record.completion, Completion::FullySucceeded);
        let recorded = statuses.lock().unwrap();
        assert_eq!(
            recorded.as_slice(),
            &[RequestStatus::Processing, RequestStatus::Processed]
        );
    }

    #[tokio::test]
    async fn test_missing_mandatory_content_fails_before_fanout() {
        let statuses = Arc::new(Mutex::new(Vec::new()));
        let orch = full_run_orchestrator(None, statuses.clone(), false);

        let record = orch
            .process(&IngestSubmission {
                url: "https://www.youtube.com/watch?v=abc".into(),
                summary_languages: vec!["en".into()],
                subtitle_languages: vec![SKIP_LANGUAGE.into()],
                detailed_languages: vec![SKIP_LANGUAGE.into()],
            })
            .await
            .unwrap();

        assert_eq!(record.completion, Completion::Failed);
        assert!(record.error.as_deref().unwrap().contains("no content"));
        let recorded = statuses.lock().unwrap();
        assert_eq!(
            recorded.as_slice(),
            &[RequestStatus::Processing, RequestStatus::Failed]
        );
    }
}
