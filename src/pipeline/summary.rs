//! Summary batch: one whole-content LLM pass per requested language.

use super::{LanguageTaskResult, Orchestrator, TaskKind, SECTION_SUMMARY, SKIP_LANGUAGE};
use crate::llm::validate_min_length;
use crate::retry::{retry_all, retry_with_policy};
use crate::store::NewSection;
use crate::Result;

const SUMMARY_SORT_ORDER: i32 = 100;

impl Orchestrator {
    /// Run the summary task for every requested language, sequentially.
    ///
    /// A failing language is recorded and the batch moves on; the `na`
    /// sentinel skips the whole batch before any store or LLM traffic.
    pub(crate) async fn summary_batch(
        &self,
        request_id: i64,
        content: &str,
        languages: &[String],
    ) -> Vec<LanguageTaskResult> {
        if languages.iter().any(|l| l == SKIP_LANGUAGE) {
            return vec![LanguageTaskResult::skipped(TaskKind::Summary)];
        }

        let mut results = Vec::with_capacity(languages.len());
        for language in languages {
            let outcome = self
                .steps
                .with_step(request_id, "summary", || {
                    self.summarize_language(request_id, content, language)
                })
                .await;
            results.push(LanguageTaskResult::from_result(
                TaskKind::Summary,
                language,
                outcome,
            ));
        }
        results
    }

    async fn summarize_language(
        &self,
        request_id: i64,
        content: &str,
        language: &str,
    ) -> Result<String> {
        let ctx = self.task_context(request_id).await?;
        let workflow = self.workflows.workflow_id(ctx.channel, language).to_string();
        let prompt = summary_prompt(language);

        let summary = retry_with_policy(self.options.retry, retry_all, || {
            self.llm.summarize(&workflow, &prompt, content)
        })
        .await?;
        validate_min_length(&summary)?;

        self.store
            .delete_sections(ctx.article_id, SECTION_SUMMARY, language)
            .await?;
        self.store
            .create_sections(
                ctx.article_id,
                &[NewSection {
                    section_type: SECTION_SUMMARY.to_string(),
                    content: summary,
                    language: language.to_string(),
                    sort_order: SUMMARY_SORT_ORDER,
                }],
            )
            .await?;

        Ok(format!("{language} summary stored"))
    }
}

fn summary_prompt(language: &str) -> String {
    format!(
        "Summarize the following transcript in {language}. \
         Cover the main arguments, notable facts and the conclusion; \
         write flowing prose rather than a bullet list."
    )
}
