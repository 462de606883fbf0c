//! Detailed-rewrite batch.
//!
//! Splits the transcript along chapter markers when the platform provided
//! any, falling back to the same fixed time windows the polish batch uses.
//! Each span is rewritten into long-form prose concurrently under the chunk
//! gate, then reassembled in chapter order.

use regex::Regex;

use super::polish::{run_gated_chunks, split_into_windows};
use super::{LanguageTaskResult, Orchestrator, TaskKind, SECTION_DETAIL, SKIP_LANGUAGE};
use crate::llm::validate_min_length;
use crate::store::NewSection;
use crate::timecode::parse_timestamp;
use crate::Result;

const DETAIL_SORT_ORDER: i32 = 700;

impl Orchestrator {
    pub(crate) async fn detail_batch(
        &self,
        request_id: i64,
        content: &str,
        chapters: Option<&str>,
        languages: &[String],
    ) -> Vec<LanguageTaskResult> {
        if languages.iter().any(|l| l == SKIP_LANGUAGE) {
            return vec![LanguageTaskResult::skipped(TaskKind::Detail)];
        }

        let mut results = Vec::with_capacity(languages.len());
        for language in languages {
            let outcome = self
                .steps
                .with_step(request_id, "detail", || {
                    self.detail_language(request_id, content, chapters, language)
                })
                .await;
            results.push(LanguageTaskResult::from_result(
                TaskKind::Detail,
                language,
                outcome,
            ));
        }
        results
    }

    async fn detail_language(
        &self,
        request_id: i64,
        content: &str,
        chapters: Option<&str>,
        language: &str,
    ) -> Result<String> {
        let ctx = self.task_context(request_id).await?;
        let workflow = self.workflows.workflow_id(ctx.channel, language).to_string();
        let prompt = detail_prompt(language);

        let chunks = match chapters {
            Some(markers) => {
                let spans = split_by_chapters(content, markers);
                if spans.is_empty() {
                    split_into_windows(content, self.options.polish_window_secs)
                } else {
                    spans
                }
            }
            None => split_into_windows(content, self.options.polish_window_secs),
        };
        let chunk_count = chunks.len();

        let expanded = run_gated_chunks(
            self.llm.clone(),
            &workflow,
            &prompt,
            chunks,
            self.options.chunk_gate,
            self.options.retry,
        )
        .await?;
        let text = expanded.join("\n\n");
        validate_min_length(&text)?;

        self.store
            .delete_sections(ctx.article_id, SECTION_DETAIL, language)
            .await?;
        self.store
            .create_sections(
                ctx.article_id,
                &[NewSection {
                    section_type: SECTION_DETAIL.to_string(),
                    content: text,
                    language: language.to_string(),
                    sort_order: DETAIL_SORT_ORDER,
                }],
            )
            .await?;

        Ok(format!(
            "{language} detailed rewrite stored from {chunk_count} spans"
        ))
    }
}

fn detail_prompt(language: &str) -> String {
    format!(
        "Rewrite the following transcript span into detailed, well-structured \
         {language} prose. Preserve every substantive point and keep the \
         speaker's reasoning intact; do not condense."
    )
}

struct ChapterSpan {
    title: String,
    start_secs: u64,
    end_secs: u64,
}

fn extract_chapter_spans(markers: &str) -> Vec<ChapterSpan> {
    let line = Regex::new(r"\[(\d{1,2}:\d{2}:\d{2})\]\s*(\S.*)").expect("static regex");
    let mut starts: Vec<(u64, String)> = markers
        .lines()
        .filter_map(|l| {
            let caps = line.captures(l)?;
            let secs = parse_timestamp(&caps[1])?;
            Some((secs, caps[2].trim().to_string()))
        })
        .collect();
    starts.sort_by_key(|(secs, _)| *secs);

    let ends: Vec<u64> = starts
        .iter()
        .skip(1)
        .map(|(secs, _)| *secs)
        .chain(std::iter::once(u64::MAX))
        .collect();

    starts
        .into_iter()
        .zip(ends)
        .map(|((start_secs, title), end_secs)| ChapterSpan {
            title,
            start_secs,
            end_secs,
        })
        .collect()
}

/// Group dialogue lines into `# title` headed spans by chapter time range.
///
/// Chapters that cover no dialogue are dropped; an empty result means the
/// markers were unusable and the caller falls back to time windows.
fn split_by_chapters(content: &str, markers: &str) -> Vec<String> {
    let spans = extract_chapter_spans(markers);
    if spans.is_empty() {
        return Vec::new();
    }

    let stamp = Regex::new(r"^\[(\d{1,2}:\d{2}:\d{2})\]").expect("static regex");
    let dialogues: Vec<(u64, &str)> = content
        .lines()
        .filter_map(|l| {
            let caps = stamp.captures(l)?;
            let secs = parse_timestamp(&caps[1])?;
            Some((secs, l))
        })
        .collect();

    spans
        .into_iter()
        .filter_map(|span| {
            let lines: Vec<&str> = dialogues
                .iter()
                .filter(|(secs, _)| *secs >= span.start_secs && *secs < span.end_secs)
                .map(|(_, l)| *l)
                .collect();
            if lines.is_empty() {
                return None;
            }
            Some(format!("# {}\n\n{}", span.title, lines.join("\n")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKERS: &str = "[00:00:00] Intro\n[00:05:00] Main topic\n[00:30:00] Outro";

    #[test]
    fn test_dialogues_group_into_chapter_spans() {
        let content = "[00:00:10] welcome everyone\n\
                       [00:04:00] today we talk about rust\n\
                       [00:06:00] first point\n\
                       [00:29:00] second point";
        let spans = split_by_chapters(content, MARKERS);

        assert_eq!(spans.len(), 2);
        assert!(spans[0].starts_with("# Intro\n"));
        assert!(spans[0].contains("welcome everyone"));
        assert!(spans[0].contains("today we talk about rust"));
        assert!(spans[1].starts_with("# Main topic\n"));
        assert!(spans[1].contains("first point"));
        assert!(spans[1].contains("second point"));
    }

    #[test]
    fn test_chapter_without_dialogue_is_dropped() {
        let content = "[00:31:00] only the outro has lines";
        let spans = split_by_chapters(content, MARKERS);

        assert_eq!(spans.len(), 1);
        assert!(spans[0].starts_with("# Outro\n"));
    }

    #[test]
    fn test_unusable_markers_yield_no_spans() {
        assert!(split_by_chapters("[00:00:10] line", "no stamps here").is_empty());
        assert!(split_by_chapters("[00:00:10] line", "").is_empty());
    }

    #[test]
    fn test_unordered_markers_are_sorted_by_start() {
        let markers = "[00:05:00] Second\n[00:00:00] First";
        let content = "[00:01:00] a\n[00:06:00] b";
        let spans = split_by_chapters(content, markers);

        assert_eq!(spans.len(), 2);
        assert!(spans[0].starts_with("# First\n"));
        assert!(spans[1].starts_with("# Second\n"));
    }
}
