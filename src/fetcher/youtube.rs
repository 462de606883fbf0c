use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use super::{AuthorInfo, ContentFetcher, ContentMetadata};
use crate::resolver::Platform;
use crate::retry::{retry_all, retry_with_policy, RetryPolicy};
use crate::timecode::format_timestamp;
use crate::Result;

const VISITOR_TTL: Duration = Duration::from_secs(3600);

/// YouTube content fetcher.
///
/// Captions come from the timedtext track referenced by the watch page; the
/// visitor id scraped from the page is cached instance-scoped with a TTL so
/// repeated fetches within one process reuse it. The cache holds an explicit
/// (value, expiry) pair and never crosses into other fetcher instances.
pub struct YoutubeFetcher {
    http: reqwest::Client,
    retry: RetryPolicy,
    visitor: RwLock<Option<(String, Instant)>>,
    caption_url: Regex,
    visitor_data: Regex,
    chapter_line: Regex,
}

#[derive(Debug, Deserialize)]
struct OembedResponse {
    title: String,
    author_name: String,
    thumbnail_url: Option<String>,
}

impl YoutubeFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            retry: RetryPolicy::default(),
            visitor: RwLock::new(None),
            caption_url: Regex::new(r#""captionTracks":\[\{"baseUrl":"([^"]+)""#).unwrap(),
            visitor_data: Regex::new(r#""visitorData":"([^"]+)""#).unwrap(),
            chapter_line: Regex::new(r"(?m)^(\d{1,2}:\d{2}(?::\d{2})?)\s+(.+)$").unwrap(),
        }
    }

    async fn watch_page(&self, url: &str) -> Result<String> {
        retry_with_policy(self.retry, retry_all, || async {
            let response = self.http.get(url).send().await?;
            Ok(response.error_for_status()?.text().await?)
        })
        .await
    }

    fn cached_visitor(&self) -> Option<String> {
        let guard = self.visitor.read().unwrap();
        guard
            .as_ref()
            .filter(|(_, expiry)| *expiry > Instant::now())
            .map(|(value, _)| value.clone())
    }

    fn remember_visitor(&self, page: &str) {
        if let Some(caps) = self.visitor_data.captures(page) {
            let mut guard = self.visitor.write().unwrap();
            *guard = Some((caps[1].to_string(), Instant::now() + VISITOR_TTL));
        }
    }

    /// Convert a timedtext XML document into `[HH:MM:SS] text` lines
    fn timedtext_to_transcript(xml: &str) -> String {
        let entry = Regex::new(r#"<text start="([\d.]+)"[^>]*>(.*?)</text>"#).unwrap();
        let mut lines = Vec::new();
        for caps in entry.captures_iter(xml) {
            let start = caps[1].parse::<f64>().unwrap_or(0.0) as u64;
            let text = super::strip_html(&caps[2]);
            if !text.is_empty() {
                lines.push(format!("[{}] {}", format_timestamp(start), text));
            }
        }
        lines.join("\n")
    }

    /// Pull `M:SS Title` chapter lines out of the video description
    fn chapters_from_page(&self, page: &str) -> Option<String> {
        let description = Regex::new(r#""shortDescription":"((?:[^"\\]|\\.)*)""#)
            .unwrap()
            .captures(page)?[1]
            .replace("\\n", "\n");

        let mut chapters = Vec::new();
        for caps in self.chapter_line.captures_iter(&description) {
            let secs = crate::timecode::parse_timestamp(&caps[1])?;
            chapters.push(format!("[{}] {}", format_timestamp(secs), caps[2].trim()));
        }
        if chapters.len() >= 2 {
            Some(chapters.join("\n"))
        } else {
            None
        }
    }

    async fn oembed(&self, url: &str) -> Result<OembedResponse> {
        let endpoint = format!(
            "https://www.youtube.com/oembed?url={}&format=json",
            urlencoding::encode(url)
        );
        retry_with_policy(self.retry, retry_all, || async {
            let response = self.http.get(&endpoint).send().await?;
            Ok(response.error_for_status()?.json().await?)
        })
        .await
    }
}

#[async_trait]
impl ContentFetcher for YoutubeFetcher {
    fn can_handle(&self, url: &str) -> bool {
        url.contains("youtube.com/watch") || url.contains("youtu.be/")
    }

    fn platform_name(&self) -> &'static str {
        "youtube"
    }

    async fn fetch_content(&self, url: &str) -> Result<Option<String>> {
        let page = self.watch_page(url).await?;
        self.remember_visitor(&page);

        let Some(caps) = self.caption_url.captures(&page) else {
            tracing::info!(url, "no caption track on video");
            return Ok(None);
        };
        let caption_url = caps[1].replace("\\u0026", "&");

        let xml = retry_with_policy(self.retry, retry_all, || async {
            let mut request = self.http.get(&caption_url);
            if let Some(visitor) = self.cached_visitor() {
                request = request.header("X-Goog-Visitor-Id", visitor);
            }
            let response = request.send().await?;
            Ok(response.error_for_status()?.text().await?)
        })
        .await?;

        let transcript = Self::timedtext_to_transcript(&xml);
        if transcript.is_empty() {
            return Ok(None);
        }
        Ok(Some(transcript))
    }

    async fn fetch_metadata(&self, url: &str) -> Result<Option<ContentMetadata>> {
        let oembed = self.oembed(url).await?;
        Ok(Some(ContentMetadata {
            title: oembed.title,
            author: oembed.author_name,
            cover_url: oembed.thumbnail_url,
            publish_date: None,
            duration_secs: None,
        }))
    }

    async fn fetch_chapters(&self, url: &str) -> Result<Option<String>> {
        let page = self.watch_page(url).await?;
        self.remember_visitor(&page);
        Ok(self.chapters_from_page(&page))
    }

    async fn fetch_author(&self, url: &str) -> Result<Option<AuthorInfo>> {
        let oembed = self.oembed(url).await?;
        Ok(Some(AuthorInfo {
            name: oembed.author_name,
            icon: None,
            platform: Platform::Youtube,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timedtext_to_transcript() {
        let xml = r#"<transcript>
            <text start="0.0" dur="2.5">hello &amp; welcome</text>
            <text start="62.1" dur="3.0">second line</text>
            <text start="65.0" dur="1.0"></text>
        </transcript>"#;
        let transcript = YoutubeFetcher::timedtext_to_transcript(xml);
        assert_eq!(
            transcript,
            "[00:00:00] hello & welcome\n[00:01:02] second line"
        );
    }

    #[test]
    fn test_chapters_extracted_from_description() {
        let fetcher = YoutubeFetcher::new(reqwest::Client::new());
        let page = r#"{"shortDescription":"Great talk.\n0:00 Intro\n12:30 Scaling\n1:02:00 Q&A"}"#;
        let chapters = fetcher.chapters_from_page(page).unwrap();
        assert_eq!(
            chapters,
            "[00:00:00] Intro\n[00:12:30] Scaling\n[01:02:00] Q&A"
        );
    }

    #[test]
    fn test_single_timestamp_is_not_a_chapter_list() {
        let fetcher = YoutubeFetcher::new(reqwest::Client::new());
        let page = r#"{"shortDescription":"See 0:42 for the good part"}"#;
        assert!(fetcher.chapters_from_page(page).is_none());
    }

    #[test]
    fn test_visitor_cache_expiry() {
        let fetcher = YoutubeFetcher::new(reqwest::Client::new());
        assert!(fetcher.cached_visitor().is_none());

        fetcher.remember_visitor(r#"{"visitorData":"abc123"}"#);
        assert_eq!(fetcher.cached_visitor().as_deref(), Some("abc123"));

        // force expiry
        *fetcher.visitor.write().unwrap() =
            Some(("abc123".into(), Instant::now() - Duration::from_secs(1)));
        assert!(fetcher.cached_visitor().is_none());
    }
}
