//! Fetch strategy registry.
//!
//! Every concrete platform integration implements the same four-operation
//! capability surface; the registry dispatches each call through the same
//! ordered-list-first-match rule as the resolver, independently per call.
//! `None` from any operation means "not available on this platform", which is
//! not an error; transient faults surface as `Err` and are retried inside the
//! individual fetcher.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::resolver::Platform;
use crate::Result;

pub mod bilibili;
pub mod file;
pub mod webpage;
pub mod wechat;
pub mod youtube;

/// Metadata for one piece of content
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentMetadata {
    pub title: String,
    pub author: String,
    pub cover_url: Option<String>,
    pub publish_date: Option<DateTime<Utc>>,
    /// Duration in seconds for audio/video, absent for articles
    pub duration_secs: Option<u64>,
}

/// Author/channel info used for attribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorInfo {
    pub name: String,
    pub icon: Option<String>,
    pub platform: Platform,
}

/// Capability contract implemented by each platform integration.
///
/// The first fetcher whose `can_handle` returns true is used exclusively for
/// all four operations on that URL. Fetcher-local state (token caches) must
/// stay instance-scoped and never leak across URLs handled by other fetchers.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    fn can_handle(&self, url: &str) -> bool;

    fn platform_name(&self) -> &'static str;

    /// Raw transcript or article text
    async fn fetch_content(&self, url: &str) -> Result<Option<String>>;

    async fn fetch_metadata(&self, url: &str) -> Result<Option<ContentMetadata>>;

    /// Chapter markers as `[HH:MM:SS] title` lines; most platforms have none
    async fn fetch_chapters(&self, _url: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn fetch_author(&self, _url: &str) -> Result<Option<AuthorInfo>> {
        Ok(None)
    }
}

/// Ordered collection of content fetchers
pub struct FetcherRegistry {
    fetchers: Vec<Box<dyn ContentFetcher>>,
}

impl FetcherRegistry {
    /// Registry with the default platform integrations, in priority order
    pub fn new(http: reqwest::Client) -> Self {
        let mut registry = Self {
            fetchers: Vec::new(),
        };
        registry.register(Box::new(youtube::YoutubeFetcher::new(http.clone())));
        registry.register(Box::new(bilibili::BilibiliFetcher::new(http.clone())));
        registry.register(Box::new(wechat::WechatFetcher::new(http.clone())));
        registry.register(Box::new(file::FileFetcher::new()));
        registry.register(Box::new(webpage::WebpageFetcher::new(http)));
        registry
    }

    pub fn empty() -> Self {
        Self {
            fetchers: Vec::new(),
        }
    }

    pub fn register(&mut self, fetcher: Box<dyn ContentFetcher>) {
        self.fetchers.push(fetcher);
    }

    fn find_fetcher(&self, url: &str) -> Option<&dyn ContentFetcher> {
        self.fetchers
            .iter()
            .find(|f| f.can_handle(url))
            .map(|boxed| boxed.as_ref())
    }

    pub async fn fetch_content(&self, url: &str) -> Result<Option<String>> {
        match self.find_fetcher(url) {
            Some(fetcher) => fetcher.fetch_content(url).await,
            None => {
                tracing::warn!(url, "no content fetcher matched URL");
                Ok(None)
            }
        }
    }

    pub async fn fetch_metadata(&self, url: &str) -> Result<Option<ContentMetadata>> {
        match self.find_fetcher(url) {
            Some(fetcher) => fetcher.fetch_metadata(url).await,
            None => Ok(None),
        }
    }

    pub async fn fetch_chapters(&self, url: &str) -> Result<Option<String>> {
        match self.find_fetcher(url) {
            Some(fetcher) => fetcher.fetch_chapters(url).await,
            None => Ok(None),
        }
    }

    pub async fn fetch_author(&self, url: &str) -> Result<Option<AuthorInfo>> {
        match self.find_fetcher(url) {
            Some(fetcher) => fetcher.fetch_author(url).await,
            None => Ok(None),
        }
    }
}

/// Strip HTML tags and collapse whitespace; shared by the article fetchers
pub(crate) fn strip_html(html: &str) -> String {
    let without_scripts = regex::Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>")
        .unwrap()
        .replace_all(html, " ");
    let without_tags = regex::Regex::new(r"(?s)<[^>]+>")
        .unwrap()
        .replace_all(&without_scripts, " ");
    let decoded = without_tags
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubFetcher {
        name: &'static str,
        prefix: &'static str,
        content: Option<&'static str>,
        chapters: Option<&'static str>,
    }

    #[async_trait]
    impl ContentFetcher for StubFetcher {
        fn can_handle(&self, url: &str) -> bool {
            url.starts_with(self.prefix)
        }

        fn platform_name(&self) -> &'static str {
            self.name
        }

        async fn fetch_content(&self, _url: &str) -> Result<Option<String>> {
            Ok(self.content.map(str::to_string))
        }

        async fn fetch_metadata(&self, _url: &str) -> Result<Option<ContentMetadata>> {
            Ok(Some(ContentMetadata {
                title: self.name.to_string(),
                ..Default::default()
            }))
        }

        async fn fetch_chapters(&self, _url: &str) -> Result<Option<String>> {
            Ok(self.chapters.map(str::to_string))
        }
    }

    fn registry() -> FetcherRegistry {
        let mut registry = FetcherRegistry::empty();
        registry.register(Box::new(StubFetcher {
            name: "alpha",
            prefix: "https://a.example",
            content: Some("alpha transcript"),
            chapters: None,
        }));
        registry.register(Box::new(StubFetcher {
            name: "beta",
            prefix: "https://",
            content: Some("beta transcript"),
            chapters: Some("[00:00:00] Intro"),
        }));
        registry
    }

    #[tokio::test]
    async fn test_first_matching_fetcher_handles_all_operations() {
        let registry = registry();
        let url = "https://a.example/video/1";

        let content = registry.fetch_content(url).await.unwrap().unwrap();
        assert_eq!(content, "alpha transcript");
        let metadata = registry.fetch_metadata(url).await.unwrap().unwrap();
        assert_eq!(metadata.title, "alpha");
        // alpha has no chapters; dispatch does not fall through to beta
        assert!(registry.fetch_chapters(url).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_later_fetcher_used_when_first_declines_url() {
        let registry = registry();
        let content = registry
            .fetch_content("https://b.example/video/2")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(content, "beta transcript");
    }

    #[tokio::test]
    async fn test_unmatched_url_yields_none() {
        let registry = registry();
        assert!(registry.fetch_content("ftp://nope").await.unwrap().is_none());
        assert!(registry.fetch_metadata("ftp://nope").await.unwrap().is_none());
    }

    #[test]
    fn test_strip_html() {
        let html = "<html><head><style>p{}</style></head>\
                    <body><p>Hello &amp; <b>world</b></p><script>var x;</script></body></html>";
        assert_eq!(strip_html(html), "Hello & world");
    }
}
