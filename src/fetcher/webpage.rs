use async_trait::async_trait;
use regex::Regex;
use url::Url;

use super::{strip_html, ContentFetcher, ContentMetadata};
use crate::retry::{retry_all, retry_with_policy, RetryPolicy};
use crate::Result;

/// Generic webpage fetcher; the catch-all strategy for plain articles.
///
/// Registered last so dedicated platform fetchers win first.
pub struct WebpageFetcher {
    http: reqwest::Client,
    retry: RetryPolicy,
    title: Regex,
}

impl WebpageFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            retry: RetryPolicy::default(),
            title: Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap(),
        }
    }

    async fn page(&self, url: &str) -> Result<String> {
        retry_with_policy(self.retry, retry_all, || async {
            let response = self.http.get(url).send().await?;
            Ok(response.error_for_status()?.text().await?)
        })
        .await
    }
}

#[async_trait]
impl ContentFetcher for WebpageFetcher {
    fn can_handle(&self, url: &str) -> bool {
        Url::parse(url)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false)
    }

    fn platform_name(&self) -> &'static str {
        "webpage"
    }

    async fn fetch_content(&self, url: &str) -> Result<Option<String>> {
        let page = self.page(url).await?;
        let text = strip_html(&page);
        if text.is_empty() {
            return Ok(None);
        }
        Ok(Some(text))
    }

    async fn fetch_metadata(&self, url: &str) -> Result<Option<ContentMetadata>> {
        let page = self.page(url).await?;
        let title = self
            .title
            .captures(&page)
            .map(|caps| strip_html(&caps[1]))
            .filter(|t| !t.is_empty());
        let Some(title) = title else {
            return Ok(None);
        };
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        Ok(Some(ContentMetadata {
            title,
            author: host,
            cover_url: None,
            publish_date: None,
            duration_secs: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_regex() {
        let fetcher = WebpageFetcher::new(reqwest::Client::new());
        let page = "<html><head><title>\n  A Story \n</title></head><body>x</body></html>";
        let title = fetcher.title.captures(page).map(|c| strip_html(&c[1]));
        assert_eq!(title.as_deref(), Some("A Story"));
    }
}
