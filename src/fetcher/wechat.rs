use async_trait::async_trait;
use regex::Regex;

use super::{strip_html, AuthorInfo, ContentFetcher, ContentMetadata};
use crate::resolver::Platform;
use crate::retry::{retry_all, retry_with_policy, RetryPolicy};
use crate::Result;

/// WeChat public-account article fetcher
pub struct WechatFetcher {
    http: reqwest::Client,
    retry: RetryPolicy,
    og_property: Regex,
    body_div: Regex,
}

impl WechatFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            retry: RetryPolicy::default(),
            og_property: Regex::new(
                r#"<meta\s+property="og:([a-z:_]+)"\s+content="([^"]*)""#,
            )
            .unwrap(),
            body_div: Regex::new(r#"(?s)<div[^>]+id="js_content"[^>]*>(.*?)</div>"#).unwrap(),
        }
    }

    async fn page(&self, url: &str) -> Result<String> {
        retry_with_policy(self.retry, retry_all, || async {
            let response = self.http.get(url).send().await?;
            Ok(response.error_for_status()?.text().await?)
        })
        .await
    }

    fn og(&self, page: &str, name: &str) -> Option<String> {
        self.og_property
            .captures_iter(page)
            .find(|caps| &caps[1] == name)
            .map(|caps| caps[2].to_string())
    }
}

#[async_trait]
impl ContentFetcher for WechatFetcher {
    fn can_handle(&self, url: &str) -> bool {
        url.contains("mp.weixin.qq.com/s")
    }

    fn platform_name(&self) -> &'static str {
        "wechat"
    }

    async fn fetch_content(&self, url: &str) -> Result<Option<String>> {
        let page = self.page(url).await?;
        // prefer the article body container, fall back to the whole page
        let text = match self.body_div.captures(&page) {
            Some(caps) => strip_html(&caps[1]),
            None => strip_html(&page),
        };
        if text.is_empty() {
            return Ok(None);
        }
        Ok(Some(text))
    }

    async fn fetch_metadata(&self, url: &str) -> Result<Option<ContentMetadata>> {
        let page = self.page(url).await?;
        let Some(title) = self.og(&page, "title") else {
            return Ok(None);
        };
        Ok(Some(ContentMetadata {
            title,
            author: self.og(&page, "article:author").unwrap_or_default(),
            cover_url: self.og(&page, "image"),
            publish_date: None,
            duration_secs: None,
        }))
    }

    async fn fetch_author(&self, url: &str) -> Result<Option<AuthorInfo>> {
        let page = self.page(url).await?;
        let Some(name) = self.og(&page, "article:author") else {
            return Ok(None);
        };
        Ok(Some(AuthorInfo {
            name,
            icon: None,
            platform: Platform::Wechat,
        }))
    }
}
