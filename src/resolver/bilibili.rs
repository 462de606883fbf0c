use async_trait::async_trait;
use regex::Regex;
use reqwest::redirect;

use super::{Platform, PlatformParser, Resolution};
use crate::Result;

/// Bilibili video URL parser.
///
/// Accepts BV/av links on any bilibili host plus `b23.tv` short links, which
/// are expanded by following the redirect, and normalizes everything to
/// `https://www.bilibili.com/video/<id>`.
pub struct BilibiliParser {
    http: reqwest::Client,
    video_id: Regex,
}

impl BilibiliParser {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            video_id: Regex::new(r"(?i)(BV[0-9A-Za-z]+|av\d+)").unwrap(),
        }
    }

    fn extract_video_id(&self, url: &str) -> Option<String> {
        let id = self.video_id.captures(url)?[1].to_string();
        if let Some(rest) = id.strip_prefix("BV").or_else(|| id.strip_prefix("bv")) {
            Some(format!("BV{rest}"))
        } else {
            Some(id.to_lowercase())
        }
    }

    /// Expand a b23.tv short link to the full video URL. Tries a no-redirect
    /// HEAD first, then a full GET as fallback.
    async fn resolve_short_url(&self, short_url: &str) -> Result<Option<String>> {
        let no_redirect = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .build()?;
        let response = no_redirect.head(short_url).send().await?;
        if response.status().is_redirection() {
            if let Some(location) = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
            {
                if location.contains("bilibili.com/video/") {
                    tracing::info!(short_url, target = location, "expanded short link");
                    return Ok(Some(location.to_string()));
                }
            }
        }

        let response = self.http.get(short_url).send().await?;
        let final_url = response.url().to_string();
        if final_url.contains("bilibili.com/video/") {
            return Ok(Some(final_url));
        }
        Ok(None)
    }
}

#[async_trait]
impl PlatformParser for BilibiliParser {
    fn can_handle(&self, url: &str) -> bool {
        url.contains("bilibili.com/video/") || url.contains("b23.tv/")
    }

    async fn parse(&self, url: &str) -> Result<Option<Resolution>> {
        let expanded;
        let target = if url.contains("b23.tv/") {
            match self.resolve_short_url(url).await? {
                Some(full) => {
                    expanded = full;
                    expanded.as_str()
                }
                None => return Ok(None),
            }
        } else {
            url
        };

        let Some(video_id) = self.extract_video_id(target) else {
            return Ok(None);
        };

        Ok(Some(Resolution {
            platform: Platform::Bilibili,
            resolved_url: format!("https://www.bilibili.com/video/{video_id}"),
            original_url: url.to_string(),
        }))
    }

    fn platform_name(&self) -> &'static str {
        "bilibili"
    }
}
