use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use super::{AuthorInfo, ContentFetcher, ContentMetadata};
use crate::resolver::Platform;
use crate::retry::{retry_all, retry_with_policy, RetryPolicy};
use crate::timecode::format_timestamp;
use crate::Result;

const BUVID_TTL: Duration = Duration::from_secs(24 * 3600);

/// Bilibili content fetcher backed by the public web API.
///
/// Subtitle endpoints require a device cookie (`buvid3`); it is fetched once
/// from the fingerprint endpoint and cached instance-scoped with a TTL.
pub struct BilibiliFetcher {
    http: reqwest::Client,
    retry: RetryPolicy,
    buvid: RwLock<Option<(String, Instant)>>,
    bvid: Regex,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    code: i64,
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ViewData {
    title: String,
    pic: Option<String>,
    pubdate: Option<i64>,
    duration: Option<u64>,
    owner: Owner,
    cid: u64,
}

#[derive(Debug, Deserialize)]
struct Owner {
    name: String,
    face: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpiData {
    b_3: String,
}

#[derive(Debug, Deserialize)]
struct PlayerData {
    subtitle: Option<SubtitleInfo>,
}

#[derive(Debug, Deserialize)]
struct SubtitleInfo {
    subtitles: Vec<SubtitleTrack>,
}

#[derive(Debug, Deserialize)]
struct SubtitleTrack {
    subtitle_url: String,
}

#[derive(Debug, Deserialize)]
struct SubtitleBody {
    body: Vec<SubtitleLine>,
}

#[derive(Debug, Deserialize)]
struct SubtitleLine {
    from: f64,
    content: String,
}

impl BilibiliFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            retry: RetryPolicy::default(),
            buvid: RwLock::new(None),
            bvid: Regex::new(r"video/(BV[0-9A-Za-z]+|av\d+)").unwrap(),
        }
    }

    fn extract_bvid(&self, url: &str) -> Option<String> {
        self.bvid.captures(url).map(|caps| caps[1].to_string())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, endpoint: &str, cookie: Option<&str>) -> Result<T> {
        retry_with_policy(self.retry, retry_all, || async {
            let mut request = self.http.get(endpoint);
            if let Some(cookie) = cookie {
                request = request.header(reqwest::header::COOKIE, cookie);
            }
            let response = request.send().await?;
            Ok(response.error_for_status()?.json().await?)
        })
        .await
    }

    async fn view(&self, url: &str) -> Result<Option<ViewData>> {
        let Some(bvid) = self.extract_bvid(url) else {
            return Ok(None);
        };
        let endpoint = format!("https://api.bilibili.com/x/web-interface/view?bvid={bvid}");
        let envelope: ApiEnvelope<ViewData> = self.get_json(&endpoint, None).await?;
        if envelope.code != 0 {
            anyhow::bail!("bilibili view API error {}: {}", envelope.code, envelope.message);
        }
        Ok(envelope.data)
    }

    async fn device_cookie(&self) -> Result<String> {
        if let Some((value, expiry)) = self.buvid.read().unwrap().clone() {
            if expiry > Instant::now() {
                return Ok(value);
            }
        }

        let envelope: ApiEnvelope<SpiData> = self
            .get_json("https://api.bilibili.com/x/frontend/finger/spi", None)
            .await?;
        let data = envelope
            .data
            .ok_or_else(|| anyhow::anyhow!("fingerprint endpoint returned no data"))?;
        let cookie = format!("buvid3={}", data.b_3);
        *self.buvid.write().unwrap() = Some((cookie.clone(), Instant::now() + BUVID_TTL));
        Ok(cookie)
    }
}

#[async_trait]
impl ContentFetcher for BilibiliFetcher {
    fn can_handle(&self, url: &str) -> bool {
        url.contains("bilibili.com/video/")
    }

    fn platform_name(&self) -> &'static str {
        "bilibili"
    }

    async fn fetch_content(&self, url: &str) -> Result<Option<String>> {
        let Some(view) = self.view(url).await? else {
            return Ok(None);
        };
        let Some(bvid) = self.extract_bvid(url) else {
            return Ok(None);
        };

        let cookie = self.device_cookie().await?;
        let endpoint = format!(
            "https://api.bilibili.com/x/player/wbi/v2?bvid={bvid}&cid={}",
            view.cid
        );
        let envelope: ApiEnvelope<PlayerData> = self.get_json(&endpoint, Some(&cookie)).await?;

        let track_url = envelope
            .data
            .and_then(|d| d.subtitle)
            .and_then(|s| s.subtitles.into_iter().next())
            .map(|t| t.subtitle_url);
        let Some(track_url) = track_url else {
            tracing::info!(url, "no subtitle track on video");
            return Ok(None);
        };
        let track_url = if track_url.starts_with("//") {
            format!("https:{track_url}")
        } else {
            track_url
        };

        let body: SubtitleBody = self.get_json(&track_url, None).await?;
        let lines: Vec<String> = body
            .body
            .iter()
            .map(|line| {
                format!(
                    "[{}] {}",
                    format_timestamp(line.from as u64),
                    line.content.trim()
                )
            })
            .collect();

        if lines.is_empty() {
            return Ok(None);
        }
        Ok(Some(lines.join("\n")))
    }

    async fn fetch_metadata(&self, url: &str) -> Result<Option<ContentMetadata>> {
        let Some(view) = self.view(url).await? else {
            return Ok(None);
        };
        Ok(Some(ContentMetadata {
            title: view.title,
            author: view.owner.name,
            cover_url: view.pic,
            publish_date: view
                .pubdate
                .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
            duration_secs: view.duration,
        }))
    }

    async fn fetch_author(&self, url: &str) -> Result<Option<AuthorInfo>> {
        let Some(view) = self.view(url).await? else {
            return Ok(None);
        };
        Ok(Some(AuthorInfo {
            name: view.owner.name,
            icon: view.owner.face,
            platform: Platform::Bilibili,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bvid() {
        let fetcher = BilibiliFetcher::new(reqwest::Client::new());
        assert_eq!(
            fetcher
                .extract_bvid("https://www.bilibili.com/video/BV1abc123")
                .as_deref(),
            Some("BV1abc123")
        );
        assert_eq!(
            fetcher
                .extract_bvid("https://www.bilibili.com/video/av170001?p=1")
                .as_deref(),
            Some("av170001")
        );
        assert!(fetcher
            .extract_bvid("https://www.bilibili.com/read/cv1")
            .is_none());
    }

    #[test]
    fn test_subtitle_envelope_parsing() {
        let json = r#"{"code":0,"message":"0","data":{"subtitle":{"subtitles":[{"subtitle_url":"//example.com/sub.json"}]}}}"#;
        let envelope: ApiEnvelope<PlayerData> = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.code, 0);
        let track = envelope.data.unwrap().subtitle.unwrap().subtitles;
        assert_eq!(track[0].subtitle_url, "//example.com/sub.json");
    }
}
