//! Concrete catalog-lookup and search clients backing the episode matcher.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use url::Url;

use super::{CatalogLookup, EpisodeDescriptor, EpisodeSearch, SearchHit};
use crate::resolver::Platform;
use crate::retry::{retry_all, retry_with_policy, RetryPolicy};
use crate::Result;

/// Episode lookup against the iTunes lookup API
pub struct ItunesCatalog {
    http: Client,
    retry: RetryPolicy,
}

impl ItunesCatalog {
    pub fn new(http: Client, retry: RetryPolicy) -> Self {
        Self { http, retry }
    }

    /// Extract the episode id (`?i=...`) or the show id (`/idNNN`) from an
    /// Apple Podcast URL
    fn extract_id(url: &str) -> Result<String> {
        let parsed = Url::parse(url)?;
        if let Some((_, episode_id)) = parsed.query_pairs().find(|(k, _)| k == "i") {
            return Ok(episode_id.into_owned());
        }
        let show_id = parsed
            .path_segments()
            .into_iter()
            .flatten()
            .find_map(|seg| seg.strip_prefix("id").map(str::to_string));
        show_id.ok_or_else(|| anyhow::anyhow!("no episode or show id in Apple URL: {url}"))
    }
}

#[derive(Debug, Deserialize)]
struct ItunesLookupResponse {
    results: Vec<ItunesResult>,
}

#[derive(Debug, Deserialize)]
struct ItunesResult {
    #[serde(rename = "trackName")]
    track_name: Option<String>,
    #[serde(rename = "collectionName")]
    collection_name: Option<String>,
    #[serde(rename = "trackTimeMillis")]
    track_time_millis: Option<u64>,
}

#[async_trait]
impl CatalogLookup for ItunesCatalog {
    async fn episode(&self, url: &str) -> Result<EpisodeDescriptor> {
        let id = Self::extract_id(url)?;
        let endpoint = format!("https://itunes.apple.com/lookup?id={id}&entity=podcastEpisode");

        let body: ItunesLookupResponse = retry_with_policy(self.retry, retry_all, || async {
            let response = self.http.get(&endpoint).send().await?;
            Ok(response.error_for_status()?.json().await?)
        })
        .await?;

        let result = body
            .results
            .into_iter()
            .find(|r| r.track_name.is_some())
            .ok_or_else(|| anyhow::anyhow!("iTunes lookup returned no episode for id {id}"))?;

        Ok(EpisodeDescriptor {
            title: result.track_name.unwrap_or_default(),
            show_name: result.collection_name.unwrap_or_default(),
            duration_ms: result.track_time_millis.unwrap_or(0),
            platform: Platform::Apple,
        })
    }
}

/// Episode lookup against the Spotify Web API using client credentials.
///
/// The access token is instance-scoped and cached with an explicit expiry;
/// the cache never leaks across other fetchers or catalog clients.
pub struct SpotifyCatalog {
    http: Client,
    client_id: String,
    client_secret: String,
    retry: RetryPolicy,
    token: Mutex<Option<CachedToken>>,
}

#[derive(Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct SpotifyTokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct SpotifyEpisode {
    name: String,
    duration_ms: u64,
    show: SpotifyShow,
}

#[derive(Debug, Deserialize)]
struct SpotifyShow {
    name: String,
}

impl SpotifyCatalog {
    pub fn new(http: Client, client_id: String, client_secret: String, retry: RetryPolicy) -> Self {
        Self {
            http,
            client_id,
            client_secret,
            retry,
            token: Mutex::new(None),
        }
    }

    fn extract_episode_id(url: &str) -> Result<String> {
        let parsed = Url::parse(url)?;
        let mut segments = parsed.path_segments().into_iter().flatten();
        while let Some(seg) = segments.next() {
            if seg == "episode" {
                if let Some(id) = segments.next() {
                    return Ok(id.to_string());
                }
            }
        }
        anyhow::bail!("no episode id in Spotify URL: {url}")
    }

    async fn access_token(&self) -> Result<String> {
        if let Some(cached) = self.token.lock().unwrap().clone() {
            if cached.expires_at > Instant::now() {
                return Ok(cached.value);
            }
        }

        let response: SpotifyTokenResponse = retry_with_policy(self.retry, retry_all, || async {
            let response = self
                .http
                .post("https://accounts.spotify.com/api/token")
                .basic_auth(&self.client_id, Some(&self.client_secret))
                .form(&[("grant_type", "client_credentials")])
                .send()
                .await?;
            Ok(response.error_for_status()?.json().await?)
        })
        .await?;

        // Renew one minute early so in-flight requests never race the expiry
        let ttl = Duration::from_secs(response.expires_in.saturating_sub(60));
        *self.token.lock().unwrap() = Some(CachedToken {
            value: response.access_token.clone(),
            expires_at: Instant::now() + ttl,
        });
        Ok(response.access_token)
    }
}

#[async_trait]
impl CatalogLookup for SpotifyCatalog {
    async fn episode(&self, url: &str) -> Result<EpisodeDescriptor> {
        let id = Self::extract_episode_id(url)?;
        let token = self.access_token().await?;
        let endpoint = format!("https://api.spotify.com/v1/episodes/{id}?market=US");

        let episode: SpotifyEpisode = retry_with_policy(self.retry, retry_all, || async {
            let response = self.http.get(&endpoint).bearer_auth(&token).send().await?;
            Ok(response.error_for_status()?.json().await?)
        })
        .await?;

        Ok(EpisodeDescriptor {
            title: episode.name,
            show_name: episode.show.name,
            duration_ms: episode.duration_ms,
            platform: Platform::Spotify,
        })
    }
}

/// Candidate search against the YouTube Data API
pub struct YoutubeSearch {
    http: Client,
    api_key: String,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct YtSearchResponse {
    items: Vec<YtSearchItem>,
}

#[derive(Debug, Deserialize)]
struct YtSearchItem {
    id: YtVideoId,
    snippet: YtSnippet,
}

#[derive(Debug, Deserialize)]
struct YtVideoId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YtSnippet {
    title: String,
    #[serde(rename = "channelTitle")]
    channel_title: String,
}

#[derive(Debug, Deserialize)]
struct YtVideosResponse {
    items: Vec<YtVideoItem>,
}

#[derive(Debug, Deserialize)]
struct YtVideoItem {
    id: String,
    #[serde(rename = "contentDetails")]
    content_details: YtContentDetails,
}

#[derive(Debug, Deserialize)]
struct YtContentDetails {
    duration: String,
}

impl YoutubeSearch {
    pub fn new(http: Client, api_key: String, retry: RetryPolicy) -> Self {
        Self {
            http,
            api_key,
            retry,
        }
    }

    /// Parse an ISO 8601 duration (`PT1H2M3S`) into milliseconds
    fn iso8601_to_ms(duration: &str) -> u64 {
        let re = Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").unwrap();
        let Some(caps) = re.captures(duration) else {
            return 0;
        };
        let part = |i: usize| {
            caps.get(i)
                .and_then(|m| m.as_str().parse::<u64>().ok())
                .unwrap_or(0)
        };
        (part(1) * 3600 + part(2) * 60 + part(3)) * 1000
    }
}

#[async_trait]
impl EpisodeSearch for YoutubeSearch {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let endpoint = format!(
            "https://www.googleapis.com/youtube/v3/search?part=snippet&type=video&maxResults={}&q={}&key={}",
            limit,
            urlencoding::encode(query),
            self.api_key
        );

        let body: YtSearchResponse = retry_with_policy(self.retry, retry_all, || async {
            let response = self.http.get(&endpoint).send().await?;
            Ok(response.error_for_status()?.json().await?)
        })
        .await?;

        let mut hits: Vec<SearchHit> = body
            .items
            .into_iter()
            .filter_map(|item| {
                let video_id = item.id.video_id?;
                Some(SearchHit {
                    episode: EpisodeDescriptor {
                        title: item.snippet.title,
                        show_name: item.snippet.channel_title,
                        duration_ms: 0,
                        platform: Platform::Youtube,
                    },
                    url: format!("https://www.youtube.com/watch?v={video_id}"),
                })
            })
            .collect();

        if hits.is_empty() {
            return Ok(hits);
        }

        // Durations come from a second call; search results carry none
        let ids: Vec<String> = hits
            .iter()
            .filter_map(|h| h.url.rsplit("v=").next().map(str::to_string))
            .collect();
        let videos_endpoint = format!(
            "https://www.googleapis.com/youtube/v3/videos?part=contentDetails&id={}&key={}",
            ids.join(","),
            self.api_key
        );
        let videos: YtVideosResponse = retry_with_policy(self.retry, retry_all, || async {
            let response = self.http.get(&videos_endpoint).send().await?;
            Ok(response.error_for_status()?.json().await?)
        })
        .await?;

        for video in videos.items {
            let duration_ms = Self::iso8601_to_ms(&video.content_details.duration);
            if let Some(hit) = hits.iter_mut().find(|h| h.url.ends_with(&video.id)) {
                hit.episode.duration_ms = duration_ms;
            }
        }

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apple_id_extraction() {
        let with_episode =
            "https://podcasts.apple.com/us/podcast/scaling-systems/id12345?i=100098765";
        assert_eq!(ItunesCatalog::extract_id(with_episode).unwrap(), "100098765");

        let show_only = "https://podcasts.apple.com/us/podcast/scaling-systems/id12345";
        assert_eq!(ItunesCatalog::extract_id(show_only).unwrap(), "12345");

        assert!(ItunesCatalog::extract_id("https://podcasts.apple.com/us/").is_err());
    }

    #[test]
    fn test_spotify_episode_id_extraction() {
        let url = "https://open.spotify.com/episode/4rOoJ6Egrf8K2IrywzwOMk?si=xyz";
        assert_eq!(
            SpotifyCatalog::extract_episode_id(url).unwrap(),
            "4rOoJ6Egrf8K2IrywzwOMk"
        );
        assert!(SpotifyCatalog::extract_episode_id("https://open.spotify.com/show/abc").is_err());
    }

    #[test]
    fn test_iso8601_duration_parsing() {
        assert_eq!(YoutubeSearch::iso8601_to_ms("PT1H2M3S"), 3_723_000);
        assert_eq!(YoutubeSearch::iso8601_to_ms("PT59M40S"), 3_580_000);
        assert_eq!(YoutubeSearch::iso8601_to_ms("PT45S"), 45_000);
        assert_eq!(YoutubeSearch::iso8601_to_ms("bogus"), 0);
    }
}
