//! Catalog-platform parsers (Apple Podcast, Spotify).
//!
//! Catalog episodes carry rich metadata but rarely a retrievable transcript,
//! so these parsers ask the episode matcher for an equivalent URL on a video
//! platform. When no candidate clears the threshold — or the matcher itself
//! fails — the original URL is kept unchanged; a missing match is never a
//! resolution failure.

use async_trait::async_trait;
use std::sync::Arc;

use super::{Platform, PlatformParser, Resolution};
use crate::matcher::EpisodeMatcher;
use crate::Result;

pub struct ApplePodcastParser {
    matcher: Arc<EpisodeMatcher>,
}

impl ApplePodcastParser {
    pub fn new(matcher: Arc<EpisodeMatcher>) -> Self {
        Self { matcher }
    }
}

#[async_trait]
impl PlatformParser for ApplePodcastParser {
    fn can_handle(&self, url: &str) -> bool {
        url.contains("podcasts.apple.com")
    }

    async fn parse(&self, url: &str) -> Result<Option<Resolution>> {
        Ok(Some(match_or_fallback(&self.matcher, url, Platform::Apple).await))
    }

    fn platform_name(&self) -> &'static str {
        "apple"
    }
}

pub struct SpotifyParser {
    matcher: Arc<EpisodeMatcher>,
}

impl SpotifyParser {
    pub fn new(matcher: Arc<EpisodeMatcher>) -> Self {
        Self { matcher }
    }
}

#[async_trait]
impl PlatformParser for SpotifyParser {
    fn can_handle(&self, url: &str) -> bool {
        url.contains("open.spotify.com/episode")
    }

    async fn parse(&self, url: &str) -> Result<Option<Resolution>> {
        Ok(Some(match_or_fallback(&self.matcher, url, Platform::Spotify).await))
    }

    fn platform_name(&self) -> &'static str {
        "spotify"
    }
}

async fn match_or_fallback(
    matcher: &EpisodeMatcher,
    url: &str,
    platform: Platform,
) -> Resolution {
    match matcher.find_match(url, platform).await {
        Ok(Some(candidate)) => Resolution {
            platform,
            resolved_url: candidate.url,
            original_url: url.to_string(),
        },
        Ok(None) => {
            tracing::info!(url, "no cross-platform match, keeping catalog URL");
            Resolution::same_url(platform, url)
        }
        Err(err) => {
            tracing::warn!(url, "episode matching failed, keeping catalog URL: {err:#}");
            Resolution::same_url(platform, url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{
        EpisodeDescriptor, MatchWeights, MockCatalogLookup, MockEpisodeSearch, PairThresholds,
        SearchHit,
    };

    fn matcher(apple: MockCatalogLookup, search: MockEpisodeSearch) -> Arc<EpisodeMatcher> {
        Arc::new(EpisodeMatcher::new(
            Box::new(apple),
            Box::new(MockCatalogLookup::new()),
            Box::new(search),
            MatchWeights::default(),
            PairThresholds::default(),
            5,
        ))
    }

    fn episode(title: &str, platform: Platform) -> EpisodeDescriptor {
        EpisodeDescriptor {
            title: title.to_string(),
            show_name: "Show".to_string(),
            duration_ms: 1_000_000,
            platform,
        }
    }

    #[tokio::test]
    async fn test_substitutes_matched_video_url() {
        let mut apple = MockCatalogLookup::new();
        apple
            .expect_episode()
            .returning(|_| Ok(episode("Exact Title", Platform::Apple)));

        let mut search = MockEpisodeSearch::new();
        search.expect_platform().return_const(Platform::Youtube);
        search.expect_search().returning(|_, _| {
            Ok(vec![SearchHit {
                episode: episode("Exact Title", Platform::Youtube),
                url: "https://www.youtube.com/watch?v=match".into(),
            }])
        });

        let parser = ApplePodcastParser::new(matcher(apple, search));
        let url = "https://podcasts.apple.com/us/podcast/show/id1?i=2";
        let res = parser.parse(url).await.unwrap().unwrap();

        assert_eq!(res.platform, Platform::Apple);
        assert_eq!(res.resolved_url, "https://www.youtube.com/watch?v=match");
        assert_eq!(res.original_url, url);
    }

    #[tokio::test]
    async fn test_falls_back_to_original_url_when_matcher_errors() {
        let mut apple = MockCatalogLookup::new();
        apple
            .expect_episode()
            .returning(|_| anyhow::bail!("catalog API down"));

        let mut search = MockEpisodeSearch::new();
        search.expect_platform().return_const(Platform::Youtube);

        let parser = ApplePodcastParser::new(matcher(apple, search));
        let url = "https://podcasts.apple.com/us/podcast/show/id1?i=2";
        let res = parser.parse(url).await.unwrap().unwrap();

        assert_eq!(res.resolved_url, url);
        assert_eq!(res.original_url, url);
    }
}
