//! Cross-platform episode matcher.
//!
//! Catalog platforms (Apple Podcast, Spotify) expose rich episode metadata
//! but rarely a machine-readable transcript. The matcher searches a video
//! platform for the *same* episode using a weighted composite similarity and
//! hands back a better-content-availability URL, keeping the catalog URL as
//! the canonical attribution link.

use async_trait::async_trait;

use crate::resolver::Platform;
use crate::Result;

pub mod catalog;
pub mod similarity;

use similarity::{duration_similarity, text_similarity};

/// Comparison unit for one episode; produced fresh per match attempt
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeDescriptor {
    pub title: String,
    pub show_name: String,
    pub duration_ms: u64,
    pub platform: Platform,
}

/// One ranked match result
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub episode: EpisodeDescriptor,
    pub url: String,
    pub similarity_score: f64,
}

/// Weights for the composite similarity score; must sum to 1
#[derive(Debug, Clone, Copy)]
pub struct MatchWeights {
    pub title: f64,
    pub show: f64,
    pub duration: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            title: 0.5,
            show: 0.3,
            duration: 0.2,
        }
    }
}

impl MatchWeights {
    pub fn new(title: f64, show: f64, duration: f64) -> Result<Self> {
        let sum = title + show + duration;
        if (sum - 1.0).abs() > 1e-6 {
            anyhow::bail!("match weights must sum to 1, got {sum}");
        }
        Ok(Self {
            title,
            show,
            duration,
        })
    }
}

/// Acceptance thresholds per platform pair.
///
/// Catalog-to-catalog metadata is clean, so the bar between Apple and Spotify
/// is stricter than between either catalog and a video platform, where titles
/// and channel names drift.
#[derive(Debug, Clone, Copy)]
pub struct PairThresholds {
    pub catalog_to_catalog: f64,
    pub catalog_to_video: f64,
}

impl Default for PairThresholds {
    fn default() -> Self {
        Self {
            catalog_to_catalog: 0.8,
            catalog_to_video: 0.5,
        }
    }
}

impl PairThresholds {
    pub fn threshold(&self, a: Platform, b: Platform) -> f64 {
        let catalog = |p: Platform| matches!(p, Platform::Apple | Platform::Spotify);
        if catalog(a) && catalog(b) {
            self.catalog_to_catalog
        } else {
            self.catalog_to_video
        }
    }
}

/// Weighted composite similarity between a source episode and a candidate
pub fn composite_score(
    source: &EpisodeDescriptor,
    candidate: &EpisodeDescriptor,
    weights: MatchWeights,
) -> f64 {
    weights.title * text_similarity(&source.title, &candidate.title)
        + weights.show * text_similarity(&source.show_name, &candidate.show_name)
        + weights.duration * duration_similarity(source.duration_ms, candidate.duration_ms)
}

/// Fetches the source episode descriptor from a catalog API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    async fn episode(&self, url: &str) -> Result<EpisodeDescriptor>;
}

/// Search hit on the candidate platform
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub episode: EpisodeDescriptor,
    pub url: String,
}

/// Queries the candidate platform's search API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EpisodeSearch: Send + Sync {
    fn platform(&self) -> Platform;
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;
}

/// Cross-platform episode matcher
pub struct EpisodeMatcher {
    apple: Box<dyn CatalogLookup>,
    spotify: Box<dyn CatalogLookup>,
    search: Box<dyn EpisodeSearch>,
    weights: MatchWeights,
    thresholds: PairThresholds,
    search_limit: usize,
}

impl EpisodeMatcher {
    pub fn new(
        apple: Box<dyn CatalogLookup>,
        spotify: Box<dyn CatalogLookup>,
        search: Box<dyn EpisodeSearch>,
        weights: MatchWeights,
        thresholds: PairThresholds,
        search_limit: usize,
    ) -> Self {
        Self {
            apple,
            spotify,
            search,
            weights,
            thresholds,
            search_limit,
        }
    }

    /// Find the best candidate for `url` on the search platform.
    ///
    /// Returns `Ok(None)` when no candidate clears the pair threshold; that is
    /// an expected outcome, not an error, and the caller falls back to the
    /// original URL.
    pub async fn find_match(
        &self,
        url: &str,
        source_platform: Platform,
    ) -> Result<Option<MatchCandidate>> {
        let lookup = match source_platform {
            Platform::Apple => &self.apple,
            Platform::Spotify => &self.spotify,
            other => anyhow::bail!("not a catalog platform: {other}"),
        };

        let source = lookup.episode(url).await?;
        tracing::info!(
            title = %source.title,
            show = %source.show_name,
            duration_ms = source.duration_ms,
            "matching episode across platforms"
        );

        let hits = self.search.search(&source.title, self.search_limit).await?;
        if hits.is_empty() {
            tracing::info!("no search candidates for episode title");
            return Ok(None);
        }

        // Stable max-selection: ties keep the first hit in result order
        let mut best: Option<MatchCandidate> = None;
        for hit in hits {
            let score = composite_score(&source, &hit.episode, self.weights);
            tracing::debug!(score, candidate = %hit.episode.title, "scored candidate");
            if best.as_ref().map_or(true, |b| score > b.similarity_score) {
                best = Some(MatchCandidate {
                    episode: hit.episode,
                    url: hit.url,
                    similarity_score: score,
                });
            }
        }

        let threshold = self
            .thresholds
            .threshold(source_platform, self.search.platform());
        match best {
            Some(candidate) if candidate.similarity_score >= threshold => {
                tracing::info!(
                    score = candidate.similarity_score,
                    threshold,
                    url = %candidate.url,
                    "accepted cross-platform match"
                );
                Ok(Some(candidate))
            }
            Some(candidate) => {
                tracing::info!(
                    score = candidate.similarity_score,
                    threshold,
                    "best candidate below threshold, no match"
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

/// Convert a `H:MM:SS` or `MM:SS` duration string to milliseconds.
///
/// Unparsable input yields 0, which the similarity function treats as
/// "duration unknown" rather than an error.
pub fn duration_str_to_ms(duration: &str) -> u64 {
    let parts: Vec<Option<u64>> = duration.split(':').map(|p| p.trim().parse().ok()).collect();
    let seconds = match parts.as_slice() {
        [Some(m), Some(s)] => m * 60 + s,
        [Some(h), Some(m), Some(s)] => h * 3600 + m * 60 + s,
        _ => return 0,
    };
    seconds * 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(title: &str, show: &str, duration_ms: u64, platform: Platform) -> EpisodeDescriptor {
        EpisodeDescriptor {
            title: title.to_string(),
            show_name: show.to_string(),
            duration_ms,
            platform,
        }
    }

    fn matcher_with(
        source: EpisodeDescriptor,
        hits: Vec<SearchHit>,
    ) -> EpisodeMatcher {
        let mut apple = MockCatalogLookup::new();
        apple.expect_episode().returning(move |_| Ok(source.clone()));
        let spotify = MockCatalogLookup::new();

        let mut search = MockEpisodeSearch::new();
        search.expect_platform().return_const(Platform::Youtube);
        search.expect_search().returning(move |_, _| Ok(hits.clone()));

        EpisodeMatcher::new(
            Box::new(apple),
            Box::new(spotify),
            Box::new(search),
            MatchWeights::default(),
            PairThresholds::default(),
            5,
        )
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        assert!(MatchWeights::new(0.5, 0.3, 0.2).is_ok());
        assert!(MatchWeights::new(0.5, 0.5, 0.5).is_err());
    }

    #[test]
    fn test_pair_thresholds() {
        let t = PairThresholds::default();
        assert_eq!(t.threshold(Platform::Apple, Platform::Spotify), 0.8);
        assert_eq!(t.threshold(Platform::Spotify, Platform::Youtube), 0.5);
        assert_eq!(t.threshold(Platform::Apple, Platform::Youtube), 0.5);
    }

    #[test]
    fn test_identical_descriptor_scores_one() {
        let d = descriptor("Episode 1", "The Show", 1_000_000, Platform::Apple);
        let score = composite_score(&d, &d, MatchWeights::default());
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_duration_str_to_ms() {
        assert_eq!(duration_str_to_ms("3:43"), 223_000);
        assert_eq!(duration_str_to_ms("1:38:27"), 5_907_000);
        assert_eq!(duration_str_to_ms("nonsense"), 0);
        assert_eq!(duration_str_to_ms("1:2:3:4"), 0);
    }

    #[tokio::test]
    async fn test_accepts_close_video_candidate_above_threshold() {
        // Apple episode "Episode 42: Scaling Systems", 3 600 000 ms; the video
        // platform carries it with a slightly different title and duration.
        let source = descriptor(
            "Episode 42: Scaling Systems",
            "Systems Talk",
            3_600_000,
            Platform::Apple,
        );
        let hits = vec![
            SearchHit {
                episode: descriptor(
                    "Unrelated gardening video",
                    "Green Thumb",
                    600_000,
                    Platform::Youtube,
                ),
                url: "https://www.youtube.com/watch?v=zzz".into(),
            },
            SearchHit {
                episode: descriptor(
                    "Episode 42 - Scaling Systems Talk",
                    "Systems Talk",
                    3_580_000,
                    Platform::Youtube,
                ),
                url: "https://www.youtube.com/watch?v=abc".into(),
            },
        ];

        let matcher = matcher_with(source, hits);
        let result = matcher
            .find_match("https://podcasts.apple.com/us/podcast/id1/ep2", Platform::Apple)
            .await
            .unwrap()
            .expect("should match");

        assert_eq!(result.url, "https://www.youtube.com/watch?v=abc");
        assert!(result.similarity_score >= 0.5);
    }

    #[tokio::test]
    async fn test_no_candidate_above_threshold_returns_none() {
        let source = descriptor("Deep dive on storage engines", "DB Weekly", 4_000_000, Platform::Apple);
        let hits = vec![SearchHit {
            episode: descriptor("Cat compilation 2024", "Cats!", 120_000, Platform::Youtube),
            url: "https://www.youtube.com/watch?v=cat".into(),
        }];

        let matcher = matcher_with(source, hits);
        let result = matcher
            .find_match("https://podcasts.apple.com/us/podcast/id1/ep3", Platform::Apple)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_tie_keeps_first_candidate_in_result_order() {
        let source = descriptor("Same Episode", "Same Show", 1_000_000, Platform::Apple);
        let twin = descriptor("Same Episode", "Same Show", 1_000_000, Platform::Youtube);
        let hits = vec![
            SearchHit {
                episode: twin.clone(),
                url: "https://www.youtube.com/watch?v=first".into(),
            },
            SearchHit {
                episode: twin,
                url: "https://www.youtube.com/watch?v=second".into(),
            },
        ];

        let matcher = matcher_with(source, hits);
        let result = matcher
            .find_match("https://podcasts.apple.com/us/podcast/id1/ep4", Platform::Apple)
            .await
            .unwrap()
            .expect("should match");
        assert_eq!(result.url, "https://www.youtube.com/watch?v=first");
    }

    #[tokio::test]
    async fn test_empty_search_results_is_no_match() {
        let source = descriptor("Episode", "Show", 1_000_000, Platform::Apple);
        let matcher = matcher_with(source, vec![]);
        let result = matcher
            .find_match("https://podcasts.apple.com/us/podcast/id1/ep5", Platform::Apple)
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
