//! Platform resolver: classifies a raw URL and normalizes it.
//!
//! Detection runs over a fixed, priority-ordered list of parsers; the first
//! parser whose `can_handle` returns true and whose `parse` yields a result
//! wins. Detectors are not mutually exclusive by construction, so order
//! matters: the generic webpage parser accepts any HTTP(S) URL and must stay
//! last.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::matcher::EpisodeMatcher;
use crate::Result;

pub mod bilibili;
pub mod catalog;
pub mod github;
pub mod webpage;
pub mod wechat;
pub mod youtube;

/// Originating source type of a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Bilibili,
    Apple,
    Spotify,
    Wechat,
    Webpage,
    File,
    Github,
    Private,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Bilibili => "bilibili",
            Platform::Apple => "apple",
            Platform::Spotify => "spotify",
            Platform::Wechat => "wechat",
            Platform::Webpage => "webpage",
            Platform::File => "file",
            Platform::Github => "github",
            Platform::Private => "private",
        }
    }

    /// Content channel used to pick the LLM workflow for this platform
    pub fn channel(&self) -> ContentChannel {
        match self {
            Platform::Youtube | Platform::Bilibili => ContentChannel::Video,
            Platform::Apple | Platform::Spotify => ContentChannel::Podcast,
            Platform::Wechat | Platform::Webpage | Platform::Github => ContentChannel::Article,
            Platform::File | Platform::Private => ContentChannel::Document,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broad content category, one axis of workflow selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentChannel {
    Video,
    Podcast,
    Article,
    Document,
}

impl ContentChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentChannel::Video => "video",
            ContentChannel::Podcast => "podcast",
            ContentChannel::Article => "article",
            ContentChannel::Document => "document",
        }
    }
}

/// Resolver output: classified platform plus normalized and original URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub platform: Platform,
    pub resolved_url: String,
    pub original_url: String,
}

impl Resolution {
    pub fn same_url(platform: Platform, url: &str) -> Self {
        Self {
            platform,
            resolved_url: url.to_string(),
            original_url: url.to_string(),
        }
    }
}

/// One platform detector in the resolver chain
#[async_trait]
pub trait PlatformParser: Send + Sync {
    /// Cheap, synchronous URL-shape check
    fn can_handle(&self, url: &str) -> bool;

    /// Classify and normalize; `None` means "looked like ours but is not",
    /// letting later parsers have a go
    async fn parse(&self, url: &str) -> Result<Option<Resolution>>;

    fn platform_name(&self) -> &'static str;
}

/// Fixed priority-ordered collection of platform parsers
pub struct ContentResolver {
    parsers: Vec<Box<dyn PlatformParser>>,
}

impl ContentResolver {
    /// Build the default parser chain. The catalog parsers get the matcher so
    /// they can substitute a better-content-availability URL; the webpage
    /// parser is registered last as the catch-all.
    pub fn new(http: reqwest::Client, matcher: Arc<EpisodeMatcher>) -> Self {
        let mut resolver = Self {
            parsers: Vec::new(),
        };
        resolver.register(Box::new(wechat::WechatParser::new()));
        resolver.register(Box::new(github::GithubParser::new()));
        resolver.register(Box::new(bilibili::BilibiliParser::new(http)));
        resolver.register(Box::new(youtube::YoutubeParser::new()));
        resolver.register(Box::new(catalog::ApplePodcastParser::new(matcher.clone())));
        resolver.register(Box::new(catalog::SpotifyParser::new(matcher)));
        resolver.register(Box::new(webpage::WebpageParser::new()));
        resolver
    }

    /// Build an empty resolver; used with explicit `register` calls
    pub fn empty() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    pub fn register(&mut self, parser: Box<dyn PlatformParser>) {
        self.parsers.push(parser);
    }

    pub fn list_platforms(&self) -> Vec<&'static str> {
        self.parsers.iter().map(|p| p.platform_name()).collect()
    }

    /// Resolve a URL to its platform. `Ok(None)` means no detector matched;
    /// the caller treats that as a terminal resolution failure.
    pub async fn resolve(&self, url: &str) -> Result<Option<Resolution>> {
        tracing::info!(url, "resolving URL");
        for parser in &self.parsers {
            if parser.can_handle(url) {
                if let Some(resolution) = parser.parse(url).await? {
                    tracing::info!(
                        platform = %resolution.platform,
                        resolved = %resolution.resolved_url,
                        "URL resolved"
                    );
                    return Ok(Some(resolution));
                }
            }
        }
        tracing::warn!(url, "no platform parser matched URL");
        Ok(None)
    }
}

/// Whether the input looks like a local file path rather than a URL
pub fn is_local_path(input: &str) -> bool {
    if input.starts_with("http://") || input.starts_with("https://") {
        return false;
    }
    let path = std::path::Path::new(input);
    path.exists() || path.extension().is_some() || input.contains('/') || input.contains('\\')
}
