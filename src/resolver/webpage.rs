use async_trait::async_trait;
use url::Url;

use super::{Platform, PlatformParser, Resolution};
use crate::Result;

/// Catch-all parser for any well-formed HTTP(S) URL.
///
/// Must be registered last: every URL the dedicated parsers skip lands here.
pub struct WebpageParser;

impl WebpageParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WebpageParser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformParser for WebpageParser {
    fn can_handle(&self, url: &str) -> bool {
        Url::parse(url)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false)
    }

    async fn parse(&self, url: &str) -> Result<Option<Resolution>> {
        Ok(Some(Resolution::same_url(Platform::Webpage, url)))
    }

    fn platform_name(&self) -> &'static str {
        "webpage"
    }
}
