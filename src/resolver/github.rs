use async_trait::async_trait;

use super::{Platform, PlatformParser, Resolution};
use crate::Result;

/// GitHub repository / document parser
pub struct GithubParser;

impl GithubParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GithubParser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformParser for GithubParser {
    fn can_handle(&self, url: &str) -> bool {
        url.contains("github.com/") || url.contains("gist.github.com/")
    }

    async fn parse(&self, url: &str) -> Result<Option<Resolution>> {
        Ok(Some(Resolution::same_url(Platform::Github, url)))
    }

    fn platform_name(&self) -> &'static str {
        "github"
    }
}
