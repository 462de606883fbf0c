use async_trait::async_trait;
use regex::Regex;

use super::{Platform, PlatformParser, Resolution};
use crate::Result;

/// YouTube URL parser: accepts watch, share and shorts links and normalizes
/// them all to `https://www.youtube.com/watch?v=<id>`
pub struct YoutubeParser {
    video_id: Regex,
}

impl YoutubeParser {
    pub fn new() -> Self {
        Self {
            video_id: Regex::new(
                r"(?:youtube\.com/(?:watch\?(?:.*&)?v=|shorts/|live/|embed/)|youtu\.be/)([A-Za-z0-9_-]{6,})",
            )
            .unwrap(),
        }
    }

    fn extract_video_id(&self, url: &str) -> Option<String> {
        self.video_id
            .captures(url)
            .map(|caps| caps[1].to_string())
    }
}

impl Default for YoutubeParser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformParser for YoutubeParser {
    fn can_handle(&self, url: &str) -> bool {
        url.contains("youtube.com/") || url.contains("youtu.be/")
    }

    async fn parse(&self, url: &str) -> Result<Option<Resolution>> {
        let Some(video_id) = self.extract_video_id(url) else {
            return Ok(None);
        };
        Ok(Some(Resolution {
            platform: Platform::Youtube,
            resolved_url: format!("https://www.youtube.com/watch?v={video_id}"),
            original_url: url.to_string(),
        }))
    }

    fn platform_name(&self) -> &'static str {
        "youtube"
    }
}
