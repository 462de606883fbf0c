use async_trait::async_trait;
use std::path::Path;

use super::{ContentFetcher, ContentMetadata};
use crate::resolver::is_local_path;
use crate::Result;

const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "srt", "vtt"];

/// Fetcher for locally uploaded text/transcript files
pub struct FileFetcher;

impl FileFetcher {
    pub fn new() -> Self {
        Self
    }

    fn is_text_file(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| TEXT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
    }
}

impl Default for FileFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentFetcher for FileFetcher {
    fn can_handle(&self, url: &str) -> bool {
        is_local_path(url) && Self::is_text_file(Path::new(url))
    }

    fn platform_name(&self) -> &'static str {
        "file"
    }

    async fn fetch_content(&self, url: &str) -> Result<Option<String>> {
        let content = fs_err::read_to_string(url)?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(content))
    }

    async fn fetch_metadata(&self, url: &str) -> Result<Option<ContentMetadata>> {
        let path = Path::new(url);
        let title = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("uploaded file")
            .to_string();
        Ok(Some(ContentMetadata {
            title,
            author: String::new(),
            cover_url: None,
            publish_date: None,
            duration_secs: None,
        }))
    }
}
