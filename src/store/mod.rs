//! Persistence collaborator contract.
//!
//! The pipeline treats the store purely as a keyed record store with
//! last-write-wins update semantics; no transactions are assumed across
//! calls. The REST implementation talks to a PostgREST-style table API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::resolver::Platform;
use crate::Result;

pub mod rest;

/// Lifecycle status of one ingestion request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Processing,
    Processed,
    Failed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Processing => "processing",
            RequestStatus::Processed => "processed",
            RequestStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewRequest {
    pub original_url: String,
    pub resolved_url: Option<String>,
    pub platform: Option<Platform>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: i64,
    pub original_url: String,
    pub resolved_url: Option<String>,
    pub platform: Option<Platform>,
    pub status: RequestStatus,
    pub error_message: Option<String>,
    pub content: Option<String>,
    pub article_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewArticle {
    pub request_id: i64,
    pub title: String,
    pub cover_url: Option<String>,
    pub publish_date: Option<DateTime<Utc>>,
    pub author_id: Option<i64>,
    pub channel: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: i64,
    pub request_id: i64,
    pub title: String,
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewSection {
    pub section_type: String,
    pub content: String,
    pub language: String,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewAuthor {
    pub name: String,
    pub icon: Option<String>,
    pub platform: Platform,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub id: i64,
    pub name: String,
}

/// Keyed record store consumed by the orchestration engine
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn create_request(&self, request: &NewRequest) -> Result<RequestRecord>;

    async fn update_status<'a>(
        &self,
        request_id: i64,
        status: RequestStatus,
        error_message: Option<&'a str>,
    ) -> Result<()>;

    /// Record the outcome of URL resolution on the request
    async fn update_resolution(
        &self,
        request_id: i64,
        platform: Platform,
        resolved_url: &str,
    ) -> Result<()>;

    async fn update_content(&self, request_id: i64, content: &str) -> Result<()>;

    async fn create_article(&self, article: &NewArticle) -> Result<ArticleRecord>;

    /// Flip the article to externally visible once the fan-out settles
    async fn publish_article(&self, article_id: i64) -> Result<()>;

    async fn create_sections(&self, article_id: i64, sections: &[NewSection]) -> Result<()>;

    /// Remove existing sections of one type and language before re-creating
    async fn delete_sections(
        &self,
        article_id: i64,
        section_type: &str,
        language: &str,
    ) -> Result<()>;

    async fn get_request_by_article_id(&self, article_id: i64) -> Result<Option<RequestRecord>>;

    async fn get_article_by_request_id(&self, request_id: i64) -> Result<Option<ArticleRecord>>;

    async fn find_author_by_name(&self, name: &str) -> Result<Option<AuthorRecord>>;

    async fn create_author(&self, author: &NewAuthor) -> Result<AuthorRecord>;
}
