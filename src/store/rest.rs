//! PostgREST-style table client.
//!
//! Each call is a single stateless HTTP request against one table; updates
//! are last-write-wins. Table names follow the hosted schema.

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use super::{
    ArticleRecord, ArticleStore, AuthorRecord, NewArticle, NewAuthor, NewRequest, NewSection,
    RequestRecord, RequestStatus,
};
use crate::resolver::Platform;
use crate::Result;

const REQUESTS_TABLE: &str = "keep_article_requests";
const ARTICLES_TABLE: &str = "keep_articles";
const SECTIONS_TABLE: &str = "keep_article_sections";
const AUTHORS_TABLE: &str = "keep_authors";

pub struct RestStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestStore {
    pub fn new(http: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn insert_returning<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .authed(self.http.post(self.table_url(table)))
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("insert into {table} failed"))?;

        let mut rows: Vec<T> = response.json().await?;
        rows.pop()
            .ok_or_else(|| anyhow::anyhow!("insert into {table} returned no row"))
    }

    async fn patch_by_id(&self, table: &str, id: i64, body: serde_json::Value) -> Result<()> {
        self.authed(self.http.patch(self.table_url(table)))
            .query(&[("id", format!("eq.{id}"))])
            .json(&body)
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("update of {table}/{id} failed"))?;
        Ok(())
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        filter_column: &str,
        filter_value: &str,
    ) -> Result<Option<T>> {
        let response = self
            .authed(self.http.get(self.table_url(table)))
            .query(&[
                (filter_column, format!("eq.{filter_value}")),
                ("limit", "1".to_string()),
            ])
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("select from {table} failed"))?;

        let mut rows: Vec<T> = response.json().await?;
        Ok(rows.pop())
    }
}

#[async_trait]
impl ArticleStore for RestStore {
    async fn create_request(&self, request: &NewRequest) -> Result<RequestRecord> {
        self.insert_returning(REQUESTS_TABLE, request).await
    }

    async fn update_status<'a>(
        &self,
        request_id: i64,
        status: RequestStatus,
        error_message: Option<&'a str>,
    ) -> Result<()> {
        let body = json!({
            "status": status.as_str(),
            "error_message": error_message,
        });
        self.patch_by_id(REQUESTS_TABLE, request_id, body).await
    }

    async fn update_resolution(
        &self,
        request_id: i64,
        platform: Platform,
        resolved_url: &str,
    ) -> Result<()> {
        let body = json!({
            "platform": platform.as_str(),
            "resolved_url": resolved_url,
        });
        self.patch_by_id(REQUESTS_TABLE, request_id, body).await
    }

    async fn update_content(&self, request_id: i64, content: &str) -> Result<()> {
        self.patch_by_id(REQUESTS_TABLE, request_id, json!({ "content": content }))
            .await
    }

    async fn create_article(&self, article: &NewArticle) -> Result<ArticleRecord> {
        self.insert_returning(ARTICLES_TABLE, article).await
    }

    async fn publish_article(&self, article_id: i64) -> Result<()> {
        self.patch_by_id(ARTICLES_TABLE, article_id, json!({ "visible": true }))
            .await
    }

    async fn create_sections(&self, article_id: i64, sections: &[NewSection]) -> Result<()> {
        let rows: Vec<serde_json::Value> = sections
            .iter()
            .map(|s| {
                json!({
                    "article_id": article_id,
                    "section_type": s.section_type,
                    "content": s.content,
                    "language": s.language,
                    "sort_order": s.sort_order,
                })
            })
            .collect();

        self.authed(self.http.post(self.table_url(SECTIONS_TABLE)))
            .json(&rows)
            .send()
            .await?
            .error_for_status()
            .context("insert of article sections failed")?;
        Ok(())
    }

    async fn delete_sections(
        &self,
        article_id: i64,
        section_type: &str,
        language: &str,
    ) -> Result<()> {
        self.authed(self.http.delete(self.table_url(SECTIONS_TABLE)))
            .query(&[
                ("article_id", format!("eq.{article_id}")),
                ("section_type", format!("eq.{section_type}")),
                ("language", format!("eq.{language}")),
            ])
            .send()
            .await?
            .error_for_status()
            .context("delete of article sections failed")?;
        Ok(())
    }

    async fn get_request_by_article_id(&self, article_id: i64) -> Result<Option<RequestRecord>> {
        self.select_one(REQUESTS_TABLE, "article_id", &article_id.to_string())
            .await
    }

    async fn get_article_by_request_id(&self, request_id: i64) -> Result<Option<ArticleRecord>> {
        self.select_one(ARTICLES_TABLE, "request_id", &request_id.to_string())
            .await
    }

    async fn find_author_by_name(&self, name: &str) -> Result<Option<AuthorRecord>> {
        self.select_one(AUTHORS_TABLE, "name", name).await
    }

    async fn create_author(&self, author: &NewAuthor) -> Result<AuthorRecord> {
        self.insert_returning(AUTHORS_TABLE, author).await
    }
}
