//! Semantic Scholar 文献源（Graph API 的 paper/search）

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::SourcesSection;
use crate::document::Document;
use crate::sources::{DocumentSource, SourceError};

const FIELDS: &str = "title,authors,year,abstract,fieldsOfStudy";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Paper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Paper {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<Author>,
    year: Option<i32>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default)]
    fields_of_study: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: Option<String>,
}

impl Paper {
    fn into_document(self) -> Option<Document> {
        let title = self.title.filter(|t| !t.trim().is_empty())?;
        Some(Document {
            title,
            authors: self.authors.into_iter().filter_map(|a| a.name).collect(),
            year: self.year,
            body: self.abstract_text.unwrap_or_default(),
            fields: self.fields_of_study.unwrap_or_default(),
        })
    }
}

pub struct SemanticScholarSource {
    client: Client,
    api_base: String,
    limit: usize,
}

impl SemanticScholarSource {
    pub fn new(api_base: impl Into<String>, limit: usize, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hive/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            limit: limit.max(1),
        }
    }

    pub fn from_config(cfg: &SourcesSection) -> Self {
        Self::new(
            cfg.api_base.clone(),
            cfg.limit,
            Duration::from_secs(cfg.timeout_secs),
        )
    }
}

#[async_trait]
impl DocumentSource for SemanticScholarSource {
    async fn lookup(&self, title: &str) -> Result<Vec<Document>, SourceError> {
        let url = format!("{}/paper/search", self.api_base);
        let limit = self.limit.to_string();
        let resp = self
            .client
            .get(&url)
            .query(&[("query", title), ("fields", FIELDS), ("limit", limit.as_str())])
            .send()
            .await
            .map_err(|e| SourceError::Http(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(SourceError::Status(resp.status().as_u16()));
        }
        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        let documents: Vec<Document> = body
            .data
            .into_iter()
            .filter_map(Paper::into_document)
            .collect();
        tracing::debug!(query = title, found = documents.len(), "Semantic Scholar lookup");
        Ok(documents)
    }

    fn name(&self) -> &str {
        "semantic_scholar"
    }
}
