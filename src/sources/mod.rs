//! 文献源：把报告中发现的候选标题补全为完整文献
//!
//! 查找失败或无结果时由调用方退回到候选本身（只有标题与线索）。

pub mod semantic_scholar;

use async_trait::async_trait;
use thiserror::Error;

use crate::document::{normalize_key, title_covers, Document};

pub use semantic_scholar::SemanticScholarSource;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Request failed: {0}")]
    Http(String),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("Decode error: {0}")]
    Decode(String),
}

/// 文献查找接口
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// 按标题查找；结果按相关度排序
    async fn lookup(&self, title: &str) -> Result<Vec<Document>, SourceError>;

    fn name(&self) -> &str {
        "source"
    }
}

/// 内存文献目录（本地语料、测试）
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    documents: Vec<Document>,
}

impl StaticSource {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl DocumentSource for StaticSource {
    /// 键完全相同的排在前面，其次是标题整词包含查询的
    async fn lookup(&self, title: &str) -> Result<Vec<Document>, SourceError> {
        let key = normalize_key(title);
        if key.is_empty() {
            return Ok(Vec::new());
        }
        let mut exact = Vec::new();
        let mut partial = Vec::new();
        for doc in &self.documents {
            let doc_key = doc.key();
            if doc_key == key {
                exact.push(doc.clone());
            } else if title_covers(&doc.title, title) {
                partial.push(doc.clone());
            }
        }
        exact.extend(partial);
        Ok(exact)
    }

    fn name(&self) -> &str {
        "static"
    }
}
