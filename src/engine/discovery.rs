//! 文献发现：从报告中提取候选文献，再经文献源补全

use std::collections::HashSet;

use crate::document::{normalize_key, title_covers, Document, DocumentStub};
use crate::report::ResearchReport;
use crate::sources::DocumentSource;

/// 从报告中提取候选文献的策略
pub trait DiscoveryStrategy: Send + Sync {
    fn extract(&self, report: &ResearchReport) -> Vec<DocumentStub>;
}

/// 默认策略：读取跨领域联系与 quick win 中的建议阅读
#[derive(Debug, Default, Clone, Copy)]
pub struct SuggestedReading;

impl DiscoveryStrategy for SuggestedReading {
    fn extract(&self, report: &ResearchReport) -> Vec<DocumentStub> {
        let mut seen = HashSet::new();
        let mut stubs = Vec::new();

        let mut push = |title: &str, fields: &[String], context: &str| {
            let key = normalize_key(title);
            if key.is_empty() || !seen.insert(key) {
                return;
            }
            stubs.push(DocumentStub {
                title: title.trim().to_string(),
                fields: fields.to_vec(),
                context: context.to_string(),
            });
        };

        for connection in &report.cross_field_connections {
            for title in &connection.suggested_reading {
                push(title, &connection.fields, &connection.insight);
            }
        }
        for win in &report.quick_wins {
            for title in &win.suggested_reading {
                push(title, &report.fields, &win.description);
            }
        }
        stubs
    }
}

/// 用文献源补全候选；只接受标题整词覆盖候选标题的结果，否则保留候选本身
pub async fn enrich(stub: DocumentStub, source: Option<&dyn DocumentSource>) -> Document {
    let Some(source) = source else {
        return stub.into();
    };
    match source.lookup(&stub.title).await {
        Ok(found) => match found
            .into_iter()
            .find(|doc| title_covers(&doc.title, &stub.title))
        {
            Some(mut doc) => {
                if doc.fields.is_empty() {
                    doc.fields = stub.fields;
                }
                doc
            }
            None => {
                tracing::debug!(source = source.name(), title = %stub.title, "No matching title");
                stub.into()
            }
        },
        Err(e) => {
            tracing::warn!(source = source.name(), title = %stub.title, "Lookup failed: {}", e);
            stub.into()
        }
    }
}
