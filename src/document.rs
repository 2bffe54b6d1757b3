//! 文献：流水线的输入单元
//!
//! 以归一化标题作为稳定键（小写、非字母数字折叠为单个空格），用于队列去重与「已处理」判定。

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// 一篇输入文献（至少包含标题与正文/摘要）
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub year: Option<i32>,
    /// 摘要或自由文本正文
    #[serde(default, alias = "abstract")]
    pub body: String,
    /// 研究领域标签
    #[serde(default)]
    pub fields: Vec<String>,
}

impl Document {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    /// 稳定键：归一化标题
    pub fn key(&self) -> String {
        normalize_key(&self.title)
    }
}

fn non_alnum() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\p{L}\p{N}]+").expect("valid regex"))
}

/// 归一化文本：小写、非字母数字折叠为单个空格、去首尾空白
pub fn normalize_key(text: &str) -> String {
    non_alnum()
        .replace_all(&text.to_lowercase(), " ")
        .trim()
        .to_string()
}

/// candidate 的词集合是否包含 title 的全部词（整词比较）
pub fn title_covers(candidate: &str, title: &str) -> bool {
    let candidate = normalize_key(candidate);
    let title = normalize_key(title);
    if title.is_empty() {
        return false;
    }
    let words: HashSet<&str> = candidate.split(' ').collect();
    title.split(' ').all(|w| words.contains(w))
}

/// 从报告中发现的候选文献（仅有标题与线索，待文献源补全）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStub {
    pub title: String,
    #[serde(default)]
    pub fields: Vec<String>,
    /// 发现线索（跨领域洞见 / quick win 描述）
    #[serde(default)]
    pub context: String,
}

impl From<DocumentStub> for Document {
    fn from(stub: DocumentStub) -> Self {
        Document {
            title: stub.title,
            body: stub.context,
            fields: stub.fields,
            ..Document::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_key() {
        assert_eq!(
            normalize_key("  Attention Is All You Need! "),
            "attention is all you need"
        );
        assert_eq!(
            normalize_key("CRISPR--Cas9: a   review"),
            normalize_key("crispr cas9 A review")
        );
    }

    #[test]
    fn test_title_covers_whole_words() {
        assert!(title_covers("Graph Neural Networks: A Review", "graph neural networks"));
        assert!(title_covers("Art", "ART!"));
        assert!(!title_covers("Art", "Partial Differential Equations"));
        assert!(!title_covers("Partial Differential Equations", "art"));
        assert!(!title_covers("Graph networks", "graph neural networks"));
        assert!(!title_covers("anything", "  "));
    }

    #[test]
    fn test_deserialize_abstract_alias() {
        let doc: Document = serde_json::from_str(
            r#"{"title": "Paper", "abstract": "Body text", "fields": ["biology"], "year": 2021}"#,
        )
        .unwrap();
        assert_eq!(doc.body, "Body text");
        assert_eq!(doc.year, Some(2021));
        assert!(doc.authors.is_empty());
    }
}
