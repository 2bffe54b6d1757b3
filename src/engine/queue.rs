//! 工作队列：待探索文献的 FIFO
//!
//! 以归一化标题去重：键已在队列中时入队为空操作；出队时键随之移除。队列有容量上限。

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::document::Document;

/// 入队结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Added,
    Duplicate,
    Full,
    /// 标题归一化后为空
    Invalid,
}

/// 队列快照（只用于观测）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub length: usize,
    pub titles: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct WorkQueue {
    items: VecDeque<Document>,
    keys: HashSet<String>,
    capacity: usize,
}

impl WorkQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            keys: HashSet::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn enqueue(&mut self, document: Document) -> Enqueued {
        let key = document.key();
        if key.is_empty() {
            return Enqueued::Invalid;
        }
        if self.keys.contains(&key) {
            return Enqueued::Duplicate;
        }
        if self.items.len() >= self.capacity {
            return Enqueued::Full;
        }
        self.keys.insert(key);
        self.items.push_back(document);
        Enqueued::Added
    }

    /// 取出至多 n 篇文献（保持 FIFO 顺序）
    pub fn pop_batch(&mut self, n: usize) -> Vec<Document> {
        let take = n.min(self.items.len());
        let batch: Vec<Document> = self.items.drain(..take).collect();
        for doc in &batch {
            self.keys.remove(&doc.key());
        }
        batch
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.keys.clear();
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            length: self.items.len(),
            titles: self.items.iter().map(|d| d.title.clone()).collect(),
        }
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new(50)
    }
}
