//! Search index schema definition / 搜索索引的 Schema 定义

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of indexed unit / 索引条目类型
///
/// Closed set; the `search.item_type` column has a CHECK constraint on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// Document title / 文档标题
    Doc,
    /// Page body / 页面正文
    Page,
    /// Single tag token / 标签
    Tag,
    /// Attachment filename / 附件文件名
    File,
}

impl ItemType {
    /// Search order when several item types are requested / 查询顺序
    pub const ALL: [ItemType; 4] = [ItemType::Doc, ItemType::Page, ItemType::Tag, ItemType::File];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Doc => "doc",
            Self::Page => "page",
            Self::Tag => "tag",
            Self::File => "file",
        }
    }

    /// Human label used in error context / 错误描述
    pub fn describe(self) -> &'static str {
        match self {
            Self::Doc => "document names",
            Self::Page => "document content",
            Self::Tag => "document tag",
            Self::File => "document attachments",
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown search item type: {0}")]
pub struct UnknownItemType(pub String);

impl TryFrom<String> for ItemType {
    type Error = UnknownItemType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "doc" => Ok(Self::Doc),
            "page" => Ok(Self::Page),
            "tag" => Ok(Self::Tag),
            "file" => Ok(Self::File),
            _ => Err(UnknownItemType(value)),
        }
    }
}

/// One row of the `search` table / 索引条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SearchEntry {
    pub org_id: String,
    pub document_id: String,
    /// Empty for `doc` and `tag` entries / 标题与标签条目为空
    pub item_id: String,
    #[sqlx(try_from = "String")]
    pub item_type: ItemType,
    pub content: String,
}

/// Search query options / 搜索查询选项
///
/// Each enabled switch costs exactly one scoped query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Keywords, passed to the full-text engine verbatim / 搜索关键词
    pub keywords: String,
    #[serde(rename = "doc", default)]
    pub match_titles: bool,
    #[serde(rename = "content", default)]
    pub match_content: bool,
    #[serde(rename = "tag", default)]
    pub match_tags: bool,
    #[serde(rename = "attachment", default)]
    pub match_attachments: bool,
}

impl QueryOptions {
    /// All item types disabled / 默认全部关闭
    pub fn new(keywords: impl Into<String>) -> Self {
        Self {
            keywords: keywords.into(),
            ..Default::default()
        }
    }

    /// Every item type enabled / 全部启用
    pub fn everything(keywords: impl Into<String>) -> Self {
        Self::new(keywords)
            .titles(true)
            .content(true)
            .tags(true)
            .attachments(true)
    }

    pub fn titles(mut self, enabled: bool) -> Self {
        self.match_titles = enabled;
        self
    }

    pub fn content(mut self, enabled: bool) -> Self {
        self.match_content = enabled;
        self
    }

    pub fn tags(mut self, enabled: bool) -> Self {
        self.match_tags = enabled;
        self
    }

    pub fn attachments(mut self, enabled: bool) -> Self {
        self.match_attachments = enabled;
        self
    }

    /// Whether the switch for an item type is on / 是否启用该类型
    pub fn matches(&self, item_type: ItemType) -> bool {
        match item_type {
            ItemType::Doc => self.match_titles,
            ItemType::Page => self.match_content,
            ItemType::Tag => self.match_tags,
            ItemType::File => self.match_attachments,
        }
    }

    /// Enabled item types in search order / 启用的类型
    pub fn enabled(&self) -> impl Iterator<Item = ItemType> + '_ {
        ItemType::ALL.into_iter().filter(|t| self.matches(*t))
    }
}

/// Search result, returned to the client as-is / 搜索结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct QueryResult {
    pub id: i64,
    pub org_id: String,
    pub document_id: String,
    pub item_id: String,
    #[sqlx(try_from = "String")]
    pub item_type: ItemType,
    pub space_id: String,
    /// Document title / 文档标题
    pub document: String,
    pub tags: String,
    pub excerpt: String,
    /// Space name, `Unknown` when the space is gone / 空间名称
    pub space: String,
}

/// Per-organization entry counts / 索引统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub doc_count: u64,
    pub page_count: u64,
    pub tag_count: u64,
    pub file_count: u64,
}

impl IndexStats {
    pub fn total(&self) -> u64 {
        self.doc_count + self.page_count + self.tag_count + self.file_count
    }

    pub(crate) fn add(&mut self, item_type: ItemType, count: u64) {
        match item_type {
            ItemType::Doc => self.doc_count += count,
            ItemType::Page => self.page_count += count,
            ItemType::Tag => self.tag_count += count,
            ItemType::File => self.file_count += count,
        }
    }
}
