//! Value objects handed in by the document/page/attachment handlers / 外部实体
//!
//! These are owned by the surrounding wiki; the search core only reads them.

use serde::{Deserialize, Serialize};

/// Tag separator inside `Document::tags` / 标签分隔符
pub const TAG_SEPARATOR: char = '#';

/// Per-request identity / 请求上下文
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub org_id: String,
    pub user_id: String,
}

impl RequestContext {
    pub fn new(org_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            user_id: user_id.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub ref_id: String,
    pub org_id: String,
    pub space_id: String,
    pub title: String,
    /// `#`-joined tag tokens, e.g. `#alpha#beta#`
    pub tags: String,
    pub excerpt: String,
}

impl Document {
    /// Non-empty tag tokens in declaration order, duplicates kept / 拆分标签
    pub fn tag_tokens(&self) -> impl Iterator<Item = &str> {
        self.tags.split(TAG_SEPARATOR).filter(|t| !t.is_empty())
    }
}

/// Document section with rendered HTML body / 文档页面
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Page {
    pub ref_id: String,
    pub document_id: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Attachment {
    pub ref_id: String,
    pub document_id: String,
    pub filename: String,
}

/// Space visibility type, stored as integer / 空间类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i64)]
pub enum SpaceType {
    /// Shared through the default (empty user) role grant
    Public = 1,
    /// Owned by one user
    Personal = 2,
    /// Shared through per-user role grants
    Restricted = 3,
}

impl SpaceType {
    pub fn as_i64(self) -> i64 {
        self as i64
    }
}

impl TryFrom<i64> for SpaceType {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Public),
            2 => Ok(Self::Personal),
            3 => Ok(Self::Restricted),
            other => Err(other),
        }
    }
}
