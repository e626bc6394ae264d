//! Search module - indexing and permission-scoped retrieval / 搜索模块
//!
//! - `store`: replace-on-write index entries inside the caller's transaction / 索引写入
//! - `indexer`: the same writes, each in its own transaction / 独立事务写入
//! - `visibility`: spaces an identity may see / 可见空间
//! - `keywords`: boolean-mode keywords to FTS5 expressions / 关键词解析
//! - `query`: keyword search over titles, content, tags and attachments / 关键词搜索
//! - `normalize`: HTML to plain text before indexing / HTML 转文本

pub mod indexer;
pub mod keywords;
pub mod normalize;
pub mod query;
pub mod schema;
pub mod store;
pub mod visibility;

pub use indexer::Indexer;
pub use keywords::match_expression;
pub use normalize::{normalize, NormalizeError};
pub use schema::{IndexStats, ItemType, QueryOptions, QueryResult, SearchEntry};
pub use store::SearchStore;
pub use visibility::Visibility;
