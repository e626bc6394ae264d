//! Query engine - permission-scoped keyword search / 权限范围内的关键词搜索
//!
//! One query per enabled item type, results concatenated in the order
//! doc, page, tag, file. Titles, content and tags go through the FTS5 index
//! with keywords translated by `keywords::match_expression`; attachment
//! filenames use substring matching.

use once_cell::sync::Lazy;
use sqlx::Statement;

use super::keywords::match_expression;
use super::schema::{ItemType, QueryOptions, QueryResult};
use super::store::{prepare, SearchStore};
use super::visibility::Visibility;
use crate::error::SearchError;
use crate::models::RequestContext;

/// SQL per item type, built once / 每种类型的查询语句
static MATCH_SQL: Lazy<[String; 4]> = Lazy::new(|| ItemType::ALL.map(build_match_sql));

fn match_sql(item_type: ItemType) -> &'static str {
    let index = ItemType::ALL
        .iter()
        .position(|t| *t == item_type)
        .unwrap_or_default();
    &MATCH_SQL[index]
}

fn build_match_sql(item_type: ItemType) -> String {
    let matcher = match item_type {
        // Filenames are too short for relevance ranking / 文件名使用 LIKE
        ItemType::File => "s.content LIKE ?",
        ItemType::Doc | ItemType::Page | ItemType::Tag => {
            "s.id IN (SELECT rowid FROM search_fts WHERE search_fts MATCH ?)"
        }
    };

    // A document whose space row is gone still surfaces, labelled Unknown
    format!(
        r#"
        SELECT
            s.id, s.org_id, s.document_id, s.item_id, s.item_type,
            d.space_id, COALESCE(d.title, 'Unknown') AS document, d.tags, d.excerpt,
            COALESCE(sp.name, 'Unknown') AS space
        FROM search s
        JOIN document d ON d.org_id = s.org_id AND d.ref_id = s.document_id
        LEFT JOIN space sp ON sp.org_id = d.org_id AND sp.ref_id = d.space_id
        WHERE s.org_id = ?
            AND s.item_type = '{item_type}'
            AND (sp.ref_id IS NULL OR {visible})
            AND {matcher}
        "#,
        item_type = item_type.as_str(),
        visible = Visibility::predicate("d.space_id"),
        matcher = matcher,
    )
}

/// Substring pattern for filename search / 文件名匹配模式
///
/// Quotes and `%` are removed before wrapping so they cannot break the
/// pattern or act as wildcards.
pub fn like_pattern(keywords: &str) -> String {
    let cleaned: String = keywords
        .chars()
        .filter(|c| !matches!(c, '\'' | '"' | '%'))
        .collect();
    format!("%{}%", cleaned)
}

impl SearchStore {
    /// Search documents the identity may see / 搜索用户可见文档
    ///
    /// Blank keywords return nothing without touching the database.
    pub async fn search(
        &self,
        ctx: &RequestContext,
        options: &QueryOptions,
    ) -> Result<Vec<QueryResult>, SearchError> {
        let keywords = options.keywords.trim();
        if keywords.is_empty() {
            return Ok(Vec::new());
        }

        let expression = match_expression(keywords);
        let mut results = Vec::new();
        for item_type in options.enabled() {
            let term = match (item_type, &expression) {
                (ItemType::File, _) => like_pattern(keywords),
                (_, Some(expression)) => expression.clone(),
                (_, None) => {
                    tracing::debug!("No full-text terms in {:?}, skipping {}", keywords, item_type);
                    continue;
                }
            };

            let hits = self.match_item_type(ctx, item_type, term).await?;
            tracing::debug!("Search {} in {}: {} hits", item_type, ctx.org_id, hits.len());
            results.extend(hits);
        }

        Ok(results)
    }

    async fn match_item_type(
        &self,
        ctx: &RequestContext,
        item_type: ItemType,
        term: String,
    ) -> Result<Vec<QueryResult>, SearchError> {
        let operation = format!("search {}", item_type.describe());
        let stmt = prepare(self.pool(), match_sql(item_type), &operation).await?;
        let mut query = stmt.query_as::<QueryResult>().bind(&ctx.org_id);
        for value in Visibility::new(ctx).params() {
            query = query.bind(value);
        }

        query
            .bind(term)
            .fetch_all(self.pool())
            .await
            .map_err(|e| SearchError::execution(operation, e))
    }
}
