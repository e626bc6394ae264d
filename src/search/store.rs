//! Index store - replace-on-write search entries / 索引存储
//!
//! Every write runs inside the caller's transaction: the store never begins,
//! commits or rolls back. Units are replaced by delete-then-insert, so indexing
//! the same unit twice leaves one copy and shrinking tag/attachment sets need
//! no diffing.

use chrono::Utc;
use sqlx::sqlite::SqliteStatement;
use sqlx::{Executor, Pool, Sqlite, Statement, Transaction};

use super::normalize::normalize;
use super::schema::{IndexStats, ItemType};
use crate::error::SearchError;
use crate::models::{Attachment, Document, Page, RequestContext};

const SQL_DELETE_DOCUMENT_ITEMS: &str =
    "DELETE FROM search WHERE org_id = ? AND document_id = ? AND item_type IN ('doc', 'file', 'tag')";

const SQL_DELETE_DOCUMENT: &str = "DELETE FROM search WHERE org_id = ? AND document_id = ?";

const SQL_DELETE_DOCUMENT_PAGE: &str =
    "DELETE FROM search WHERE org_id = ? AND document_id = ? AND item_id = ? AND item_type = 'page'";

const SQL_DELETE_PAGE: &str = "DELETE FROM search WHERE org_id = ? AND item_id = ? AND item_type = 'page'";

const SQL_DELETE_ORGANIZATION: &str = "DELETE FROM search WHERE org_id = ?";

const SQL_INSERT_ENTRY: &str =
    "INSERT INTO search (org_id, document_id, item_id, item_type, content, created) VALUES (?, ?, ?, ?, ?, ?)";

const SQL_COUNT_BY_TYPE: &str =
    "SELECT item_type, COUNT(*) FROM search WHERE org_id = ? GROUP BY item_type";

/// Prepare a statement, failures reported as preparation errors / 预编译语句
///
/// sqlx keeps prepared statements in a per-connection cache keyed by SQL text,
/// so each statement shape is compiled once per connection.
pub(crate) async fn prepare<'c, E>(
    executor: E,
    sql: &'static str,
    operation: &str,
) -> Result<SqliteStatement<'static>, SearchError>
where
    E: Executor<'c, Database = Sqlite>,
{
    executor
        .prepare(sql)
        .await
        .map_err(|e| SearchError::preparation(operation, e))
}

/// Search index store / 搜索索引存储
#[derive(Debug, Clone)]
pub struct SearchStore {
    db: Pool<Sqlite>,
}

impl SearchStore {
    /// Use an existing connection pool / 使用现有数据库连接池
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.db
    }

    /// Replace title, tag and attachment entries of a document / 索引文档标题、标签与附件
    pub async fn index_document(
        &self,
        ctx: &RequestContext,
        tx: &mut Transaction<'_, Sqlite>,
        doc: &Document,
        attachments: &[Attachment],
    ) -> Result<(), SearchError> {
        // remove previous search entries
        let delete = prepare(&mut **tx, SQL_DELETE_DOCUMENT_ITEMS, "delete document index entries").await?;
        delete
            .query()
            .bind(&ctx.org_id)
            .bind(&doc.ref_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| SearchError::execution("delete document index entries", e))?;

        let insert = prepare(&mut **tx, SQL_INSERT_ENTRY, "insert document entry").await?;
        let created = Utc::now().to_rfc3339();
        let entry = NewEntry {
            ctx,
            document_id: &doc.ref_id,
            created: &created,
        };

        entry
            .insert(tx, &insert, "", ItemType::Doc, &doc.title, "insert document title entry")
            .await?;

        let mut tag_count = 0usize;
        for tag in doc.tag_tokens() {
            entry
                .insert(tx, &insert, "", ItemType::Tag, tag, "insert document tag entry")
                .await?;
            tag_count += 1;
        }

        for file in attachments {
            entry
                .insert(tx, &insert, &file.ref_id, ItemType::File, &file.filename, "insert document file entry")
                .await?;
        }

        tracing::debug!(
            "Indexed document {} (org {}): {} tags, {} attachments",
            doc.ref_id,
            ctx.org_id,
            tag_count,
            attachments.len()
        );
        Ok(())
    }

    /// Remove every entry of a document / 删除文档的全部索引
    pub async fn delete_document(
        &self,
        ctx: &RequestContext,
        tx: &mut Transaction<'_, Sqlite>,
        document_id: &str,
    ) -> Result<(), SearchError> {
        let stmt = prepare(&mut **tx, SQL_DELETE_DOCUMENT, "delete document entries").await?;
        let result = stmt
            .query()
            .bind(&ctx.org_id)
            .bind(document_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| SearchError::execution("delete document entries", e))?;

        tracing::debug!("Removed {} search entries of document {}", result.rows_affected(), document_id);
        Ok(())
    }

    /// Replace the content entry of one page / 索引页面正文
    ///
    /// The body is converted before anything is written, so a conversion
    /// failure leaves the previous entry in place.
    pub async fn index_content(
        &self,
        ctx: &RequestContext,
        tx: &mut Transaction<'_, Sqlite>,
        page: &Page,
    ) -> Result<(), SearchError> {
        let content = normalize(&page.body)
            .map_err(|e| SearchError::normalization("index document content", e))?;

        let delete = prepare(&mut **tx, SQL_DELETE_DOCUMENT_PAGE, "delete document content entry").await?;
        delete
            .query()
            .bind(&ctx.org_id)
            .bind(&page.document_id)
            .bind(&page.ref_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| SearchError::execution("delete document content entry", e))?;

        let insert = prepare(&mut **tx, SQL_INSERT_ENTRY, "insert document content entry").await?;
        let created = Utc::now().to_rfc3339();
        NewEntry {
            ctx,
            document_id: &page.document_id,
            created: &created,
        }
        .insert(tx, &insert, &page.ref_id, ItemType::Page, &content, "insert document content entry")
        .await?;

        tracing::debug!("Indexed page {} of document {} ({} chars)", page.ref_id, page.document_id, content.len());
        Ok(())
    }

    /// Remove the content entry of a page / 删除页面正文索引
    pub async fn delete_content(
        &self,
        ctx: &RequestContext,
        tx: &mut Transaction<'_, Sqlite>,
        page_id: &str,
    ) -> Result<(), SearchError> {
        let stmt = prepare(&mut **tx, SQL_DELETE_PAGE, "delete document content entry").await?;
        stmt.query()
            .bind(&ctx.org_id)
            .bind(page_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| SearchError::execution("delete document content entry", e))?;
        Ok(())
    }

    /// Remove every entry of an organization / 清空租户索引
    pub async fn delete_organization(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        org_id: &str,
    ) -> Result<u64, SearchError> {
        let stmt = prepare(&mut **tx, SQL_DELETE_ORGANIZATION, "delete organization entries").await?;
        let result = stmt
            .query()
            .bind(org_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| SearchError::execution("delete organization entries", e))?;

        tracing::info!("Removed {} search entries of organization {}", result.rows_affected(), org_id);
        Ok(result.rows_affected())
    }

    /// Entry counts per item type / 获取统计信息
    pub async fn stats(&self, org_id: &str) -> Result<IndexStats, SearchError> {
        let stmt = prepare(&self.db, SQL_COUNT_BY_TYPE, "count index entries").await?;
        let rows: Vec<(String, i64)> = stmt
            .query_as()
            .bind(org_id)
            .fetch_all(&self.db)
            .await
            .map_err(|e| SearchError::execution("count index entries", e))?;

        let mut stats = IndexStats::default();
        for (item_type, count) in rows {
            match ItemType::try_from(item_type) {
                Ok(t) => stats.add(t, count.max(0) as u64),
                Err(e) => tracing::warn!("Skipping entries in stats: {}", e),
            }
        }
        Ok(stats)
    }
}

/// Shared fields of the rows written by one operation / 单次写入的公共字段
struct NewEntry<'a> {
    ctx: &'a RequestContext,
    document_id: &'a str,
    created: &'a str,
}

impl NewEntry<'_> {
    async fn insert(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        stmt: &SqliteStatement<'static>,
        item_id: &str,
        item_type: ItemType,
        content: &str,
        operation: &str,
    ) -> Result<(), SearchError> {
        stmt.query()
            .bind(&self.ctx.org_id)
            .bind(self.document_id)
            .bind(item_id)
            .bind(item_type.as_str())
            .bind(content)
            .bind(self.created)
            .execute(&mut **tx)
            .await
            .map_err(|e| SearchError::execution(operation, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{ctx, document, memory_pool, reject_content, ORG};
    use crate::search::schema::SearchEntry;

    async fn entries(pool: &Pool<Sqlite>, document_id: &str) -> Vec<SearchEntry> {
        sqlx::query_as(
            "SELECT org_id, document_id, item_id, item_type, content FROM search WHERE document_id = ? ORDER BY item_type, item_id, content",
        )
        .bind(document_id)
        .fetch_all(pool)
        .await
        .unwrap()
    }

    fn attachment(ref_id: &str, filename: &str) -> Attachment {
        Attachment {
            ref_id: ref_id.to_string(),
            document_id: "doc-1".to_string(),
            filename: filename.to_string(),
        }
    }

    fn page(ref_id: &str, body: &str) -> Page {
        Page {
            ref_id: ref_id.to_string(),
            document_id: "doc-1".to_string(),
            body: body.to_string(),
        }
    }

    async fn index_document(store: &SearchStore, doc: &Document, attachments: &[Attachment]) {
        let mut tx = store.pool().begin().await.unwrap();
        store.index_document(&ctx("u1"), &mut tx, doc, attachments).await.unwrap();
        tx.commit().await.unwrap();
    }

    async fn index_page(store: &SearchStore, p: &Page) -> Result<(), SearchError> {
        let mut tx = store.pool().begin().await.unwrap();
        store.index_content(&ctx("u1"), &mut tx, p).await?;
        tx.commit().await.unwrap();
        Ok(())
    }

    #[tokio::test]
    async fn test_index_document_writes_title_tags_files() {
        let store = SearchStore::new(memory_pool().await);
        let doc = document("doc-1", "space-1", "Deploy Guide", "#ops#k8s#");
        index_document(&store, &doc, &[attachment("att-1", "cluster.yaml")]).await;

        let rows = entries(store.pool(), "doc-1").await;
        let summary: Vec<(ItemType, &str, &str)> = rows
            .iter()
            .map(|e| (e.item_type, e.item_id.as_str(), e.content.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (ItemType::Doc, "", "Deploy Guide"),
                (ItemType::File, "att-1", "cluster.yaml"),
                (ItemType::Tag, "", "k8s"),
                (ItemType::Tag, "", "ops"),
            ]
        );
        assert!(rows.iter().all(|e| e.org_id == ORG));
    }

    #[tokio::test]
    async fn test_index_document_is_idempotent() {
        let store = SearchStore::new(memory_pool().await);
        let doc = document("doc-1", "space-1", "Deploy Guide", "#ops#");
        let files = [attachment("att-1", "cluster.yaml")];

        index_document(&store, &doc, &files).await;
        let once = entries(store.pool(), "doc-1").await;
        index_document(&store, &doc, &files).await;
        let twice = entries(store.pool(), "doc-1").await;

        assert_eq!(once, twice);
        assert_eq!(twice.len(), 3);
    }

    #[tokio::test]
    async fn test_index_document_replaces_attachments() {
        let store = SearchStore::new(memory_pool().await);
        let doc = document("doc-1", "space-1", "Deploy Guide", "");

        index_document(&store, &doc, &[attachment("att-a", "a.pdf")]).await;
        index_document(&store, &doc, &[attachment("att-b", "b.pdf")]).await;

        let files: Vec<String> = entries(store.pool(), "doc-1")
            .await
            .into_iter()
            .filter(|e| e.item_type == ItemType::File)
            .map(|e| e.content)
            .collect();
        assert_eq!(files, vec!["b.pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_tag_tokens_indexed() {
        let store = SearchStore::new(memory_pool().await);
        index_document(&store, &document("doc-1", "s", "T", "#alpha#beta#"), &[]).await;
        index_document(&store, &document("doc-2", "s", "T", ""), &[]).await;

        let tags = |rows: Vec<SearchEntry>| -> Vec<String> {
            rows.into_iter()
                .filter(|e| e.item_type == ItemType::Tag)
                .map(|e| e.content)
                .collect()
        };
        assert_eq!(tags(entries(store.pool(), "doc-1").await), vec!["alpha", "beta"]);
        assert!(tags(entries(store.pool(), "doc-2").await).is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_tags_are_kept() {
        let store = SearchStore::new(memory_pool().await);
        index_document(&store, &document("doc-1", "s", "T", "#api#api#"), &[]).await;

        let stats = store.stats(ORG).await.unwrap();
        assert_eq!(stats.tag_count, 2);
    }

    #[tokio::test]
    async fn test_index_document_keeps_page_entries() {
        let store = SearchStore::new(memory_pool().await);
        let doc = document("doc-1", "s", "Title", "");
        index_page(&store, &page("page-1", "<p>body</p>")).await.unwrap();
        index_document(&store, &doc, &[]).await;
        index_document(&store, &doc, &[]).await;

        let stats = store.stats(ORG).await.unwrap();
        assert_eq!(stats.page_count, 1);
        assert_eq!(stats.doc_count, 1);
    }

    #[tokio::test]
    async fn test_delete_document_removes_all_types() {
        let store = SearchStore::new(memory_pool().await);
        let doc = document("doc-1", "s", "Title", "#one#");
        index_document(&store, &doc, &[attachment("att-1", "x.txt")]).await;
        index_page(&store, &page("page-1", "<p>body</p>")).await.unwrap();

        let mut tx = store.pool().begin().await.unwrap();
        store.delete_document(&ctx("u1"), &mut tx, "doc-1").await.unwrap();
        tx.commit().await.unwrap();

        assert!(entries(store.pool(), "doc-1").await.is_empty());
    }

    #[tokio::test]
    async fn test_index_content_replaces_page_entry() {
        let store = SearchStore::new(memory_pool().await);
        index_page(&store, &page("page-1", "<p>first draft</p>")).await.unwrap();
        index_page(&store, &page("page-1", "<h1>Final</h1><p>copy</p>")).await.unwrap();

        let rows = entries(store.pool(), "doc-1").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].item_type, ItemType::Page);
        assert_eq!(rows[0].item_id, "page-1");
        assert_eq!(rows[0].content, "Final copy");
    }

    #[tokio::test]
    async fn test_index_content_failure_keeps_old_entry() {
        let store = SearchStore::new(memory_pool().await);
        index_page(&store, &page("page-1", "<p>stable text</p>")).await.unwrap();
        reject_content(store.pool(), "rejected body").await;

        let mut tx = store.pool().begin().await.unwrap();
        let err = store
            .index_content(&ctx("u1"), &mut tx, &page("page-1", "<p>rejected body</p>"))
            .await
            .unwrap_err();
        tx.rollback().await.unwrap();

        assert!(matches!(err, SearchError::Execution { .. }));
        assert_eq!(err.operation(), "insert document content entry");
        let rows = entries(store.pool(), "doc-1").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content, "stable text");
    }

    #[tokio::test]
    async fn test_index_content_recovers_malformed_html() {
        let store = SearchStore::new(memory_pool().await);
        index_page(&store, &page("page-1", "<p>1 < 2 <b")).await.unwrap();

        let rows = entries(store.pool(), "doc-1").await;
        assert_eq!(rows[0].content, "1 < 2");
    }

    #[tokio::test]
    async fn test_delete_content_only_removes_that_page() {
        let store = SearchStore::new(memory_pool().await);
        index_page(&store, &page("page-1", "one")).await.unwrap();
        index_page(&store, &page("page-2", "two")).await.unwrap();

        let mut tx = store.pool().begin().await.unwrap();
        store.delete_content(&ctx("u1"), &mut tx, "page-1").await.unwrap();
        tx.commit().await.unwrap();

        let rows = entries(store.pool(), "doc-1").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].item_id, "page-2");
    }

    #[tokio::test]
    async fn test_delete_content_scoped_by_organization() {
        let store = SearchStore::new(memory_pool().await);
        index_page(&store, &page("page-1", "one")).await.unwrap();

        let other = RequestContext::new("org-2", "u1");
        let mut tx = store.pool().begin().await.unwrap();
        store.delete_content(&other, &mut tx, "page-1").await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(entries(store.pool(), "doc-1").await.len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_keeps_previous_index() {
        let store = SearchStore::new(memory_pool().await);
        let doc = document("doc-1", "s", "Old Title", "");
        index_document(&store, &doc, &[]).await;

        let renamed = document("doc-1", "s", "New Title", "#fresh#");
        let mut tx = store.pool().begin().await.unwrap();
        store.index_document(&ctx("u1"), &mut tx, &renamed, &[]).await.unwrap();
        tx.rollback().await.unwrap();

        let rows = entries(store.pool(), "doc-1").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content, "Old Title");
    }

    #[tokio::test]
    async fn test_delete_organization() {
        let store = SearchStore::new(memory_pool().await);
        index_document(&store, &document("doc-1", "s", "A", "#x#"), &[]).await;
        index_document(&store, &document("doc-2", "s", "B", ""), &[]).await;

        let mut tx = store.pool().begin().await.unwrap();
        let removed = store.delete_organization(&mut tx, ORG).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(removed, 3);
        assert_eq!(store.stats(ORG).await.unwrap().total(), 0);
    }

    #[tokio::test]
    async fn test_stats_counts_per_type() {
        let store = SearchStore::new(memory_pool().await);
        let doc = document("doc-1", "s", "A", "#x#y#");
        index_document(&store, &doc, &[attachment("a1", "f1"), attachment("a2", "f2")]).await;
        index_page(&store, &page("page-1", "body")).await.unwrap();

        let stats = store.stats(ORG).await.unwrap();
        assert_eq!(
            stats,
            IndexStats {
                doc_count: 1,
                page_count: 1,
                tag_count: 2,
                file_count: 2,
            }
        );
        assert_eq!(store.stats("org-2").await.unwrap().total(), 0);
    }
}
