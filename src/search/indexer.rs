//! Self-contained indexing operations / 独立事务的索引操作
//!
//! Callers without a transaction of their own (background jobs, the CLI)
//! go through `Indexer`: each call opens one transaction, commits on success
//! and rolls back on failure, so a failed replace never leaves a half-written
//! unit behind.

use sqlx::{Sqlite, Transaction};

use super::store::SearchStore;
use crate::error::SearchError;
use crate::models::{Attachment, Document, Page, RequestContext};

/// Transaction-owning wrapper around `SearchStore` / 自带事务的索引器
#[derive(Debug, Clone)]
pub struct Indexer {
    store: SearchStore,
}

impl Indexer {
    pub fn new(store: SearchStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SearchStore {
        &self.store
    }

    async fn begin(&self, operation: &str) -> Result<Transaction<'static, Sqlite>, SearchError> {
        self.store
            .pool()
            .begin()
            .await
            .map_err(|e| SearchError::execution(format!("{}: begin transaction", operation), e))
    }

    /// Commit on success, roll back and log on failure / 提交或回滚
    async fn finish<T>(
        &self,
        tx: Transaction<'static, Sqlite>,
        operation: &str,
        result: Result<T, SearchError>,
    ) -> Result<T, SearchError> {
        match result {
            Ok(value) => {
                tx.commit()
                    .await
                    .map_err(|e| SearchError::execution(format!("{}: commit", operation), e))?;
                Ok(value)
            }
            Err(err) => {
                tracing::error!("{} failed, rolling back: {}", operation, err);
                if let Err(e) = tx.rollback().await {
                    tracing::warn!("{}: rollback failed: {}", operation, e);
                }
                Err(err)
            }
        }
    }

    /// 索引文档标题、标签与附件
    pub async fn index_document(
        &self,
        ctx: &RequestContext,
        doc: &Document,
        attachments: &[Attachment],
    ) -> Result<(), SearchError> {
        let operation = "index document";
        let mut tx = self.begin(operation).await?;
        let result = self.store.index_document(ctx, &mut tx, doc, attachments).await;
        self.finish(tx, operation, result).await
    }

    /// 删除文档索引
    pub async fn delete_document(&self, ctx: &RequestContext, document_id: &str) -> Result<(), SearchError> {
        let operation = "delete document";
        let mut tx = self.begin(operation).await?;
        let result = self.store.delete_document(ctx, &mut tx, document_id).await;
        self.finish(tx, operation, result).await
    }

    /// 索引页面正文
    pub async fn index_content(&self, ctx: &RequestContext, page: &Page) -> Result<(), SearchError> {
        let operation = "index content";
        let mut tx = self.begin(operation).await?;
        let result = self.store.index_content(ctx, &mut tx, page).await;
        self.finish(tx, operation, result).await
    }

    /// 删除页面正文索引
    pub async fn delete_content(&self, ctx: &RequestContext, page_id: &str) -> Result<(), SearchError> {
        let operation = "delete content";
        let mut tx = self.begin(operation).await?;
        let result = self.store.delete_content(ctx, &mut tx, page_id).await;
        self.finish(tx, operation, result).await
    }

    /// Document plus all its pages in one transaction / 整篇文档重建索引
    ///
    /// Any failing page aborts the whole rebuild.
    pub async fn reindex_document(
        &self,
        ctx: &RequestContext,
        doc: &Document,
        pages: &[Page],
        attachments: &[Attachment],
    ) -> Result<(), SearchError> {
        let operation = "reindex document";
        let mut tx = self.begin(operation).await?;
        let result = self.reindex_in(ctx, &mut tx, doc, pages, attachments).await;
        self.finish(tx, operation, result).await?;

        tracing::info!("Reindexed document {} with {} pages", doc.ref_id, pages.len());
        Ok(())
    }

    async fn reindex_in(
        &self,
        ctx: &RequestContext,
        tx: &mut Transaction<'_, Sqlite>,
        doc: &Document,
        pages: &[Page],
        attachments: &[Attachment],
    ) -> Result<(), SearchError> {
        self.store.delete_document(ctx, tx, &doc.ref_id).await?;
        self.store.index_document(ctx, tx, doc, attachments).await?;
        for page in pages {
            self.store.index_content(ctx, tx, page).await?;
        }
        Ok(())
    }

    /// 清空租户索引
    pub async fn purge_organization(&self, org_id: &str) -> Result<u64, SearchError> {
        let operation = "purge organization";
        let mut tx = self.begin(operation).await?;
        let result = self.store.delete_organization(&mut tx, org_id).await;
        self.finish(tx, operation, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{ctx, document, memory_pool, reject_content, ORG};

    fn page(ref_id: &str, body: &str) -> Page {
        Page {
            ref_id: ref_id.to_string(),
            document_id: "doc-1".to_string(),
            body: body.to_string(),
        }
    }

    async fn indexer() -> Indexer {
        Indexer::new(SearchStore::new(memory_pool().await))
    }

    #[tokio::test]
    async fn test_operations_commit() {
        let indexer = indexer().await;
        let doc = document("doc-1", "s", "Guide", "#a#");
        indexer.index_document(&ctx("u1"), &doc, &[]).await.unwrap();
        indexer.index_content(&ctx("u1"), &page("p1", "<p>hello</p>")).await.unwrap();

        let stats = indexer.store().stats(ORG).await.unwrap();
        assert_eq!(stats.total(), 3);

        indexer.delete_content(&ctx("u1"), "p1").await.unwrap();
        assert_eq!(indexer.store().stats(ORG).await.unwrap().page_count, 0);

        indexer.delete_document(&ctx("u1"), "doc-1").await.unwrap();
        assert_eq!(indexer.store().stats(ORG).await.unwrap().total(), 0);
    }

    #[tokio::test]
    async fn test_reindex_rolls_back_on_failed_page() {
        let indexer = indexer().await;
        let doc = document("doc-1", "s", "Guide", "");
        indexer
            .reindex_document(&ctx("u1"), &doc, &[page("p1", "<p>old</p>")], &[])
            .await
            .unwrap();

        reject_content(indexer.store().pool(), "rejected").await;
        let renamed = document("doc-1", "s", "Renamed", "#new#");
        let pages = [page("p1", "<p>fine</p>"), page("p2", "<p>rejected</p>")];
        let err = indexer
            .reindex_document(&ctx("u1"), &renamed, &pages, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Execution { .. }));

        let stats = indexer.store().stats(ORG).await.unwrap();
        assert_eq!(stats.doc_count, 1);
        assert_eq!(stats.page_count, 1);
        assert_eq!(stats.tag_count, 0);
    }

    #[tokio::test]
    async fn test_purge_organization() {
        let indexer = indexer().await;
        indexer
            .index_document(&ctx("u1"), &document("doc-1", "s", "A", "#x#"), &[])
            .await
            .unwrap();

        assert_eq!(indexer.purge_organization(ORG).await.unwrap(), 2);
        assert_eq!(indexer.store().stats(ORG).await.unwrap().total(), 0);
    }

    #[tokio::test]
    async fn test_begin_failure_reported() {
        let indexer = indexer().await;
        indexer.store().pool().close().await;

        let err = indexer.delete_document(&ctx("u1"), "doc-1").await.unwrap_err();
        assert_eq!(err.operation(), "delete document: begin transaction");
    }
}
