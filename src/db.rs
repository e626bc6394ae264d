//! Database setup / 数据库初始化
//!
//! - `connect`: SQLite pool in WAL mode / WAL 模式连接池
//! - `run_migrations`: search table, FTS5 index and the host tables it joins / 建表

use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use crate::config::DatabaseConfig;

/// Open a connection pool / 打开连接池
pub async fn connect(database_url: &str, db: &DatabaseConfig) -> Result<SqlitePool> {
    // pragma 按连接生效，放在连接参数里保证池中每个连接一致
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_millis(db.busy_timeout_ms));

    let pool = SqlitePoolOptions::new()
        .max_connections(db.max_connections)
        .connect_with(options)
        .await?;

    tracing::info!("Search database opened: {} (WAL mode)", database_url);
    Ok(pool)
}

/// Run database migrations / 运行数据库迁移
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Host tables, owned by the wiki; created here only when absent / 宿主表
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS document (
            ref_id TEXT PRIMARY KEY,
            org_id TEXT NOT NULL,
            space_id TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            tags TEXT NOT NULL DEFAULT '',
            excerpt TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS space (
            ref_id TEXT PRIMARY KEY,
            org_id TEXT NOT NULL,
            name TEXT NOT NULL,
            type INTEGER NOT NULL,
            user_id TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS space_role (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            org_id TEXT NOT NULL,
            space_id TEXT NOT NULL,
            user_id TEXT NOT NULL DEFAULT '',
            can_view INTEGER NOT NULL DEFAULT 0,
            can_edit INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_space_role_lookup ON space_role(org_id, space_id, user_id)",
    )
    .execute(pool)
    .await?;

    // Search entries / 索引条目
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS search (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            org_id TEXT NOT NULL,
            document_id TEXT NOT NULL,
            item_id TEXT NOT NULL DEFAULT '',
            item_type TEXT NOT NULL CHECK (item_type IN ('doc', 'page', 'tag', 'file')),
            content TEXT NOT NULL DEFAULT '',
            created TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_search_document ON search(org_id, document_id, item_type)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_search_item ON search(org_id, item_id, item_type)")
        .execute(pool)
        .await?;

    // FTS5 external content table over search.content / 全文索引
    sqlx::query(
        "CREATE VIRTUAL TABLE IF NOT EXISTS search_fts USING fts5(content, content='search', content_rowid='id')",
    )
    .execute(pool)
    .await?;

    // Triggers keep search_fts inside the writer's transaction / 触发器同步全文索引
    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS search_fts_insert AFTER INSERT ON search BEGIN
            INSERT INTO search_fts(rowid, content) VALUES (new.id, new.content);
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS search_fts_delete AFTER DELETE ON search BEGIN
            INSERT INTO search_fts(search_fts, rowid, content) VALUES ('delete', old.id, old.content);
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS search_fts_update AFTER UPDATE OF content ON search BEGIN
            INSERT INTO search_fts(search_fts, rowid, content) VALUES ('delete', old.id, old.content);
            INSERT INTO search_fts(rowid, content) VALUES (new.id, new.content);
        END
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Search schema migrations applied");
    Ok(())
}
