//! Visibility resolver - spaces a user may see / 可见空间计算
//!
//! A space is visible when any of these holds:
//! - personal space owned by the user / 个人空间
//! - public space with a default (empty user) grant that can view or edit / 公开空间
//! - restricted space with a grant for the user that can view or edit / 受限空间
//!
//! The union is rendered once as a SQL fragment with positional parameters,
//! so every item-type query embeds the identical predicate and the engine
//! filters visibility and text match in one pass. Nothing is cached: each
//! query sees the current grants.

use once_cell::sync::Lazy;
use sqlx::Statement;

use super::store::{prepare, SearchStore};
use crate::error::SearchError;
use crate::models::{RequestContext, SpaceType};

/// `SELECT ref_id ...` over visible spaces; parameters from `Visibility::params`
static VISIBLE_SPACES_SQL: Lazy<String> = Lazy::new(|| {
    format!(
        "SELECT ref_id FROM space WHERE org_id = ? AND type = {personal} AND user_id = ? \
         UNION ALL SELECT ref_id FROM space WHERE org_id = ? AND type = {public} AND ref_id IN \
         (SELECT space_id FROM space_role WHERE org_id = ? AND user_id = '' AND (can_view = 1 OR can_edit = 1)) \
         UNION ALL SELECT ref_id FROM space WHERE org_id = ? AND type = {restricted} AND ref_id IN \
         (SELECT space_id FROM space_role WHERE org_id = ? AND user_id = ? AND (can_view = 1 OR can_edit = 1))",
        personal = SpaceType::Personal.as_i64(),
        public = SpaceType::Public.as_i64(),
        restricted = SpaceType::Restricted.as_i64(),
    )
});

/// Scoping predicate for one identity / 可见性谓词
#[derive(Debug, Clone, Copy)]
pub struct Visibility<'a> {
    org_id: &'a str,
    user_id: &'a str,
}

impl<'a> Visibility<'a> {
    pub fn new(ctx: &'a RequestContext) -> Self {
        Self {
            org_id: &ctx.org_id,
            user_id: &ctx.user_id,
        }
    }

    /// Sub-select yielding the visible space ids / 可见空间子查询
    pub fn spaces_sql() -> &'static str {
        &VISIBLE_SPACES_SQL
    }

    /// `<column> IN (<visible spaces>)` / 嵌入查询的条件
    pub fn predicate(space_column: &str) -> String {
        format!("{} IN ({})", space_column, Self::spaces_sql())
    }

    /// Values for the placeholders, in order / 参数顺序
    pub fn params(&self) -> [&'a str; 7] {
        [
            self.org_id,
            self.user_id,
            self.org_id,
            self.org_id,
            self.org_id,
            self.org_id,
            self.user_id,
        ]
    }
}

impl SearchStore {
    /// Visible space ids for the request identity / 获取用户可见空间
    pub async fn visible_spaces(&self, ctx: &RequestContext) -> Result<Vec<String>, SearchError> {
        let stmt = prepare(self.pool(), Visibility::spaces_sql(), "resolve visible spaces").await?;
        let mut query = stmt.query_scalar::<String>();
        for value in Visibility::new(ctx).params() {
            query = query.bind(value);
        }

        query
            .fetch_all(self.pool())
            .await
            .map_err(|e| SearchError::execution("resolve visible spaces", e))
    }
}
