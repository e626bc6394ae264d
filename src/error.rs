//! Search error taxonomy / 搜索错误类型
//!
//! Every failure carries the name of the step that failed so the caller can
//! tell which statement broke without losing the underlying driver error.

use thiserror::Error;

use crate::search::normalize::NormalizeError;

#[derive(Debug, Error)]
pub enum SearchError {
    /// Statement could not be prepared / 语句预编译失败
    #[error("prepare {operation}: {source}")]
    Preparation {
        operation: String,
        #[source]
        source: sqlx::Error,
    },

    /// Statement was prepared but failed when run / 语句执行失败
    #[error("execute {operation}: {source}")]
    Execution {
        operation: String,
        #[source]
        source: sqlx::Error,
    },

    /// Markup could not be converted to text / HTML 转文本失败
    #[error("{operation}: strip HTML failed: {source}")]
    Normalization {
        operation: String,
        #[source]
        source: NormalizeError,
    },
}

impl SearchError {
    pub fn preparation(operation: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Preparation { operation: operation.into(), source }
    }

    pub fn execution(operation: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Execution { operation: operation.into(), source }
    }

    pub fn normalization(operation: impl Into<String>, source: NormalizeError) -> Self {
        Self::Normalization { operation: operation.into(), source }
    }

    /// Name of the step that failed / 失败步骤名称
    pub fn operation(&self) -> &str {
        match self {
            Self::Preparation { operation, .. }
            | Self::Execution { operation, .. }
            | Self::Normalization { operation, .. } => operation,
        }
    }
}
