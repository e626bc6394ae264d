pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod search;

pub use error::SearchError;
pub use models::{Attachment, Document, Page, RequestContext, SpaceType};
pub use search::{Indexer, QueryOptions, QueryResult, SearchStore};
