//! Transport to the search engine
//!
//! The query executor and mutation path only talk to the engine through the
//! [`Transport`] trait. Two implementations ship with the crate:
//! - [`HttpTransport`] speaks the Elasticsearch REST API over `reqwest`
//! - [`MemoryTransport`] evaluates the same DSL over in-process documents

mod http;
mod memory;

pub use http::HttpTransport;
pub use memory::MemoryTransport;

use crate::dsl::{EsQuery, EsSearchRequest, Hit};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Transport-level failures. Callers of the public API never see this type;
/// it is folded into [`crate::Error::Backend`].
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} {path} returned {status}: {body}")]
    Status {
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// The engine refused to create something that is already there.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::Status { status: 400, body, .. } if body.contains("already_exists"))
    }
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// How an (index, document type) pair is laid out on the cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Addressing {
    /// `/{index}/{type}/...`, for clusters that still have mapping types.
    Typed,
    /// `/{index}_{type}/_doc/...`, one physical index per document type.
    #[default]
    IndexPerType,
}

impl Addressing {
    /// Name of the physical index holding documents of `doc_type`.
    pub fn physical_index(&self, index: &str, doc_type: &str) -> String {
        match self {
            Self::Typed => index.to_string(),
            Self::IndexPerType => format!("{index}_{doc_type}"),
        }
    }

    /// Path segments addressing the collection of `doc_type` documents, the
    /// prefix for `_search`, `_count` and `_delete_by_query`.
    pub fn collection(&self, index: &str, doc_type: &str) -> Vec<String> {
        match self {
            Self::Typed => vec![index.to_string(), doc_type.to_string()],
            Self::IndexPerType => vec![self.physical_index(index, doc_type)],
        }
    }

    /// Path segments for a single document, or for auto-id creation when
    /// `id` is `None`.
    pub fn document(&self, index: &str, doc_type: &str, id: Option<&str>) -> Vec<String> {
        let mut segments = match self {
            Self::Typed => vec![index.to_string(), doc_type.to_string()],
            Self::IndexPerType => vec![self.physical_index(index, doc_type), "_doc".to_string()],
        };
        if let Some(id) = id {
            segments.push(id.to_string());
        }
        segments
    }
}

/// Search engine primitives, addressed by index and document type.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Run a search and return the hit window the engine produced.
    async fn search(
        &self,
        index: &str,
        doc_type: &str,
        request: &EsSearchRequest,
    ) -> TransportResult<Vec<Hit>>;

    async fn count(&self, index: &str, doc_type: &str, query: &EsQuery) -> TransportResult<u64>;

    /// Index (create or replace) a document; returns the id it was stored
    /// under. With `id == None` the engine assigns one.
    async fn index(
        &self,
        index: &str,
        doc_type: &str,
        id: Option<&str>,
        document: &Map<String, Value>,
    ) -> TransportResult<String>;

    async fn delete(&self, index: &str, doc_type: &str, id: &str) -> TransportResult<()>;

    /// Delete every document matching `query`; returns how many went.
    async fn delete_by_query(
        &self,
        index: &str,
        doc_type: &str,
        query: &EsQuery,
    ) -> TransportResult<u64>;

    async fn put_mapping(&self, index: &str, doc_type: &str, mapping: &Value) -> TransportResult<()>;

    /// Drop the type definition together with its documents.
    async fn delete_mapping(&self, index: &str, doc_type: &str) -> TransportResult<()>;

    async fn create_index(&self, index: &str) -> TransportResult<()>;

    async fn delete_index(&self, index: &str) -> TransportResult<()>;

    /// Make writes so far visible to searches. With `doc_type` set only that
    /// type's documents need to become visible.
    async fn refresh(&self, index: &str, doc_type: Option<&str>) -> TransportResult<()>;

    /// Block until the cluster reports at least `status`.
    async fn wait_for_status(&self, status: &str) -> TransportResult<()>;
}
