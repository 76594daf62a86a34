//! Elasticsearch response bodies read back by the HTTP transport

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// ES search response format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsSearchResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub timed_out: bool,
    pub hits: HitsResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitsResponse {
    #[serde(default)]
    pub total: Option<TotalHits>,
    #[serde(default)]
    pub max_score: Option<f32>,
    #[serde(default)]
    pub hits: Vec<Hit>,
}

/// Pre-7 clusters report a bare number, later ones an object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TotalHits {
    Count(u64),
    Object { value: u64, relation: String },
}

impl TotalHits {
    pub fn value(&self) -> u64 {
        match self {
            Self::Count(n) | Self::Object { value: n, .. } => *n,
        }
    }
}

/// One search hit: engine id plus stored source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(rename = "_index", default)]
    pub index: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: Option<f32>,
    #[serde(rename = "_source", default)]
    pub source: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsCountResponse {
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsIndexResponse {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub result: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsDeleteByQueryResponse {
    #[serde(default)]
    pub deleted: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsClusterHealth {
    pub status: String,
    #[serde(default)]
    pub timed_out: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_response_modern_total() {
        let r: EsSearchResponse = serde_json::from_value(json!({
            "took": 3,
            "timed_out": false,
            "hits": {
                "total": {"value": 1, "relation": "eq"},
                "max_score": 1.0,
                "hits": [{"_index": "db", "_id": "abc", "_score": 1.0, "_source": {"name": "Pippo"}}]
            }
        }))
        .unwrap();
        assert_eq!(r.hits.total.unwrap().value(), 1);
        assert_eq!(r.hits.hits[0].id, "abc");
        assert_eq!(r.hits.hits[0].source["name"], json!("Pippo"));
    }

    #[test]
    fn test_search_response_legacy_total() {
        let r: EsSearchResponse = serde_json::from_value(json!({
            "hits": {"total": 7, "hits": []}
        }))
        .unwrap();
        assert_eq!(r.hits.total.unwrap().value(), 7);
    }
}
