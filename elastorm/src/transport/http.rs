//! Elasticsearch REST transport

use super::{Addressing, Transport, TransportError, TransportResult};
use crate::dsl::{
    EsClusterHealth, EsCountResponse, EsDeleteByQueryResponse, EsIndexResponse, EsQuery,
    EsQueryBody, EsSearchRequest, EsSearchResponse, Hit,
};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Transport over the Elasticsearch REST API.
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    addressing: Addressing,
}

impl HttpTransport {
    pub fn new(base_url: Url, addressing: Addressing, timeout: Duration) -> TransportResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            addressing,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn addressing(&self) -> Addressing {
        self.addressing
    }

    /// Join path segments onto the base URL, percent-encoding each one.
    pub fn url<S: AsRef<str>>(&self, segments: &[S]) -> TransportResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::Other(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments.iter().map(AsRef::as_ref));
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> TransportResult<T> {
        debug!("{} {}", method, url.path());
        let path = url.path().to_string();
        let mut request = self.client.request(method.clone(), url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(TransportError::NotFound(path));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                method: method.to_string(),
                path,
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// With one index per type, a type nothing was written to has no index
    /// yet. Reads against it find nothing instead of failing.
    fn absent_collection_is_empty<T: Default>(&self, result: TransportResult<T>) -> TransportResult<T> {
        match result {
            Err(TransportError::NotFound(path)) if self.addressing == Addressing::IndexPerType => {
                debug!("{} does not exist yet, no documents", path);
                Ok(T::default())
            }
            other => other,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn search(
        &self,
        index: &str,
        doc_type: &str,
        request: &EsSearchRequest,
    ) -> TransportResult<Vec<Hit>> {
        let mut segments = self.addressing.collection(index, doc_type);
        segments.push("_search".to_string());
        let body = serde_json::to_value(request)?;
        let response: TransportResult<EsSearchResponse> =
            self.send(Method::POST, self.url(&segments)?, Some(body)).await;
        self.absent_collection_is_empty(response.map(|r| r.hits.hits))
    }

    async fn count(&self, index: &str, doc_type: &str, query: &EsQuery) -> TransportResult<u64> {
        let mut segments = self.addressing.collection(index, doc_type);
        segments.push("_count".to_string());
        let body = serde_json::to_value(EsQueryBody {
            query: query.clone(),
        })?;
        let response: TransportResult<EsCountResponse> =
            self.send(Method::POST, self.url(&segments)?, Some(body)).await;
        self.absent_collection_is_empty(response.map(|r| r.count))
    }

    async fn index(
        &self,
        index: &str,
        doc_type: &str,
        id: Option<&str>,
        document: &Map<String, Value>,
    ) -> TransportResult<String> {
        let segments = self.addressing.document(index, doc_type, id);
        let method = if id.is_some() { Method::PUT } else { Method::POST };
        let body = Value::Object(document.clone());
        let response: EsIndexResponse = self.send(method, self.url(&segments)?, Some(body)).await?;
        Ok(response.id)
    }

    async fn delete(&self, index: &str, doc_type: &str, id: &str) -> TransportResult<()> {
        let segments = self.addressing.document(index, doc_type, Some(id));
        let _: Value = self.send(Method::DELETE, self.url(&segments)?, None).await?;
        Ok(())
    }

    async fn delete_by_query(
        &self,
        index: &str,
        doc_type: &str,
        query: &EsQuery,
    ) -> TransportResult<u64> {
        let mut segments = self.addressing.collection(index, doc_type);
        segments.push("_delete_by_query".to_string());
        let body = serde_json::to_value(EsQueryBody {
            query: query.clone(),
        })?;
        let response: TransportResult<EsDeleteByQueryResponse> =
            self.send(Method::POST, self.url(&segments)?, Some(body)).await;
        self.absent_collection_is_empty(response.map(|r| r.deleted))
    }

    async fn put_mapping(&self, index: &str, doc_type: &str, mapping: &Value) -> TransportResult<()> {
        let (segments, body) = match self.addressing {
            Addressing::Typed => (
                vec![index.to_string(), "_mapping".to_string(), doc_type.to_string()],
                json!({ doc_type: mapping }),
            ),
            Addressing::IndexPerType => {
                let physical = self.addressing.physical_index(index, doc_type);
                match self.create_index(&physical).await {
                    Ok(()) => {}
                    Err(e) if e.is_already_exists() => {
                        debug!("index {} already exists", physical);
                    }
                    Err(e) => return Err(e),
                }
                (vec![physical, "_mapping".to_string()], mapping.clone())
            }
        };
        let _: Value = self.send(Method::PUT, self.url(&segments)?, Some(body)).await?;
        Ok(())
    }

    async fn delete_mapping(&self, index: &str, doc_type: &str) -> TransportResult<()> {
        let segments = self.addressing.collection(index, doc_type);
        let _: Value = self.send(Method::DELETE, self.url(&segments)?, None).await?;
        Ok(())
    }

    async fn create_index(&self, index: &str) -> TransportResult<()> {
        let _: Value = self.send(Method::PUT, self.url(&[index])?, None).await?;
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> TransportResult<()> {
        if self.addressing == Addressing::IndexPerType {
            let pattern = format!("{index}_*");
            let per_type: TransportResult<Value> =
                self.send(Method::DELETE, self.url(&[pattern.as_str()])?, None).await;
            if let Err(e) = per_type {
                warn!("could not drop per-type indices '{}': {}", pattern, e);
            }
        }
        let _: Value = self.send(Method::DELETE, self.url(&[index])?, None).await?;
        Ok(())
    }

    async fn refresh(&self, index: &str, doc_type: Option<&str>) -> TransportResult<()> {
        let target = match doc_type {
            Some(doc_type) => self.addressing.physical_index(index, doc_type),
            None => index.to_string(),
        };
        let url = self.url(&[target.as_str(), "_refresh"])?;
        let _: Value = self.send(Method::POST, url, None).await?;
        Ok(())
    }

    async fn wait_for_status(&self, status: &str) -> TransportResult<()> {
        let mut url = self.url(&["_cluster", "health"])?;
        url.query_pairs_mut().append_pair("wait_for_status", status);
        let health: EsClusterHealth = self.send(Method::GET, url, None).await?;
        if health.timed_out {
            return Err(TransportError::Other(format!(
                "cluster did not reach '{}' (status '{}')",
                status, health.status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str, addressing: Addressing) -> HttpTransport {
        HttpTransport::new(Url::parse(base).unwrap(), addressing, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_url_joins_segments() {
        let t = transport("http://localhost:9200", Addressing::IndexPerType);
        let url = t.url(&["db_person", "_search"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9200/db_person/_search");
    }

    #[test]
    fn test_url_keeps_base_path_and_encodes_ids() {
        let t = transport("http://proxy:8080/es/", Addressing::Typed);
        let url = t.url(&["db", "person", "a/b c"]).unwrap();
        assert_eq!(url.as_str(), "http://proxy:8080/es/db/person/a%2Fb%20c");
    }
}
