//! HTTP transport to the search engine's REST API

use crate::config::EngineConfig;
use crate::metrics::ENGINE_REQUESTS_TOTAL;
use crate::search::error::{SearchError, SearchResult};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// The one engine operation query builders depend on
#[async_trait]
pub trait SearchTransport: Send + Sync {
    /// Run `query` against `index` and return the raw response body.
    ///
    /// A body carrying an `error` object is returned as-is; interpreting it is
    /// the caller's job.
    async fn search(&self, index: &str, query: &Value) -> SearchResult<Value>;
}

/// How [`SearchClient::reindex`] waits for the copy to finish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReindexMode {
    /// Block inside a single request until the engine is done
    Blocking,
    /// Start a background task and poll it until it completes. Gives up
    /// with [`SearchError::Engine`] after `engine.reindex_max_polls` polls;
    /// the engine task itself keeps running.
    Task,
}

/// Summary of a finished reindex
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReindexOutcome {
    pub total: u64,
    pub created: u64,
    pub updated: u64,
    pub failures: usize,
}

impl ReindexOutcome {
    fn from_response(body: &Value) -> Self {
        let count = |key: &str| body.get(key).and_then(Value::as_u64).unwrap_or(0);
        Self {
            total: count("total"),
            created: count("created"),
            updated: count("updated"),
            failures: body
                .get("failures")
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0),
        }
    }
}

/// Stateless client for one engine endpoint. Cloning shares the underlying
/// connection pool.
#[derive(Clone, Debug)]
pub struct SearchClient {
    client: Client,
    endpoint: Url,
    reindex_poll_interval: Duration,
    reindex_max_polls: u32,
}

impl SearchClient {
    /// Create a new client
    pub fn new(config: &EngineConfig) -> SearchResult<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            SearchError::Configuration(format!("invalid engine endpoint '{}': {}", config.endpoint, e))
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(SearchError::Configuration(format!(
                "engine endpoint '{}' cannot be used as a base URL",
                config.endpoint
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SearchError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            reindex_poll_interval: Duration::from_millis(config.reindex_poll_interval_ms),
            reindex_max_polls: config.reindex_max_polls,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    /// Create an index from a settings/mappings document
    pub async fn create_index(&self, name: &str, schema: &Value) -> SearchResult<()> {
        let request = self.request(Method::PUT, &[name])?.json(schema);
        self.expect_success("create_index", request).await?;
        info!(index = %name, "Created index");
        Ok(())
    }

    pub async fn delete_index(&self, name: &str) -> SearchResult<()> {
        let request = self.request(Method::DELETE, &[name])?;
        self.expect_success("delete_index", request).await?;
        info!(index = %name, "Deleted index");
        Ok(())
    }

    pub async fn create_index_alias(&self, index: &str, alias: &str) -> SearchResult<()> {
        self.update_aliases("create_alias", json!([{ "add": { "index": index, "alias": alias } }]))
            .await?;
        info!(index = %index, alias = %alias, "Created index alias");
        Ok(())
    }

    pub async fn delete_index_alias(&self, index: &str, alias: &str) -> SearchResult<()> {
        self.update_aliases(
            "delete_alias",
            json!([{ "remove": { "index": index, "alias": alias } }]),
        )
        .await?;
        info!(index = %index, alias = %alias, "Deleted index alias");
        Ok(())
    }

    /// Delete every document matching `query` (a query clause, not a full
    /// request). Returns the number of deleted documents.
    pub async fn delete_by_query(&self, index: &str, query: &Value) -> SearchResult<u64> {
        let request = self
            .request(Method::POST, &[index, "_delete_by_query"])?
            .query(&[("conflicts", "proceed"), ("refresh", "true")])
            .json(&json!({ "query": query }));
        let body = self.expect_success("delete_by_query", request).await?;
        let deleted = body.get("deleted").and_then(Value::as_u64).unwrap_or(0);
        info!(index = %index, deleted, "Deleted documents by query");
        Ok(deleted)
    }

    /// Delete every document in `index`
    pub async fn purge(&self, index: &str) -> SearchResult<u64> {
        self.delete_by_query(index, &json!({ "match_all": {} })).await
    }

    /// Fetch a document's source, or `None` if it does not exist
    pub async fn get_document(&self, index: &str, id: &str) -> SearchResult<Option<Value>> {
        let request = self.request(Method::GET, &[index, "_doc", id])?;
        let (status, body) = self.send("get_document", request).await?;

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SearchError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let mut doc: Value = serde_json::from_str(&body)
            .map_err(|e| SearchError::InvalidResponse(format!("document body: {}", e)))?;
        if doc.get("found").and_then(Value::as_bool) == Some(false) {
            return Ok(None);
        }
        Ok(Some(doc.get_mut("_source").map(Value::take).unwrap_or(doc)))
    }

    pub async fn index_document(&self, index: &str, id: &str, doc: &Value) -> SearchResult<()> {
        let request = self.request(Method::PUT, &[index, "_doc", id])?.json(doc);
        self.expect_success("index_document", request).await?;
        debug!(index = %index, id = %id, "Indexed document");
        Ok(())
    }

    /// Whether an index (or alias) exists. Never fails: an unreachable engine
    /// reads as "no".
    pub async fn index_exists(&self, name: &str) -> bool {
        let request = match self.request(Method::HEAD, &[name]) {
            Ok(request) => request,
            Err(e) => {
                warn!(index = %name, error = %e, "Could not build index existence check");
                return false;
            }
        };
        match self.send("index_exists", request).await {
            Ok((status, _)) => status.is_success(),
            Err(e) => {
                warn!(index = %name, error = %e, "Index existence check failed");
                false
            }
        }
    }

    /// Make recently written documents searchable
    pub async fn refresh(&self, index: &str) -> SearchResult<()> {
        let request = self.request(Method::POST, &[index, "_refresh"])?;
        self.expect_success("refresh", request).await?;
        Ok(())
    }

    pub async fn count_documents(&self, index: &str) -> SearchResult<u64> {
        let request = self.request(Method::GET, &[index, "_count"])?;
        let body = self.expect_success("count", request).await?;
        body.get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| SearchError::InvalidResponse("count response without count".to_string()))
    }

    /// Copy every document of `from` into `to`
    pub async fn reindex(&self, from: &str, to: &str, mode: ReindexMode) -> SearchResult<ReindexOutcome> {
        let wait = match mode {
            ReindexMode::Blocking => "true",
            ReindexMode::Task => "false",
        };
        let request = self
            .request(Method::POST, &["_reindex"])?
            .query(&[("wait_for_completion", wait)])
            .json(&json!({ "source": { "index": from }, "dest": { "index": to } }));
        let body = self.expect_success("reindex", request).await?;

        let response = match mode {
            ReindexMode::Blocking => body,
            ReindexMode::Task => {
                let task = body.get("task").and_then(Value::as_str).ok_or_else(|| {
                    SearchError::InvalidResponse("reindex response without task id".to_string())
                })?;
                info!(from = %from, to = %to, task = %task, "Reindex task started");
                self.wait_for_task(task).await?
            }
        };

        let outcome = ReindexOutcome::from_response(&response);
        info!(
            from = %from,
            to = %to,
            total = outcome.total,
            failures = outcome.failures,
            "Reindex complete"
        );
        Ok(outcome)
    }

    async fn wait_for_task(&self, task: &str) -> SearchResult<Value> {
        for _ in 0..self.reindex_max_polls {
            let request = self.request(Method::GET, &["_tasks", task])?;
            let mut body = self.expect_success("task_status", request).await?;

            if body.get("completed").and_then(Value::as_bool) == Some(true) {
                if let Some(error) = body.get("error") {
                    return Err(SearchError::from_engine_body(error));
                }
                return Ok(body.get_mut("response").map(Value::take).unwrap_or_default());
            }

            debug!(task = %task, "Waiting for engine task");
            tokio::time::sleep(self.reindex_poll_interval).await;
        }

        warn!(task = %task, polls = self.reindex_max_polls, "Gave up waiting for engine task");
        Err(SearchError::Engine {
            error_type: "task_timeout".to_string(),
            reason: format!(
                "task {} not completed after {} polls",
                task, self.reindex_max_polls
            ),
        })
    }

    async fn update_aliases(&self, operation: &'static str, actions: Value) -> SearchResult<()> {
        let request = self
            .request(Method::POST, &["_aliases"])?
            .json(&json!({ "actions": actions }));
        self.expect_success(operation, request).await?;
        Ok(())
    }

    fn request(&self, method: Method, segments: &[&str]) -> SearchResult<RequestBuilder> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| SearchError::Configuration("engine endpoint cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(self.client.request(method, url))
    }

    /// Send a request and read the whole body, recording the outcome
    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> SearchResult<(StatusCode, String)> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                ENGINE_REQUESTS_TOTAL
                    .with_label_values(&[operation, "unreachable"])
                    .inc();
                return Err(e.into());
            }
        };

        let status = response.status();
        let body = response.text().await?;
        let outcome = if status.is_success() { "success" } else { "error" };
        ENGINE_REQUESTS_TOTAL
            .with_label_values(&[operation, outcome])
            .inc();
        Ok((status, body))
    }

    /// Send a mutating request; anything but 2xx is an error
    async fn expect_success(&self, operation: &'static str, request: RequestBuilder) -> SearchResult<Value> {
        let (status, body) = self.send(operation, request).await?;
        if !status.is_success() {
            warn!(operation, status = status.as_u16(), "Search engine request failed");
            return Err(SearchError::Http {
                status: status.as_u16(),
                body,
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|e| SearchError::InvalidResponse(format!("{} response: {}", operation, e)))
    }
}

#[async_trait]
impl SearchTransport for SearchClient {
    async fn search(&self, index: &str, query: &Value) -> SearchResult<Value> {
        let request = self.request(Method::POST, &[index, "_search"])?.json(query);
        let (status, body) = self.send("search", request).await?;

        if status.is_success() {
            return serde_json::from_str(&body)
                .map_err(|e| SearchError::InvalidResponse(format!("search response: {}", e)));
        }

        // Engines report malformed queries as 4xx with an error object.
        match serde_json::from_str::<Value>(&body) {
            Ok(parsed) if parsed.get("error").is_some() => Ok(parsed),
            _ => Err(SearchError::Http {
                status: status.as_u16(),
                body,
            }),
        }
    }
}
