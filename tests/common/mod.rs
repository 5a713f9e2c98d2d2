//! Common test utilities
//!
//! [`FakeEngine`] is an in-memory [`SearchTransport`] that evaluates the part
//! of the query DSL the builders emit, so integration tests can check query
//! semantics end to end without a running engine.

#![allow(dead_code)]

use async_trait::async_trait;
use kumquat_search::config::Config;
use kumquat_search::search::{SearchResult, SearchService, SearchTransport};
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

pub const ITEMS: &str = "kumquat_items";
pub const COLLECTIONS: &str = "kumquat_collections";
pub const AGENTS: &str = "kumquat_agents";

#[derive(Default)]
pub struct FakeEngine {
    indexes: Mutex<HashMap<String, Vec<Value>>>,
    calls: AtomicUsize,
    last_query: Mutex<Option<Value>>,
    failure: Mutex<Option<Value>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, index: &str, doc: Value) {
        self.indexes
            .lock()
            .unwrap()
            .entry(index.to_string())
            .or_default()
            .push(doc);
    }

    /// Answer every following search with this `error` object
    pub fn fail_with(&self, error: Value) {
        *self.failure.lock().unwrap() = Some(error);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    pub fn last_query(&self) -> Option<Value> {
        self.last_query.lock().unwrap().clone()
    }

    fn documents(&self, index: &str) -> Vec<Value> {
        let indexes = self.indexes.lock().unwrap();
        index
            .split(',')
            .filter_map(|name| indexes.get(name))
            .flatten()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SearchTransport for FakeEngine {
    async fn search(&self, index: &str, query: &Value) -> SearchResult<Value> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        *self.last_query.lock().unwrap() = Some(query.clone());

        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Ok(json!({ "error": error, "status": 400 }));
        }

        let mut matches: Vec<(f64, Value)> = self
            .documents(index)
            .into_iter()
            .filter_map(|doc| evaluate(&query["query"], &doc).map(|score| (score, doc)))
            .collect();

        if let Some(sort) = query.get("sort").and_then(Value::as_array) {
            matches.sort_by(|(_, a), (_, b)| compare_by_sort(sort, a, b));
        } else {
            matches.sort_by(|(a, _), (b, _)| b.total_cmp(a));
        }

        let aggregations = query
            .get("aggregations")
            .and_then(Value::as_object)
            .map(|aggs| aggregate(aggs, &matches));

        let total = matches.len();
        let from = query["from"].as_u64().unwrap_or(0) as usize;
        let size = query["size"].as_u64().unwrap_or(10) as usize;
        let hits: Vec<Value> = matches
            .into_iter()
            .skip(from)
            .take(size)
            .map(|(score, doc)| {
                json!({
                    "_index": index,
                    "_id": doc["sys_k_repository_id"],
                    "_score": score,
                    "_source": doc,
                })
            })
            .collect();

        let mut response = json!({
            "took": 1,
            "timed_out": false,
            "hits": {
                "total": { "value": total, "relation": "eq" },
                "hits": hits,
            }
        });
        if let Some(aggregations) = aggregations {
            response["aggregations"] = aggregations;
        }
        Ok(response)
    }
}

/// Field values of a document, flattening arrays
fn values<'a>(doc: &'a Value, field: &str) -> Vec<&'a Value> {
    match doc.get(field) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(value) => vec![value],
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn field_text(doc: &Value, field: &str) -> String {
    if field == "search_all" {
        return doc
            .as_object()
            .map(|obj| {
                obj.values()
                    .flat_map(|v| match v {
                        Value::Array(items) => items.clone(),
                        other => vec![other.clone()],
                    })
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();
    }
    values(doc, field)
        .into_iter()
        .filter_map(Value::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Score of `doc` against `clause`, or `None` when it does not match
fn evaluate(clause: &Value, doc: &Value) -> Option<f64> {
    let (kind, body) = clause.as_object()?.iter().next()?;
    match kind.as_str() {
        "match_all" => Some(1.0),
        "term" => {
            let (field, expected) = body.as_object()?.iter().next()?;
            values(doc, field).contains(&expected).then_some(1.0)
        }
        "terms" => {
            let (field, expected) = body.as_object()?.iter().next()?;
            let expected = expected.as_array()?;
            values(doc, field)
                .iter()
                .any(|v| expected.contains(v))
                .then_some(1.0)
        }
        "exists" => {
            let field = body["field"].as_str()?;
            (!values(doc, field).is_empty()).then_some(1.0)
        }
        "range" => {
            let (field, bounds) = body.as_object()?.iter().next()?;
            let in_range = values(doc, field).iter().any(|value| {
                bounds.as_object().map_or(false, |bounds| {
                    bounds.iter().all(|(op, bound)| {
                        match (op.as_str(), compare_values(value, bound)) {
                            ("gt", Some(ord)) => ord == Ordering::Greater,
                            ("gte", Some(ord)) => ord != Ordering::Less,
                            ("lt", Some(ord)) => ord == Ordering::Less,
                            ("lte", Some(ord)) => ord != Ordering::Greater,
                            _ => false,
                        }
                    })
                })
            });
            in_range.then_some(1.0)
        }
        "query_string" => {
            let fields: Vec<String> = match body.get("default_field") {
                Some(field) => vec![field.as_str()?.to_string()],
                None => body["fields"]
                    .as_array()?
                    .iter()
                    .filter_map(|f| f.as_str().map(str::to_string))
                    .collect(),
            };
            let text: Vec<String> = fields
                .iter()
                .flat_map(|field| tokens(&field_text(doc, field)))
                .collect();
            let wanted = tokens(body["query"].as_str()?);
            let mut score = 0.0;
            for token in &wanted {
                let hits = text.iter().filter(|t| *t == token).count();
                if hits == 0 {
                    return None;
                }
                score += hits as f64;
            }
            Some(score.max(1.0))
        }
        "bool" => {
            let section = |name: &str| body[name].as_array().cloned().unwrap_or_default();
            let mut score = 0.0;
            for clause in section("must") {
                score += evaluate(&clause, doc)?;
            }
            for clause in section("filter") {
                evaluate(&clause, doc)?;
            }
            if section("must_not")
                .iter()
                .any(|clause| evaluate(clause, doc).is_some())
            {
                return None;
            }
            let should = section("should");
            if !should.is_empty() {
                let required = body["minimum_should_match"].as_u64().unwrap_or(
                    if section("must").is_empty() && section("filter").is_empty() {
                        1
                    } else {
                        0
                    },
                ) as usize;
                let matched = should
                    .iter()
                    .filter_map(|clause| evaluate(clause, doc))
                    .collect::<Vec<_>>();
                if matched.len() < required {
                    return None;
                }
                score += matched.iter().sum::<f64>();
            }
            Some(score.max(1.0))
        }
        _ => None,
    }
}

fn compare_by_sort(sort: &[Value], a: &Value, b: &Value) -> Ordering {
    for key in sort {
        let Some((field, spec)) = key.as_object().and_then(|o| o.iter().next()) else {
            continue;
        };
        let descending = spec["order"].as_str() == Some("desc");
        let ordering = match (values(a, field).first(), values(b, field).first()) {
            (Some(x), Some(y)) => {
                let ordering = compare_values(x, y).unwrap_or(Ordering::Equal);
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            }
            // Missing values sort last either way
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn aggregate(aggs: &Map<String, Value>, matches: &[(f64, Value)]) -> Value {
    let mut out = Map::new();
    for (name, agg) in aggs {
        if let Some(terms) = agg.get("terms") {
            let field = terms["field"].as_str().unwrap_or_default();
            let size = terms["size"].as_u64().unwrap_or(10) as usize;
            let mut counts: Vec<(String, u64)> = Vec::new();
            for (_, doc) in matches {
                for value in values(doc, field) {
                    let key = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    match counts.iter_mut().find(|(k, _)| *k == key) {
                        Some((_, count)) => *count += 1,
                        None => counts.push((key, 1)),
                    }
                }
            }
            counts.sort_by(|(ka, ca), (kb, cb)| cb.cmp(ca).then_with(|| ka.cmp(kb)));
            counts.truncate(size);
            let buckets: Vec<Value> = counts
                .into_iter()
                .map(|(key, count)| json!({ "key": key, "doc_count": count }))
                .collect();
            out.insert(name.clone(), json!({ "buckets": buckets }));
        } else if let Some(sum) = agg.get("sum") {
            let field = sum["field"].as_str().unwrap_or_default();
            let total: f64 = matches
                .iter()
                .flat_map(|(_, doc)| values(doc, field))
                .filter_map(Value::as_f64)
                .sum();
            out.insert(name.clone(), json!({ "value": total }));
        }
    }
    Value::Object(out)
}

/// A published, unrestricted item document
pub fn item(id: &str, title: &str) -> Value {
    json!({
        "sys_k_repository_id": id,
        "sys_k_class": "Item",
        "sys_k_title": title,
        "sys_t_title": title,
        "sys_b_published": true,
        "sys_b_restricted": false,
        "sys_b_publicly_accessible": true,
        "sys_i_effective_allowed_host_group_count": 0,
        "sys_k_variant": "File",
        "sys_l_total_byte_size": 100,
    })
}

/// A published, unrestricted top-level collection document
pub fn collection(id: &str, title: &str) -> Value {
    json!({
        "sys_k_repository_id": id,
        "sys_k_class": "Collection",
        "sys_k_title": title,
        "sys_b_published": true,
        "sys_b_restricted": false,
        "sys_b_publicly_accessible": true,
        "sys_i_effective_allowed_host_group_count": 0,
    })
}

pub fn agent(id: &str, name: &str) -> Value {
    json!({
        "sys_k_repository_id": id,
        "sys_k_class": "Agent",
        "sys_k_name": name,
    })
}

/// Set `field` on a document built by one of the helpers above
pub fn with(mut doc: Value, field: &str, value: Value) -> Value {
    doc[field] = value;
    doc
}

/// Service over `engine` with the default configuration
pub fn service(engine: &Arc<FakeEngine>) -> SearchService {
    let transport: Arc<dyn SearchTransport> = engine.clone();
    SearchService::new(transport, &Config::default())
}

/// Whether a metric appears in Prometheus text exposition output
pub fn metric_exists(output: &str, metric_name: &str) -> bool {
    output.lines().any(|line| {
        line.starts_with(&format!("# HELP {}", metric_name))
            || line.starts_with(&format!("# TYPE {}", metric_name))
            || line.starts_with(metric_name)
    })
}

/// Extract the sample value from a Prometheus output line
/// Example: `metric_name{label1="value1"} 42.5` -> Some(42.5)
pub fn extract_metric_value(line: &str) -> Option<f64> {
    line.split_whitespace().last()?.parse::<f64>().ok()
}
