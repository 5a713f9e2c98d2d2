//! Typed query documents for the search engine's JSON query DSL
//!
//! Builders assemble a [`SearchRequest`] out of [`Clause`] values and only
//! turn it into JSON at the very end, in a single serialization pass.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use strum_macros::{Display, EnumString};

/// Sort direction
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Default operator of a query-string clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Operator {
    And,
    Or,
}

/// Bounds of a range clause. Values are already in the engine's format
/// (numbers, or RFC 3339 strings for dates).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeBounds {
    pub gt: Option<Value>,
    pub gte: Option<Value>,
    pub lt: Option<Value>,
    pub lte: Option<Value>,
}

impl RangeBounds {
    fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (key, bound) in [
            ("gt", &self.gt),
            ("gte", &self.gte),
            ("lt", &self.lt),
            ("lte", &self.lte),
        ] {
            if let Some(value) = bound {
                map.insert(key.to_string(), value.clone());
            }
        }
        Value::Object(map)
    }
}

/// One node of a query tree
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    MatchAll,
    Term {
        field: String,
        value: Value,
    },
    Terms {
        field: String,
        values: Vec<Value>,
    },
    Range {
        field: String,
        bounds: RangeBounds,
    },
    Exists {
        field: String,
    },
    QueryString {
        query: String,
        fields: Vec<String>,
        default_operator: Operator,
        lenient: bool,
    },
    Bool(BoolQuery),
}

impl Clause {
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Clause::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn terms<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Clause::Terms {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Clause::Exists {
            field: field.into(),
        }
    }

    pub fn range(field: impl Into<String>, bounds: RangeBounds) -> Self {
        Clause::Range {
            field: field.into(),
            bounds,
        }
    }

    /// A free-text clause against the given fields, AND-ing its terms
    pub fn query_string(query: impl Into<String>, fields: Vec<String>) -> Self {
        Clause::QueryString {
            query: query.into(),
            fields,
            default_operator: Operator::And,
            lenient: true,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Clause::MatchAll => json!({ "match_all": {} }),
            Clause::Term { field, value } => json!({ "term": { field.as_str(): value } }),
            Clause::Terms { field, values } => json!({ "terms": { field.as_str(): values } }),
            Clause::Range { field, bounds } => {
                json!({ "range": { field.as_str(): bounds.to_json() } })
            }
            Clause::Exists { field } => json!({ "exists": { "field": field } }),
            Clause::QueryString {
                query,
                fields,
                default_operator,
                lenient,
            } => {
                let mut body = json!({
                    "query": query,
                    "default_operator": default_operator.to_string(),
                    "lenient": lenient,
                });
                if fields.len() == 1 {
                    body["default_field"] = json!(fields[0]);
                } else if !fields.is_empty() {
                    body["fields"] = json!(fields);
                }
                json!({ "query_string": body })
            }
            Clause::Bool(bool_query) => bool_query.to_json(),
        }
    }
}

/// A boolean compound clause
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    pub must: Vec<Clause>,
    pub filter: Vec<Clause>,
    pub should: Vec<Clause>,
    pub must_not: Vec<Clause>,
    pub minimum_should_match: Option<u32>,
}

impl BoolQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must(mut self, clause: Clause) -> Self {
        self.must.push(clause);
        self
    }

    pub fn filter(mut self, clause: Clause) -> Self {
        self.filter.push(clause);
        self
    }

    pub fn should(mut self, clause: Clause) -> Self {
        self.should.push(clause);
        self
    }

    pub fn must_not(mut self, clause: Clause) -> Self {
        self.must_not.push(clause);
        self
    }

    pub fn minimum_should_match(mut self, n: u32) -> Self {
        self.minimum_should_match = Some(n);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
            && self.filter.is_empty()
            && self.should.is_empty()
            && self.must_not.is_empty()
    }

    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        for (key, clauses) in [
            ("must", &self.must),
            ("filter", &self.filter),
            ("should", &self.should),
            ("must_not", &self.must_not),
        ] {
            if !clauses.is_empty() {
                body.insert(
                    key.to_string(),
                    Value::Array(clauses.iter().map(Clause::to_json).collect()),
                );
            }
        }
        if let Some(n) = self.minimum_should_match {
            body.insert("minimum_should_match".to_string(), json!(n));
        }
        json!({ "bool": Value::Object(body) })
    }
}

impl From<BoolQuery> for Clause {
    fn from(query: BoolQuery) -> Self {
        Clause::Bool(query)
    }
}

/// An aggregation request
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    Terms { field: String, size: usize },
    Sum { field: String },
}

impl Aggregation {
    pub fn to_json(&self) -> Value {
        match self {
            Aggregation::Terms { field, size } => {
                json!({ "terms": { "field": field, "size": size } })
            }
            Aggregation::Sum { field } => json!({ "sum": { "field": field } }),
        }
    }
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub field: String,
    pub direction: SortDirection,
}

impl SortField {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// A complete query document
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: Clause,
    /// Named aggregations, in request order
    pub aggregations: Vec<(String, Aggregation)>,
    pub sort: Vec<SortField>,
    pub from: usize,
    pub size: usize,
    /// Ask for an exact total instead of the engine's default lower bound
    pub track_total_hits: bool,
}

impl SearchRequest {
    pub fn new(query: Clause) -> Self {
        Self {
            query,
            aggregations: Vec::new(),
            sort: Vec::new(),
            from: 0,
            size: 0,
            track_total_hits: true,
        }
    }

    pub fn to_json(&self) -> Value {
        let mut doc = Map::new();
        doc.insert("query".to_string(), self.query.to_json());

        if !self.aggregations.is_empty() {
            let aggregations: Map<String, Value> = self
                .aggregations
                .iter()
                .map(|(name, agg)| (name.clone(), agg.to_json()))
                .collect();
            doc.insert("aggregations".to_string(), Value::Object(aggregations));
        }

        if !self.sort.is_empty() {
            let sort: Vec<Value> = self
                .sort
                .iter()
                .map(|s| json!({ s.field.as_str(): { "order": s.direction.to_string() } }))
                .collect();
            doc.insert("sort".to_string(), Value::Array(sort));
        }

        doc.insert("from".to_string(), json!(self.from));
        doc.insert("size".to_string(), json!(self.size));
        if self.track_total_hits {
            doc.insert("track_total_hits".to_string(), json!(true));
        }

        Value::Object(doc)
    }
}
