//! Fluent, lazily executed search builders
//!
//! A [`Relation`] accumulates query intent through chained `&mut self` calls.
//! Nothing touches the network until a result accessor (`count`, `facets`,
//! `hits`, `ids`, `to_array`...) needs data; the parsed response is then
//! cached until the next mutating call clears it.
//!
//! Entity-specific behaviour lives in two places: the [`EntitySchema`] field
//! table the relation is built with, and the [`Scope`] type parameter that
//! contributes entity-specific clauses.

use crate::metrics::{
    SEARCH_ERRORS_TOTAL, SEARCH_HITS_DROPPED_TOTAL, SEARCH_QUERIES_TOTAL,
    SEARCH_QUERY_DURATION_SECONDS,
};
use crate::search::access::AccessContext;
use crate::search::client::SearchTransport;
use crate::search::dsl::{Aggregation, BoolQuery, Clause, SearchRequest, SortDirection, SortField};
use crate::search::error::{SearchError, SearchResult};
use crate::search::facet::{Facet, FacetTerm};
use crate::search::profile::MetadataProfile;
use crate::search::schema::{EntitySchema, EntityType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Page size used when none is configured
pub const DEFAULT_LIMIT: usize = 25;
/// Facet bucket limit used when none is configured
pub const DEFAULT_BUCKET_LIMIT: usize = 10;
/// Default `index.max_result_window` of Elasticsearch and OpenSearch
pub const DEFAULT_MAX_RESULT_WINDOW: usize = 10_000;
/// Name of the byte-size sum aggregation
pub const TOTAL_BYTE_SIZE_AGGREGATION: &str = "total_byte_size";

/// Strip characters that break the engine's query-string syntax.
///
/// Brackets, braces and parentheses are removed and slashes become spaces.
/// This keeps ordinary user input from producing parse errors; it does not
/// neutralize every reserved character and is not an injection defense.
pub fn sanitize_query(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '[' | ']' | '(' | ')' | '{' | '}'))
        .map(|c| if c == '/' { ' ' } else { c })
        .collect()
}

/// Value constraint of one filtered field
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// Exact match
    Single(Value),
    /// Match any of the values
    Any(Vec<Value>),
}

impl FilterValue {
    fn to_clause(&self, field: &str) -> Clause {
        match self {
            FilterValue::Single(value) => Clause::term(field, value.clone()),
            FilterValue::Any(values) => Clause::terms(field, values.iter().cloned()),
        }
    }

    fn with(self, value: Value) -> Self {
        let mut values = match self {
            FilterValue::Single(existing) => vec![existing],
            FilterValue::Any(existing) => existing,
        };
        if !values.contains(&value) {
            values.push(value);
        }
        if values.len() == 1 {
            FilterValue::Single(values.remove(0))
        } else {
            FilterValue::Any(values)
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Single(value.into())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Single(value.into())
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Single(value.into())
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Single(value.into())
    }
}

impl From<u64> for FilterValue {
    fn from(value: u64) -> Self {
        FilterValue::Single(value.into())
    }
}

impl<T: Into<Value>> From<Vec<T>> for FilterValue {
    fn from(values: Vec<T>) -> Self {
        FilterValue::Any(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for FilterValue {
    fn from(values: [T; N]) -> Self {
        FilterValue::Any(values.into_iter().map(Into::into).collect())
    }
}

/// `field:value` filter pairs, usually round-tripped through a UI as plain
/// strings (see [`FacetTerm::query`])
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetFilters(Vec<(String, String)>);

impl FacetFilters {
    /// Parse `field:value` tokens. Tokens without exactly one colon, or with
    /// an empty side, are dropped without complaint.
    pub fn parse<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pairs = tokens
            .into_iter()
            .filter_map(|token| {
                let mut parts = token.as_ref().split(':');
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(field), Some(value), None) if !field.is_empty() && !value.is_empty() => {
                        Some((field.to_string(), value.to_string()))
                    }
                    _ => None,
                }
            })
            .collect();
        Self(pairs)
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for FacetFilters {
    fn from(token: &str) -> Self {
        Self::parse([token])
    }
}

impl From<String> for FacetFilters {
    fn from(token: String) -> Self {
        Self::parse([token])
    }
}

impl From<Vec<String>> for FacetFilters {
    fn from(tokens: Vec<String>) -> Self {
        Self::parse(tokens)
    }
}

impl From<Vec<&str>> for FacetFilters {
    fn from(tokens: Vec<&str>) -> Self {
        Self::parse(tokens)
    }
}

impl From<&[String]> for FacetFilters {
    fn from(tokens: &[String]) -> Self {
        Self::parse(tokens)
    }
}

impl<const N: usize> From<[&str; N]> for FacetFilters {
    fn from(tokens: [&str; N]) -> Self {
        Self::parse(tokens)
    }
}

impl From<HashMap<String, String>> for FacetFilters {
    fn from(map: HashMap<String, String>) -> Self {
        let mut pairs: Vec<_> = map.into_iter().collect();
        pairs.sort();
        Self(pairs)
    }
}

impl From<BTreeMap<String, String>> for FacetFilters {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map.into_iter().collect())
    }
}

/// Free-text query against one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextQuery {
    pub field: String,
    pub text: String,
}

/// Requested sort order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderBy {
    /// No sort at all, not even the profile default: engine relevance order
    Unsorted,
    Field(String, SortDirection),
}

impl From<&str> for OrderBy {
    fn from(field: &str) -> Self {
        OrderBy::Field(field.to_string(), SortDirection::Asc)
    }
}

impl From<String> for OrderBy {
    fn from(field: String) -> Self {
        OrderBy::Field(field, SortDirection::Asc)
    }
}

impl<S: Into<String>> From<(S, SortDirection)> for OrderBy {
    fn from((field, direction): (S, SortDirection)) -> Self {
        OrderBy::Field(field.into(), direction)
    }
}

/// Effective ordering state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Ordering {
    /// Profile default sort field if there is one, else relevance
    #[default]
    Default,
    Unsorted,
    Fields(Vec<SortField>),
}

/// Everything a relation has been told so far
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    pub filters: BTreeMap<String, FilterValue>,
    /// Filters from `field:value` tokens, AND-ed with `filters`
    pub facet_filters: BTreeMap<String, FilterValue>,
    pub query: Option<TextQuery>,
    /// Additional AND-ed per-field queries
    pub field_queries: Vec<TextQuery>,
    pub exact_match: bool,
    pub ordering: Ordering,
    pub start: usize,
    pub limit: usize,
    pub aggregations_enabled: bool,
    pub bucket_limit: usize,
    pub max_result_window: usize,
    pub access: AccessContext,
    pub profile: Option<MetadataProfile>,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            filters: BTreeMap::new(),
            facet_filters: BTreeMap::new(),
            query: None,
            field_queries: Vec::new(),
            exact_match: false,
            ordering: Ordering::Default,
            start: 0,
            limit: DEFAULT_LIMIT,
            aggregations_enabled: true,
            bucket_limit: DEFAULT_BUCKET_LIMIT,
            max_result_window: DEFAULT_MAX_RESULT_WINDOW,
            access: AccessContext::default(),
            profile: None,
        }
    }
}

impl QueryState {
    fn has_text_query(&self) -> bool {
        self.query.is_some() || !self.field_queries.is_empty()
    }

    /// `(from, size)` of the request. `from + size` never exceeds the
    /// engine's result window; pages entirely past it come back empty.
    pub fn window(&self) -> (usize, usize) {
        let from = self.start.min(self.max_result_window);
        let size = self.limit.min(self.max_result_window - from);
        (from, size)
    }
}

/// Entity-specific clauses layered on top of the shared builder state
pub trait Scope: Default + Send + Sync {
    /// Entity types to match. Defaults to every type the schema covers.
    fn types(&self, schema: &EntitySchema) -> Vec<EntityType> {
        schema.types.clone()
    }

    /// Add this scope's clauses to `query`. `has_text_query` tells whether
    /// the request carries free-text matching.
    fn apply(&self, schema: &EntitySchema, has_text_query: bool, query: &mut BoolQuery);
}

/// A ranked search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub id: String,
    pub score: Option<f64>,
    pub entity_type: Option<EntityType>,
}

/// Parsed, immutable response of one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Total matching documents, not just this page
    pub total_count: u64,
    pub facets: Vec<Facet>,
    /// Hits in engine order
    pub hits: Vec<Hit>,
    /// Hits on this page that carried no identifier and were skipped
    #[serde(default)]
    pub unidentified: usize,
    pub total_byte_size: Option<u64>,
}

impl QueryResult {
    /// Parse a raw engine response. An `error` object becomes
    /// [`SearchError::Engine`].
    pub fn from_response(
        response: &Value,
        schema: &EntitySchema,
        profile: Option<&MetadataProfile>,
        aggregations_requested: bool,
    ) -> SearchResult<Self> {
        if let Some(error) = response.get("error") {
            return Err(SearchError::from_engine_body(error));
        }

        let hits = response
            .get("hits")
            .ok_or_else(|| SearchError::InvalidResponse("response has no hits".to_string()))?;

        let total_count = match hits.get("total") {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
            Some(total) => total.get("value").and_then(Value::as_u64).unwrap_or(0),
            None => 0,
        };

        let raw_hits = hits.get("hits").and_then(Value::as_array);
        let hits: Vec<Hit> = raw_hits
            .map(|raw| raw.iter().filter_map(|hit| parse_hit(hit, schema)).collect())
            .unwrap_or_default();
        let unidentified = raw_hits.map_or(0, Vec::len) - hits.len();

        let aggregations = response.get("aggregations");
        let facets = match (aggregations_requested, profile) {
            (true, Some(profile)) => profile
                .facet_fields
                .iter()
                .map(|facet_field| {
                    let mut facet = Facet::new(&facet_field.label, &facet_field.field);
                    facet.terms = aggregations
                        .and_then(|aggs| aggs.get(&facet_field.field))
                        .and_then(|agg| agg.get("buckets"))
                        .and_then(Value::as_array)
                        .map(|buckets| {
                            buckets
                                .iter()
                                .filter_map(|bucket| parse_bucket(bucket, &facet_field.field))
                                .collect()
                        })
                        .unwrap_or_default();
                    facet
                })
                .collect(),
            _ => Vec::new(),
        };

        let total_byte_size = aggregations
            .and_then(|aggs| aggs.get(TOTAL_BYTE_SIZE_AGGREGATION))
            .and_then(|agg| agg.get("value"))
            .and_then(Value::as_f64)
            .map(|value| value.round() as u64);

        Ok(Self {
            total_count,
            facets,
            hits,
            unidentified,
            total_byte_size,
        })
    }

    pub fn ids(&self) -> Vec<String> {
        self.hits.iter().map(|hit| hit.id.clone()).collect()
    }
}

fn parse_hit(hit: &Value, schema: &EntitySchema) -> Option<Hit> {
    let source = hit.get("_source");
    let id = source
        .and_then(|s| s.get(schema.id_field))
        .and_then(Value::as_str)
        .or_else(|| hit.get("_id").and_then(Value::as_str));

    Some(Hit {
        id: id?.to_string(),
        score: hit.get("_score").and_then(Value::as_f64),
        entity_type: source
            .and_then(|s| s.get(schema.class_field))
            .and_then(Value::as_str)
            .and_then(EntityType::from_class_name),
    })
}

fn parse_bucket(bucket: &Value, field: &str) -> Option<FacetTerm> {
    let name = match bucket.get("key_as_string").or_else(|| bucket.get("key"))? {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    Some(FacetTerm {
        label: name.clone(),
        name,
        count: bucket.get("doc_count").and_then(Value::as_u64).unwrap_or(0),
        field: field.to_string(),
    })
}

/// Resolves search hits into stored domain entities
#[async_trait]
pub trait EntityFinder: Send + Sync {
    type Entity: Send;

    async fn find_by_repository_id(&self, id: &str) -> SearchResult<Option<Self::Entity>>;

    /// Resolve one hit. Finders spanning several entity types can dispatch on
    /// `hit.entity_type`.
    async fn find_hit(&self, hit: &Hit) -> SearchResult<Option<Self::Entity>> {
        self.find_by_repository_id(&hit.id).await
    }
}

/// One page of resolved entities
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPage<T> {
    /// Entities in hit order
    pub entities: Vec<T>,
    /// Identifiers of hits with no stored entity (stale index entries)
    pub dropped: Vec<String>,
    /// Hits the engine returned without any identifier
    pub unidentified: usize,
    /// Engine total. Can exceed what a full walk of the pages resolves when
    /// the index is stale.
    pub total_count: u64,
}

/// Shared builder over one entity schema
pub struct Relation<S: Scope> {
    transport: Arc<dyn SearchTransport>,
    index: String,
    schema: EntitySchema,
    state: QueryState,
    scope: S,
    result: Option<QueryResult>,
}

impl<S: Scope> Relation<S> {
    pub fn new(
        transport: Arc<dyn SearchTransport>,
        index: impl Into<String>,
        schema: EntitySchema,
    ) -> Self {
        Self {
            transport,
            index: index.into(),
            schema,
            state: QueryState::default(),
            scope: S::default(),
            result: None,
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn scope(&self) -> &S {
        &self.scope
    }

    /// Whether a response is cached
    pub fn is_loaded(&self) -> bool {
        self.result.is_some()
    }

    fn touch(&mut self) -> &mut Self {
        self.result = None;
        self
    }

    fn state_mut(&mut self) -> &mut QueryState {
        self.result = None;
        &mut self.state
    }

    pub(crate) fn scope_mut(&mut self) -> &mut S {
        self.result = None;
        &mut self.scope
    }

    /// Constrain `field`. A single value must match exactly; a collection
    /// matches any of its values.
    pub fn filter(&mut self, field: impl Into<String>, value: impl Into<FilterValue>) -> &mut Self {
        self.state_mut().filters.insert(field.into(), value.into());
        self
    }

    /// Add `field:value` filters. Values for the same field accumulate into
    /// an any-of match. They are kept apart from [`filter`](Self::filter)
    /// constraints and AND-ed with them, so a token can only narrow a field
    /// the caller already constrained.
    pub fn facet_filters(&mut self, filters: impl Into<FacetFilters>) -> &mut Self {
        let filters = filters.into();
        let state = self.state_mut();
        for (field, value) in filters.0 {
            let value = Value::String(value);
            let merged = match state.facet_filters.remove(&field) {
                Some(existing) => existing.with(value),
                None => FilterValue::Single(value),
            };
            state.facet_filters.insert(field, merged);
        }
        self
    }

    /// Match `text` against `field`. Blank text leaves any earlier query in
    /// place.
    pub fn query(&mut self, field: impl Into<String>, text: impl AsRef<str>) -> &mut Self {
        let text = text.as_ref().trim();
        if !text.is_empty() {
            self.state_mut().query = Some(TextQuery {
                field: field.into(),
                text: text.to_string(),
            });
        }
        self.touch()
    }

    /// Match `text` against every searchable field
    pub fn query_all(&mut self, text: impl AsRef<str>) -> &mut Self {
        let field = self.schema.search_all_field;
        self.query(field, text)
    }

    /// Additionally require `text` to match `field`
    pub fn where_matches(&mut self, field: impl Into<String>, text: impl AsRef<str>) -> &mut Self {
        let text = text.as_ref().trim();
        if !text.is_empty() {
            self.state_mut().field_queries.push(TextQuery {
                field: field.into(),
                text: text.to_string(),
            });
        }
        self.touch()
    }

    /// Compare query text as one exact keyword instead of tokenized text
    pub fn exact_match(&mut self, exact: bool) -> &mut Self {
        self.state_mut().exact_match = exact;
        self
    }

    /// Replace the sort order
    pub fn order(&mut self, order: impl Into<OrderBy>) -> &mut Self {
        self.state_mut().ordering = match order.into() {
            OrderBy::Unsorted => Ordering::Unsorted,
            OrderBy::Field(field, direction) => {
                Ordering::Fields(vec![SortField::new(field, direction)])
            }
        };
        self
    }

    /// Append a secondary sort key
    pub fn add_order(&mut self, field: impl Into<String>, direction: SortDirection) -> &mut Self {
        let state = self.state_mut();
        let sort = SortField::new(field, direction);
        match &mut state.ordering {
            Ordering::Fields(fields) => fields.push(sort),
            ordering => *ordering = Ordering::Fields(vec![sort]),
        }
        self
    }

    pub fn start(&mut self, start: usize) -> &mut Self {
        self.state_mut().start = start;
        self
    }

    pub fn limit(&mut self, limit: usize) -> &mut Self {
        self.state_mut().limit = limit;
        self
    }

    pub fn max_result_window(&mut self, window: usize) -> &mut Self {
        self.state_mut().max_result_window = window;
        self
    }

    /// Turn facet computation on or off
    pub fn aggregations(&mut self, enabled: bool) -> &mut Self {
        self.state_mut().aggregations_enabled = enabled;
        self
    }

    pub fn bucket_limit(&mut self, limit: usize) -> &mut Self {
        self.state_mut().bucket_limit = limit;
        self
    }

    /// Profile whose facetable fields and default sort drive the query
    pub fn metadata_profile(&mut self, profile: MetadataProfile) -> &mut Self {
        self.state_mut().profile = Some(profile);
        self
    }

    /// Replace the whole authorization context
    pub fn access_context(&mut self, access: AccessContext) -> &mut Self {
        self.state_mut().access = access;
        self
    }

    pub fn host_groups<I, K>(&mut self, groups: I) -> &mut Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.state_mut().access.host_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn roles<I, K>(&mut self, roles: I) -> &mut Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.state_mut().access.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn include_restricted(&mut self, include: bool) -> &mut Self {
        self.state_mut().access.include_restricted = include;
        self
    }

    pub fn include_unpublished(&mut self, include: bool) -> &mut Self {
        self.state_mut().access.include_unpublished = include;
        self
    }

    pub fn include_publicly_inaccessible(&mut self, include: bool) -> &mut Self {
        self.state_mut().access.include_publicly_inaccessible = include;
        self
    }

    pub fn bypass_authorization(&mut self, bypass: bool) -> &mut Self {
        self.state_mut().access.bypass_authorization = bypass;
        self
    }

    fn text_clause(&self, query: &TextQuery) -> Clause {
        if self.state.exact_match {
            Clause::term(query.field.clone(), query.text.clone())
        } else {
            Clause::query_string(sanitize_query(&query.text), vec![query.field.clone()])
        }
    }

    /// Assemble the query document for the current state
    pub fn build_request(&self) -> SearchRequest {
        let state = &self.state;
        let mut root = BoolQuery::new();

        if let Some(query) = &state.query {
            root.must.push(self.text_clause(query));
        }
        for query in &state.field_queries {
            root.must.push(self.text_clause(query));
        }

        let classes: Vec<&str> = self
            .scope
            .types(&self.schema)
            .iter()
            .map(EntityType::class_name)
            .collect();
        root.filter.push(Clause::terms(self.schema.class_field, classes));

        for (field, value) in state.filters.iter().chain(&state.facet_filters) {
            root.filter.push(value.to_clause(field));
        }

        state.access.apply(&self.schema.access, &mut root);
        self.scope
            .apply(&self.schema, state.has_text_query(), &mut root);

        let mut request = SearchRequest::new(root.into());

        if state.aggregations_enabled {
            if let Some(profile) = &state.profile {
                for facet_field in &profile.facet_fields {
                    request.aggregations.push((
                        facet_field.field.clone(),
                        Aggregation::Terms {
                            field: facet_field.field.clone(),
                            size: state.bucket_limit,
                        },
                    ));
                }
            }
            if let Some(field) = self.schema.total_byte_size_field {
                request.aggregations.push((
                    TOTAL_BYTE_SIZE_AGGREGATION.to_string(),
                    Aggregation::Sum {
                        field: field.to_string(),
                    },
                ));
            }
        }

        request.sort = match &state.ordering {
            Ordering::Unsorted => Vec::new(),
            Ordering::Fields(fields) => fields.clone(),
            Ordering::Default => state
                .profile
                .as_ref()
                .and_then(|p| p.default_sort_field.as_ref())
                .map(|field| vec![SortField::new(field.clone(), SortDirection::Asc)])
                .unwrap_or_default(),
        };

        let (from, size) = state.window();
        request.from = from;
        request.size = size;
        request
    }

    /// The query document as JSON
    pub fn to_json(&self) -> Value {
        self.build_request().to_json()
    }

    fn label(&self) -> &'static str {
        match self.schema.types.as_slice() {
            [only] => only.class_name(),
            _ => "Entity",
        }
    }

    async fn execute(&self) -> SearchResult<QueryResult> {
        let label = self.label();
        let body = self.to_json();
        debug!(entity = label, index = %self.index, query = %body, "Executing search");

        SEARCH_QUERIES_TOTAL.with_label_values(&[label]).inc();
        let timer = SEARCH_QUERY_DURATION_SECONDS
            .with_label_values(&[label])
            .start_timer();
        let response = self.transport.search(&self.index, &body).await;
        timer.observe_duration();

        let parsed = response.and_then(|response| {
            QueryResult::from_response(
                &response,
                &self.schema,
                self.state.profile.as_ref(),
                self.state.aggregations_enabled,
            )
        });

        if let Err(e) = &parsed {
            SEARCH_ERRORS_TOTAL.with_label_values(&[e.kind()]).inc();
        }
        parsed
    }

    /// The cached response, executing the query first if needed
    pub async fn load(&mut self) -> SearchResult<&QueryResult> {
        let result = match self.result.take() {
            Some(result) => result,
            None => self.execute().await?,
        };
        let result: &QueryResult = self.result.insert(result);
        Ok(result)
    }

    /// Total number of matching documents
    pub async fn count(&mut self) -> SearchResult<u64> {
        Ok(self.load().await?.total_count)
    }

    /// Facets in profile order; empty when aggregations are off
    pub async fn facets(&mut self) -> SearchResult<&[Facet]> {
        Ok(self.load().await?.facets.as_slice())
    }

    pub async fn hits(&mut self) -> SearchResult<&[Hit]> {
        Ok(self.load().await?.hits.as_slice())
    }

    /// Identifiers of this page's hits in result order
    pub async fn ids(&mut self) -> SearchResult<Vec<String>> {
        Ok(self.load().await?.ids())
    }

    /// Sum of the byte sizes of all matching documents, if the schema
    /// supports it and aggregations are on
    pub async fn total_byte_size(&mut self) -> SearchResult<Option<u64>> {
        Ok(self.load().await?.total_byte_size)
    }

    /// Resolve this page's hits into entities, in hit order. Hits the finder
    /// cannot resolve are logged and reported in [`ResolvedPage::dropped`].
    pub async fn to_array<F>(&mut self, finder: &F) -> SearchResult<ResolvedPage<F::Entity>>
    where
        F: EntityFinder + ?Sized,
    {
        let label = self.label();
        let (hits, total_count, unidentified) = {
            let result = self.load().await?;
            (result.hits.clone(), result.total_count, result.unidentified)
        };
        if unidentified > 0 {
            debug!(entity = label, count = unidentified, "Search hits without identifier; dropping");
            SEARCH_HITS_DROPPED_TOTAL
                .with_label_values(&[label])
                .inc_by(unidentified as f64);
        }

        let mut entities = Vec::with_capacity(hits.len());
        let mut dropped = Vec::new();
        for hit in &hits {
            match finder.find_hit(hit).await? {
                Some(entity) => entities.push(entity),
                None => {
                    debug!(entity = label, id = %hit.id, "Search hit has no stored entity; dropping");
                    SEARCH_HITS_DROPPED_TOTAL.with_label_values(&[label]).inc();
                    dropped.push(hit.id.clone());
                }
            }
        }

        Ok(ResolvedPage {
            entities,
            dropped,
            unidentified,
            total_count,
        })
    }
}
