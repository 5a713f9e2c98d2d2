//! Search services composed from one or more builders

use crate::search::access::AccessContext;
use crate::search::error::{SearchError, SearchResult};
use crate::search::facet::Facet;
use crate::search::relation::{FacetFilters, Hit, OrderBy, QueryResult};
use crate::search::schema::EntityType;
use crate::search::scope::{EntityRelation, ItemRelation};
use crate::search::service::SearchService;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tracing::{debug, info};

/// One page of a composite search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub total_count: u64,
    pub hits: Vec<Hit>,
    pub facets: Vec<Facet>,
}

impl From<&QueryResult> for SearchPage {
    fn from(result: &QueryResult) -> Self {
        Self {
            total_count: result.total_count,
            hits: result.hits.clone(),
            facets: result.facets.clone(),
        }
    }
}

/// Free-text search across items, collections and agents in one request
#[derive(Debug, Clone)]
pub struct SimpleSearch {
    service: SearchService,
    text: String,
    types: Vec<EntityType>,
    access: AccessContext,
    facet_filters: FacetFilters,
    start: usize,
    limit: Option<usize>,
}

impl SimpleSearch {
    pub fn new(service: SearchService, text: impl Into<String>) -> Self {
        Self {
            service,
            text: text.into(),
            types: Vec::new(),
            access: AccessContext::default(),
            facet_filters: FacetFilters::default(),
            start: 0,
            limit: None,
        }
    }

    /// Restrict the search to these types
    pub fn with_types(mut self, types: impl IntoIterator<Item = EntityType>) -> Self {
        self.types = types.into_iter().collect();
        self
    }

    pub fn with_access(mut self, access: AccessContext) -> Self {
        self.access = access;
        self
    }

    pub fn with_facet_filters(mut self, filters: impl Into<FacetFilters>) -> Self {
        self.facet_filters = filters.into();
        self
    }

    pub fn with_start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The configured builder, for callers that want to refine it further
    pub fn relation(&self) -> EntityRelation {
        let mut relation = self.service.entities();
        relation
            .query_all(&self.text)
            .access_context(self.access.clone())
            .facet_filters(self.facet_filters.clone())
            .start(self.start);
        if !self.types.is_empty() {
            relation.include_types(self.types.iter().copied());
        }
        if let Some(limit) = self.limit {
            relation.limit(limit);
        }
        relation
    }

    pub async fn execute(&self) -> SearchResult<SearchPage> {
        let mut relation = self.relation();
        let page = SearchPage::from(relation.load().await?);
        debug!(text = %self.text, total = page.total_count, "Simple search finished");
        Ok(page)
    }
}

/// Item search AND-ing several per-field text queries
#[derive(Debug, Clone)]
pub struct AdvancedSearch {
    service: SearchService,
    fields: Vec<(String, String)>,
    collection: Option<String>,
    access: AccessContext,
    order: Option<OrderBy>,
    start: usize,
    limit: Option<usize>,
}

impl AdvancedSearch {
    pub fn new(service: SearchService) -> Self {
        Self {
            service,
            fields: Vec::new(),
            collection: None,
            access: AccessContext::default(),
            order: None,
            start: 0,
            limit: None,
        }
    }

    /// Require `text` to match `field`. Blank text is ignored.
    pub fn with_field(mut self, field: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        if !text.trim().is_empty() {
            self.fields.push((field.into(), text));
        }
        self
    }

    pub fn with_collection(mut self, id: impl Into<String>) -> Self {
        self.collection = Some(id.into());
        self
    }

    pub fn with_access(mut self, access: AccessContext) -> Self {
        self.access = access;
        self
    }

    pub fn with_order(mut self, order: impl Into<OrderBy>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn with_start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The configured builder. Fails when no field query was given.
    pub fn relation(&self) -> SearchResult<ItemRelation> {
        if self.fields.is_empty() {
            return Err(SearchError::InvalidArgument(
                "advanced search needs at least one field query".to_string(),
            ));
        }

        let mut relation = self.service.items();
        for (field, text) in &self.fields {
            relation.where_matches(field.as_str(), text);
        }
        relation
            .access_context(self.access.clone())
            .start(self.start)
            // Field queries target child items too
            .search_children(true);
        if let Some(collection) = &self.collection {
            relation.collection(collection.as_str());
        }
        if let Some(order) = &self.order {
            relation.order(order.clone());
        }
        if let Some(limit) = self.limit {
            relation.limit(limit);
        }
        Ok(relation)
    }

    pub async fn execute(&self) -> SearchResult<SearchPage> {
        let mut relation = self.relation()?;
        let page = SearchPage::from(relation.load().await?);
        debug!(fields = self.fields.len(), total = page.total_count, "Advanced search finished");
        Ok(page)
    }
}

/// How federated sub-search hits are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MergeStrategy {
    /// Type by type: collections, then items, then agents
    #[default]
    Grouped,
    /// All hits by descending score; ties keep grouped order
    Relevance,
}

/// Combined result of a federated search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FederatedResults {
    /// Sum of the sub-search totals
    pub total_count: u64,
    pub hits: Vec<Hit>,
    /// Total per searched type, in search order
    pub counts: Vec<(EntityType, u64)>,
}

impl FederatedResults {
    pub fn count_for(&self, entity_type: EntityType) -> u64 {
        self.counts
            .iter()
            .find(|(t, _)| *t == entity_type)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }
}

/// One text searched against several entity types, one request per type
#[derive(Debug, Clone)]
pub struct FederatedSearch {
    service: SearchService,
    text: String,
    targets: Vec<EntityType>,
    access: AccessContext,
    limit: Option<usize>,
    strategy: MergeStrategy,
}

impl FederatedSearch {
    /// Searches collections and items unless other targets are given
    pub fn new(service: SearchService, text: impl Into<String>) -> Self {
        Self {
            service,
            text: text.into(),
            targets: vec![EntityType::Collection, EntityType::Item],
            access: AccessContext::default(),
            limit: None,
            strategy: MergeStrategy::default(),
        }
    }

    pub fn with_targets(mut self, targets: impl IntoIterator<Item = EntityType>) -> Self {
        let mut targets: Vec<EntityType> = targets.into_iter().collect();
        targets.sort();
        targets.dedup();
        self.targets = targets;
        self
    }

    pub fn with_access(mut self, access: AccessContext) -> Self {
        self.access = access;
        self
    }

    /// Page size of each sub-search
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_merge_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    fn relation_for(&self, entity_type: EntityType) -> EntityRelation {
        let mut relation = self.service.entities_of(entity_type);
        relation
            .query_all(&self.text)
            .access_context(self.access.clone());
        if let Some(limit) = self.limit {
            relation.limit(limit);
        }
        relation
    }

    pub async fn execute(&self) -> SearchResult<FederatedResults> {
        if self.targets.is_empty() {
            return Err(SearchError::InvalidArgument(
                "federated search needs at least one target type".to_string(),
            ));
        }

        let mut total_count = 0;
        let mut hits = Vec::new();
        let mut counts = Vec::with_capacity(self.targets.len());

        for entity_type in &self.targets {
            let mut relation = self.relation_for(*entity_type);
            let result = relation.load().await?;
            debug!(entity = %entity_type, total = result.total_count, "Federated sub-search finished");

            total_count += result.total_count;
            counts.push((*entity_type, result.total_count));
            hits.extend(result.hits.iter().cloned().map(|mut hit| {
                hit.entity_type = hit.entity_type.or(Some(*entity_type));
                hit
            }));
        }

        if self.strategy == MergeStrategy::Relevance {
            hits.sort_by(|a, b| {
                b.score
                    .unwrap_or(0.0)
                    .total_cmp(&a.score.unwrap_or(0.0))
            });
        }

        info!(
            text = %self.text,
            targets = self.targets.len(),
            total = total_count,
            strategy = %self.strategy,
            "Federated search finished"
        );

        Ok(FederatedResults {
            total_count,
            hits,
            counts,
        })
    }
}
