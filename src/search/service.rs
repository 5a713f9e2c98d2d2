//! Entry point that hands out configured builders

use crate::config::{Config, IndexNames, SearchDefaults};
use crate::search::client::{SearchClient, SearchTransport};
use crate::search::composite::{AdvancedSearch, FederatedSearch, SimpleSearch};
use crate::search::error::SearchResult;
use crate::search::profile::MetadataProfile;
use crate::search::relation::{Relation, Scope};
use crate::search::schema::{EntitySchema, EntityType};
use crate::search::scope::{CollectionRelation, EntityRelation, ItemRelation};
use std::sync::Arc;
use strum::IntoEnumIterator;
use tracing::info;

/// Creates builders that share one transport, one set of index names and the
/// configured query defaults
#[derive(Clone)]
pub struct SearchService {
    transport: Arc<dyn SearchTransport>,
    indexes: IndexNames,
    defaults: SearchDefaults,
    max_result_window: usize,
    profile: Option<MetadataProfile>,
}

impl SearchService {
    pub fn new(transport: Arc<dyn SearchTransport>, config: &Config) -> Self {
        Self {
            transport,
            indexes: config.engine.indexes.clone(),
            defaults: config.search.clone(),
            max_result_window: config.engine.max_result_window,
            profile: None,
        }
    }

    /// Service talking HTTP to the configured engine
    pub fn from_config(config: &Config) -> SearchResult<Self> {
        let client = SearchClient::new(&config.engine)?;
        info!(endpoint = %client.endpoint(), "Search service configured");
        Ok(Self::new(Arc::new(client), config))
    }

    /// Metadata profile applied to every builder this service creates
    pub fn with_profile(mut self, profile: MetadataProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn transport(&self) -> Arc<dyn SearchTransport> {
        Arc::clone(&self.transport)
    }

    pub fn index_for(&self, entity_type: EntityType) -> &str {
        match entity_type {
            EntityType::Item => &self.indexes.items,
            EntityType::Collection => &self.indexes.collections,
            EntityType::Agent => &self.indexes.agents,
        }
    }

    fn relation<S: Scope>(&self, index: String, schema: EntitySchema) -> Relation<S> {
        let mut relation = Relation::new(self.transport(), index, schema);
        relation
            .limit(self.defaults.default_limit)
            .bucket_limit(self.defaults.bucket_limit)
            .max_result_window(self.max_result_window);
        if let Some(profile) = &self.profile {
            relation.metadata_profile(profile.clone());
        }
        relation
    }

    pub fn items(&self) -> ItemRelation {
        self.relation(self.indexes.items.clone(), EntitySchema::item())
    }

    pub fn collections(&self) -> CollectionRelation {
        self.relation(self.indexes.collections.clone(), EntitySchema::collection())
    }

    /// Builder over collections, items and agents in one request
    pub fn entities(&self) -> EntityRelation {
        let index = EntityType::iter()
            .map(|t| self.index_for(t))
            .collect::<Vec<_>>()
            .join(",");
        self.relation(index, EntitySchema::entity())
    }

    /// Cross-entity builder restricted to one type's index and schema
    pub fn entities_of(&self, entity_type: EntityType) -> EntityRelation {
        self.relation(
            self.index_for(entity_type).to_string(),
            EntitySchema::for_type(entity_type),
        )
    }

    pub fn simple_search(&self, text: impl Into<String>) -> SimpleSearch {
        SimpleSearch::new(self.clone(), text)
    }

    pub fn advanced_search(&self) -> AdvancedSearch {
        AdvancedSearch::new(self.clone())
    }

    pub fn federated_search(&self, text: impl Into<String>) -> FederatedSearch {
        FederatedSearch::new(self.clone(), text)
    }
}

impl std::fmt::Debug for SearchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchService")
            .field("indexes", &self.indexes)
            .field("defaults", &self.defaults)
            .field("max_result_window", &self.max_result_window)
            .finish_non_exhaustive()
    }
}
