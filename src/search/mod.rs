//! Search query builders over the repository's search engine indexes
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │   SimpleSearch / AdvancedSearch / Federated     │
//! ├─────────────────────────────────────────────────┤
//! │   ItemRelation  CollectionRelation  Entity...   │
//! │        (Relation<S: Scope> + EntitySchema)      │
//! ├─────────────────────────────────────────────────┤
//! │   dsl (typed query document)  access  facets    │
//! ├─────────────────────────────────────────────────┤
//! │   SearchTransport  ◄──  SearchClient (reqwest)  │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use kumquat_search::config::Config;
//! use kumquat_search::search::{MetadataProfile, SearchService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load()?;
//!     let profile = MetadataProfile::new("default").with_facet("Subject", "sys_k_subject");
//!     let service = SearchService::from_config(&config)?.with_profile(profile);
//!
//!     let mut items = service.items();
//!     items
//!         .query_all("river maps")
//!         .facet_filters(vec!["sys_k_subject:Cartography"])
//!         .limit(20);
//!
//!     println!("{} items", items.count().await?);
//!     for facet in items.facets().await? {
//!         println!("{}: {} terms", facet.name, facet.terms.len());
//!     }
//!     Ok(())
//! }
//! ```

mod access;
mod client;
mod composite;
mod dsl;
mod error;
mod facet;
mod profile;
mod relation;
mod schema;
mod scope;
mod service;

pub use access::{AccessContext, AccessResolver, HostGroup, HostGroupResolver};
pub use client::{ReindexMode, ReindexOutcome, SearchClient, SearchTransport};
pub use composite::{
    AdvancedSearch, FederatedResults, FederatedSearch, MergeStrategy, SearchPage, SimpleSearch,
};
pub use dsl::{
    Aggregation, BoolQuery, Clause, Operator, RangeBounds, SearchRequest, SortDirection,
    SortField,
};
pub use error::{SearchError, SearchResult};
pub use facet::{Facet, FacetTerm};
pub use profile::{FacetField, MetadataProfile};
pub use relation::{
    sanitize_query, EntityFinder, FacetFilters, FilterValue, Hit, OrderBy, Ordering, QueryResult,
    QueryState, Relation, ResolvedPage, Scope, TextQuery, DEFAULT_BUCKET_LIMIT, DEFAULT_LIMIT,
    DEFAULT_MAX_RESULT_WINDOW, TOTAL_BYTE_SIZE_AGGREGATION,
};
pub use schema::{
    AccessFields, EntitySchema, EntityType, CLASS_FIELD, REPOSITORY_ID_FIELD, SEARCH_ALL_FIELD,
};
pub use scope::{
    CollectionRelation, CollectionScope, EntityRelation, EntityScope, ItemRelation, ItemScope,
    ModifiedBounds,
};
pub use service::SearchService;
