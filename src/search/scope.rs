//! Entity-specific query scopes: items, collections, and cross-entity search

use crate::search::dsl::{BoolQuery, Clause, RangeBounds};
use crate::search::relation::{Relation, Scope};
use crate::search::schema::{EntitySchema, EntityType};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

/// Builder over items
pub type ItemRelation = Relation<ItemScope>;
/// Builder over collections
pub type CollectionRelation = Relation<CollectionScope>;
/// Builder over several entity types at once
pub type EntityRelation = Relation<EntityScope>;

/// Inclusive last-modified bounds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifiedBounds {
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
}

impl ModifiedBounds {
    fn apply(&self, field: &str, query: &mut BoolQuery) {
        if self.after.is_none() && self.before.is_none() {
            return;
        }
        let format = |t: &DateTime<Utc>| Value::String(t.to_rfc3339_opts(SecondsFormat::Secs, true));
        query.filter.push(Clause::range(
            field,
            RangeBounds {
                gte: self.after.as_ref().map(format),
                lte: self.before.as_ref().map(format),
                ..Default::default()
            },
        ));
    }
}

fn exclude_nested(schema: &EntitySchema, query: &mut BoolQuery) {
    for field in &schema.parent_fields {
        query.must_not.push(Clause::exists(*field));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemScope {
    pub parent_item: Option<String>,
    pub collection: Option<String>,
    pub item_set: Option<String>,
    /// Return child items alongside top-level ones
    pub include_children_in_results: bool,
    /// Let text queries match child items even though browsing hides them
    pub search_children: bool,
    pub include_variants: Vec<String>,
    pub exclude_variants: Vec<String>,
    pub only_described: bool,
    pub last_modified: ModifiedBounds,
}

impl Scope for ItemScope {
    fn apply(&self, schema: &EntitySchema, has_text_query: bool, query: &mut BoolQuery) {
        let parent_field = schema.parent_fields.first().copied();

        match (&self.parent_item, parent_field) {
            (Some(parent), Some(field)) => query.filter.push(Clause::term(field, parent.as_str())),
            (None, _) => {
                let children_visible = self.include_children_in_results
                    || (self.search_children && has_text_query);
                if !children_visible {
                    exclude_nested(schema, query);
                }
            }
            (Some(_), None) => {}
        }

        if let (Some(collection), Some(field)) = (&self.collection, schema.collection_field) {
            query.filter.push(Clause::term(field, collection.as_str()));
        }
        if let (Some(item_set), Some(field)) = (&self.item_set, schema.item_set_field) {
            query.filter.push(Clause::term(field, item_set.as_str()));
        }

        if let Some(field) = schema.variant_field {
            if !self.include_variants.is_empty() {
                query
                    .filter
                    .push(Clause::terms(field, self.include_variants.iter().cloned()));
            }
            if !self.exclude_variants.is_empty() {
                query
                    .must_not
                    .push(Clause::terms(field, self.exclude_variants.iter().cloned()));
            }
        }

        if let (true, Some(field)) = (self.only_described, schema.described_field) {
            query.filter.push(Clause::term(field, true));
        }

        self.last_modified.apply(schema.last_modified_field, query);
    }
}

impl Relation<ItemScope> {
    /// Only direct children of the given item
    pub fn parent_item(&mut self, id: impl Into<String>) -> &mut Self {
        self.scope_mut().parent_item = Some(id.into());
        self
    }

    pub fn collection(&mut self, id: impl Into<String>) -> &mut Self {
        self.scope_mut().collection = Some(id.into());
        self
    }

    pub fn item_set(&mut self, id: impl Into<String>) -> &mut Self {
        self.scope_mut().item_set = Some(id.into());
        self
    }

    pub fn include_children_in_results(&mut self, include: bool) -> &mut Self {
        self.scope_mut().include_children_in_results = include;
        self
    }

    pub fn search_children(&mut self, search: bool) -> &mut Self {
        self.scope_mut().search_children = search;
        self
    }

    pub fn include_variants<I, V>(&mut self, variants: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.scope_mut().include_variants = variants.into_iter().map(Into::into).collect();
        self
    }

    pub fn exclude_variants<I, V>(&mut self, variants: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.scope_mut().exclude_variants = variants.into_iter().map(Into::into).collect();
        self
    }

    pub fn only_described(&mut self, described: bool) -> &mut Self {
        self.scope_mut().only_described = described;
        self
    }

    pub fn last_modified_after(&mut self, time: DateTime<Utc>) -> &mut Self {
        self.scope_mut().last_modified.after = Some(time);
        self
    }

    pub fn last_modified_before(&mut self, time: DateTime<Utc>) -> &mut Self {
        self.scope_mut().last_modified.before = Some(time);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionScope {
    pub parent_collection: Option<String>,
    pub include_children: bool,
    pub last_modified: ModifiedBounds,
}

impl Scope for CollectionScope {
    fn apply(&self, schema: &EntitySchema, _has_text_query: bool, query: &mut BoolQuery) {
        match (&self.parent_collection, schema.parent_fields.first()) {
            (Some(parent), Some(field)) => {
                query.filter.push(Clause::term(*field, parent.as_str()));
            }
            (None, _) if !self.include_children => exclude_nested(schema, query),
            _ => {}
        }
        self.last_modified.apply(schema.last_modified_field, query);
    }
}

impl Relation<CollectionScope> {
    /// Only direct children of the given collection
    pub fn parent_collection(&mut self, id: impl Into<String>) -> &mut Self {
        self.scope_mut().parent_collection = Some(id.into());
        self
    }

    pub fn include_children(&mut self, include: bool) -> &mut Self {
        self.scope_mut().include_children = include;
        self
    }

    pub fn last_modified_after(&mut self, time: DateTime<Utc>) -> &mut Self {
        self.scope_mut().last_modified.after = Some(time);
        self
    }

    pub fn last_modified_before(&mut self, time: DateTime<Utc>) -> &mut Self {
        self.scope_mut().last_modified.before = Some(time);
        self
    }
}

/// Cross-entity scope. Only top-level entities match unless
/// `include_children` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityScope {
    /// Restrict to these types; empty means every type the schema covers
    pub include_types: Vec<EntityType>,
    pub exclude_item_variants: Vec<String>,
    pub include_children: bool,
    pub last_modified: ModifiedBounds,
}

impl Scope for EntityScope {
    fn types(&self, schema: &EntitySchema) -> Vec<EntityType> {
        if self.include_types.is_empty() {
            schema.types.clone()
        } else {
            self.include_types.clone()
        }
    }

    fn apply(&self, schema: &EntitySchema, _has_text_query: bool, query: &mut BoolQuery) {
        if !self.include_children {
            exclude_nested(schema, query);
        }
        if let (false, Some(field)) = (self.exclude_item_variants.is_empty(), schema.variant_field)
        {
            query
                .must_not
                .push(Clause::terms(field, self.exclude_item_variants.iter().cloned()));
        }
        self.last_modified.apply(schema.last_modified_field, query);
    }
}

impl Relation<EntityScope> {
    pub fn include_types<I>(&mut self, types: I) -> &mut Self
    where
        I: IntoIterator<Item = EntityType>,
    {
        let mut types: Vec<EntityType> = types.into_iter().collect();
        types.sort();
        types.dedup();
        self.scope_mut().include_types = types;
        self
    }

    pub fn exclude_item_variants<I, V>(&mut self, variants: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.scope_mut().exclude_item_variants = variants.into_iter().map(Into::into).collect();
        self
    }

    pub fn include_children(&mut self, include: bool) -> &mut Self {
        self.scope_mut().include_children = include;
        self
    }

    pub fn last_modified_after(&mut self, time: DateTime<Utc>) -> &mut Self {
        self.scope_mut().last_modified.after = Some(time);
        self
    }

    pub fn last_modified_before(&mut self, time: DateTime<Utc>) -> &mut Self {
        self.scope_mut().last_modified.before = Some(time);
        self
    }
}
