//! Per-entity field tables
//!
//! Every indexed entity type stores the same concepts (identifier, class tag,
//! publication flags, access-control keys...) under its own field names. An
//! [`EntitySchema`] is the lookup table a builder consults instead of
//! hard-coding field names.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Indexed entity types
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum EntityType {
    Collection,
    Item,
    Agent,
}

impl EntityType {
    /// Value of the class tag field for documents of this type
    pub fn class_name(&self) -> &'static str {
        match self {
            EntityType::Collection => "Collection",
            EntityType::Item => "Item",
            EntityType::Agent => "Agent",
        }
    }

    pub fn from_class_name(name: &str) -> Option<Self> {
        name.parse().ok()
    }
}

/// Class tag field, shared by every index
pub const CLASS_FIELD: &str = "sys_k_class";
/// Repository identifier field, shared by every index
pub const REPOSITORY_ID_FIELD: &str = "sys_k_repository_id";
/// Catch-all text field populated from every searchable field
pub const SEARCH_ALL_FIELD: &str = "search_all";

/// Field names of the access-control concepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessFields {
    pub published: Option<&'static str>,
    pub restricted: Option<&'static str>,
    pub publicly_accessible: Option<&'static str>,
    pub allowed_host_groups: Option<&'static str>,
    pub denied_host_groups: Option<&'static str>,
    pub allowed_host_group_count: Option<&'static str>,
    pub allowed_roles: Option<&'static str>,
    pub denied_roles: Option<&'static str>,
    /// Documents of some classes in the index carry none of these fields
    /// (agents). When set, a missing field never disqualifies a document.
    pub lenient: bool,
}

impl AccessFields {
    const fn none() -> Self {
        Self {
            published: None,
            restricted: None,
            publicly_accessible: None,
            allowed_host_groups: None,
            denied_host_groups: None,
            allowed_host_group_count: None,
            allowed_roles: None,
            denied_roles: None,
            lenient: true,
        }
    }

    const fn standard(lenient: bool) -> Self {
        Self {
            published: Some("sys_b_published"),
            restricted: Some("sys_b_restricted"),
            publicly_accessible: Some("sys_b_publicly_accessible"),
            allowed_host_groups: Some("sys_k_effective_allowed_host_groups"),
            denied_host_groups: Some("sys_k_effective_denied_host_groups"),
            allowed_host_group_count: Some("sys_i_effective_allowed_host_group_count"),
            allowed_roles: Some("sys_k_effective_allowed_roles"),
            denied_roles: Some("sys_k_effective_denied_roles"),
            lenient,
        }
    }
}

/// Field-name table for one searchable entity type, or for a federation of
/// several types searched through one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    /// Entity types whose documents this schema searches
    pub types: Vec<EntityType>,
    pub class_field: &'static str,
    pub id_field: &'static str,
    pub search_all_field: &'static str,
    pub title_field: &'static str,
    /// Parent entity reference fields (one per type that can nest)
    pub parent_fields: Vec<&'static str>,
    pub collection_field: Option<&'static str>,
    pub item_set_field: Option<&'static str>,
    pub variant_field: Option<&'static str>,
    pub described_field: Option<&'static str>,
    pub last_modified_field: &'static str,
    pub total_byte_size_field: Option<&'static str>,
    pub access: AccessFields,
}

impl EntitySchema {
    pub fn item() -> Self {
        Self {
            types: vec![EntityType::Item],
            class_field: CLASS_FIELD,
            id_field: REPOSITORY_ID_FIELD,
            search_all_field: SEARCH_ALL_FIELD,
            title_field: "sys_k_title",
            parent_fields: vec!["sys_k_parent_id"],
            collection_field: Some("sys_k_collection"),
            item_set_field: Some("sys_k_item_sets"),
            variant_field: Some("sys_k_variant"),
            described_field: Some("sys_b_described"),
            last_modified_field: "sys_d_last_modified",
            total_byte_size_field: Some("sys_l_total_byte_size"),
            access: AccessFields::standard(false),
        }
    }

    pub fn collection() -> Self {
        Self {
            types: vec![EntityType::Collection],
            class_field: CLASS_FIELD,
            id_field: REPOSITORY_ID_FIELD,
            search_all_field: SEARCH_ALL_FIELD,
            title_field: "sys_k_title",
            parent_fields: vec!["sys_k_parent_collection_id"],
            collection_field: None,
            item_set_field: None,
            variant_field: None,
            described_field: None,
            last_modified_field: "sys_d_last_modified",
            total_byte_size_field: None,
            access: AccessFields::standard(false),
        }
    }

    pub fn agent() -> Self {
        Self {
            types: vec![EntityType::Agent],
            class_field: CLASS_FIELD,
            id_field: REPOSITORY_ID_FIELD,
            search_all_field: SEARCH_ALL_FIELD,
            title_field: "sys_k_name",
            parent_fields: Vec::new(),
            collection_field: None,
            item_set_field: None,
            variant_field: None,
            described_field: None,
            last_modified_field: "sys_d_last_modified",
            total_byte_size_field: None,
            access: AccessFields::none(),
        }
    }

    /// Schema for searching items, collections and agents together. Only the
    /// fields the types share are usable; access fields are lenient because
    /// agent documents carry none.
    pub fn entity() -> Self {
        Self {
            types: vec![EntityType::Collection, EntityType::Item, EntityType::Agent],
            class_field: CLASS_FIELD,
            id_field: REPOSITORY_ID_FIELD,
            search_all_field: SEARCH_ALL_FIELD,
            title_field: "sys_k_title",
            parent_fields: vec!["sys_k_parent_id", "sys_k_parent_collection_id"],
            collection_field: Some("sys_k_collection"),
            item_set_field: None,
            variant_field: Some("sys_k_variant"),
            described_field: None,
            last_modified_field: "sys_d_last_modified",
            total_byte_size_field: None,
            access: AccessFields::standard(true),
        }
    }

    pub fn for_type(entity_type: EntityType) -> Self {
        match entity_type {
            EntityType::Item => Self::item(),
            EntityType::Collection => Self::collection(),
            EntityType::Agent => Self::agent(),
        }
    }

    pub fn class_names(&self) -> Vec<&'static str> {
        self.types.iter().map(EntityType::class_name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_entity_type_round_trips_class_name() {
        for entity_type in EntityType::iter() {
            assert_eq!(
                EntityType::from_class_name(entity_type.class_name()),
                Some(entity_type)
            );
        }
        assert_eq!(EntityType::from_class_name("item"), Some(EntityType::Item));
        assert_eq!(EntityType::from_class_name("Vocabulary"), None);
    }

    #[test]
    fn test_parent_fields_differ_per_entity() {
        assert_eq!(EntitySchema::item().parent_fields, vec!["sys_k_parent_id"]);
        assert_eq!(
            EntitySchema::collection().parent_fields,
            vec!["sys_k_parent_collection_id"]
        );
        assert!(EntitySchema::agent().parent_fields.is_empty());
    }

    #[test]
    fn test_only_items_carry_byte_size() {
        assert!(EntitySchema::item().total_byte_size_field.is_some());
        assert!(EntitySchema::collection().total_byte_size_field.is_none());
        assert!(EntitySchema::entity().total_byte_size_field.is_none());
    }

    #[test]
    fn test_entity_schema_is_lenient() {
        assert!(EntitySchema::entity().access.lenient);
        assert!(!EntitySchema::item().access.lenient);
        assert_eq!(
            EntitySchema::entity().class_names(),
            vec!["Collection", "Item", "Agent"]
        );
    }
}
