//! Metadata profiles drive facet aggregation and default ordering

use serde::{Deserialize, Serialize};

/// A facetable element of a metadata profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetField {
    /// Display name of the facet
    pub label: String,
    /// Indexed keyword field the facet aggregates over
    pub field: String,
}

impl FacetField {
    pub fn new(label: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            field: field.into(),
        }
    }
}

/// The parts of a metadata profile the search layer needs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataProfile {
    pub name: String,
    /// Facetable fields, in the order facets are presented
    #[serde(default)]
    pub facet_fields: Vec<FacetField>,
    /// Field to sort by when the caller does not choose an order
    #[serde(default)]
    pub default_sort_field: Option<String>,
}

impl MetadataProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_facet(mut self, label: impl Into<String>, field: impl Into<String>) -> Self {
        self.facet_fields.push(FacetField::new(label, field));
        self
    }

    pub fn with_default_sort(mut self, field: impl Into<String>) -> Self {
        self.default_sort_field = Some(field.into());
        self
    }

    pub fn facet_field(&self, field: &str) -> Option<&FacetField> {
        self.facet_fields.iter().find(|f| f.field == field)
    }
}
