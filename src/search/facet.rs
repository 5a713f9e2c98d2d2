//! Facets computed from aggregation buckets

use serde::{Deserialize, Serialize};

/// A named aggregation dimension with its ranked buckets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facet {
    /// Display name
    pub name: String,
    /// Indexed field the buckets come from
    pub field: String,
    pub terms: Vec<FacetTerm>,
}

impl Facet {
    pub fn new(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            terms: Vec::new(),
        }
    }

    pub fn term(&self, name: &str) -> Option<&FacetTerm> {
        self.terms.iter().find(|t| t.name == name)
    }
}

/// One bucket of a [`Facet`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetTerm {
    pub name: String,
    pub label: String,
    pub count: u64,
    /// Field of the owning facet
    pub field: String,
}

impl FacetTerm {
    /// The `field:name` filter token that selects this term
    pub fn query(&self) -> String {
        format!("{}:{}", self.field, self.name)
    }

    /// Returns `params` with this term's filter token added (once)
    pub fn added_to_params(&self, params: &[String]) -> Vec<String> {
        let token = self.query();
        let mut params = params.to_vec();
        if !params.contains(&token) {
            params.push(token);
        }
        params
    }

    /// Returns `params` without this term's filter token
    pub fn removed_from_params(&self, params: &[String]) -> Vec<String> {
        let token = self.query();
        params.iter().filter(|p| **p != token).cloned().collect()
    }

    /// Whether this term's filter token is currently selected
    pub fn is_selected(&self, params: &[String]) -> bool {
        let token = self.query();
        params.iter().any(|p| *p == token)
    }
}
