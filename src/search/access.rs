//! Authorization context and the query clauses it produces
//!
//! Entities carry an allow-list and a deny-list of host groups (and roles).
//! An empty allow-list means the entity is unrestricted; a match on the
//! deny-list always wins over a match on the allow-list.

use crate::search::dsl::{BoolQuery, Clause};
use crate::search::error::{SearchError, SearchResult};
use crate::search::schema::AccessFields;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Who is asking, and how much of the index they may see
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessContext {
    pub host_groups: BTreeSet<String>,
    pub roles: BTreeSet<String>,
    pub include_restricted: bool,
    pub include_unpublished: bool,
    pub include_publicly_inaccessible: bool,
    pub bypass_authorization: bool,
}

impl AccessContext {
    /// Context for administrative queries that must see everything
    pub fn administrative() -> Self {
        Self {
            include_restricted: true,
            include_unpublished: true,
            include_publicly_inaccessible: true,
            bypass_authorization: true,
            ..Default::default()
        }
    }

    /// Build a context for a request coming from `host` and, optionally, a
    /// signed-in `user`
    pub fn for_requester(
        resolver: &dyn AccessResolver,
        host: Option<&str>,
        user: Option<&str>,
    ) -> Self {
        Self {
            host_groups: host.map(|h| resolver.host_groups(h)).unwrap_or_default(),
            roles: user.map(|u| resolver.roles(u)).unwrap_or_default(),
            ..Default::default()
        }
    }

    /// Add this context's clauses to `query`
    pub(crate) fn apply(&self, fields: &AccessFields, query: &mut BoolQuery) {
        let flags = [
            (fields.published, self.include_unpublished, true),
            (fields.restricted, self.include_restricted, false),
            (
                fields.publicly_accessible,
                self.include_publicly_inaccessible,
                true,
            ),
        ];
        for (field, include_all, required) in flags {
            let Some(field) = field else { continue };
            if include_all {
                continue;
            }
            if fields.lenient {
                query.must_not.push(Clause::term(field, !required));
            } else {
                query.filter.push(Clause::term(field, required));
            }
        }

        if self.bypass_authorization {
            return;
        }

        let mut grants = BoolQuery::new();
        if let (Some(field), false) = (fields.allowed_host_groups, self.host_groups.is_empty()) {
            grants.should.push(Clause::terms(field, self.host_groups.iter().cloned()));
        }
        if let (Some(field), false) = (fields.allowed_roles, self.roles.is_empty()) {
            grants.should.push(Clause::terms(field, self.roles.iter().cloned()));
        }
        if let Some(field) = fields.allowed_host_group_count {
            grants.should.push(Clause::term(field, 0));
            if fields.lenient {
                grants
                    .should
                    .push(BoolQuery::new().must_not(Clause::exists(field)).into());
            }
        }
        if !grants.should.is_empty() {
            query.filter.push(grants.minimum_should_match(1).into());
        }

        if let (Some(field), false) = (fields.denied_host_groups, self.host_groups.is_empty()) {
            query
                .must_not
                .push(Clause::terms(field, self.host_groups.iter().cloned()));
        }
        if let (Some(field), false) = (fields.denied_roles, self.roles.is_empty()) {
            query.must_not.push(Clause::terms(field, self.roles.iter().cloned()));
        }
    }
}

/// Resolves requesters into access keys
pub trait AccessResolver: Send + Sync {
    /// Host groups the given hostname or IP address belongs to
    fn host_groups(&self, host: &str) -> BTreeSet<String>;

    /// Roles held by the given user
    fn roles(&self, user: &str) -> BTreeSet<String>;
}

/// A named set of hostname / address patterns. `*` matches any run of
/// characters, so `*.library.example.edu` and `192.168.*` both work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostGroup {
    pub key: String,
    pub patterns: Vec<String>,
}

/// [`AccessResolver`] backed by a static list of host groups and user roles
#[derive(Debug, Clone, Default)]
pub struct HostGroupResolver {
    groups: Vec<(String, Vec<Regex>)>,
    user_roles: HashMap<String, BTreeSet<String>>,
}

impl HostGroupResolver {
    pub fn new(groups: &[HostGroup]) -> SearchResult<Self> {
        let groups = groups
            .iter()
            .map(|group| {
                let patterns = group
                    .patterns
                    .iter()
                    .map(|p| wildcard_regex(p))
                    .collect::<SearchResult<Vec<_>>>()?;
                Ok((group.key.clone(), patterns))
            })
            .collect::<SearchResult<Vec<_>>>()?;

        Ok(Self {
            groups,
            user_roles: HashMap::new(),
        })
    }

    pub fn with_user_roles<I, S>(mut self, user: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.user_roles
            .insert(user.into(), roles.into_iter().map(Into::into).collect());
        self
    }
}

impl AccessResolver for HostGroupResolver {
    fn host_groups(&self, host: &str) -> BTreeSet<String> {
        let host = host.trim().to_lowercase();
        self.groups
            .iter()
            .filter(|(_, patterns)| patterns.iter().any(|re| re.is_match(&host)))
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn roles(&self, user: &str) -> BTreeSet<String> {
        self.user_roles.get(user).cloned().unwrap_or_default()
    }
}

fn wildcard_regex(pattern: &str) -> SearchResult<Regex> {
    let escaped: Vec<String> = pattern
        .trim()
        .to_lowercase()
        .split('*')
        .map(regex::escape)
        .collect();
    let source = format!("^{}$", escaped.join(".*"));
    Regex::new(&source).map_err(|e| {
        SearchError::Configuration(format!("invalid host group pattern '{}': {}", pattern, e))
    })
}
