//! Query value types.

use crate::config::{CombineWith, SearchOptions};

/// A query is either a free-form string, a recursive Boolean tree, or the
/// wildcard sentinel — a distinguished variant, never a reserved string; the
/// literal string `"*"` run through `Query::text` is an ordinary term.
pub enum Query<ExtId> {
    Text(String),
    Tree(QueryTree<ExtId>),
    Wildcard,
}

impl<ExtId> Query<ExtId> {
    pub fn text(s: impl Into<String>) -> Self {
        Query::Text(s.into())
    }
}

/// One node of a Boolean query tree. `options` are this node's own overrides,
/// merged over the parent's effective options when the tree is compiled
/// (child wins on every field the child sets).
pub struct QueryTree<ExtId> {
    pub combine_with: CombineWith,
    pub queries: Vec<Query<ExtId>>,
    pub options: SearchOptions<ExtId>,
}

impl<ExtId> QueryTree<ExtId> {
    pub fn new(combine_with: CombineWith, queries: Vec<Query<ExtId>>) -> Self {
        QueryTree { combine_with, queries, options: SearchOptions::default() }
    }
}

/// One term derived from the query, with the per-term prefix/fuzzy flags
/// already resolved.
#[derive(Debug, Clone)]
pub struct TermSpec {
    pub term: String,
    pub prefix: bool,
    /// `None` disables fuzzy expansion for this term.
    pub fuzzy_distance: Option<f64>,
}
