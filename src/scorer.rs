//! BM25+ scoring, prefix/fuzzy reweighting, Boolean combination, and final
//! ranking.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::rc::Rc;

use crate::config::{CombineWith, SearchOptions};
use crate::ids::{FieldId, ShortId};
use crate::postings::Postings;
use crate::query::{compile_query, CompiledNode};
use crate::query::tree::{Query, TermSpec};
use crate::registry::Registry;
use crate::value::FieldValue;

/// One final, caller-facing hit.
#[derive(Debug, Clone)]
pub struct SearchResult<ExtId> {
    pub id: ExtId,
    pub score: f64,
    /// Source (query) terms that contributed to this result.
    pub terms: Vec<String>,
    /// Derived terms actually matched, across all matched fields, in the
    /// order they were first found (query order, not the arbitrary order
    /// of `matches`'s `HashMap` keys).
    pub derived_terms: Vec<String>,
    pub matches: HashMap<String, HashSet<String>>,
    pub fields: HashMap<String, FieldValue>,
}

/// One grouped auto-suggest hit.
#[derive(Debug, Clone)]
pub struct Suggestion {
    pub suggestion: String,
    pub terms: Vec<String>,
    pub score: f64,
    pub count: usize,
}

/// Per-document accumulator before final ranking.
#[derive(Default, Clone)]
struct DocResult {
    score: f64,
    source_terms: Vec<String>,
    /// Derived terms actually matched, in the order they were first
    /// recorded — `match_fields` is a `HashMap` and so cannot itself supply
    /// a stable order.
    derived_terms: Vec<String>,
    match_fields: HashMap<String, HashSet<String>>,
}

/// An order-preserving accumulation of [`DocResult`]s: plain `HashMap`
/// iteration order is not stable, but the final ranking's "ties broken by
/// insertion order" rule needs one, so insertion order is tracked alongside
/// the map.
#[derive(Default)]
struct ResultMap {
    entries: HashMap<ShortId, DocResult>,
    order: Vec<ShortId>,
}

impl ResultMap {
    fn new() -> Self {
        ResultMap::default()
    }

    fn accumulate(&mut self, doc: ShortId, score: f64, source_term: &str, derived_term: &str, field_name: &str) {
        if !self.entries.contains_key(&doc) {
            self.order.push(doc);
        }
        let entry = self.entries.entry(doc).or_default();
        entry.score += score;
        if !entry.source_terms.iter().any(|t| t == source_term) {
            entry.source_terms.push(source_term.to_string());
        }
        if !entry.derived_terms.iter().any(|t| t == derived_term) {
            entry.derived_terms.push(derived_term.to_string());
        }
        entry.match_fields.entry(derived_term.to_string()).or_default().insert(field_name.to_string());
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

fn combine(op: CombineWith, mut left: ResultMap, right: ResultMap) -> ResultMap {
    match op {
        CombineWith::Or => {
            for &doc in &right.order {
                let r = &right.entries[&doc];
                if let Some(l) = left.entries.get_mut(&doc) {
                    l.score += r.score;
                    for t in &r.source_terms {
                        if !l.source_terms.contains(t) {
                            l.source_terms.push(t.clone());
                        }
                    }
                    for t in &r.derived_terms {
                        if !l.derived_terms.contains(t) {
                            l.derived_terms.push(t.clone());
                        }
                    }
                    for (term, fields) in &r.match_fields {
                        l.match_fields.entry(term.clone()).or_default().extend(fields.iter().cloned());
                    }
                } else {
                    left.order.push(doc);
                    left.entries.insert(doc, r.clone());
                }
            }
            left
        }
        CombineWith::And => {
            let mut out = ResultMap::new();
            for &doc in &left.order {
                if let Some(r) = right.entries.get(&doc) {
                    let l = &left.entries[&doc];
                    let mut merged = l.clone();
                    merged.score += r.score;
                    for t in &r.source_terms {
                        if !merged.source_terms.contains(t) {
                            merged.source_terms.push(t.clone());
                        }
                    }
                    for t in &r.derived_terms {
                        if !merged.derived_terms.contains(t) {
                            merged.derived_terms.push(t.clone());
                        }
                    }
                    for (term, fields) in &r.match_fields {
                        merged.match_fields.entry(term.clone()).or_default().extend(fields.iter().cloned());
                    }
                    out.order.push(doc);
                    out.entries.insert(doc, merged);
                }
            }
            out
        }
        CombineWith::AndNot => {
            let mut out = ResultMap::new();
            for &doc in &left.order {
                if !right.entries.contains_key(&doc) {
                    out.order.push(doc);
                    out.entries.insert(doc, left.entries[&doc].clone());
                }
            }
            out
        }
    }
}

fn combine_all(op: CombineWith, maps: Vec<ResultMap>) -> ResultMap {
    let mut iter = maps.into_iter();
    let Some(first) = iter.next() else { return ResultMap::new() };
    iter.fold(first, |acc, next| combine(op, acc, next))
}

fn idf(n: u64, df: u64) -> f64 {
    (1.0 + (n as f64 - df as f64 + 0.5) / (df as f64 + 0.5)).ln()
}

fn tf_component(tf: f64, length: f64, avg_length: f64, k: f64, b: f64) -> f64 {
    (tf * (k + 1.0)) / (tf + k * (1.0 - b + b * length / avg_length))
}

fn bm25_plus(idf: f64, tf_component: f64, d: f64) -> f64 {
    idf * (d + tf_component)
}

struct FieldCatalog<'a> {
    names: &'a [String],
}

impl<'a> FieldCatalog<'a> {
    fn name(&self, id: FieldId) -> &str {
        &self.names[id as usize]
    }

    fn allowed(&self, name: &str, restriction: &Option<Vec<String>>) -> bool {
        restriction.as_ref().map_or(true, |allowed| allowed.iter().any(|f| f == name))
    }
}

#[allow(clippy::too_many_arguments)]
fn score_one<ExtId: Eq + Hash + Clone>(
    result: &mut ResultMap,
    registry: &Registry<ExtId>,
    catalog: &FieldCatalog,
    options: &SearchOptions<ExtId>,
    doc_count: u64,
    field: FieldId,
    doc: ShortId,
    tf: u32,
    df: u64,
    source_term: &str,
    derived_term: &str,
    weight: f64,
) {
    let field_name = catalog.name(field);
    let avg_length = registry.avg_field_length(field);
    if avg_length <= 0.0 {
        return;
    }
    let Some(lengths) = registry.field_length(doc) else { return };
    let length = lengths.get(field as usize).copied().unwrap_or(0) as f64;
    let bm25 = options.bm25();
    let score = bm25_plus(idf(doc_count, df), tf_component(tf as f64, length, avg_length, bm25.k, bm25.b), bm25.d);

    let boost = options.field_boost(field_name);
    let doc_boost = match (&options.boost_document, registry.ext_of(doc), registry.stored_fields(doc)) {
        (Some(f), Some(ext_id), Some(stored)) => f(ext_id, derived_term, stored),
        (Some(f), Some(ext_id), None) => f(ext_id, derived_term, &HashMap::new()),
        _ => 1.0,
    };
    if doc_boost <= 0.0 {
        return;
    }

    result.accumulate(doc, score * boost * doc_boost * weight, source_term, derived_term, field_name);
}

fn execute_term_spec<ExtId: Eq + Hash + Clone>(
    postings: &mut Postings,
    registry: &Registry<ExtId>,
    catalog: &FieldCatalog,
    options: &SearchOptions<ExtId>,
    spec: &TermSpec,
) -> ResultMap {
    let mut result = ResultMap::new();
    let doc_count = registry.doc_count();

    // Step 1: exact match, with opportunistic scrubbing of stale entries.
    let live_entries = postings.take_live_entries(&spec.term, |id| registry.is_live(id));
    let mut df_by_field: HashMap<FieldId, u64> = HashMap::new();
    for &(field, _, _) in &live_entries {
        if catalog.allowed(catalog.name(field), &options.fields) {
            *df_by_field.entry(field).or_insert(0) += 1;
        }
    }
    for (field, doc, tf) in live_entries {
        let field_name = catalog.name(field);
        if !catalog.allowed(field_name, &options.fields) {
            continue;
        }
        let df = df_by_field[&field];
        score_one(&mut result, registry, catalog, options, doc_count, field, doc, tf, df, &spec.term, &spec.term, 1.0);
    }

    let mut prefix_matched: HashSet<String> = HashSet::new();

    // Step 2: prefix expansion.
    if spec.prefix {
        let prefix_weight = options.prefix_weight();
        let view = postings.prefix(&spec.term);
        for (candidate, term_postings) in view.entries() {
            let distance = candidate.chars().count() as i64 - spec.term.chars().count() as i64;
            if distance <= 0 {
                continue;
            }
            prefix_matched.insert(candidate.clone());
            let len = candidate.chars().count() as f64;
            let weight = prefix_weight * len / (len + 0.3 * distance as f64);
            score_matches(
                &mut result, registry, catalog, options, doc_count, term_postings, &spec.term, &candidate, weight,
            );
        }
    }

    // Step 3: fuzzy expansion (prefix matches take precedence, no double count).
    if let Some(fuzzy_distance) = spec.fuzzy_distance {
        let fuzzy_weight = options.fuzzy_weight();
        let max_distance = fuzzy_distance.round().max(0.0) as usize;
        for hit in postings.fuzzy(&spec.term, max_distance) {
            if hit.distance == 0 || prefix_matched.contains(&hit.key) {
                continue;
            }
            let len = hit.key.chars().count() as f64;
            let weight = fuzzy_weight * len / (len + hit.distance as f64);
            score_matches(&mut result, registry, catalog, options, doc_count, hit.value, &spec.term, &hit.key, weight);
        }
    }

    result
}

#[allow(clippy::too_many_arguments)]
fn score_matches<ExtId: Eq + Hash + Clone>(
    result: &mut ResultMap,
    registry: &Registry<ExtId>,
    catalog: &FieldCatalog,
    options: &SearchOptions<ExtId>,
    doc_count: u64,
    term_postings: &crate::postings::TermPostings,
    source_term: &str,
    derived_term: &str,
    weight: f64,
) {
    for (&field, docmap) in term_postings {
        let field_name = catalog.name(field);
        if !catalog.allowed(field_name, &options.fields) {
            continue;
        }
        let df = docmap.keys().filter(|&&id| registry.is_live(id)).count() as u64;
        if df == 0 {
            continue;
        }
        for (&doc, &tf) in docmap {
            if !registry.is_live(doc) {
                continue;
            }
            score_one(result, registry, catalog, options, doc_count, field, doc, tf, df, source_term, derived_term, weight);
        }
    }
}

fn execute_node<ExtId: Eq + Hash + Clone>(
    postings: &mut Postings,
    registry: &Registry<ExtId>,
    catalog: &FieldCatalog,
    node: &CompiledNode<ExtId>,
) -> ResultMap {
    match node {
        CompiledNode::Wildcard { .. } => {
            let mut result = ResultMap::new();
            for (&short_id, _) in registry.all_ext_ids() {
                result.order.push(short_id);
                result.entries.insert(
                    short_id,
                    DocResult { score: 1.0, source_terms: Vec::new(), derived_terms: Vec::new(), match_fields: HashMap::new() },
                );
            }
            result
        }
        CompiledNode::Terms { specs, options } => {
            let per_term: Vec<ResultMap> =
                specs.iter().map(|spec| execute_term_spec(postings, registry, catalog, options, spec)).collect();
            combine_all(options.combine_with(), per_term)
        }
        CompiledNode::Combine { combine_with, children } => {
            let per_child: Vec<ResultMap> =
                children.iter().map(|child| execute_node(postings, registry, catalog, child)).collect();
            combine_all(*combine_with, per_child)
        }
    }
}

fn finalize<ExtId: Eq + Hash + Clone>(
    combined: ResultMap,
    registry: &Registry<ExtId>,
    filter: Option<&Rc<dyn Fn(&SearchResult<ExtId>) -> bool>>,
    skip_sort: bool,
) -> Vec<SearchResult<ExtId>> {
    let mut out = Vec::new();
    for &doc in &combined.order {
        let doc_result = &combined.entries[&doc];
        let Some(ext_id) = registry.ext_of(doc) else { continue };
        let quality = doc_result.source_terms.len().max(1) as f64;
        let fields = registry.stored_fields(doc).cloned().unwrap_or_default();
        let record = SearchResult {
            id: ext_id.clone(),
            score: doc_result.score * quality,
            terms: doc_result.source_terms.clone(),
            derived_terms: doc_result.derived_terms.clone(),
            matches: doc_result.match_fields.clone(),
            fields,
        };
        if let Some(f) = filter {
            if !f(&record) {
                continue;
            }
        }
        out.push(record);
    }

    if !skip_sort {
        out.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    }
    out
}

/// Compiles `query` against the index state, executes it, and returns
/// ranked results.
pub fn search<ExtId: Eq + Hash + Clone>(
    postings: &mut Postings,
    registry: &Registry<ExtId>,
    field_names: &[String],
    query: &Query<ExtId>,
    options: &SearchOptions<ExtId>,
) -> Vec<SearchResult<ExtId>> {
    let catalog = FieldCatalog { names: field_names };
    let node = compile_query(query, options);
    let combined = execute_node(postings, registry, &catalog, &node);
    let skip_sort = matches!(query, Query::Wildcard) && options.boost_document.is_none();
    finalize(combined, registry, options.filter.as_ref(), skip_sort)
}

/// Thin wrapper over `search` that groups results by derived-term tuple.
pub fn auto_suggest<ExtId: Eq + Hash + Clone>(
    postings: &mut Postings,
    registry: &Registry<ExtId>,
    field_names: &[String],
    query_text: &str,
    options: &SearchOptions<ExtId>,
) -> Vec<Suggestion> {
    let results = search(postings, registry, field_names, &Query::text(query_text), options);

    let mut groups: HashMap<String, (Vec<String>, f64, usize)> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for r in &results {
        let key = r.derived_terms.join(" ");
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        let entry = groups.entry(key).or_insert_with(|| (r.derived_terms.clone(), 0.0, 0));
        entry.1 += r.score;
        entry.2 += 1;
    }

    let mut suggestions: Vec<Suggestion> = order
        .into_iter()
        .map(|key| {
            let (terms, sum_score, count) = groups.remove(&key).unwrap();
            Suggestion { suggestion: key, terms, score: sum_score / count as f64, count }
        })
        .collect();
    suggestions.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    suggestions
}
