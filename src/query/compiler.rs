//! Compiles a [`Query`] into a tree the scorer can walk directly: term
//! specs fully resolved, options merged down from root to leaf.

use std::rc::Rc;

use crate::config::{CombineWith, FuzzyValue, SearchOptions};
use crate::query::tree::{Query, QueryTree, TermSpec};
use crate::tokenize::{DefaultTermProcessor, DefaultTokenizer, TermOutput, TermProcessor, Tokenizer};

pub enum CompiledNode<ExtId> {
    Terms { specs: Vec<TermSpec>, options: SearchOptions<ExtId> },
    Wildcard { options: SearchOptions<ExtId> },
    Combine { combine_with: CombineWith, children: Vec<CompiledNode<ExtId>> },
}

pub fn compile_query<ExtId>(query: &Query<ExtId>, inherited: &SearchOptions<ExtId>) -> CompiledNode<ExtId> {
    match query {
        Query::Wildcard => CompiledNode::Wildcard { options: inherited.clone() },
        Query::Text(text) => CompiledNode::Terms {
            specs: derive_term_specs(text, inherited),
            options: inherited.clone(),
        },
        Query::Tree(tree) => compile_tree(tree, inherited),
    }
}

fn compile_tree<ExtId>(tree: &QueryTree<ExtId>, inherited: &SearchOptions<ExtId>) -> CompiledNode<ExtId> {
    let effective = inherited.merge(&tree.options);
    let children = tree.queries.iter().map(|q| compile_query(q, &effective)).collect();
    CompiledNode::Combine { combine_with: tree.combine_with, children }
}

/// Tokenizes once with the search-time tokenizer (no field name in scope),
/// runs each token through the search-time term processor, and resolves
/// each resulting term's `prefix`/`fuzzy` flags.
fn derive_term_specs<ExtId>(text: &str, options: &SearchOptions<ExtId>) -> Vec<TermSpec> {
    let tokenizer = options
        .tokenize
        .clone()
        .unwrap_or_else(|| Rc::new(DefaultTokenizer) as Rc<dyn Tokenizer>);
    let processor = options
        .process_term
        .clone()
        .unwrap_or_else(|| Rc::new(DefaultTermProcessor) as Rc<dyn TermProcessor>);

    let raw_tokens = tokenizer.tokenize(text, None);
    let mut all_terms = Vec::new();
    for token in &raw_tokens {
        match processor.process(token, None) {
            TermOutput::Drop => {}
            TermOutput::One(t) => all_terms.push(t),
            TermOutput::Many(ts) => all_terms.extend(ts),
        }
    }

    let prefix_setting = options.prefix();
    let fuzzy_setting = options.fuzzy();
    let max_fuzzy = options.max_fuzzy();

    all_terms
        .iter()
        .enumerate()
        .map(|(index, term)| {
            let prefix = prefix_setting.resolve(term, index, &all_terms);
            let fuzzy_distance = match fuzzy_setting.resolve(term, index, &all_terms) {
                FuzzyValue::Bool(false) => None,
                FuzzyValue::Bool(true) => Some(effective_fuzzy_distance(term, 0.2, max_fuzzy)),
                FuzzyValue::Number(n) if n <= 0.0 => None,
                FuzzyValue::Number(n) if n < 1.0 => Some(effective_fuzzy_distance(term, n, max_fuzzy)),
                FuzzyValue::Number(n) => Some(n),
            };
            TermSpec { term: term.clone(), prefix, fuzzy_distance }
        })
        .collect()
}

/// Converts a fractional fuzzy setting into an absolute max edit distance:
/// `min(max_fuzzy, round(len(term) * fraction))`.
fn effective_fuzzy_distance(term: &str, fraction: f64, max_fuzzy: f64) -> f64 {
    let scaled = (term.chars().count() as f64 * fraction).round();
    scaled.min(max_fuzzy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_term_has_no_fuzzy_by_default() {
        let options: SearchOptions<u64> = SearchOptions::default();
        let specs = derive_term_specs("vita", &options);
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].term, "vita");
        assert!(!specs[0].prefix);
        assert_eq!(specs[0].fuzzy_distance, None);
    }

    #[test]
    fn fuzzy_bool_true_uses_default_fraction() {
        let mut options: SearchOptions<u64> = SearchOptions::default();
        options.fuzzy = Some(crate::config::FuzzySetting::Bool(true));
        let specs = derive_term_specs("gente", &options);
        // round(5 * 0.2) = 1
        assert_eq!(specs[0].fuzzy_distance, Some(1.0));
    }

    #[test]
    fn term_processor_expansion_produces_multiple_specs() {
        struct SplitProcessor;
        impl TermProcessor for SplitProcessor {
            fn process(&self, term: &str, _field: Option<&str>) -> TermOutput {
                if term == "foobar" {
                    TermOutput::Many(vec!["foo".to_string(), "bar".to_string()])
                } else {
                    TermOutput::One(term.to_string())
                }
            }
        }
        let mut options: SearchOptions<u64> = SearchOptions::default();
        options.process_term = Some(Rc::new(SplitProcessor));
        let specs = derive_term_specs("foobar", &options);
        let terms: Vec<_> = specs.into_iter().map(|s| s.term).collect();
        assert_eq!(terms, vec!["foo".to_string(), "bar".to_string()]);
    }
}
