//! Construction-time and per-call configuration.
//!
//! Every dynamic setting (tokenizer, term processor, boost document, the
//! `prefix`/`fuzzy` per-term predicates) is modeled as a small trait object
//! behind an `Rc`, so a configuration value can be cloned cheaply and shared
//! between the index-wide default and any number of per-call overrides.
//! Effective options for one call are built by merging three layers,
//! right-most wins: built-in defaults, constructor-time `search_options`,
//! then the options object passed to that particular `search`/`auto_suggest`
//! call.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{Result, SearchIndexError};
use crate::logger::{Logger, TracingLogger};
use crate::scorer::SearchResult;
use crate::tokenize::{DefaultTermProcessor, DefaultTokenizer, TermProcessor, Tokenizer};
use crate::value::FieldValue;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BM25Options {
    pub k: f64,
    pub b: f64,
    pub d: f64,
}

impl Default for BM25Options {
    fn default() -> Self {
        BM25Options { k: 1.2, b: 0.7, d: 0.5 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineWith {
    Or,
    And,
    AndNot,
}

impl CombineWith {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "OR" => Ok(CombineWith::Or),
            "AND" => Ok(CombineWith::And),
            "AND_NOT" => Ok(CombineWith::AndNot),
            other => Err(SearchIndexError::InvalidCombinator(other.to_string())),
        }
    }
}

/// Whether to expand a term with its prefix matches: either fixed, or a
/// function of `(term, index_in_query, all_terms)`.
#[derive(Clone)]
pub enum PrefixSetting {
    Bool(bool),
    Fn(Rc<dyn Fn(&str, usize, &[String]) -> bool>),
}

impl PrefixSetting {
    pub fn resolve(&self, term: &str, index: usize, all_terms: &[String]) -> bool {
        match self {
            PrefixSetting::Bool(b) => *b,
            PrefixSetting::Fn(f) => f(term, index, all_terms),
        }
    }

    /// `true` only for the last term of the query (the auto-suggest default).
    pub fn last_term_only() -> Self {
        PrefixSetting::Fn(Rc::new(|_term: &str, index: usize, all_terms: &[String]| {
            index + 1 == all_terms.len()
        }))
    }
}

impl Default for PrefixSetting {
    fn default() -> Self {
        PrefixSetting::Bool(false)
    }
}

/// Resolved per-term fuzzy setting, before the max-distance conversion rule
/// is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FuzzyValue {
    Bool(bool),
    Number(f64),
}

#[derive(Clone)]
pub enum FuzzySetting {
    Bool(bool),
    Number(f64),
    Fn(Rc<dyn Fn(&str, usize, &[String]) -> FuzzyValue>),
}

impl FuzzySetting {
    pub fn resolve(&self, term: &str, index: usize, all_terms: &[String]) -> FuzzyValue {
        match self {
            FuzzySetting::Bool(b) => FuzzyValue::Bool(*b),
            FuzzySetting::Number(n) => FuzzyValue::Number(*n),
            FuzzySetting::Fn(f) => f(term, index, all_terms),
        }
    }
}

impl Default for FuzzySetting {
    fn default() -> Self {
        FuzzySetting::Bool(false)
    }
}

/// Thresholds a vacuum pass must meet before it runs.
/// `None` at the call site means unconditional and dominates any narrowing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VacuumConditions {
    pub min_dirt_count: Option<u64>,
    pub min_dirt_factor: Option<f64>,
}

impl VacuumConditions {
    /// Narrows `self` and `other` to the stricter (higher) threshold on each
    /// axis; a missing threshold on either side leaves that axis unbounded.
    pub fn narrow(self, other: VacuumConditions) -> VacuumConditions {
        VacuumConditions {
            min_dirt_count: max_option(self.min_dirt_count, other.min_dirt_count),
            min_dirt_factor: max_option_f64(self.min_dirt_factor, other.min_dirt_factor),
        }
    }

    pub fn met(&self, dirt_count: u64, dirt_factor: f64) -> bool {
        let count_ok = self.min_dirt_count.map_or(true, |min| dirt_count >= min);
        let factor_ok = self.min_dirt_factor.map_or(true, |min| dirt_factor >= min);
        count_ok && factor_ok
    }
}

fn max_option(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        _ => None,
    }
}

fn max_option_f64(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoVacuumOptions {
    pub batch_size: usize,
    pub batch_wait_ms: u64,
    pub min_dirt_count: u64,
    pub min_dirt_factor: f64,
}

impl Default for AutoVacuumOptions {
    fn default() -> Self {
        AutoVacuumOptions {
            batch_size: 1000,
            batch_wait_ms: 10,
            min_dirt_count: 20,
            min_dirt_factor: 0.1,
        }
    }
}

impl AutoVacuumOptions {
    pub fn as_conditions(&self) -> VacuumConditions {
        VacuumConditions {
            min_dirt_count: Some(self.min_dirt_count),
            min_dirt_factor: Some(self.min_dirt_factor),
        }
    }
}

/// `false` disables auto-vacuum entirely; otherwise it runs with the given
/// (possibly default) thresholds after every `discard`.
#[derive(Clone)]
pub enum AutoVacuumSetting {
    Disabled,
    Enabled(AutoVacuumOptions),
}

impl Default for AutoVacuumSetting {
    fn default() -> Self {
        AutoVacuumSetting::Enabled(AutoVacuumOptions::default())
    }
}

impl AutoVacuumSetting {
    pub fn is_enabled(&self) -> bool {
        matches!(self, AutoVacuumSetting::Enabled(_))
    }

    pub fn options(&self) -> Option<&AutoVacuumOptions> {
        match self {
            AutoVacuumSetting::Enabled(opts) => Some(opts),
            AutoVacuumSetting::Disabled => None,
        }
    }
}

/// Per-call (or constructor-time default) search configuration. Every field
/// is `Option` so that [`SearchOptions::merge`] can implement field-wise,
/// right-most-wins layering; [`SearchOptions::field_boost`] and friends
/// apply their hard defaults at the point of use.
#[derive(Clone)]
pub struct SearchOptions<ExtId> {
    pub fields: Option<Vec<String>>,
    pub filter: Option<Rc<dyn Fn(&SearchResult<ExtId>) -> bool>>,
    pub boost: Option<HashMap<String, f64>>,
    pub fuzzy_weight: Option<f64>,
    pub prefix_weight: Option<f64>,
    pub boost_document: Option<Rc<dyn Fn(&ExtId, &str, &HashMap<String, FieldValue>) -> f64>>,
    pub prefix: Option<PrefixSetting>,
    pub fuzzy: Option<FuzzySetting>,
    pub max_fuzzy: Option<f64>,
    pub combine_with: Option<CombineWith>,
    pub tokenize: Option<Rc<dyn Tokenizer>>,
    pub process_term: Option<Rc<dyn TermProcessor>>,
    pub bm25: Option<BM25Options>,
}

impl<ExtId> Default for SearchOptions<ExtId> {
    fn default() -> Self {
        SearchOptions {
            fields: None,
            filter: None,
            boost: None,
            fuzzy_weight: None,
            prefix_weight: None,
            boost_document: None,
            prefix: None,
            fuzzy: None,
            max_fuzzy: None,
            combine_with: None,
            tokenize: None,
            process_term: None,
            bm25: None,
        }
    }
}

impl<ExtId> SearchOptions<ExtId> {
    /// Layers `over` on top of `self`, `over`'s values winning wherever set.
    pub fn merge(&self, over: &Self) -> Self {
        SearchOptions {
            fields: over.fields.clone().or_else(|| self.fields.clone()),
            filter: over.filter.clone().or_else(|| self.filter.clone()),
            boost: over.boost.clone().or_else(|| self.boost.clone()),
            fuzzy_weight: over.fuzzy_weight.or(self.fuzzy_weight),
            prefix_weight: over.prefix_weight.or(self.prefix_weight),
            boost_document: over.boost_document.clone().or_else(|| self.boost_document.clone()),
            prefix: over.prefix.clone().or_else(|| self.prefix.clone()),
            fuzzy: over.fuzzy.clone().or_else(|| self.fuzzy.clone()),
            max_fuzzy: over.max_fuzzy.or(self.max_fuzzy),
            combine_with: over.combine_with.or(self.combine_with),
            tokenize: over.tokenize.clone().or_else(|| self.tokenize.clone()),
            process_term: over.process_term.clone().or_else(|| self.process_term.clone()),
            bm25: over.bm25.or(self.bm25),
        }
    }

    pub fn field_boost(&self, field: &str) -> f64 {
        self.boost.as_ref().and_then(|m| m.get(field).copied()).unwrap_or(1.0)
    }

    pub fn fuzzy_weight(&self) -> f64 {
        self.fuzzy_weight.unwrap_or(0.45)
    }

    pub fn prefix_weight(&self) -> f64 {
        self.prefix_weight.unwrap_or(0.375)
    }

    pub fn max_fuzzy(&self) -> f64 {
        self.max_fuzzy.unwrap_or(6.0)
    }

    pub fn combine_with(&self) -> CombineWith {
        self.combine_with.unwrap_or(CombineWith::Or)
    }

    pub fn bm25(&self) -> BM25Options {
        self.bm25.unwrap_or_default()
    }

    pub fn prefix(&self) -> PrefixSetting {
        self.prefix.clone().unwrap_or_default()
    }

    pub fn fuzzy(&self) -> FuzzySetting {
        self.fuzzy.clone().unwrap_or_default()
    }
}

/// Default overrides layered under `auto_suggest`: `combine_with = AND`,
/// `prefix` true only for the last query term.
#[derive(Clone)]
pub struct AutoSuggestOptions<ExtId> {
    pub search_options: SearchOptions<ExtId>,
}

impl<ExtId> Default for AutoSuggestOptions<ExtId> {
    fn default() -> Self {
        let mut search_options = SearchOptions::default();
        search_options.combine_with = Some(CombineWith::And);
        search_options.prefix = Some(PrefixSetting::last_term_only());
        AutoSuggestOptions { search_options }
    }
}

/// Construction-time configuration for a [`crate::SearchIndex`].
#[derive(Clone)]
pub struct IndexOptions<ExtId> {
    pub fields: Vec<String>,
    pub id_field: String,
    pub store_fields: Vec<String>,
    pub extract_field: Option<Rc<dyn Fn(&HashMap<String, FieldValue>, &str) -> FieldValue>>,
    pub tokenize: Rc<dyn Tokenizer>,
    pub process_term: Rc<dyn TermProcessor>,
    pub logger: Rc<dyn Logger>,
    pub auto_vacuum: AutoVacuumSetting,
    pub search_options: SearchOptions<ExtId>,
    pub auto_suggest_options: AutoSuggestOptions<ExtId>,
}

impl<ExtId> IndexOptions<ExtId> {
    pub fn new(fields: Vec<String>) -> Self {
        IndexOptions {
            fields,
            id_field: "id".to_string(),
            store_fields: Vec::new(),
            extract_field: None,
            tokenize: Rc::new(DefaultTokenizer),
            process_term: Rc::new(DefaultTermProcessor),
            logger: Rc::new(TracingLogger),
            auto_vacuum: AutoVacuumSetting::default(),
            search_options: SearchOptions::default(),
            auto_suggest_options: AutoSuggestOptions::default(),
        }
    }

    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }

    pub fn with_store_fields(mut self, store_fields: Vec<String>) -> Self {
        self.store_fields = store_fields;
        self
    }

    pub fn with_extract_field(
        mut self,
        f: impl Fn(&HashMap<String, FieldValue>, &str) -> FieldValue + 'static,
    ) -> Self {
        self.extract_field = Some(Rc::new(f));
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: impl Tokenizer + 'static) -> Self {
        self.tokenize = Rc::new(tokenizer);
        self
    }

    pub fn with_term_processor(mut self, processor: impl TermProcessor + 'static) -> Self {
        self.process_term = Rc::new(processor);
        self
    }

    pub fn with_logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Rc::new(logger);
        self
    }

    pub fn with_auto_vacuum(mut self, setting: AutoVacuumSetting) -> Self {
        self.auto_vacuum = setting;
        self
    }

    pub fn with_search_options(mut self, options: SearchOptions<ExtId>) -> Self {
        self.search_options = options;
        self
    }

    pub fn with_auto_suggest_options(mut self, options: AutoSuggestOptions<ExtId>) -> Self {
        self.auto_suggest_options = options;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(SearchIndexError::MissingFieldsOption);
        }
        Ok(())
    }
}

/// Looks up the hard-coded default for one of the named, independently
/// tunable search options (the ones with a fixed fallback baked into
/// [`SearchOptions`]'s accessor methods, rather than ones that depend on
/// the index's own fields or configured callbacks). Mirrors a small
/// introspection surface callers use to ask "what would this option be if
/// I didn't set it" without constructing a whole [`SearchOptions`].
pub fn default_option(name: &str) -> Result<String> {
    match name {
        "fuzzy_weight" => Ok("0.45".to_string()),
        "prefix_weight" => Ok("0.375".to_string()),
        "max_fuzzy" => Ok("6".to_string()),
        "combine_with" => Ok("OR".to_string()),
        "bm25.k" => Ok("1.2".to_string()),
        "bm25.b" => Ok("0.7".to_string()),
        "bm25.d" => Ok("0.5".to_string()),
        other => Err(SearchIndexError::UnknownOption(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_with_parses_case_insensitively() {
        assert_eq!(CombineWith::parse("or").unwrap(), CombineWith::Or);
        assert_eq!(CombineWith::parse("AND_NOT").unwrap(), CombineWith::AndNot);
        assert!(CombineWith::parse("XOR").is_err());
    }

    #[test]
    fn search_options_merge_is_right_most_wins() {
        let base: SearchOptions<u64> = SearchOptions {
            fuzzy_weight: Some(0.1),
            prefix_weight: Some(0.2),
            ..Default::default()
        };
        let over: SearchOptions<u64> =
            SearchOptions { fuzzy_weight: Some(0.9), ..Default::default() };
        let merged = base.merge(&over);
        assert_eq!(merged.fuzzy_weight, Some(0.9));
        assert_eq!(merged.prefix_weight, Some(0.2));
    }

    #[test]
    fn defaults_match_spec() {
        let opts: SearchOptions<u64> = SearchOptions::default();
        assert_eq!(opts.fuzzy_weight(), 0.45);
        assert_eq!(opts.prefix_weight(), 0.375);
        assert_eq!(opts.max_fuzzy(), 6.0);
        assert_eq!(opts.combine_with(), CombineWith::Or);
        let bm25 = opts.bm25();
        assert_eq!((bm25.k, bm25.b, bm25.d), (1.2, 0.7, 0.5));
    }

    #[test]
    fn vacuum_conditions_narrow_to_stricter_threshold() {
        let a = VacuumConditions { min_dirt_count: Some(5), min_dirt_factor: Some(0.1) };
        let b = VacuumConditions { min_dirt_count: Some(20), min_dirt_factor: Some(0.05) };
        let narrowed = a.narrow(b);
        assert_eq!(narrowed.min_dirt_count, Some(20));
        assert_eq!(narrowed.min_dirt_factor, Some(0.1));
    }

    #[test]
    fn unconditional_dominates_when_narrowing() {
        let unconditional = VacuumConditions { min_dirt_count: None, min_dirt_factor: None };
        let strict = VacuumConditions { min_dirt_count: Some(20), min_dirt_factor: Some(0.1) };
        let narrowed = strict.narrow(unconditional);
        assert_eq!(narrowed.min_dirt_count, None);
        assert_eq!(narrowed.min_dirt_factor, None);
    }

    #[test]
    fn default_option_looks_up_known_names_and_rejects_unknown_ones() {
        assert_eq!(default_option("fuzzy_weight").unwrap(), "0.45");
        assert!(matches!(default_option("not_a_real_option"), Err(SearchIndexError::UnknownOption(_))));
    }

    #[test]
    fn index_options_validates_empty_fields() {
        let opts: IndexOptions<u64> = IndexOptions::new(Vec::new());
        assert!(matches!(opts.validate(), Err(SearchIndexError::MissingFieldsOption)));
    }
}
