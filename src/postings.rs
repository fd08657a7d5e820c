//! Inverted index: term → field → document → frequency.

use std::collections::HashMap;

use crate::ids::{FieldId, ShortId};
use crate::radix::{FuzzyMatch, RadixMap};

/// `field-id → (short-id → term-frequency)` for one term. The inner map is
/// the hottest allocation in the scoring path, so it uses `ahash` instead
/// of the default hasher.
pub type TermPostings = HashMap<FieldId, crate::ids::FastMap<ShortId, u32>>;

/// `term → TermPostings`, backed by the compressed prefix tree.
#[derive(Default)]
pub struct Postings {
    tree: RadixMap<TermPostings>,
}

impl Postings {
    pub fn new() -> Self {
        Postings { tree: RadixMap::new() }
    }

    pub fn get(&self, term: &str) -> Option<&TermPostings> {
        self.tree.get(term)
    }

    pub fn get_mut(&mut self, term: &str) -> Option<&mut TermPostings> {
        self.tree.get_mut(term)
    }

    /// Increments `(term, field, doc)` by one, creating submaps as needed.
    pub fn bump(&mut self, term: &str, field: FieldId, doc: ShortId) {
        let term_postings = self.tree.get_or_insert_with(term, HashMap::new);
        let field_postings = term_postings.entry(field).or_default();
        *field_postings.entry(doc).or_insert(0) += 1;
    }

    /// Decrements `(term, field, doc)` by one, pruning empty submaps and the
    /// term itself eagerly. Returns `false` if the entry did not exist (the
    /// `version_conflict` case callers must warn about).
    pub fn decrement(&mut self, term: &str, field: FieldId, doc: ShortId) -> bool {
        let Some(term_postings) = self.tree.get_mut(term) else { return false };
        let Some(field_postings) = term_postings.get_mut(&field) else { return false };
        let Some(freq) = field_postings.get_mut(&doc) else { return false };

        if *freq <= 1 {
            field_postings.remove(&doc);
        } else {
            *freq -= 1;
        }
        let field_empty = field_postings.is_empty();
        if field_empty {
            term_postings.remove(&field);
        }
        if term_postings.is_empty() {
            self.tree.remove(term);
        }
        true
    }

    /// Sets `(term, field, doc)` to an absolute frequency, creating submaps
    /// as needed. Used only when rebuilding postings from a serialized
    /// index, where frequencies are already known rather than accumulated
    /// one occurrence at a time.
    pub fn set(&mut self, term: &str, field: FieldId, doc: ShortId, frequency: u32) {
        let term_postings = self.tree.get_or_insert_with(term, HashMap::new);
        let field_postings = term_postings.entry(field).or_default();
        field_postings.insert(doc, frequency);
    }

    /// Vacuum sweep over one term: removes every entry referencing a
    /// short id for which `is_live` returns false,
    /// pruning empty field and term submaps, and returns the number of
    /// (field, short_id) entries removed.
    pub fn scrub_stale(&mut self, term: &str, is_live: impl Fn(ShortId) -> bool) -> u64 {
        let mut removed = 0u64;
        let mut empty_fields = Vec::new();

        if let Some(term_postings) = self.tree.get_mut(term) {
            for (&field, docmap) in term_postings.iter_mut() {
                let stale: Vec<ShortId> =
                    docmap.keys().copied().filter(|&id| !is_live(id)).collect();
                for id in stale {
                    docmap.remove(&id);
                    removed += 1;
                }
                if docmap.is_empty() {
                    empty_fields.push(field);
                }
            }
            for field in empty_fields {
                term_postings.remove(&field);
            }
            if term_postings.is_empty() {
                self.tree.remove(term);
            }
        }

        removed
    }

    /// Opportunistic scrub: removes every entry referencing a
    /// short id for which `is_live` returns false, pruning empty field
    /// submaps and the term itself, and returns the remaining live entries
    /// as `(field, doc, term_frequency)` tuples.
    pub fn take_live_entries(
        &mut self,
        term: &str,
        is_live: impl Fn(ShortId) -> bool,
    ) -> Vec<(FieldId, ShortId, u32)> {
        let mut live = Vec::new();
        let mut empty_fields = Vec::new();

        if let Some(term_postings) = self.tree.get_mut(term) {
            for (&field, docmap) in term_postings.iter_mut() {
                let stale: Vec<ShortId> =
                    docmap.keys().copied().filter(|&id| !is_live(id)).collect();
                for id in stale {
                    docmap.remove(&id);
                }
                for (&doc, &tf) in docmap.iter() {
                    live.push((field, doc, tf));
                }
                if docmap.is_empty() {
                    empty_fields.push(field);
                }
            }
            for field in empty_fields {
                term_postings.remove(&field);
            }
            let term_now_empty = term_postings.is_empty();
            if term_now_empty {
                self.tree.remove(term);
            }
        }

        live
    }

    pub fn prefix(&self, prefix: &str) -> crate::radix::Prefix<'_, TermPostings> {
        self.tree.prefix(prefix)
    }

    pub fn fuzzy(&self, term: &str, max_distance: usize) -> Vec<FuzzyMatch<'_, TermPostings>> {
        self.tree.fuzzy(term, max_distance)
    }

    /// Removes the (short_id) entry for `field` under `term`, pruning empty
    /// submaps upward. Used by the scorer's opportunistic scrub when it
    /// finds a reference to a discarded short id.
    pub fn remove_doc(&mut self, term: &str, field: FieldId, doc: ShortId) {
        if let Some(term_postings) = self.tree.get_mut(term) {
            if let Some(field_postings) = term_postings.get_mut(&field) {
                field_postings.remove(&doc);
                if field_postings.is_empty() {
                    term_postings.remove(&field);
                }
            }
            if term_postings.is_empty() {
                self.tree.remove(term);
            }
        }
    }

    /// Every `(term, TermPostings)` pair, for the vacuum walk and for
    /// serialization.
    pub fn iter(&self) -> impl Iterator<Item = (String, &TermPostings)> {
        self.tree.iter()
    }

    pub fn iter_mut_terms(&self) -> Vec<String> {
        self.tree.keys().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bump_then_decrement_prunes_empty_entries() {
        let mut p = Postings::new();
        p.bump("vita", 0, 1);
        p.bump("vita", 0, 1);
        assert_eq!(p.get("vita").unwrap()[&0][&1], 2);
        assert!(p.decrement("vita", 0, 1));
        assert_eq!(p.get("vita").unwrap()[&0][&1], 1);
        assert!(p.decrement("vita", 0, 1));
        assert!(p.get("vita").is_none());
    }

    #[test]
    fn decrement_missing_entry_reports_failure() {
        let mut p = Postings::new();
        assert!(!p.decrement("missing", 0, 1));
    }

    #[test]
    fn remove_doc_prunes_empty_field_and_term() {
        let mut p = Postings::new();
        p.bump("vita", 0, 1);
        p.remove_doc("vita", 0, 1);
        assert!(p.get("vita").is_none());
    }
}
