//! The top-level engine: construction, incremental mutation, search,
//! auto-suggest, and serialization, tying every other module together.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::rc::Rc;

use crate::config::{AutoVacuumSetting, IndexOptions, SearchOptions};
use crate::error::{Result, SearchIndexError};
use crate::ids::{FieldId, ShortId};
use crate::postings::Postings;
use crate::query::tree::Query;
use crate::registry::Registry;
use crate::scorer::{self, SearchResult, Suggestion};
use crate::serialize::{SerializedIndex, TermFrequencyMap, SUPPORTED_VERSIONS};
use crate::tokenize::TermOutput;
use crate::value::{DocumentId, FieldMap, FieldValue};
use crate::vacuum::{self, SharedVacuumFuture, VacuumHost, VacuumParams, VacuumScheduler};

/// Everything the mutation, search, and vacuum paths share, generic over
/// the caller's external id type but otherwise plain data.
struct SharedState<ExtId> {
    postings: Postings,
    registry: Registry<ExtId>,
    dirt_count: u64,
}

impl<ExtId: DocumentId + 'static> VacuumHost for SharedState<ExtId> {
    fn doc_count(&self) -> u64 {
        self.registry.doc_count()
    }

    fn dirt_count(&self) -> u64 {
        self.dirt_count
    }

    fn set_dirt_count(&mut self, value: u64) {
        self.dirt_count = value;
    }

    fn is_live(&self, short_id: ShortId) -> bool {
        self.registry.is_live(short_id)
    }

    fn terms_snapshot(&self) -> Vec<String> {
        self.postings.iter_mut_terms()
    }

    fn scrub_term(&mut self, term: &str) -> u64 {
        let registry = &self.registry;
        self.postings.scrub_stale(term, |id| registry.is_live(id))
    }
}

/// An embeddable, in-memory full-text search index over documents keyed by
/// `ExtId`. `ExtId` is any caller type that can be read out of
/// (and written back to) the id field's extracted [`FieldValue`] — see
/// [`DocumentId`].
pub struct SearchIndex<ExtId: DocumentId + 'static> {
    options: IndexOptions<ExtId>,
    field_names: Vec<String>,
    field_ids: HashMap<String, FieldId>,
    state: Rc<RefCell<SharedState<ExtId>>>,
    scheduler: VacuumScheduler,
}

impl<ExtId: DocumentId + 'static> SearchIndex<ExtId> {
    pub fn new(options: IndexOptions<ExtId>) -> Result<Self> {
        options.validate()?;
        let field_names = options.fields.clone();
        let field_ids: HashMap<String, FieldId> =
            field_names.iter().enumerate().map(|(i, name)| (name.clone(), i as FieldId)).collect();
        let state = Rc::new(RefCell::new(SharedState {
            postings: Postings::new(),
            registry: Registry::new(field_names.len()),
            dirt_count: 0,
        }));
        let scheduler = VacuumScheduler::new(state.clone());
        Ok(SearchIndex { options, field_names, field_ids, state, scheduler })
    }

    fn extract(&self, document: &FieldMap, name: &str) -> FieldValue {
        match &self.options.extract_field {
            Some(f) => f(document, name),
            None => document.get(name).cloned().unwrap_or(FieldValue::Null),
        }
    }

    fn resolve_id(&self, document: &FieldMap) -> Result<(FieldValue, ExtId)> {
        let raw = self.extract(document, &self.options.id_field);
        if raw.is_nullish() {
            return Err(SearchIndexError::MissingIdField(self.options.id_field.clone()));
        }
        let ext_id = ExtId::from_field_value(&raw)
            .ok_or_else(|| SearchIndexError::MissingIdField(self.options.id_field.clone()))?;
        Ok((raw, ext_id))
    }

    /// Runs the tokenizer then the term processor over one field's text,
    /// returning every derived term in order; `add` and `remove` both run
    /// documents through this exact same pipeline.
    fn derive_terms(&self, text: &str, field_name: &str) -> Vec<String> {
        let tokens = self.options.tokenize.tokenize(text, Some(field_name));
        let mut terms = Vec::new();
        for token in &tokens {
            match self.options.process_term.process(token, Some(field_name)) {
                TermOutput::Drop => {}
                TermOutput::One(t) => terms.push(t),
                TermOutput::Many(ts) => terms.extend(ts),
            }
        }
        terms
    }

    /// Indexes `document`, rejecting a duplicate or missing id.
    pub fn add(&mut self, document: &FieldMap) -> Result<()> {
        let (id_value, ext_id) = self.resolve_id(document)?;
        let mut state = self.state.borrow_mut();
        if state.registry.short_of(&ext_id).is_some() {
            return Err(SearchIndexError::DuplicateId(format!("{id_value:?}")));
        }

        let stored: HashMap<String, FieldValue> = self
            .options
            .store_fields
            .iter()
            .map(|name| (name.clone(), self.extract(document, name)))
            .collect();
        let short_id = state.registry.insert(ext_id, stored, self.field_names.len());

        for (field_name, &field_id) in &self.field_ids {
            let value = self.extract(document, field_name);
            if value.is_nullish() {
                continue;
            }
            let text = value.stringify();
            let mut unique_terms: HashSet<String> = HashSet::new();
            for term in self.derive_terms(&text, field_name) {
                state.postings.bump(&term, field_id, short_id);
                unique_terms.insert(term);
            }
            state.registry.record_field_length(short_id, field_id, unique_terms.len() as u32);
        }
        Ok(())
    }

    /// Removes `document`. Tolerates mutation-since-indexing:
    /// a missing posting is warned at `version_conflict`, not an error.
    pub fn remove(&mut self, document: &FieldMap) -> Result<()> {
        let raw = self.extract(document, &self.options.id_field);
        let ext_id = ExtId::from_field_value(&raw)
            .ok_or_else(|| SearchIndexError::UnknownDocument(format!("{raw:?}")))?;
        let mut state = self.state.borrow_mut();
        let short_id = state
            .registry
            .short_of(&ext_id)
            .ok_or_else(|| SearchIndexError::UnknownDocument(format!("{raw:?}")))?;

        for (field_name, &field_id) in &self.field_ids {
            let value = self.extract(document, field_name);
            if value.is_nullish() {
                continue;
            }
            let text = value.stringify();
            for term in self.derive_terms(&text, field_name) {
                if !state.postings.decrement(&term, field_id, short_id) {
                    self.options.logger.log(
                        crate::logger::LogLevel::Warn,
                        &format!(
                            "document {raw:?}: posting for term {term:?} missing in field {field_name:?}"
                        ),
                        Some("version_conflict"),
                    );
                }
            }
        }
        state.registry.remove(short_id);
        Ok(())
    }

    /// Drops registry state for `short_id` (id maps, stored fields, field
    /// lengths, `avg_field_length`) without touching postings — the stale
    /// references are left for vacuum/opportunistic scrubbing, and without
    /// triggering an auto-vacuum pass.
    fn discard_without_vacuum(&mut self, id: &ExtId) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let short_id = state
            .registry
            .short_of(id)
            .ok_or_else(|| SearchIndexError::UnknownDocument("<discard>".to_string()))?;
        state.registry.remove(short_id);
        state.dirt_count += 1;
        Ok(())
    }

    /// Discards `id`: marks its document dead and bumps dirt count,
    /// triggering an auto-vacuum pass if configured to do so.
    pub fn discard(&mut self, id: &ExtId) -> Result<SharedVacuumFuture> {
        self.discard_without_vacuum(id)?;
        Ok(self.scheduler.maybe_auto_vacuum(&self.options.auto_vacuum).unwrap_or_else(vacuum::resolved))
    }

    /// Replaces a document in place: `discard` then `add`, inheriting
    /// discard's failure semantics.
    pub fn replace(&mut self, document: &FieldMap) -> Result<SharedVacuumFuture> {
        let (_, ext_id) = self.resolve_id(document)?;
        let fut = self.discard(&ext_id)?;
        self.add(document)?;
        Ok(fut)
    }

    /// Adds every document in `documents` in order, yielding cooperatively
    /// (a zero-delay `yield_now`) between chunks of `chunk_size` so a
    /// large bulk ingest doesn't monopolize a single-threaded cooperative
    /// runtime. Stops at the first failing `add`, leaving every document
    /// added so far indexed and the remainder untouched.
    pub async fn add_all_async(&mut self, documents: &[FieldMap], chunk_size: usize) -> Result<()> {
        let chunk_size = chunk_size.max(1);
        for chunk in documents.chunks(chunk_size) {
            for document in chunk {
                self.add(document)?;
            }
            tokio::task::yield_now().await;
        }
        Ok(())
    }

    /// `documents = None` resets the index to empty; `Some(docs)` removes
    /// each in order (see DESIGN.md for why there is no separate
    /// `InvalidArgument` case here).
    pub fn remove_all(&mut self, documents: Option<&[FieldMap]>) -> Result<()> {
        match documents {
            Some(docs) => {
                for doc in docs {
                    self.remove(doc)?;
                }
                Ok(())
            }
            None => {
                let mut state = self.state.borrow_mut();
                state.postings = Postings::new();
                state.registry.clear(self.field_names.len());
                state.dirt_count = 0;
                Ok(())
            }
        }
    }

    /// Discards every id in `ids`: suppresses auto-vacuum for the duration
    /// of the loop, restores it afterward (even on error), and always runs
    /// exactly one auto-vacuum pass at the end — including when a discard
    /// failed partway through, so a failure never leaves dirt unvacuumed.
    pub fn discard_all(&mut self, ids: &[ExtId]) -> Result<SharedVacuumFuture> {
        let original = self.options.auto_vacuum.clone();
        self.options.auto_vacuum = AutoVacuumSetting::Disabled;

        let mut failure = None;
        for id in ids {
            if let Err(e) = self.discard_without_vacuum(id) {
                failure = Some(e);
                break;
            }
        }

        self.options.auto_vacuum = original;
        let fut = self.scheduler.maybe_auto_vacuum(&self.options.auto_vacuum).unwrap_or_else(vacuum::resolved);

        if let Some(e) = failure {
            return Err(e);
        }
        Ok(fut)
    }

    /// Runs a vacuum pass directly, so callers can force an unconditional
    /// one regardless of the configured auto-vacuum thresholds.
    pub fn vacuum(&self, conditions: Option<crate::config::VacuumConditions>) -> SharedVacuumFuture {
        let opts = self.options.auto_vacuum.options().cloned().unwrap_or_default();
        let params = VacuumParams { batch_size: opts.batch_size, batch_wait_ms: opts.batch_wait_ms };
        self.scheduler.vacuum(params, conditions)
    }

    pub fn is_vacuuming(&self) -> bool {
        self.scheduler.is_vacuuming()
    }

    pub fn doc_count(&self) -> u64 {
        self.state.borrow().registry.doc_count()
    }

    pub fn dirt_count(&self) -> u64 {
        self.state.borrow().dirt_count
    }

    /// Compiles and executes `query`, returning ranked results. `options`
    /// layers over the index's configured `search_options` default,
    /// right-most wins.
    pub fn search(&mut self, query: &Query<ExtId>, options: Option<&SearchOptions<ExtId>>) -> Vec<SearchResult<ExtId>>
    where
        ExtId: Eq + Hash + Clone,
    {
        let effective = match options {
            Some(o) => self.options.search_options.merge(o),
            None => self.options.search_options.clone(),
        };
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        scorer::search(&mut state.postings, &state.registry, &self.field_names, query, &effective)
    }

    /// Suggests completions for a partial query, grouping hits by the
    /// derived-term tuple they share.
    pub fn auto_suggest(&mut self, query_text: &str, options: Option<&SearchOptions<ExtId>>) -> Vec<Suggestion>
    where
        ExtId: Eq + Hash + Clone,
    {
        let with_suggest_defaults =
            self.options.search_options.merge(&self.options.auto_suggest_options.search_options);
        let effective = match options {
            Some(o) => with_suggest_defaults.merge(o),
            None => with_suggest_defaults,
        };
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        scorer::auto_suggest(&mut state.postings, &state.registry, &self.field_names, query_text, &effective)
    }

    /// Snapshots the index into the portable plain-data shape.
    pub fn to_serializable(&self) -> SerializedIndex {
        let state = self.state.borrow();
        let document_ids = state
            .registry
            .all_ext_ids()
            .map(|(&short_id, ext_id)| (short_id, ext_id.to_field_value()))
            .collect();
        let field_length =
            state.registry.all_field_lengths().map(|(&short_id, lengths)| (short_id, lengths.clone())).collect();
        let stored_fields =
            state.registry.all_stored_fields().map(|(&short_id, fields)| (short_id, fields.clone())).collect();
        let average_field_length =
            (0..self.field_names.len()).map(|f| state.registry.avg_field_length(f as FieldId)).collect();
        let index = state
            .postings
            .iter()
            .map(|(term, term_postings)| {
                let by_field: HashMap<FieldId, TermFrequencyMap> = term_postings
                    .iter()
                    .map(|(&field_id, docmap)| {
                        (field_id, TermFrequencyMap::V2(docmap.iter().map(|(&d, &f)| (d, f)).collect()))
                    })
                    .collect();
                (term, by_field)
            })
            .collect();

        SerializedIndex {
            serialization_version: crate::serialize::CURRENT_VERSION,
            document_count: state.registry.doc_count(),
            next_short_id: state.registry.next_short_id(),
            dirt_count: state.dirt_count,
            document_ids,
            field_ids: self.field_ids.clone(),
            field_length,
            average_field_length,
            stored_fields,
            index,
        }
    }

    /// Rebuilds an index from a previously serialized snapshot. `options`
    /// is required (`None` is [`SearchIndexError::MissingLoadOptions`]); an
    /// unrecognized `serialization_version` is
    /// [`SearchIndexError::IncompatibleIndexVersion`].
    pub fn from_serializable(data: SerializedIndex, options: Option<IndexOptions<ExtId>>) -> Result<Self> {
        let options = options.ok_or(SearchIndexError::MissingLoadOptions)?;
        options.validate()?;
        if !SUPPORTED_VERSIONS.contains(&data.serialization_version) {
            return Err(SearchIndexError::IncompatibleIndexVersion(data.serialization_version));
        }

        let field_names = options.fields.clone();
        let field_ids = data.field_ids.clone();

        let mut ext_of_short = HashMap::new();
        for (&short_id, value) in &data.document_ids {
            let ext_id = ExtId::from_field_value(value)
                .ok_or_else(|| SearchIndexError::InvalidArgument(format!("unrecognized document id {value:?}")))?;
            ext_of_short.insert(short_id, ext_id);
        }

        let mut registry = Registry::new(field_names.len());
        registry.restore_raw_parts(
            ext_of_short,
            data.field_length,
            data.stored_fields,
            data.average_field_length,
            data.next_short_id,
            data.document_count,
        );

        let mut postings = Postings::new();
        for (term, by_field) in data.index {
            for (field_id, freq_map) in by_field {
                for (short_id, frequency) in freq_map.into_inner() {
                    postings.set(&term, field_id, short_id, frequency);
                }
            }
        }

        let state = Rc::new(RefCell::new(SharedState { postings, registry, dirt_count: data.dirt_count }));
        let scheduler = VacuumScheduler::new(state.clone());
        Ok(SearchIndex { options, field_names, field_ids, state, scheduler })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CombineWith;

    fn doc(id: u64, text: &str) -> FieldMap {
        let mut m = HashMap::new();
        m.insert("id".to_string(), FieldValue::Number(id as f64));
        m.insert("text".to_string(), FieldValue::String(text.to_string()));
        m
    }

    fn fresh_index() -> SearchIndex<u64> {
        SearchIndex::new(IndexOptions::new(vec!["text".to_string()])).unwrap()
    }

    #[test]
    fn add_then_search_finds_the_document() {
        let mut index = fresh_index();
        index.add(&doc(1, "Nel mezzo del cammin di nostra vita")).unwrap();
        let results = index.search(&Query::text("vita"), None);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 1);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut index = fresh_index();
        index.add(&doc(1, "a")).unwrap();
        let err = index.add(&doc(1, "b")).unwrap_err();
        assert!(matches!(err, SearchIndexError::DuplicateId(_)));
    }

    #[test]
    fn missing_id_field_is_rejected() {
        let mut index = fresh_index();
        let mut d = HashMap::new();
        d.insert("text".to_string(), FieldValue::String("no id here".to_string()));
        let err = index.add(&d).unwrap_err();
        assert!(matches!(err, SearchIndexError::MissingIdField(_)));
    }

    #[test]
    fn add_then_remove_leaves_no_results() {
        let mut index = fresh_index();
        index.add(&doc(1, "vita nuova")).unwrap();
        index.remove(&doc(1, "vita nuova")).unwrap();
        assert!(index.search(&Query::text("vita"), None).is_empty());
        assert_eq!(index.doc_count(), 0);
    }

    #[test]
    fn remove_unknown_document_is_an_error() {
        let mut index = fresh_index();
        let err = index.remove(&doc(99, "ghost")).unwrap_err();
        assert!(matches!(err, SearchIndexError::UnknownDocument(_)));
    }

    #[test]
    fn discard_then_readd_hides_stale_postings() {
        let mut index = fresh_index();
        index.add(&doc(1, "Some newer stuff")).unwrap();
        let _ = index.discard(&1);
        index.add(&doc(1, "Some newer stuff")).unwrap();
        // "new" only ever existed as a token of the discarded doc's run;
        // searching it after re-add must not resurrect the stale posting.
        assert!(index.search(&Query::text("newer"), None).len() == 1);
    }

    #[test]
    fn wildcard_matches_every_live_document() {
        let mut index = fresh_index();
        index.add(&doc(1, "a")).unwrap();
        index.add(&doc(2, "b")).unwrap();
        let results = index.search(&Query::Wildcard, None);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn remove_all_with_no_documents_resets_everything() {
        let mut index = fresh_index();
        index.add(&doc(1, "a")).unwrap();
        index.add(&doc(2, "b")).unwrap();
        index.remove_all(None).unwrap();
        assert_eq!(index.doc_count(), 0);
        assert!(index.search(&Query::Wildcard, None).is_empty());
    }

    #[test]
    fn serialize_then_deserialize_reproduces_search_results() {
        let mut index = fresh_index();
        index.add(&doc(1, "Nel mezzo del cammin di nostra vita")).unwrap();
        index.add(&doc(2, "vita nuova")).unwrap();

        let snapshot = index.to_serializable();
        let mut reloaded =
            SearchIndex::<u64>::from_serializable(snapshot, Some(IndexOptions::new(vec!["text".to_string()])))
                .unwrap();

        let mut before = index.search(&Query::text("vita"), None);
        let mut after = reloaded.search(&Query::text("vita"), None);
        before.sort_by(|a, b| a.id.cmp(&b.id));
        after.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(before.len(), after.len());
        for (b, a) in before.iter().zip(after.iter()) {
            assert_eq!(b.id, a.id);
            assert!((b.score - a.score).abs() < 1e-9);
        }
    }

    #[test]
    fn from_serializable_without_options_is_an_error() {
        let index = fresh_index();
        let snapshot = index.to_serializable();
        let err = SearchIndex::<u64>::from_serializable(snapshot, None).unwrap_err();
        assert!(matches!(err, SearchIndexError::MissingLoadOptions));
    }

    #[test]
    fn incompatible_version_is_rejected() {
        let index = fresh_index();
        let mut snapshot = index.to_serializable();
        snapshot.serialization_version = 99;
        let err = SearchIndex::<u64>::from_serializable(
            snapshot,
            Some(IndexOptions::new(vec!["text".to_string()])),
        )
        .unwrap_err();
        assert!(matches!(err, SearchIndexError::IncompatibleIndexVersion(99)));
    }

    #[tokio::test]
    async fn add_all_async_indexes_every_document_in_chunks() {
        let mut index = fresh_index();
        let docs: Vec<_> = (1..=5).map(|i| doc(i, "vita nostra")).collect();
        index.add_all_async(&docs, 2).await.unwrap();
        assert_eq!(index.doc_count(), 5);
        assert_eq!(index.search(&Query::text("vita"), None).len(), 5);
    }

    #[tokio::test]
    async fn add_all_async_stops_at_first_duplicate_id() {
        let mut index = fresh_index();
        index.add(&doc(1, "already here")).unwrap();
        let docs = vec![doc(1, "dup"), doc(2, "fine")];
        let err = index.add_all_async(&docs, 10).await.unwrap_err();
        assert!(matches!(err, SearchIndexError::DuplicateId(_)));
        assert_eq!(index.doc_count(), 1);
    }

    #[test]
    fn and_not_combinator_excludes_right_operand_matches() {
        let mut index = fresh_index();
        index.add(&doc(1, "vita nuova")).unwrap();
        index.add(&doc(2, "vita nostra")).unwrap();
        let tree = crate::query::tree::QueryTree::new(
            CombineWith::AndNot,
            vec![Query::text("vita"), Query::text("nostra")],
        );
        let results = index.search(&Query::Tree(tree), None);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 1);
    }
}
