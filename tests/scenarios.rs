//! End-to-end scenarios covering add/search, BM25 length normalization,
//! fuzzy/prefix expansion, discard/re-add, auto-vacuum scheduling,
//! serialization round trips, and auto-suggest ordering.

use std::collections::HashMap;

use lexitrie::{
    BM25Options, CombineWith, FieldValue, FuzzySetting, IndexOptions, PrefixSetting, Query, QueryTree,
    SearchIndex, SearchOptions,
};

fn doc(id: u64, text: &str) -> HashMap<String, FieldValue> {
    let mut m = HashMap::new();
    m.insert("id".to_string(), FieldValue::Number(id as f64));
    m.insert("text".to_string(), FieldValue::String(text.to_string()));
    m
}

fn text_index() -> SearchIndex<u64> {
    SearchIndex::new(IndexOptions::new(vec!["text".to_string()])).unwrap()
}

#[test]
fn add_then_search_finds_the_document() {
    let mut index = text_index();
    index.add(&doc(1, "Nel mezzo del cammin di nostra vita")).unwrap();

    let results = index.search(&Query::text("vita"), None);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, 1);
}

/// Shorter fields score a shared term higher under BM25+ length
/// normalization, and overriding `k`/`b`/`d` changes that effect.
#[test]
fn bm25_rewards_shorter_fields_and_responds_to_overrides() {
    let mut index = text_index();
    index.add(&doc(1, "something very very very cool")).unwrap();
    index.add(&doc(2, "something cool")).unwrap();

    let results = index.search(&Query::text("very"), None);
    assert_eq!(results[0].id, 1);

    let default_score = results[0].score;

    let overridden = SearchOptions { bm25: Some(BM25Options { k: 1.0, b: 0.7, d: 0.5 }), ..Default::default() };
    let overridden_results = index.search(&Query::text("very"), Some(&overridden));
    let overridden_score = overridden_results.iter().find(|r| r.id == 1).unwrap().score;

    assert!(overridden_score < default_score);
}

/// Enabling fuzzy and prefix expansion surfaces additional matches
/// without inflating the score of a document that already matched exactly.
#[test]
fn fuzzy_and_prefix_expansion_does_not_double_count_exact_matches() {
    let mut index = text_index();
    index.add(&doc(1, "Poi che la gente poverella crebbe")).unwrap();
    index.add(&doc(2, "Deus, venerunt gentes")).unwrap();

    let exact_only = index.search(&Query::text("gente"), None);
    let exact_score_for_1 = exact_only.iter().find(|r| r.id == 1).unwrap().score;

    let opts = SearchOptions {
        fuzzy: Some(FuzzySetting::Number(0.2)),
        prefix: Some(PrefixSetting::Bool(true)),
        ..Default::default()
    };
    let results = index.search(&Query::text("gente"), Some(&opts));
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, 1);
    assert_eq!(results[1].id, 2);

    let score_for_1 = results.iter().find(|r| r.id == 1).unwrap().score;
    assert!((score_for_1 - exact_score_for_1).abs() < 1e-9);
}

#[test]
fn discard_then_readd_hides_stale_postings() {
    let mut index = text_index();
    index.add(&doc(1, "Some newer stuff")).unwrap();
    let _ = index.discard(&1);
    index.add(&doc(1, "Some newer stuff")).unwrap();

    assert!(index.search(&Query::text("new"), None).is_empty());
    let results = index.search(&Query::text("newer"), None);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, 1);
}

/// `is_vacuuming` flips true only once the configured dirt-count
/// threshold is actually met.
#[test]
fn auto_vacuum_starts_once_dirt_threshold_is_met() {
    use lexitrie::{AutoVacuumOptions, AutoVacuumSetting};

    let options = IndexOptions::new(vec!["text".to_string()]).with_auto_vacuum(AutoVacuumSetting::Enabled(
        AutoVacuumOptions { batch_size: 1, batch_wait_ms: 10, min_dirt_count: 2, min_dirt_factor: 0.0 },
    ));
    let mut index: SearchIndex<u64> = SearchIndex::new(options).unwrap();
    index.add(&doc(1, "a")).unwrap();
    index.add(&doc(2, "b")).unwrap();
    index.add(&doc(3, "c")).unwrap();

    let _ = index.discard(&1);
    assert!(!index.is_vacuuming());

    let _ = index.discard(&2);
    assert!(index.is_vacuuming());
}

#[test]
fn serialized_index_reproduces_search_results_after_reload() {
    let options = IndexOptions::new(vec!["text".to_string()]).with_store_fields(vec!["category".to_string()]);
    let mut index: SearchIndex<u64> = SearchIndex::new(options).unwrap();

    let mut d1 = doc(1, "Nel mezzo del cammin di nostra vita");
    d1.insert("category".to_string(), FieldValue::String("inferno".to_string()));
    let mut d2 = doc(2, "Tanto gentile e tanto onesta pare");
    d2.insert("category".to_string(), FieldValue::String("vita-nova".to_string()));
    let mut d3 = doc(3, "Vita nova e poesia della vita");
    d3.insert("category".to_string(), FieldValue::String("vita-nova".to_string()));

    index.add(&d1).unwrap();
    index.add(&d2).unwrap();
    index.add(&d3).unwrap();

    let snapshot = index.to_serializable();
    let mut reloaded = SearchIndex::<u64>::from_serializable(
        snapshot,
        Some(IndexOptions::new(vec!["text".to_string()]).with_store_fields(vec!["category".to_string()])),
    )
    .unwrap();

    let mut before = index.search(&Query::text("vita"), None);
    let mut after = reloaded.search(&Query::text("vita"), None);
    before.sort_by(|a, b| a.id.cmp(&b.id));
    after.sort_by(|a, b| a.id.cmp(&b.id));

    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(after.iter()) {
        assert_eq!(b.id, a.id);
        assert!((b.score - a.score).abs() < 1e-9);
        assert_eq!(b.matches, a.matches);
        assert_eq!(b.fields, a.fields);
    }
}

#[test]
fn auto_suggest_orders_suggestions_by_score() {
    let mut index = text_index();
    index.add(&doc(1, "Nel mezzo del cammin di nostra vita")).unwrap();
    index.add(&doc(2, "Tanto gentile e tanto onesta pare")).unwrap();
    index.add(&doc(3, "vita nova")).unwrap();

    let suggestions = index.auto_suggest("vita no", None);
    assert!(suggestions.len() >= 2);
    assert_eq!(suggestions[0].suggestion, "vita nova");
    assert_eq!(suggestions[1].suggestion, "vita nostra");
    assert!(suggestions[0].score >= suggestions[1].score);
}

/// AND_NOT with the wildcard operand is set subtraction from every live
/// document.
#[test]
fn wildcard_and_not_is_set_subtraction() {
    let mut index = text_index();
    index.add(&doc(1, "alpha")).unwrap();
    index.add(&doc(2, "beta")).unwrap();
    index.add(&doc(3, "alpha beta")).unwrap();

    let tree = QueryTree::new(CombineWith::AndNot, vec![Query::Wildcard, Query::text("beta")]);
    let mut results = index.search(&Query::Tree(tree), None);
    results.sort_by(|a, b| a.id.cmp(&b.id));
    assert_eq!(results.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1]);
}

/// The literal string `"*"` is an ordinary term, never the wildcard sentinel.
#[test]
fn literal_asterisk_is_an_ordinary_term() {
    let mut index = text_index();
    index.add(&doc(1, "use the * operator")).unwrap();
    index.add(&doc(2, "no special characters here")).unwrap();

    let results = index.search(&Query::text("*"), None);
    assert_eq!(results.len(), 0, "the default tokenizer drops non-alphanumeric runs entirely");
}
