use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lexitrie::{FieldValue, IndexOptions, Query, RadixMap, SearchIndex};
use rand::prelude::*;

const WORDS: &[&str] = &[
    "alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel", "india", "juliet",
    "kilo", "lima", "mike", "november", "oscar", "papa", "quebec", "romeo", "sierra", "tango",
    "uniform", "victor", "whiskey", "xray", "yankee", "zulu",
];

fn build_index(doc_count: usize) -> SearchIndex<u64> {
    let mut rng = StdRng::seed_from_u64(7);
    let mut index: SearchIndex<u64> =
        SearchIndex::new(IndexOptions::new(vec!["text".to_string()])).unwrap();
    for id in 0..doc_count {
        let body: String = (0..20).map(|_| *WORDS.choose(&mut rng).unwrap()).collect::<Vec<_>>().join(" ");
        let mut doc = HashMap::new();
        doc.insert("id".to_string(), FieldValue::Number(id as f64));
        doc.insert("text".to_string(), FieldValue::String(body));
        index.add(&doc).unwrap();
    }
    index
}

fn build_radix(entries: usize) -> RadixMap<u32> {
    let mut rng = StdRng::seed_from_u64(11);
    let mut map = RadixMap::new();
    for i in 0..entries {
        let word = WORDS.choose(&mut rng).unwrap();
        map.insert(&format!("{word}{i}"), i as u32);
    }
    map
}

fn bench_fuzzy_lookup(c: &mut Criterion) {
    let map = build_radix(5_000);
    c.bench_function("radix_fuzzy_distance_2", |b| {
        b.iter(|| {
            let hits = map.fuzzy(black_box("alfa0"), 2);
            black_box(hits.len())
        })
    });
}

fn bench_search(c: &mut Criterion) {
    let mut index = build_index(2_000);
    c.bench_function("search_exact_term", |b| {
        b.iter(|| {
            let results = index.search(&Query::text("alpha"), None);
            black_box(results.len())
        })
    });
}

criterion_group!(benches, bench_fuzzy_lookup, bench_search);
criterion_main!(benches);
