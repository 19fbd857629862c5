use blogsearch_core::document::load_posts;
use blogsearch_core::persist::{deserialize, serialize};
use blogsearch_core::{build, search, Document, IndexBuilder, IndexConfig, RawPost, SearchIndex, Tokenizer};
use proptest::prelude::*;
use std::path::Path;

fn post(title: &str, url: &str) -> RawPost {
    RawPost { title: Some(title.into()), url: Some(url.into()), ..Default::default() }
}

fn store() -> SearchIndex {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../data/lunr-store.js");
    let posts = load_posts(&path).unwrap();
    let out = build(posts);
    assert!(out.warnings.is_empty());
    out.index
}

fn indexed_text(doc: &Document) -> Vec<String> {
    let mut fields = vec![doc.title.clone(), doc.excerpt.clone()];
    fields.extend(doc.categories.iter().cloned());
    fields.extend(doc.tags.iter().cloned());
    fields
}

#[test]
fn site_store_is_searchable() {
    let index = store();
    assert_eq!(index.num_docs(), 2);

    let hits = search(&index, "Frida", 10);
    assert_eq!(hits.len(), 1);
    let doc = index.document(hits[0].doc_id).unwrap();
    assert_eq!(doc.url, "http://0.0.0.0:4000/frida-can-play-in-the-blue-team/");
    assert_eq!(doc.categories, vec!["Exploitation"]);

    let hits = search(&index, "native libraries android", 10);
    assert_eq!(hits[0].doc_id, 0);
}

#[test]
fn title_outranks_excerpt() {
    let index = build(vec![
        RawPost { excerpt: Some("tampering detection".into()), url: Some("/excerpt".into()), ..Default::default() },
        post("Tampering", "/title"),
    ])
    .index;
    let ids: Vec<_> = search(&index, "tampering", 10).iter().map(|h| h.doc_id).collect();
    assert_eq!(ids, vec![1, 0]);
}

#[test]
fn flat_weights_remove_title_bias() {
    let mut config = IndexConfig::default();
    config.weights.title = 1.0;
    let index = IndexBuilder::new(config)
        .unwrap()
        .build(vec![
            RawPost { excerpt: Some("tampering tampering".into()), url: Some("/excerpt".into()), ..Default::default() },
            post("Tampering", "/title"),
        ])
        .index;
    let ids: Vec<_> = search(&index, "tampering", 10).iter().map(|h| h.doc_id).collect();
    assert_eq!(ids, vec![0, 1]);
}

#[test]
fn every_token_has_a_posting() {
    let index = store();
    let tokenizer = Tokenizer::default();
    for doc in index.docs() {
        for text in indexed_text(doc) {
            for term in tokenizer.terms(&text) {
                assert!(
                    index.postings(&term).iter().any(|p| p.doc_id == doc.id),
                    "{term:?} missing for document {}",
                    doc.id
                );
            }
        }
    }
}

#[test]
fn stemmed_index_stems_queries() {
    let mut config = IndexConfig::default();
    config.tokenizer.stem = true;
    let index = IndexBuilder::new(config).unwrap().build(vec![post("Exploiting stack overflows", "/x")]).index;
    assert_eq!(search(&index, "exploit overflow", 10).len(), 1);
}

fn word() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "frida", "android", "native", "tampering", "injection", "bypass", "stack", "buffer", "overflow",
        "defence", "the", "of", "blue", "team", "x",
    ])
    .prop_map(str::to_string)
}

fn text() -> impl Strategy<Value = String> {
    prop::collection::vec(word(), 0..8).prop_map(|w| w.join(" "))
}

fn corpus() -> impl Strategy<Value = Vec<RawPost>> {
    prop::collection::vec(
        (text(), text(), prop::collection::vec(word(), 0..3), prop::option::of(0u8..12)),
        0..12,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .map(|(title, excerpt, tags, url)| RawPost {
                title: Some(title),
                excerpt: Some(excerpt),
                tags: Some(tags),
                url: url.map(|u| format!("/post-{u}")),
                ..Default::default()
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn build_is_deterministic(posts in corpus()) {
        let a = build(posts.clone());
        let b = build(posts);
        prop_assert_eq!(&a.index, &b.index);
        prop_assert_eq!(serialize(&a.index).unwrap(), serialize(&b.index).unwrap());
        prop_assert_eq!(a.warnings, b.warnings);
    }

    #[test]
    fn serialization_round_trips(posts in corpus()) {
        let index = build(posts).index;
        let back = deserialize(&serialize(&index).unwrap()).unwrap();
        prop_assert_eq!(back, index);
    }

    #[test]
    fn results_respect_limit_and_order(posts in corpus(), query in text(), limit in 0usize..6) {
        let index = build(posts).index;
        let hits = search(&index, &query, limit);
        prop_assert!(hits.len() <= limit);
        for pair in hits.windows(2) {
            prop_assert!(
                pair[0].score > pair[1].score
                    || (pair[0].score == pair[1].score && pair[0].doc_id < pair[1].doc_id)
            );
        }
        for hit in &hits {
            prop_assert!(index.document(hit.doc_id).is_some());
        }
    }

    #[test]
    fn hits_contain_a_query_term(posts in corpus(), query in text()) {
        let index = build(posts).index;
        let terms = index.tokenizer().terms(&query);
        for hit in search(&index, &query, 100) {
            prop_assert!(terms.iter().any(|t| index.postings(t).iter().any(|p| p.doc_id == hit.doc_id)));
        }
    }
}
