use blogsearch_core::document::{parse_posts_json, store_array};
use blogsearch_core::tokenizer::tokenize;
use blogsearch_core::{build, search};
use criterion::{criterion_group, criterion_main, Criterion};

const STORE: &str = include_str!("../../data/lunr-store.js");

fn bench_tokenize(c: &mut Criterion) {
    c.bench_function("tokenize_store", |b| b.iter(|| tokenize(STORE)));
}

fn bench_build_and_search(c: &mut Criterion) {
    let posts = parse_posts_json(store_array(STORE).expect("store array")).expect("valid store");
    c.bench_function("build_store", |b| b.iter(|| build(posts.clone())));

    let index = build(posts).index;
    c.bench_function("search_store", |b| b.iter(|| search(&index, "frida native libraries", 10)));
}

criterion_group!(benches, bench_tokenize, bench_build_and_search);
criterion_main!(benches);
