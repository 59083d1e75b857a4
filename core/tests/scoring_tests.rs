mod common;

use ircore::accumulate::score_query;
use ircore::query::Query;
use ircore::{CorpusStats, Model, ScoringParams};
use std::collections::BTreeMap;

const EPS: f64 = 1e-9;

fn cat_dog_query() -> Query {
    let mut terms = BTreeMap::new();
    terms.insert("cat".to_string(), 1);
    terms.insert("dog".to_string(), 1);
    Query { id: "1".into(), terms }
}

fn corpus() -> CorpusStats {
    CorpusStats { vocabulary: 10.0, avg_doc_length: 5.0, num_docs: 3.0, corpus_length: 15.0 }
}

fn okapi(tf: f64, len: f64) -> f64 {
    tf / (tf + 0.5 + 1.5 * len / 5.0)
}

fn bm25(tf: f64, len: f64) -> f64 {
    // docFreq is 2 for both terms, tfq is 1 so the query component is 1
    (3.5f64 / 2.5).ln() * (tf + 1.2 * tf) / (tf + 1.2 * (0.25 + 0.75 * len / 5.0))
}

fn assert_close(model: &str, doc: &str, got: f64, want: f64) {
    assert!((got - want).abs() < EPS, "{model} {doc}: got {got}, want {want}");
}

#[test]
fn cat_dog_matches_hand_computed_scores() {
    let stats = common::cat_dog_corpus();
    let state = score_query(&stats, &corpus(), &ScoringParams::default(), &cat_dog_query()).unwrap();
    let idf = (3.0f64 / 2.0).ln();

    let d1 = state.get("doc1").unwrap().scores;
    assert_close("okapi", "doc1", d1.okapi_tf, okapi(2.0, 4.0));
    assert_close("tfidf", "doc1", d1.tf_idf, okapi(2.0, 4.0) * idf);
    assert_close("bm25", "doc1", d1.bm25, bm25(2.0, 4.0));
    assert_close("laplace", "doc1", d1.laplace, (3.0f64 / 14.0).ln() + (1.0f64 / 14.0).ln());
    assert_close(
        "jm",
        "doc1",
        d1.jelinek_mercer,
        (0.5 * 2.0 / 4.0 + 0.5 * 3.0 / 15.0f64).ln() + (0.5 * 4.0 / 15.0f64).ln(),
    );

    let d2 = state.get("doc2").unwrap().scores;
    assert_close("okapi", "doc2", d2.okapi_tf, okapi(1.0, 6.0) + okapi(3.0, 6.0));
    assert_close("tfidf", "doc2", d2.tf_idf, (okapi(1.0, 6.0) + okapi(3.0, 6.0)) * idf);
    assert_close("bm25", "doc2", d2.bm25, bm25(1.0, 6.0) + bm25(3.0, 6.0));
    assert_close("laplace", "doc2", d2.laplace, (2.0f64 / 16.0).ln() + (4.0f64 / 16.0).ln());
    assert_close(
        "jm",
        "doc2",
        d2.jelinek_mercer,
        (0.5 / 6.0 + 0.5 * 3.0 / 15.0f64).ln() + (0.5 * 3.0 / 6.0 + 0.5 * 4.0 / 15.0f64).ln(),
    );

    let d3 = state.get("doc3").unwrap().scores;
    assert_close("okapi", "doc3", d3.okapi_tf, 1.0 / 3.0);
    assert_close("tfidf", "doc3", d3.tf_idf, idf / 3.0);
    assert_close("bm25", "doc3", d3.bm25, bm25(1.0, 5.0));
    // one background term for "cat", one observed term for "dog"
    assert_close("laplace", "doc3", d3.laplace, (1.0f64 / 15.0).ln() + (2.0f64 / 15.0).ln());
    assert_close(
        "jm",
        "doc3",
        d3.jelinek_mercer,
        (0.5 / 5.0 + 0.5 * 4.0 / 15.0f64).ln() + (0.5 * 3.0 / 15.0f64).ln(),
    );
}

#[test]
fn custom_params_reach_every_parametrized_model() {
    let stats = common::cat_dog_corpus();
    let params = ScoringParams { k1: 2.0, k2: 10.0, b: 0.5, lambda: 0.2 };
    let mut q = cat_dog_query();
    q.terms.insert("dog".into(), 2);
    let state = score_query(&stats, &corpus(), &params, &q).unwrap();

    let d3 = state.get("doc3").unwrap().scores;
    assert_close(
        "jm",
        "doc3",
        d3.jelinek_mercer,
        (0.2 / 5.0 + 0.8 * 4.0 / 15.0f64).ln() + (0.8 * 3.0 / 15.0f64).ln(),
    );
    // dog in doc3: tfd=1, tfq=2, docFreq=2, len=5
    let doc_term = (1.0 + 2.0) / (1.0 + 2.0 * (0.5 + 0.5 * 5.0 / 5.0));
    let query_term = (2.0 + 10.0 * 2.0) / (2.0 + 10.0);
    assert_close("bm25", "doc3", d3.bm25, (3.5f64 / 2.5).ln() * doc_term * query_term);
    // okapi tf and the laplace model take no tunable constants
    assert_close("okapi", "doc3", d3.okapi_tf, 1.0 / 3.0);
    assert_close("laplace", "doc3", d3.laplace, (1.0f64 / 15.0).ln() + (2.0f64 / 15.0).ln());
}

#[test]
fn every_model_ranks_the_same_documents() {
    let stats = common::cat_dog_corpus();
    let state = score_query(&stats, &corpus(), &ScoringParams::default(), &cat_dog_query()).unwrap();
    let docs = |m: Model| {
        let mut d: Vec<String> = state.scores(m).into_iter().map(|(d, _)| d.to_string()).collect();
        d.sort();
        d
    };
    let reference = docs(Model::OkapiTf);
    assert_eq!(reference, vec!["doc1", "doc2", "doc3"]);
    for m in Model::ALL {
        assert_eq!(docs(m), reference, "{}", m.name());
    }
}

#[test]
fn pure_background_laplace_is_sum_of_backgrounds() {
    // doc4 matches only "bird"; "cat" and "dog" are both absent from it
    let stats = common::cat_dog_corpus().with_document("doc4", 7).with_posting("bird", "doc4", 1);
    let mut q = cat_dog_query();
    q.terms.insert("bird".into(), 1);
    let state = score_query(&stats, &corpus(), &ScoringParams::default(), &q).unwrap();
    let d4 = state.get("doc4").unwrap().scores;
    let background = (1.0f64 / (7.0 + 10.0)).ln();
    assert_close("laplace", "doc4", d4.laplace - (2.0f64 / 17.0).ln(), 2.0 * background);
}

#[test]
fn state_does_not_leak_between_queries() {
    let stats = common::cat_dog_corpus();
    let params = ScoringParams::default();
    let first = score_query(&stats, &corpus(), &params, &cat_dog_query()).unwrap();

    let mut only_dog = BTreeMap::new();
    only_dog.insert("dog".to_string(), 1);
    let dog = Query { id: "2".into(), terms: only_dog };
    let second = score_query(&stats, &corpus(), &params, &dog).unwrap();
    assert!(second.get("doc1").is_none());
    assert_eq!(second.len(), 2);

    let again = score_query(&stats, &corpus(), &params, &cat_dog_query()).unwrap();
    for doc in ["doc1", "doc2", "doc3"] {
        assert_eq!(first.get(doc).unwrap().scores, again.get(doc).unwrap().scores);
    }
}
