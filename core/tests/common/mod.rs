use ircore::{CorpusStats, MemoryStats};

/// Three documents, two terms, statistics small enough to check by hand.
///
/// cat: doc1 tf=2 (len 4), doc2 tf=1 (len 6)
/// dog: doc2 tf=3 (len 6), doc3 tf=1 (len 5)
pub fn cat_dog_corpus() -> MemoryStats {
    let corpus = CorpusStats { vocabulary: 10.0, avg_doc_length: 5.0, num_docs: 3.0, corpus_length: 15.0 };
    MemoryStats::new(corpus)
        .with_document("doc1", 4)
        .with_document("doc2", 6)
        .with_document("doc3", 5)
        .with_posting("cat", "doc1", 2)
        .with_posting("cat", "doc2", 1)
        .with_posting("dog", "doc2", 3)
        .with_posting("dog", "doc3", 1)
}
