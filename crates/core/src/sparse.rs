use crate::models::SparseVector;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub const DEFAULT_K1: f32 = 1.5;
pub const DEFAULT_B: f32 = 0.75;

/// Corpus statistics fixed by a `fit` pass: lexicographically assigned term
/// ids, per-term IDF, and the corpus mean document length. Serializable so
/// it can be persisted next to the collection it was fitted on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorpusVocabulary {
    term_ids: BTreeMap<String, u32>,
    idf: HashMap<String, f32>,
    avg_len: f32,
}

impl CorpusVocabulary {
    pub fn len(&self) -> usize {
        self.term_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.term_ids.is_empty()
    }
}

/// Where the encoder takes its vocabulary and IDF from.
///
/// `BatchLocal` recomputes both over every `encode` call, which matches how
/// the index was originally populated: document chunks are encoded together
/// and get meaningful corpus statistics, while a single query text encoded
/// alone gets degenerate ones (df equals 1 for every term). `Fitted` pins
/// the statistics from a prior `fit` so queries and corpus share one
/// vocabulary; terms unknown to the vocabulary are dropped.
#[derive(Debug, Clone, Default)]
pub enum VocabularyMode {
    #[default]
    BatchLocal,
    Fitted(CorpusVocabulary),
}

/// BM25 term-weight encoder producing sparse vectors.
#[derive(Debug, Clone)]
pub struct Bm25Encoder {
    k1: f32,
    b: f32,
    vocabulary: VocabularyMode,
}

impl Default for Bm25Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Bm25Encoder {
    pub fn new() -> Self {
        Self::with_params(DEFAULT_K1, DEFAULT_B)
    }

    pub fn with_params(k1: f32, b: f32) -> Self {
        Self {
            k1,
            b,
            vocabulary: VocabularyMode::BatchLocal,
        }
    }

    pub fn with_vocabulary(vocabulary: CorpusVocabulary) -> Self {
        Self {
            k1: DEFAULT_K1,
            b: DEFAULT_B,
            vocabulary: VocabularyMode::Fitted(vocabulary),
        }
    }

    /// Compute corpus statistics over `texts` without encoding them, for
    /// later use via [`VocabularyMode::Fitted`].
    pub fn fit(&self, texts: &[String]) -> CorpusVocabulary {
        let tokenized: Vec<Vec<String>> = texts.iter().map(|text| tokenize(text)).collect();
        build_vocabulary(&tokenized)
    }

    /// Encode one sparse vector per input text, positionally paired.
    /// `encode(&[])` returns an empty vector.
    pub fn encode(&self, texts: &[String]) -> Vec<SparseVector> {
        let tokenized: Vec<Vec<String>> = texts.iter().map(|text| tokenize(text)).collect();

        let batch_vocabulary;
        let vocabulary = match &self.vocabulary {
            VocabularyMode::BatchLocal => {
                batch_vocabulary = build_vocabulary(&tokenized);
                &batch_vocabulary
            }
            VocabularyMode::Fitted(fitted) => fitted,
        };

        tokenized
            .iter()
            .map(|tokens| self.score_document(tokens, vocabulary))
            .collect()
    }

    fn score_document(&self, tokens: &[String], vocabulary: &CorpusVocabulary) -> SparseVector {
        let doc_len = tokens.len() as f32;
        let avg_len = vocabulary.avg_len;

        let mut term_freq: BTreeMap<&str, f32> = BTreeMap::new();
        for token in tokens {
            *term_freq.entry(token.as_str()).or_insert(0.0) += 1.0;
        }

        let mut indices = Vec::with_capacity(term_freq.len());
        let mut values = Vec::with_capacity(term_freq.len());

        // BTreeMap iteration is lexicographic, so indices come out ascending
        // under the lexicographic id assignment.
        for (term, freq) in term_freq {
            let Some(&term_id) = vocabulary.term_ids.get(term) else {
                continue;
            };
            let Some(&idf) = vocabulary.idf.get(term) else {
                continue;
            };

            let weight = idf * (freq * (self.k1 + 1.0))
                / (freq + self.k1 * (1.0 - self.b + self.b * doc_len / avg_len));
            indices.push(term_id);
            values.push(weight);
        }

        SparseVector { indices, values }
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn build_vocabulary(tokenized: &[Vec<String>]) -> CorpusVocabulary {
    let num_docs = tokenized.len();

    let total_tokens: usize = tokenized.iter().map(Vec::len).sum();
    let avg_len = if num_docs == 0 {
        1.0
    } else {
        total_tokens as f32 / num_docs as f32
    };
    // A batch of empty texts would otherwise zero the normalizer.
    let avg_len = if avg_len > 0.0 { avg_len } else { 1.0 };

    let mut document_frequency: BTreeMap<&str, usize> = BTreeMap::new();
    for tokens in tokenized {
        let distinct: BTreeSet<&str> = tokens.iter().map(String::as_str).collect();
        for term in distinct {
            *document_frequency.entry(term).or_insert(0) += 1;
        }
    }

    let mut term_ids = BTreeMap::new();
    let mut idf = HashMap::with_capacity(document_frequency.len());
    for (next_id, (term, &df)) in document_frequency.iter().enumerate() {
        term_ids.insert((*term).to_string(), next_id as u32);
        let ratio = (num_docs as f32 - df as f32 + 0.5) / (df as f32 + 0.5) + 1.0;
        idf.insert((*term).to_string(), ratio.ln());
    }

    CorpusVocabulary {
        term_ids,
        idf,
        avg_len,
    }
}
