//! # Índice TF-IDF
//!
//! Vetorização esparsa de `nome + descrição` de cada menção, usada pelo sinal
//! semântico. Unigramas e bigramas, stop words removidas, vocabulário limitado
//! aos `max_features` termos mais frequentes.
//!
//! - **TF**: contagem bruta do termo no documento.
//! - **IDF** (suavizado): `ln((1 + n) / (1 + df)) + 1`.
//! - Vetores normalizados (L2), então o cosseno é só o produto interno.

use std::collections::{BTreeMap, HashMap};

use crate::normalize::{is_stop_word, normalize_text, words};

/// Vetor esparso ordenado por índice de termo.
pub type SparseVector = Vec<(usize, f64)>;

#[derive(Debug, Clone, Default)]
pub struct TfIdfIndex {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    vectors: Vec<SparseVector>,
}

fn terms(text: &str) -> Vec<String> {
    let tokens: Vec<String> = words(&normalize_text(text))
        .into_iter()
        .filter(|t| t.chars().count() > 1 && !is_stop_word(t))
        .collect();
    let bigrams = tokens.windows(2).map(|w| format!("{} {}", w[0], w[1]));
    tokens.iter().cloned().chain(bigrams).collect()
}

impl TfIdfIndex {
    /// Constrói o índice; `vector(i)` corresponde a `texts[i]`.
    pub fn build<S: AsRef<str>>(texts: &[S], max_features: usize) -> Self {
        let docs: Vec<Vec<String>> = texts.iter().map(|t| terms(t.as_ref())).collect();

        let mut totals: HashMap<&str, usize> = HashMap::new();
        for doc in &docs {
            for term in doc {
                *totals.entry(term.as_str()).or_insert(0) += 1;
            }
        }
        let mut ranked: Vec<(&str, usize)> = totals.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(max_features);

        // ordem alfabética no vocabulário final, para índices estáveis
        let mut selected: Vec<&str> = ranked.into_iter().map(|(t, _)| t).collect();
        selected.sort_unstable();
        let vocabulary: HashMap<String, usize> = selected
            .iter()
            .enumerate()
            .map(|(i, t)| (t.to_string(), i))
            .collect();

        let n = docs.len() as f64;
        let mut df = vec![0usize; vocabulary.len()];
        let counts: Vec<BTreeMap<usize, f64>> = docs
            .iter()
            .map(|doc| {
                let mut tf = BTreeMap::new();
                for term in doc {
                    if let Some(&idx) = vocabulary.get(term) {
                        *tf.entry(idx).or_insert(0.0) += 1.0;
                    }
                }
                for idx in tf.keys() {
                    df[*idx] += 1;
                }
                tf
            })
            .collect();

        let idf: Vec<f64> = df
            .iter()
            .map(|&d| ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0)
            .collect();

        let vectors = counts
            .into_iter()
            .map(|tf| {
                let mut vector: SparseVector =
                    tf.into_iter().map(|(idx, count)| (idx, count * idf[idx])).collect();
                let norm = vector.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
                if norm > 0.0 {
                    vector.iter_mut().for_each(|(_, v)| *v /= norm);
                }
                vector
            })
            .collect();

        Self {
            vocabulary,
            idf,
            vectors,
        }
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn vector(&self, doc: usize) -> &[(usize, f64)] {
        self.vectors.get(doc).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.vocabulary.get(term).map(|&i| self.idf[i])
    }

    /// Cosseno entre dois documentos do índice, em [0, 1].
    pub fn similarity(&self, a: usize, b: usize) -> f64 {
        cosine(self.vector(a), self.vector(b))
    }
}

/// Produto interno de dois vetores L2-normalizados (merge de listas ordenadas).
pub fn cosine(a: &[(usize, f64)], b: &[(usize, f64)]) -> f64 {
    let (mut i, mut j, mut dot) = (0, 0, 0.0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                dot += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    dot.clamp(0.0, 1.0)
}
