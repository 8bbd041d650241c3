use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::LDAConfig;
use crate::error::{AnalysisError, Result};
use crate::models::TokenRow;

/// Term counts with one row per document. Terms are sorted alphabetically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentTermMatrix {
    pub documents: Vec<String>,
    pub terms: Vec<String>,
    pub counts: Vec<Vec<usize>>, // Documents x Terms
}

impl DocumentTermMatrix {
    /// Casts token rows into a matrix whose documents are the sub-event classes.
    pub fn from_token_rows(rows: &[TokenRow]) -> Result<Self> {
        let mut cells: BTreeMap<String, BTreeMap<&str, usize>> = BTreeMap::new();
        for row in rows {
            *cells
                .entry(row.class.label().to_string())
                .or_default()
                .entry(row.token.as_str())
                .or_insert(0) += 1;
        }
        let triples = cells
            .iter()
            .flat_map(|(doc, terms)| terms.iter().map(move |(term, n)| (doc.as_str(), *term, *n)));
        Self::from_triples(triples)
    }

    pub fn from_triples<'a, I>(triples: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str, usize)>,
    {
        let mut cells: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();
        for (doc, term, n) in triples {
            *cells.entry(doc).or_default().entry(term).or_insert(0) += n;
        }

        let terms: Vec<String> = {
            let mut all: Vec<&str> = cells.values().flat_map(|t| t.keys().copied()).collect();
            all.sort_unstable();
            all.dedup();
            all.into_iter().map(String::from).collect()
        };
        if terms.is_empty() {
            return Err(AnalysisError::Computation("document-term matrix has no terms".to_string()));
        }

        let index: BTreeMap<&str, usize> = terms.iter().enumerate().map(|(i, t)| (t.as_str(), i)).collect();
        let mut documents = Vec::new();
        let mut counts = Vec::new();
        for (doc, doc_terms) in &cells {
            let mut row = vec![0; terms.len()];
            for (term, n) in doc_terms {
                row[index[term]] += n;
            }
            documents.push(doc.to_string());
            counts.push(row);
        }

        Ok(DocumentTermMatrix { documents, terms, counts })
    }

    pub fn num_documents(&self) -> usize {
        self.documents.len()
    }

    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    pub fn total_tokens(&self) -> usize {
        self.counts.iter().flatten().sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeledTopic {
    pub id: usize,
    pub name: String,
    pub words: Vec<(String, f64)>, // Term and its beta in this topic
    pub documents: Vec<usize>,     // Documents whose dominant topic this is
    pub coherence_score: f64,
}

#[derive(Debug, Clone)]
pub struct TopicModel {
    pub topics: Vec<ModeledTopic>,
    pub vocabulary: Vec<String>,
    pub documents: Vec<String>,
    pub word_topic_matrix: Vec<Vec<f64>>, // Terms x Topics (beta)
    pub doc_topic_matrix: Vec<Vec<f64>>,  // Documents x Topics (gamma)
}

impl TopicModel {
    pub fn num_topics(&self) -> usize {
        self.doc_topic_matrix.first().map(|r| r.len()).unwrap_or(0)
    }

    pub fn beta(&self, topic: usize) -> Vec<f64> {
        self.word_topic_matrix.iter().map(|row| row[topic]).collect()
    }

    /// The `n` highest-beta terms of every topic.
    pub fn top_terms(&self, n: usize) -> Vec<Vec<(String, f64)>> {
        (0..self.num_topics())
            .map(|topic| rank_terms(&self.beta(topic), &self.vocabulary, n))
            .collect()
    }
}

/// Terms ordered by weight descending; equal weights keep vocabulary order.
pub(crate) fn rank_terms(weights: &[f64], vocabulary: &[String], n: usize) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = vocabulary.iter().cloned().zip(weights.iter().copied()).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(n);
    ranked
}

/// Display name from the three strongest terms.
pub(crate) fn topic_name(words: &[(String, f64)]) -> String {
    if words.is_empty() {
        return "Topic".to_string();
    }
    words.iter().take(3).map(|(w, _)| w.as_str()).collect::<Vec<_>>().join("-")
}

/// Indices of documents whose largest proportion falls on `topic`.
pub(crate) fn dominant_documents(doc_topic_matrix: &[Vec<f64>], topic: usize) -> Vec<usize> {
    doc_topic_matrix
        .iter()
        .enumerate()
        .filter_map(|(doc_id, probs)| {
            let max_topic = probs
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i)?;
            (max_topic == topic).then_some(doc_id)
        })
        .collect()
}

pub struct SimpleLDA {
    config: LDAConfig,
}

impl SimpleLDA {
    pub fn new(config: LDAConfig) -> Self {
        SimpleLDA { config }
    }

    /// Collapsed Gibbs sampling. Identical input and seed give identical output.
    pub fn fit(&self, dtm: &DocumentTermMatrix) -> Result<TopicModel> {
        let num_topics = self.config.num_topics;
        if num_topics == 0 {
            return Err(AnalysisError::Computation("LDA needs at least one topic".to_string()));
        }
        if dtm.total_tokens() == 0 {
            return Err(AnalysisError::Computation("LDA input has no tokens".to_string()));
        }
        info!(
            documents = dtm.num_documents(),
            terms = dtm.num_terms(),
            topics = num_topics,
            "fitting LDA"
        );

        let (word_topic_matrix, doc_topic_matrix) = self.run_lda(dtm);
        let topics = self.extract_topics(&word_topic_matrix, &dtm.terms, &doc_topic_matrix);

        Ok(TopicModel {
            topics,
            vocabulary: dtm.terms.clone(),
            documents: dtm.documents.clone(),
            word_topic_matrix,
            doc_topic_matrix,
        })
    }

    fn run_lda(&self, dtm: &DocumentTermMatrix) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
        let num_topics = self.config.num_topics;
        let vocab_size = dtm.num_terms();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);

        let mut word_topic_counts = vec![vec![0usize; num_topics]; vocab_size];
        let mut doc_topic_counts = vec![vec![0usize; num_topics]; dtm.num_documents()];
        let mut topic_counts = vec![0usize; num_topics];

        // (document, term, topic) per token occurrence
        let mut assignments: Vec<(usize, usize, usize)> = Vec::with_capacity(dtm.total_tokens());
        for (doc_id, row) in dtm.counts.iter().enumerate() {
            for (word_id, &n) in row.iter().enumerate() {
                for _ in 0..n {
                    let topic = rng.gen_range(0..num_topics);
                    word_topic_counts[word_id][topic] += 1;
                    doc_topic_counts[doc_id][topic] += 1;
                    topic_counts[topic] += 1;
                    assignments.push((doc_id, word_id, topic));
                }
            }
        }

        let beta_sum = vocab_size as f64 * self.config.beta;
        let mut weights = vec![0.0; num_topics];
        for iteration in 0..self.config.iterations {
            for slot in assignments.iter_mut() {
                let (doc_id, word_id, old_topic) = *slot;

                word_topic_counts[word_id][old_topic] -= 1;
                doc_topic_counts[doc_id][old_topic] -= 1;
                topic_counts[old_topic] -= 1;

                let mut total = 0.0;
                for (topic, weight) in weights.iter_mut().enumerate() {
                    let word_prob = (word_topic_counts[word_id][topic] as f64 + self.config.beta)
                        / (topic_counts[topic] as f64 + beta_sum);
                    let doc_prob = doc_topic_counts[doc_id][topic] as f64 + self.config.alpha;
                    total += word_prob * doc_prob;
                    *weight = total;
                }
                let draw = rng.gen::<f64>() * total;
                let new_topic = weights.iter().position(|&w| draw < w).unwrap_or(num_topics - 1);

                word_topic_counts[word_id][new_topic] += 1;
                doc_topic_counts[doc_id][new_topic] += 1;
                topic_counts[new_topic] += 1;
                slot.2 = new_topic;
            }
            if iteration % 50 == 0 {
                debug!(iteration, "gibbs sweep");
            }
        }

        (
            self.normalize_word_topic_matrix(&word_topic_counts, &topic_counts),
            self.normalize_doc_topic_matrix(&doc_topic_counts),
        )
    }

    fn normalize_word_topic_matrix(&self, counts: &[Vec<usize>], topic_counts: &[usize]) -> Vec<Vec<f64>> {
        counts
            .iter()
            .map(|word_counts| {
                word_counts
                    .iter()
                    .enumerate()
                    .map(|(topic, &count)| {
                        (count as f64 + self.config.beta)
                            / (topic_counts[topic] as f64 + counts.len() as f64 * self.config.beta)
                    })
                    .collect()
            })
            .collect()
    }

    fn normalize_doc_topic_matrix(&self, counts: &[Vec<usize>]) -> Vec<Vec<f64>> {
        let k = self.config.num_topics as f64;
        counts
            .iter()
            .map(|doc_counts| {
                let total: usize = doc_counts.iter().sum();
                doc_counts
                    .iter()
                    .map(|&count| (count as f64 + self.config.alpha) / (total as f64 + k * self.config.alpha))
                    .collect()
            })
            .collect()
    }

    fn extract_topics(
        &self,
        word_topic_matrix: &[Vec<f64>],
        vocabulary: &[String],
        doc_topic_matrix: &[Vec<f64>],
    ) -> Vec<ModeledTopic> {
        (0..self.config.num_topics)
            .map(|topic_id| {
                let beta: Vec<f64> = word_topic_matrix.iter().map(|row| row[topic_id]).collect();
                let words = rank_terms(&beta, vocabulary, self.config.top_terms);
                let coherence_score = if words.is_empty() {
                    0.0
                } else {
                    words.iter().map(|(_, p)| p).sum::<f64>() / words.len() as f64
                };
                ModeledTopic {
                    id: topic_id,
                    name: topic_name(&words),
                    documents: dominant_documents(doc_topic_matrix, topic_id),
                    words,
                    coherence_score,
                }
            })
            .collect()
    }
}
