//! Structural topic model without covariates.
//!
//! Initialisation is spectral: topics are anchored on words whose co-occurrence
//! profiles span the profile space, and every other word is expressed as a
//! convex mix of the anchors. An EM pass then refines topic-term weights (beta)
//! and per-document proportions (gamma), with each document's proportions
//! shrunk toward the corpus-wide mean. No step draws random numbers.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::StructuralConfig;
use crate::error::{AnalysisError, Result};
use crate::topic_modeling::{dominant_documents, rank_terms, topic_name, DocumentTermMatrix, ModeledTopic};

const RECOVERY_ITERATIONS: usize = 500;
const EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Serialize)]
pub struct StmFit {
    pub vocabulary: Vec<String>,
    pub documents: Vec<String>,
    pub anchors: Vec<String>,
    pub beta: Vec<Vec<f64>>,  // Topics x Terms
    pub gamma: Vec<Vec<f64>>, // Documents x Topics
    pub iterations: usize,
    pub log_likelihood: f64,
}

impl StmFit {
    pub fn num_topics(&self) -> usize {
        self.beta.len()
    }

    pub fn beta(&self, topic: usize) -> &[f64] {
        &self.beta[topic]
    }

    /// Topic proportions of a document, looked up by its label.
    pub fn gamma(&self, document: &str) -> Option<&[f64]> {
        self.documents
            .iter()
            .position(|d| d == document)
            .map(|i| self.gamma[i].as_slice())
    }

    pub fn top_terms(&self, n: usize) -> Vec<Vec<(String, f64)>> {
        self.beta.iter().map(|b| rank_terms(b, &self.vocabulary, n)).collect()
    }

    pub fn topics(&self, n: usize) -> Vec<ModeledTopic> {
        self.top_terms(n)
            .into_iter()
            .enumerate()
            .map(|(id, words)| ModeledTopic {
                id,
                name: topic_name(&words),
                documents: dominant_documents(&self.gamma, id),
                coherence_score: if words.is_empty() {
                    0.0
                } else {
                    words.iter().map(|(_, p)| p).sum::<f64>() / words.len() as f64
                },
                words,
            })
            .collect()
    }
}

pub struct StructuralTopicModel {
    config: StructuralConfig,
}

impl StructuralTopicModel {
    pub fn new(config: StructuralConfig) -> Self {
        StructuralTopicModel { config }
    }

    pub fn fit(&self, dtm: &DocumentTermMatrix) -> Result<StmFit> {
        let k = self.config.num_topics;
        if k == 0 {
            return Err(AnalysisError::Computation("structural model needs at least one topic".to_string()));
        }
        if dtm.num_terms() < k {
            return Err(AnalysisError::Computation(format!(
                "cannot place {k} anchors in a vocabulary of {} terms",
                dtm.num_terms()
            )));
        }
        info!(documents = dtm.num_documents(), terms = dtm.num_terms(), topics = k, "fitting structural topic model");

        let (anchors, beta) = spectral_init(dtm, k, self.config.spectral_terms)?;
        let (beta, gamma, iterations, log_likelihood) = self.expectation_maximization(dtm, beta);

        Ok(StmFit {
            vocabulary: dtm.terms.clone(),
            documents: dtm.documents.clone(),
            anchors: anchors.iter().map(|&i| dtm.terms[i].clone()).collect(),
            beta,
            gamma,
            iterations,
            log_likelihood,
        })
    }

    fn expectation_maximization(
        &self,
        dtm: &DocumentTermMatrix,
        mut beta: Vec<Vec<f64>>,
    ) -> (Vec<Vec<f64>>, Vec<Vec<f64>>, usize, f64) {
        let k = beta.len();
        let v = dtm.num_terms();
        let prior = self.config.prior_strength * k as f64;
        let mut gamma = vec![vec![1.0 / k as f64; k]; dtm.num_documents()];
        let mut previous = f64::NEG_INFINITY;
        let mut log_likelihood = f64::NEG_INFINITY;
        let mut iterations = 0;

        for iteration in 0..self.config.max_em_iterations {
            iterations = iteration + 1;
            let mean: Vec<f64> = (0..k)
                .map(|t| gamma.iter().map(|g| g[t]).sum::<f64>() / gamma.len().max(1) as f64)
                .collect();

            let mut topic_term = vec![vec![0.0; v]; k];
            let mut next_gamma = Vec::with_capacity(gamma.len());
            log_likelihood = 0.0;

            for (doc, row) in dtm.counts.iter().enumerate() {
                let mut doc_topic = vec![0.0; k];
                let mut length = 0.0;
                for (w, &n) in row.iter().enumerate() {
                    if n == 0 {
                        continue;
                    }
                    let n = n as f64;
                    length += n;
                    let mixture: f64 = (0..k).map(|t| gamma[doc][t] * beta[t][w]).sum();
                    log_likelihood += n * mixture.max(EPSILON).ln();
                    for t in 0..k {
                        let responsibility = gamma[doc][t] * beta[t][w] / mixture.max(EPSILON);
                        doc_topic[t] += n * responsibility;
                        topic_term[t][w] += n * responsibility;
                    }
                }
                next_gamma.push(
                    (0..k)
                        .map(|t| (doc_topic[t] + prior * mean[t]) / (length + prior))
                        .collect(),
                );
            }

            for row in topic_term.iter_mut() {
                let total: f64 = row.iter().sum::<f64>() + v as f64 * EPSILON;
                for value in row.iter_mut() {
                    *value = (*value + EPSILON) / total;
                }
            }
            beta = topic_term;
            gamma = next_gamma;

            let change = ((log_likelihood - previous) / log_likelihood.abs().max(EPSILON)).abs();
            debug!(iteration, log_likelihood, change, "structural EM step");
            if change < self.config.tolerance {
                break;
            }
            previous = log_likelihood;
        }

        (beta, gamma, iterations, log_likelihood)
    }
}

/// Anchor words and initial topic-term weights from the word co-occurrence matrix.
fn spectral_init(dtm: &DocumentTermMatrix, k: usize, spectral_terms: usize) -> Result<(Vec<usize>, Vec<Vec<f64>>)> {
    let v = dtm.num_terms();
    let frequencies: Vec<usize> = (0..v).map(|w| dtm.counts.iter().map(|row| row[w]).sum()).collect();

    // Profile columns are limited to the most frequent terms.
    let mut columns: Vec<usize> = (0..v).collect();
    columns.sort_by(|&a, &b| frequencies[b].cmp(&frequencies[a]).then(a.cmp(&b)));
    columns.truncate(spectral_terms.max(k));

    let weights: Vec<f64> = dtm
        .counts
        .iter()
        .map(|row| {
            let n: usize = row.iter().sum();
            if n >= 2 {
                1.0 / (n as f64 * (n as f64 - 1.0))
            } else {
                0.0
            }
        })
        .collect();

    // Row-normalised co-occurrence profile of every word over the profile columns.
    let mut profiles = vec![vec![0.0; columns.len()]; v];
    let mut row_sums = vec![0.0; v];
    for (doc, row) in dtm.counts.iter().enumerate() {
        let w_d = weights[doc];
        if w_d == 0.0 {
            continue;
        }
        let n_d: usize = row.iter().sum();
        for (i, &x_i) in row.iter().enumerate() {
            if x_i == 0 {
                continue;
            }
            let x_i = x_i as f64;
            row_sums[i] += w_d * x_i * (n_d as f64 - 1.0);
            for (j, &col) in columns.iter().enumerate() {
                let x_j = row[col] as f64;
                let diagonal = if col == i { 1.0 } else { 0.0 };
                profiles[i][j] += w_d * x_i * (x_j - diagonal);
            }
        }
    }
    for (profile, &sum) in profiles.iter_mut().zip(&row_sums) {
        if sum > 0.0 {
            profile.iter_mut().for_each(|p| *p /= sum);
        }
    }
    let total: f64 = row_sums.iter().sum();
    if total <= 0.0 {
        return Err(AnalysisError::Computation(
            "no document has two or more tokens; co-occurrence is empty".to_string(),
        ));
    }

    let anchors = find_anchors(&profiles, &columns, k);
    debug!(?anchors, "anchor words selected");

    let anchor_rows: Vec<&[f64]> = anchors.iter().map(|&a| profiles[a].as_slice()).collect();
    let gram: Vec<Vec<f64>> = anchor_rows
        .iter()
        .map(|a| anchor_rows.iter().map(|b| dot(a, b)).collect())
        .collect();
    let trace: f64 = (0..k).map(|i| gram[i][i]).sum();
    let step = 1.0 / (2.0 * trace).max(EPSILON);

    let mut beta = vec![vec![0.0; v]; k];
    for word in 0..v {
        let mix = if row_sums[word] > 0.0 {
            let target: Vec<f64> = anchor_rows.iter().map(|a| dot(a, &profiles[word])).collect();
            recover_mixture(&gram, &target, step)
        } else {
            vec![1.0 / k as f64; k]
        };
        let word_probability = row_sums[word] / total;
        for t in 0..k {
            beta[t][word] = mix[t] * word_probability;
        }
    }
    for row in beta.iter_mut() {
        let sum: f64 = row.iter().sum();
        if sum > 0.0 {
            row.iter_mut().for_each(|b| *b /= sum);
        } else {
            row.iter_mut().for_each(|b| *b = 1.0 / v as f64);
        }
    }

    Ok((anchors, beta))
}

/// Greedy Gram-Schmidt pivoting over candidate words (those backing a profile column).
fn find_anchors(profiles: &[Vec<f64>], candidates: &[usize], k: usize) -> Vec<usize> {
    let mut residual: Vec<Vec<f64>> = candidates.iter().map(|&c| profiles[c].clone()).collect();
    let mut chosen: Vec<usize> = Vec::with_capacity(k);

    while chosen.len() < k {
        let pick = (0..residual.len())
            .filter(|i| !chosen.contains(i))
            .max_by(|&a, &b| norm_sq(&residual[a]).total_cmp(&norm_sq(&residual[b])).then(b.cmp(&a)));
        let Some(pick) = pick else { break };
        chosen.push(pick);

        let length = norm_sq(&residual[pick]).sqrt();
        if length <= EPSILON {
            continue;
        }
        let basis: Vec<f64> = residual[pick].iter().map(|x| x / length).collect();
        for row in residual.iter_mut() {
            let projection = dot(row, &basis);
            row.iter_mut().zip(&basis).for_each(|(r, b)| *r -= projection * b);
        }
    }

    chosen.into_iter().map(|i| candidates[i]).collect()
}

/// Exponentiated gradient on the simplex for min ||q - c·A||².
fn recover_mixture(gram: &[Vec<f64>], target: &[f64], step: f64) -> Vec<f64> {
    let k = target.len();
    let mut mix = vec![1.0 / k as f64; k];
    for _ in 0..RECOVERY_ITERATIONS {
        let gradient: Vec<f64> = (0..k)
            .map(|i| 2.0 * (dot(&gram[i], &mix) - target[i]))
            .collect();
        let mut total = 0.0;
        for (m, g) in mix.iter_mut().zip(&gradient) {
            *m *= (-step * g).exp();
            total += *m;
        }
        if total <= 0.0 || !total.is_finite() {
            return vec![1.0 / k as f64; k];
        }
        mix.iter_mut().for_each(|m| *m /= total);
    }
    mix
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm_sq(a: &[f64]) -> f64 {
    dot(a, a)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dtm() -> DocumentTermMatrix {
        DocumentTermMatrix::from_triples([
            ("Government regains territory", "regime", 40),
            ("Government regains territory", "control", 25),
            ("Government regains territory", "village", 10),
            ("Non-state actor overtakes territory", "hts", 35),
            ("Non-state actor overtakes territory", "captured", 30),
            ("Non-state actor overtakes territory", "village", 12),
        ])
        .unwrap()
    }

    #[test]
    fn fit_is_deterministic() {
        let a = StructuralTopicModel::new(StructuralConfig::default()).fit(&dtm()).unwrap();
        let b = StructuralTopicModel::new(StructuralConfig::default()).fit(&dtm()).unwrap();
        assert_eq!(a.beta, b.beta);
        assert_eq!(a.gamma, b.gamma);
        assert_eq!(a.anchors, b.anchors);
    }

    #[test]
    fn beta_and_gamma_are_distributions() {
        let fit = StructuralTopicModel::new(StructuralConfig::default()).fit(&dtm()).unwrap();
        assert_eq!(fit.num_topics(), 2);
        assert_eq!(fit.anchors.len(), 2);
        for t in 0..fit.num_topics() {
            assert!((fit.beta(t).iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
        for doc in &fit.documents {
            let gamma = fit.gamma(doc).unwrap();
            assert!((gamma.iter().sum::<f64>() - 1.0).abs() < 1e-9);
            assert!(gamma.iter().all(|g| *g >= 0.0));
        }
        assert!(fit.gamma("Armed clash").is_none());
    }

    #[test]
    fn separates_class_vocabularies() {
        let fit = StructuralTopicModel::new(StructuralConfig::default()).fit(&dtm()).unwrap();
        let top = fit.top_terms(2);
        let firsts: Vec<&str> = top.iter().map(|t| t[0].0.as_str()).collect();
        assert!(firsts.contains(&"regime") || firsts.contains(&"control"));
        assert!(firsts.contains(&"hts") || firsts.contains(&"captured"));
    }

    #[test]
    fn topic_summaries_score_their_top_terms() {
        let fit = StructuralTopicModel::new(StructuralConfig::default()).fit(&dtm()).unwrap();
        let topics = fit.topics(3);
        assert_eq!(topics.len(), 2);
        for topic in &topics {
            let expected = topic.words.iter().map(|(_, p)| p).sum::<f64>() / topic.words.len() as f64;
            assert!((topic.coherence_score - expected).abs() < 1e-12);
        }
        let dominant: usize = topics.iter().map(|t| t.documents.len()).sum();
        assert_eq!(dominant, fit.documents.len());
    }

    #[test]
    fn too_many_topics_for_vocabulary() {
        let config = StructuralConfig { num_topics: 9, ..StructuralConfig::default() };
        assert!(StructuralTopicModel::new(config).fit(&dtm()).is_err());
    }
}
