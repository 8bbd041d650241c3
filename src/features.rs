use std::collections::{BTreeMap, BTreeSet};

use chrono::Datelike;
use counter::Counter;
use serde::Serialize;
use tracing::debug;

use crate::error::{AnalysisError, Result};
use crate::models::EventRecord;
use crate::tokenize::Tokenizer;

const MONTHS: [&str; 12] = ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];
const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Rows of numeric predictors with their column names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureMatrix {
    pub names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_features(&self) -> usize {
        self.names.len()
    }
}

/// Preprocessing steps, learned from a training partition only.
#[derive(Debug, Clone)]
pub struct FeatureRecipe {
    tokenizer: Tokenizer,
    max_tokens: usize,
}

impl FeatureRecipe {
    pub fn new(tokenizer: Tokenizer, max_tokens: usize) -> Self {
        FeatureRecipe { tokenizer, max_tokens }
    }

    pub fn fit(&self, records: &[EventRecord]) -> Result<FittedRecipe> {
        if records.is_empty() {
            return Err(AnalysisError::Computation("cannot prepare features from zero records".to_string()));
        }

        let documents: Vec<Vec<String>> = records.iter().map(|r| self.ngrams(&r.notes)).collect();
        let mut frequency: Counter<&str> = Counter::new();
        for doc in &documents {
            for gram in doc {
                frequency[&gram.as_str()] += 1;
            }
        }
        let vocabulary: Vec<String> = frequency
            .most_common_ordered()
            .into_iter()
            .take(self.max_tokens)
            .map(|(gram, _)| gram.to_string())
            .collect();

        let total = records.len() as f64;
        let idf: Vec<f64> = vocabulary
            .iter()
            .map(|term| {
                let df = documents.iter().filter(|doc| doc.iter().any(|g| g == term)).count();
                (1.0 + total / df.max(1) as f64).ln()
            })
            .collect();

        let admin2_levels: Vec<String> = records
            .iter()
            .map(|r| r.admin2.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut fitted = FittedRecipe {
            tokenizer: self.tokenizer.clone(),
            vocabulary,
            idf,
            admin2_levels,
            keep: Vec::new(),
            means: Vec::new(),
            std_devs: Vec::new(),
            names: Vec::new(),
        };

        let (all_names, raw) = fitted.raw_matrix(records);
        for j in 0..all_names.len() {
            let column: Vec<f64> = raw.iter().map(|row| row[j]).collect();
            let mean = column.iter().sum::<f64>() / total;
            let variance = if column.len() > 1 {
                column.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (total - 1.0)
            } else {
                0.0
            };
            if variance > 0.0 {
                fitted.keep.push(j);
                fitted.means.push(mean);
                fitted.std_devs.push(variance.sqrt());
                fitted.names.push(all_names[j].clone());
            }
        }
        debug!(
            candidates = all_names.len(),
            kept = fitted.names.len(),
            vocabulary = fitted.vocabulary.len(),
            "feature recipe prepared"
        );
        if fitted.names.is_empty() {
            return Err(AnalysisError::Computation("every feature has zero variance".to_string()));
        }
        Ok(fitted)
    }

    fn ngrams(&self, text: &str) -> Vec<String> {
        ngrams(&self.tokenizer, text)
    }
}

/// Unigrams and bigrams of the stop-word-free token stream, bigrams joined by `_`.
fn ngrams(tokenizer: &Tokenizer, text: &str) -> Vec<String> {
    let tokens = tokenizer.unigrams(text);
    let mut grams = tokens.clone();
    grams.extend(tokens.windows(2).map(|pair| format!("{}_{}", pair[0], pair[1])));
    grams
}

#[derive(Debug, Clone)]
pub struct FittedRecipe {
    tokenizer: Tokenizer,
    vocabulary: Vec<String>,
    idf: Vec<f64>,
    admin2_levels: Vec<String>,
    keep: Vec<usize>,
    means: Vec<f64>,
    std_devs: Vec<f64>,
    names: Vec<String>,
}

impl FittedRecipe {
    pub fn feature_names(&self) -> &[String] {
        &self.names
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    /// Applies the learned steps; z-scores use the training means and deviations.
    pub fn transform(&self, records: &[EventRecord]) -> FeatureMatrix {
        let (_, raw) = self.raw_matrix(records);
        let rows = raw
            .into_iter()
            .map(|row| {
                self.keep
                    .iter()
                    .enumerate()
                    .map(|(k, &j)| (row[j] - self.means[k]) / self.std_devs[k])
                    .collect()
            })
            .collect();
        FeatureMatrix {
            names: self.names.clone(),
            rows,
        }
    }

    fn raw_matrix(&self, records: &[EventRecord]) -> (Vec<String>, Vec<Vec<f64>>) {
        let mut names = vec!["fatalities".to_string()];
        names.extend(MONTHS.iter().map(|m| format!("event_date_month_{m}")));
        names.extend(WEEKDAYS.iter().map(|d| format!("event_date_dow_{d}")));
        names.extend(self.admin2_levels.iter().map(|a| format!("admin2_{a}")));
        names.extend(self.vocabulary.iter().map(|g| format!("tfidf_notes_{g}")));

        let admin2_offset = 1 + MONTHS.len() + WEEKDAYS.len();
        let text_offset = admin2_offset + self.admin2_levels.len();
        let admin2_index: BTreeMap<&str, usize> = self
            .admin2_levels
            .iter()
            .enumerate()
            .map(|(i, a)| (a.as_str(), i))
            .collect();
        let vocabulary_index: BTreeMap<&str, usize> = self
            .vocabulary
            .iter()
            .enumerate()
            .map(|(i, g)| (g.as_str(), i))
            .collect();

        let rows = records
            .iter()
            .map(|record| {
                let mut row = vec![0.0; names.len()];
                row[0] = f64::from(record.fatalities);
                row[1 + record.event_date.month0() as usize] = 1.0;
                row[1 + MONTHS.len() + record.event_date.weekday().num_days_from_sunday() as usize] = 1.0;
                if let Some(&i) = admin2_index.get(record.admin2.as_str()) {
                    row[admin2_offset + i] = 1.0;
                }

                let grams = ngrams(&self.tokenizer, &record.notes);
                if !grams.is_empty() {
                    let length = grams.len() as f64;
                    for gram in &grams {
                        if let Some(&i) = vocabulary_index.get(gram.as_str()) {
                            row[text_offset + i] += self.idf[i] / length;
                        }
                    }
                }
                row
            })
            .collect();
        (names, rows)
    }
}
