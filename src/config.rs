use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub tokenizer: TokenizerConfig,
    pub lexical: LexicalConfig,
    pub lda: LDAConfig,
    pub structural: StructuralConfig,
    pub classifier: ClassifierConfig,
}

impl AnalysisConfig {
    /// Reads a JSON override file. Missing sections and fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Replaces every stochastic seed with `seed`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.lda.seed = seed;
        self.classifier.seed = seed;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    /// Use the bundled English stop-word list
    pub use_standard_stop_words: bool,
    /// Language markers and reporting boilerplate removed on top of the standard list
    pub domain_stop_words: Vec<String>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        TokenizerConfig {
            use_standard_stop_words: true,
            domain_stop_words: [
                "size", "report", "reports", "reported", "reportedly", "coded",
                "arabic", "english", "translated", "source", "sources", "unknown",
            ]
            .iter()
            .map(|w| w.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LexicalConfig {
    pub top_terms: usize,
    pub top_tf_idf: usize,
    /// Co-occurrence edges below this count are dropped before display
    pub min_cooccurrence: usize,
}

impl Default for LexicalConfig {
    fn default() -> Self {
        LexicalConfig {
            top_terms: 20,
            top_tf_idf: 15,
            min_cooccurrence: 150,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LDAConfig {
    pub num_topics: usize,
    pub iterations: usize,
    pub alpha: f64, // Document-topic concentration
    pub beta: f64,  // Topic-word concentration
    pub seed: u64,
    pub top_terms: usize,
}

impl Default for LDAConfig {
    fn default() -> Self {
        LDAConfig {
            num_topics: 6,
            iterations: 200,
            alpha: 0.1,
            beta: 0.01,
            seed: 1234,
            top_terms: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuralConfig {
    pub num_topics: usize,
    pub max_em_iterations: usize,
    /// Relative change in the bound below which EM stops
    pub tolerance: f64,
    /// Pull of each document's topic proportions toward the corpus mean
    pub prior_strength: f64,
    /// Most frequent terms used as co-occurrence profile columns during spectral initialisation
    pub spectral_terms: usize,
    pub top_terms: usize,
}

impl Default for StructuralConfig {
    fn default() -> Self {
        StructuralConfig {
            num_topics: 2,
            max_em_iterations: 100,
            tolerance: 1e-5,
            prior_strength: 1.0,
            spectral_terms: 500,
            top_terms: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub train_fraction: f64,
    pub bootstraps: usize,
    pub penalty_levels: usize,
    /// log10 bounds of the penalty grid
    pub penalty_range: (f64, f64),
    pub max_tokens: usize,
    pub top_importances: usize,
    pub seed: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            train_fraction: 0.75,
            bootstraps: 25,
            penalty_levels: 40,
            penalty_range: (-10.0, 0.0),
            max_tokens: 500,
            top_importances: 20,
            seed: 1234,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{ "lda": { "num_topics": 4 }, "lexical": { "min_cooccurrence": 10 } }"#)
                .unwrap();
        assert_eq!(config.lda.num_topics, 4);
        assert_eq!(config.lda.top_terms, 10);
        assert_eq!(config.lexical.min_cooccurrence, 10);
        assert_eq!(config.classifier.penalty_levels, 40);
        assert_eq!(config.structural.num_topics, 2);
    }

    #[test]
    fn seed_override_reaches_every_stage() {
        let config = AnalysisConfig::default().with_seed(7);
        assert_eq!(config.lda.seed, 7);
        assert_eq!(config.classifier.seed, 7);
    }
}
