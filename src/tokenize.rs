use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::TokenizerConfig;
use crate::models::{EventRecord, TokenRow};

static WORD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+(?:['’][\p{L}\p{N}]+)*").unwrap());

const STANDARD_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "according", "across", "after", "afterwards", "again", "against",
    "all", "almost", "alone", "along", "already", "also", "although", "always", "am", "among",
    "amongst", "an", "and", "another", "any", "anyhow", "anyone", "anything", "anyway",
    "anywhere", "are", "around", "as", "at", "be", "became", "because", "become", "becomes",
    "been", "before", "beforehand", "behind", "being", "below", "beside", "besides", "between",
    "beyond", "both", "but", "by", "can", "cannot", "could", "did", "do", "does", "doing",
    "done", "down", "during", "each", "either", "else", "elsewhere", "enough", "etc", "even",
    "ever", "every", "everyone", "everything", "everywhere", "except", "few", "for", "former",
    "formerly", "from", "further", "had", "has", "have", "having", "he", "hence", "her",
    "here", "hereafter", "hereby", "herein", "hers", "herself", "him", "himself", "his", "how",
    "however", "i", "if", "in", "indeed", "into", "is", "it", "it's", "its", "itself", "just",
    "last", "latter", "least", "less", "many", "may", "me", "meanwhile", "might", "more",
    "moreover", "most", "mostly", "much", "must", "my", "myself", "namely", "neither",
    "never", "nevertheless", "next", "no", "nobody", "none", "nor", "not", "nothing", "now",
    "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto", "or", "other",
    "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own", "per", "perhaps",
    "rather", "same", "several", "she", "should", "since", "so", "some", "somehow", "someone",
    "something", "sometime", "sometimes", "somewhere", "still", "such", "than", "that",
    "that's", "the", "their", "theirs", "them", "themselves", "then", "thence", "there",
    "thereafter", "thereby", "therefore", "therein", "thereupon", "these", "they", "this",
    "those", "though", "through", "throughout", "thru", "thus", "to", "together", "too",
    "toward", "towards", "under", "until", "up", "upon", "us", "very", "via", "was", "we",
    "well", "were", "what", "whatever", "when", "whence", "whenever", "where", "whereafter",
    "whereas", "whereby", "wherein", "whereupon", "wherever", "whether", "which", "while",
    "whither", "who", "whoever", "whole", "whom", "whose", "why", "will", "with", "within",
    "without", "would", "yet", "you", "your", "yours", "yourself", "yourselves",
];

/// Words removed before any counting.
#[derive(Debug, Clone, Default)]
pub struct StopWords {
    words: HashSet<String>,
}

impl StopWords {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StopWords {
            words: words.into_iter().map(|w| w.into().to_lowercase()).collect(),
        }
    }

    pub fn standard() -> Self {
        StopWords::new(STANDARD_STOP_WORDS.iter().copied())
    }

    pub fn from_config(config: &TokenizerConfig) -> Self {
        let mut stop_words = if config.use_standard_stop_words {
            StopWords::standard()
        } else {
            StopWords::default()
        };
        stop_words.extend(config.domain_stop_words.iter().cloned());
        stop_words
    }

    pub fn extend<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.words.extend(words.into_iter().map(|w| w.into().to_lowercase()));
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Tokenizer {
    stop_words: StopWords,
}

impl Tokenizer {
    pub fn new(stop_words: StopWords) -> Self {
        Tokenizer { stop_words }
    }

    pub fn from_config(config: &TokenizerConfig) -> Self {
        Tokenizer::new(StopWords::from_config(config))
    }

    pub fn stop_words(&self) -> &StopWords {
        &self.stop_words
    }

    /// Every lowercased word in `text`, before any cleaning.
    pub fn words(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        WORD_PATTERN
            .find_iter(&lowered)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// A token survives when it is not a stop word and holds at least one lowercase letter.
    pub fn keep(&self, token: &str) -> bool {
        !self.stop_words.contains(token) && token.chars().any(|c| c.is_alphabetic() && c.is_lowercase())
    }

    pub fn unigrams(&self, text: &str) -> Vec<String> {
        self.words(text).into_iter().filter(|w| self.keep(w)).collect()
    }

    /// Adjacent word pairs taken before cleaning; a pair is kept only if both halves pass.
    pub fn bigrams(&self, text: &str) -> Vec<String> {
        self.words(text)
            .windows(2)
            .filter(|pair| self.keep(&pair[0]) && self.keep(&pair[1]))
            .map(|pair| format!("{} {}", pair[0], pair[1]))
            .collect()
    }
}

/// One row per surviving unigram of each studied record.
pub fn explode_unigrams(records: &[EventRecord], tokenizer: &Tokenizer) -> Vec<TokenRow> {
    explode(records, |text| tokenizer.unigrams(text))
}

/// One row per surviving bigram of each studied record.
pub fn explode_bigrams(records: &[EventRecord], tokenizer: &Tokenizer) -> Vec<TokenRow> {
    explode(records, |text| tokenizer.bigrams(text))
}

fn explode<F>(records: &[EventRecord], split: F) -> Vec<TokenRow>
where
    F: Fn(&str) -> Vec<String>,
{
    records
        .iter()
        .filter_map(|record| record.territory_change().map(|class| (record, class)))
        .flat_map(|(record, class)| {
            split(&record.notes).into_iter().map(move |token| TokenRow {
                id: record.id,
                class,
                token,
            })
        })
        .collect()
}
