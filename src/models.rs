use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const GOVERNMENT_REGAINS: &str = "Government regains territory";
pub const NON_STATE_OVERTAKES: &str = "Non-state actor overtakes territory";

/// One conflict incident as loaded from the event file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: u64,
    pub event_date: NaiveDate,
    pub actor1: String,
    pub admin1: String,
    pub admin2: String,
    pub event_type: String,
    pub sub_event_type: String,
    pub fatalities: u32,
    pub notes: String,
}

impl EventRecord {
    pub fn territory_change(&self) -> Option<TerritoryChange> {
        TerritoryChange::from_label(&self.sub_event_type)
    }
}

/// The two sub-event types under study. Ordering follows the labels alphabetically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TerritoryChange {
    GovernmentRegains,
    NonStateOvertakes,
}

impl TerritoryChange {
    pub const ALL: [TerritoryChange; 2] = [TerritoryChange::GovernmentRegains, TerritoryChange::NonStateOvertakes];

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            GOVERNMENT_REGAINS => Some(TerritoryChange::GovernmentRegains),
            NON_STATE_OVERTAKES => Some(TerritoryChange::NonStateOvertakes),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TerritoryChange::GovernmentRegains => GOVERNMENT_REGAINS,
            TerritoryChange::NonStateOvertakes => NON_STATE_OVERTAKES,
        }
    }

    /// Classifier target: 1.0 for the event class (government regains).
    pub fn target(&self) -> f64 {
        match self {
            TerritoryChange::GovernmentRegains => 1.0,
            TerritoryChange::NonStateOvertakes => 0.0,
        }
    }
}

impl fmt::Display for TerritoryChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One unigram or bigram exploded out of a record's notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRow {
    pub id: u64,
    pub class: TerritoryChange,
    pub token: String,
}

/// Number of records in `class` whose notes contain both tokens. `token_a < token_b`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooccurrencePair {
    pub class: TerritoryChange,
    pub token_a: String,
    pub token_b: String,
    pub count: usize,
}

/// tf-idf row for one (document, term) pair, where a document is a whole class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermStatistic {
    pub document: TerritoryChange,
    pub term: String,
    pub count: usize,
    pub tf: f64,
    pub idf: f64,
    pub tf_idf: f64,
}
