pub mod config;
pub mod error;
pub mod explore;
pub mod features;
pub mod ingest;
pub mod lasso;
pub mod lexical;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod structural;
pub mod tokenize;
pub mod topic_modeling;
pub mod tuning;

pub use config::AnalysisConfig;
pub use error::{AnalysisError, Result};
pub use pipeline::{AnalysisReport, Stages};
