use std::collections::BTreeMap;
use std::path::Path;

use tracing::info;

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::explore::{self, DatasetOverview};
use crate::features::FeatureRecipe;
use crate::ingest;
use crate::lexical;
use crate::models::{CooccurrencePair, EventRecord, TermStatistic, TerritoryChange};
use crate::structural::{StmFit, StructuralTopicModel};
use crate::tokenize::{self, Tokenizer};
use crate::topic_modeling::{DocumentTermMatrix, SimpleLDA, TopicModel};
use crate::tuning::{self, CandidateSummary, FinalFit, TuneResults};

/// Which optional stages to run.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stages {
    pub skip_topics: bool,
    pub skip_classifier: bool,
}

#[derive(Debug)]
pub struct ClassificationReport {
    pub train_size: usize,
    pub test_size: usize,
    pub tuning: TuneResults,
    pub best: CandidateSummary,
    pub final_fit: FinalFit,
}

#[derive(Debug)]
pub struct AnalysisReport {
    pub records: usize,
    pub overview: DatasetOverview,
    pub unigram_counts: BTreeMap<TerritoryChange, Vec<(String, usize)>>,
    pub bigram_counts: BTreeMap<TerritoryChange, Vec<(String, usize)>>,
    pub cooccurrence_edges: Vec<CooccurrencePair>,
    pub tf_idf: BTreeMap<TerritoryChange, Vec<TermStatistic>>,
    pub lda: Option<TopicModel>,
    pub structural: Option<StmFit>,
    pub classification: Option<ClassificationReport>,
}

/// Loads, filters and analyses the event file at `path`.
pub fn run(path: &Path, config: &AnalysisConfig, stages: Stages) -> Result<AnalysisReport> {
    let records = ingest::filter_territorial(ingest::load_events(path)?);
    analyze(&records, config, stages)
}

/// Runs every stage in order over already-filtered records. Any stage failure ends the run.
pub fn analyze(records: &[EventRecord], config: &AnalysisConfig, stages: Stages) -> Result<AnalysisReport> {
    info!(records = records.len(), "starting analysis");
    let tokenizer = Tokenizer::from_config(&config.tokenizer);
    let overview = explore::overview(records);

    let unigrams = tokenize::explode_unigrams(records, &tokenizer);
    let bigrams = tokenize::explode_bigrams(records, &tokenizer);
    info!(unigrams = unigrams.len(), bigrams = bigrams.len(), "tokenized notes");

    let top = config.lexical.top_terms;
    let truncate = |mut counts: BTreeMap<TerritoryChange, Vec<(String, usize)>>| {
        counts.values_mut().for_each(|c| c.truncate(top));
        counts
    };
    let unigram_counts = truncate(lexical::token_counts(&unigrams));
    let bigram_counts = truncate(lexical::token_counts(&bigrams));

    let pairs = lexical::pairwise_cooccurrence(&unigrams);
    let cooccurrence_edges = lexical::filter_edges(&pairs, config.lexical.min_cooccurrence);
    info!(pairs = pairs.len(), edges = cooccurrence_edges.len(), "co-occurrence counted");

    let tf_idf = lexical::top_tf_idf(&lexical::tf_idf(&unigrams), config.lexical.top_tf_idf);

    let (lda, structural) = if stages.skip_topics {
        (None, None)
    } else {
        let dtm = DocumentTermMatrix::from_token_rows(&unigrams)?;
        let lda = SimpleLDA::new(config.lda.clone()).fit(&dtm)?;
        let structural = StructuralTopicModel::new(config.structural.clone()).fit(&dtm)?;
        (Some(lda), Some(structural))
    };

    let classification = if stages.skip_classifier {
        None
    } else {
        Some(classify(records, config, &tokenizer)?)
    };

    Ok(AnalysisReport {
        records: records.len(),
        overview,
        unigram_counts,
        bigram_counts,
        cooccurrence_edges,
        tf_idf,
        lda,
        structural,
        classification,
    })
}

fn classify(records: &[EventRecord], config: &AnalysisConfig, tokenizer: &Tokenizer) -> Result<ClassificationReport> {
    let settings = &config.classifier;
    let labeled: Vec<(EventRecord, TerritoryChange)> = records
        .iter()
        .filter_map(|r| r.territory_change().map(|c| (r.clone(), c)))
        .collect();
    let labels: Vec<TerritoryChange> = labeled.iter().map(|(_, c)| *c).collect();

    let split = tuning::stratified_split(&labels, settings.train_fraction, settings.seed)?;
    let train: Vec<EventRecord> = split.train.iter().map(|&i| labeled[i].0.clone()).collect();
    let test: Vec<EventRecord> = split.test.iter().map(|&i| labeled[i].0.clone()).collect();
    let train_labels: Vec<TerritoryChange> = split.train.iter().map(|&i| labels[i]).collect();
    info!(train = train.len(), test = test.len(), "stratified split");

    let recipe = FeatureRecipe::new(tokenizer.clone(), settings.max_tokens);
    // offset keeps the bootstrap stream independent of the split stream
    let resamples = tuning::bootstraps(&train_labels, settings.bootstraps, settings.seed.wrapping_add(1))?;
    let grid = tuning::penalty_grid(settings.penalty_levels, settings.penalty_range);
    let tuning = tuning::tune_grid(&train, &resamples, &grid, &recipe)?;
    let best = tuning::select_best(&tuning)?;
    info!(penalty = best.penalty, mean_roc_auc = ?best.mean_roc_auc, "selected penalty");

    let final_fit = tuning::last_fit(&train, &test, &recipe, best.penalty, settings.top_importances)?;

    Ok(ClassificationReport {
        train_size: train.len(),
        test_size: test.len(),
        tuning,
        best,
        final_fit,
    })
}
