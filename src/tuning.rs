use std::collections::BTreeMap;
use std::sync::mpsc;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{AnalysisError, Result};
use crate::features::{FeatureMatrix, FeatureRecipe};
use crate::lasso::{LassoFit, LassoLogistic};
use crate::metrics::ClassMetrics;
use crate::models::{EventRecord, TerritoryChange};

/// Row indices of the two partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Stratified split: each class contributes `fraction` of its rows to train.
pub fn stratified_split(labels: &[TerritoryChange], fraction: f64, seed: u64) -> Result<Split> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(AnalysisError::Computation(format!("train fraction must be in (0, 1), got {fraction}")));
    }
    let strata = strata(labels)?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut split = Split { train: Vec::new(), test: Vec::new() };

    for mut members in strata.into_values() {
        members.shuffle(&mut rng);
        let cut = ((members.len() as f64 * fraction).round() as usize).clamp(1, members.len().saturating_sub(1).max(1));
        split.train.extend_from_slice(&members[..cut]);
        split.test.extend_from_slice(&members[cut..]);
    }
    split.train.sort_unstable();
    split.test.sort_unstable();
    Ok(split)
}

/// A bootstrap draw: `analysis` holds positions sampled with replacement,
/// `assessment` the out-of-bag positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resample {
    pub analysis: Vec<usize>,
    pub assessment: Vec<usize>,
}

/// Stratified bootstrap resamples: each class is drawn with replacement to its own size.
pub fn bootstraps(labels: &[TerritoryChange], times: usize, seed: u64) -> Result<Vec<Resample>> {
    let strata = strata(labels)?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut resamples = Vec::with_capacity(times);

    for _ in 0..times {
        let mut analysis = Vec::with_capacity(labels.len());
        let mut drawn = vec![false; labels.len()];
        for members in strata.values() {
            for _ in 0..members.len() {
                let pick = members[rng.gen_range(0..members.len())];
                drawn[pick] = true;
                analysis.push(pick);
            }
        }
        let assessment = (0..labels.len()).filter(|&i| !drawn[i]).collect();
        resamples.push(Resample { analysis, assessment });
    }
    Ok(resamples)
}

fn strata(labels: &[TerritoryChange]) -> Result<BTreeMap<TerritoryChange, Vec<usize>>> {
    let mut strata: BTreeMap<TerritoryChange, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        strata.entry(*label).or_default().push(i);
    }
    if strata.len() < 2 {
        return Err(AnalysisError::Computation("stratification needs both classes present".to_string()));
    }
    Ok(strata)
}

/// `levels` penalties evenly spaced on the log10 scale between the bounds.
pub fn penalty_grid(levels: usize, log10_range: (f64, f64)) -> Vec<f64> {
    let (low, high) = log10_range;
    match levels {
        0 => Vec::new(),
        1 => vec![10f64.powf(low)],
        _ => (0..levels)
            .map(|i| 10f64.powf(low + (high - low) * i as f64 / (levels - 1) as f64))
            .collect(),
    }
}

/// Score of one penalty on one resample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResampleScore {
    pub resample: usize,
    pub candidate: usize,
    pub metrics: ClassMetrics,
}

/// Mean performance of one penalty across resamples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateSummary {
    pub candidate: usize,
    pub penalty: f64,
    pub mean_roc_auc: Option<f64>,
    pub mean_ppv: Option<f64>,
    pub mean_npv: Option<f64>,
    pub scored: usize,
    pub unscored: usize,
}

#[derive(Debug, Clone)]
pub struct TuneResults {
    pub grid: Vec<f64>,
    pub scores: BTreeMap<(usize, usize), ResampleScore>,
    pub summaries: Vec<CandidateSummary>,
}

struct PreparedResample {
    analysis: FeatureMatrix,
    analysis_targets: Vec<f64>,
    assessment: FeatureMatrix,
    assessment_targets: Vec<f64>,
}

fn gather(records: &[EventRecord], positions: &[usize]) -> Vec<EventRecord> {
    positions.iter().map(|&i| records[i].clone()).collect()
}

fn targets(records: &[EventRecord]) -> Vec<f64> {
    records
        .iter()
        .map(|r| r.territory_change().map(|c| c.target()).unwrap_or(0.0))
        .collect()
}

/// Fits the recipe and one lasso per (resample, penalty) pair in parallel.
/// Results travel back over a channel and are merged by key, not arrival order.
pub fn tune_grid(
    train: &[EventRecord],
    resamples: &[Resample],
    grid: &[f64],
    recipe: &FeatureRecipe,
) -> Result<TuneResults> {
    if grid.is_empty() {
        return Err(AnalysisError::Computation("penalty grid is empty".to_string()));
    }
    if resamples.is_empty() {
        return Err(AnalysisError::Computation("no resamples to tune over".to_string()));
    }
    info!(resamples = resamples.len(), candidates = grid.len(), "tuning penalty grid");

    let prepared: Vec<PreparedResample> = resamples
        .par_iter()
        .map(|resample| {
            let analysis = gather(train, &resample.analysis);
            let assessment = gather(train, &resample.assessment);
            let fitted = recipe.fit(&analysis)?;
            Ok(PreparedResample {
                analysis: fitted.transform(&analysis),
                analysis_targets: targets(&analysis),
                assessment: fitted.transform(&assessment),
                assessment_targets: targets(&assessment),
            })
        })
        .collect::<Result<_>>()?;

    let tasks: Vec<(usize, usize)> = (0..prepared.len())
        .flat_map(|r| (0..grid.len()).map(move |c| (r, c)))
        .collect();

    let (sender, receiver) = mpsc::channel();
    tasks.par_iter().for_each_with(sender, |sender, &(r, c)| {
        let data = &prepared[r];
        let outcome = LassoLogistic::new(grid[c])
            .fit(&data.analysis.rows, &data.analysis_targets)
            .map(|fit| {
                let probabilities = fit.predict_proba(&data.assessment.rows);
                ClassMetrics::from_predictions(&probabilities, &data.assessment_targets)
            });
        // the receiver outlives every worker
        let _ = sender.send(((r, c), outcome));
    });

    let mut scores = BTreeMap::new();
    let mut first_error = None;
    for ((resample, candidate), outcome) in receiver {
        match outcome {
            Ok(metrics) => {
                scores.insert((resample, candidate), ResampleScore { resample, candidate, metrics });
            }
            Err(e) => {
                debug!(resample, candidate, error = %e, "resample fit failed");
                first_error.get_or_insert(e);
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }

    let summaries = summarize(grid, &scores);
    Ok(TuneResults {
        grid: grid.to_vec(),
        scores,
        summaries,
    })
}

fn summarize(grid: &[f64], scores: &BTreeMap<(usize, usize), ResampleScore>) -> Vec<CandidateSummary> {
    fn mean(values: &[f64]) -> Option<f64> {
        (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
    }

    grid.iter()
        .enumerate()
        .map(|(candidate, &penalty)| {
            let metrics: Vec<&ClassMetrics> = scores
                .values()
                .filter(|s| s.candidate == candidate)
                .map(|s| &s.metrics)
                .collect();
            let aucs: Vec<f64> = metrics.iter().filter_map(|m| m.roc_auc).collect();
            let ppvs: Vec<f64> = metrics.iter().filter_map(|m| m.ppv).collect();
            let npvs: Vec<f64> = metrics.iter().filter_map(|m| m.npv).collect();
            CandidateSummary {
                candidate,
                penalty,
                mean_roc_auc: mean(&aucs),
                mean_ppv: mean(&ppvs),
                mean_npv: mean(&npvs),
                scored: aucs.len(),
                unscored: metrics.len() - aucs.len(),
            }
        })
        .collect()
}

/// Candidate with the highest mean ROC-AUC; ties go to the earlier grid entry.
pub fn select_best(results: &TuneResults) -> Result<CandidateSummary> {
    let mut best: Option<&CandidateSummary> = None;
    for summary in &results.summaries {
        let Some(auc) = summary.mean_roc_auc else { continue };
        if best.and_then(|b| b.mean_roc_auc).map_or(true, |b| auc > b) {
            best = Some(summary);
        }
    }
    best.cloned()
        .ok_or_else(|| AnalysisError::Computation("no penalty candidate produced a ROC-AUC".to_string()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
    pub coefficient: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinalFit {
    pub penalty: f64,
    pub model: LassoFit,
    pub feature_names: Vec<String>,
    pub test_metrics: ClassMetrics,
    /// Predict the event class (government regains territory)
    pub positive_importances: Vec<FeatureImportance>,
    /// Predict the other class (non-state actor overtakes territory)
    pub negative_importances: Vec<FeatureImportance>,
}

/// Refits on the full training partition with the chosen penalty and scores the test partition once.
pub fn last_fit(
    train: &[EventRecord],
    test: &[EventRecord],
    recipe: &FeatureRecipe,
    penalty: f64,
    top_importances: usize,
) -> Result<FinalFit> {
    let fitted = recipe.fit(train)?;
    let train_matrix = fitted.transform(train);
    let test_matrix = fitted.transform(test);
    let model = LassoLogistic::new(penalty).fit(&train_matrix.rows, &targets(train))?;

    let probabilities = model.predict_proba(&test_matrix.rows);
    let test_metrics = ClassMetrics::from_predictions(&probabilities, &targets(test));
    info!(penalty, nonzero = model.nonzero(), roc_auc = ?test_metrics.roc_auc, "final model evaluated");

    let (positive_importances, negative_importances) =
        importances(&train_matrix.names, &model.coefficients, top_importances);

    Ok(FinalFit {
        penalty,
        feature_names: train_matrix.names,
        model,
        test_metrics,
        positive_importances,
        negative_importances,
    })
}

/// Non-zero coefficients split by sign, each side ordered by magnitude.
pub fn importances(
    names: &[String],
    coefficients: &[f64],
    top: usize,
) -> (Vec<FeatureImportance>, Vec<FeatureImportance>) {
    let mut ranked: Vec<FeatureImportance> = names
        .iter()
        .zip(coefficients)
        .filter(|(_, c)| **c != 0.0)
        .map(|(name, &c)| FeatureImportance {
            feature: name.clone(),
            importance: c.abs(),
            coefficient: c,
        })
        .collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance).then_with(|| a.feature.cmp(&b.feature)));

    let (mut positive, mut negative): (Vec<_>, Vec<_>) = ranked.into_iter().partition(|f| f.coefficient > 0.0);
    positive.truncate(top);
    negative.truncate(top);
    (positive, negative)
}
