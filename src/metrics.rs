use serde::Serialize;

/// Counts at a 0.5 probability threshold; "positive" is the event class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionMatrix {
    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }
}

pub fn confusion_matrix(probabilities: &[f64], targets: &[f64]) -> ConfusionMatrix {
    let mut matrix = ConfusionMatrix::default();
    for (&p, &y) in probabilities.iter().zip(targets) {
        match (p >= 0.5, y > 0.5) {
            (true, true) => matrix.true_positive += 1,
            (true, false) => matrix.false_positive += 1,
            (false, false) => matrix.true_negative += 1,
            (false, true) => matrix.false_negative += 1,
        }
    }
    matrix
}

/// Area under the ROC curve via the rank-sum statistic; tied scores share their mean rank.
/// `None` when either class is absent.
pub fn roc_auc(scores: &[f64], targets: &[f64]) -> Option<f64> {
    let positives = targets.iter().filter(|&&y| y > 0.5).count();
    let negatives = targets.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && scores[order[end + 1]] == scores[order[start]] {
            end += 1;
        }
        // ranks are 1-based
        let mean_rank = (start + end) as f64 / 2.0 + 1.0;
        for &i in &order[start..=end] {
            if targets[i] > 0.5 {
                positive_rank_sum += mean_rank;
            }
        }
        start = end + 1;
    }

    let p = positives as f64;
    let u = positive_rank_sum - p * (p + 1.0) / 2.0;
    Some(u / (p * negatives as f64))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub roc_auc: Option<f64>,
    pub accuracy: f64,
    pub sensitivity: Option<f64>,
    pub specificity: Option<f64>,
    pub ppv: Option<f64>,
    pub npv: Option<f64>,
    pub confusion: ConfusionMatrix,
}

impl ClassMetrics {
    pub fn from_predictions(probabilities: &[f64], targets: &[f64]) -> Self {
        let confusion = confusion_matrix(probabilities, targets);
        let ratio = |num: usize, den: usize| (den > 0).then(|| num as f64 / den as f64);
        ClassMetrics {
            roc_auc: roc_auc(probabilities, targets),
            accuracy: ratio(confusion.true_positive + confusion.true_negative, confusion.total()).unwrap_or(0.0),
            sensitivity: ratio(confusion.true_positive, confusion.true_positive + confusion.false_negative),
            specificity: ratio(confusion.true_negative, confusion.true_negative + confusion.false_positive),
            ppv: ratio(confusion.true_positive, confusion.true_positive + confusion.false_positive),
            npv: ratio(confusion.true_negative, confusion.true_negative + confusion.false_negative),
            confusion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_ranking_scores_one() {
        let auc = roc_auc(&[0.1, 0.2, 0.8, 0.9], &[0.0, 0.0, 1.0, 1.0]).unwrap();
        assert!((auc - 1.0).abs() < 1e-12);
        let auc = roc_auc(&[0.9, 0.8, 0.2, 0.1], &[0.0, 0.0, 1.0, 1.0]).unwrap();
        assert!(auc.abs() < 1e-12);
    }

    #[test]
    fn ties_count_half() {
        let auc = roc_auc(&[0.5, 0.5, 0.5, 0.5], &[0.0, 1.0, 0.0, 1.0]).unwrap();
        assert!((auc - 0.5).abs() < 1e-12);
        // one positive above both negatives, one tied with a negative
        let auc = roc_auc(&[0.2, 0.6, 0.6, 0.9], &[0.0, 0.0, 1.0, 1.0]).unwrap();
        assert!((auc - 0.875).abs() < 1e-12);
    }

    #[test]
    fn single_class_has_no_auc() {
        assert_eq!(roc_auc(&[0.1, 0.9], &[1.0, 1.0]), None);
    }

    #[test]
    fn predictive_values_follow_confusion_counts() {
        let probs = [0.9, 0.8, 0.3, 0.6, 0.1, 0.2];
        let targets = [1.0, 1.0, 1.0, 0.0, 0.0, 0.0];
        let metrics = ClassMetrics::from_predictions(&probs, &targets);
        assert_eq!(
            metrics.confusion,
            ConfusionMatrix { true_positive: 2, false_positive: 1, true_negative: 2, false_negative: 1 }
        );
        assert!((metrics.ppv.unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!((metrics.npv.unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!((metrics.accuracy - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn undefined_predictive_value_is_none() {
        let metrics = ClassMetrics::from_predictions(&[0.1, 0.2], &[1.0, 0.0]);
        assert_eq!(metrics.ppv, None);
        assert_eq!(metrics.npv, Some(0.5));
    }
}
