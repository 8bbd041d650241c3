use serde::Serialize;

use crate::error::{AnalysisError, Result};

const PROBABILITY_FLOOR: f64 = 1e-5;

/// L1-penalised logistic regression fitted by iteratively reweighted least squares,
/// each weighted problem solved by cyclic coordinate descent with soft thresholding.
///
/// Minimises `-(1/n) loglik + penalty * |coefficients|_1`; the intercept is not penalised.
#[derive(Debug, Clone)]
pub struct LassoLogistic {
    pub penalty: f64,
    pub max_outer_iterations: usize,
    pub max_inner_sweeps: usize,
    pub tolerance: f64,
}

impl LassoLogistic {
    pub fn new(penalty: f64) -> Self {
        LassoLogistic {
            penalty,
            max_outer_iterations: 25,
            max_inner_sweeps: 200,
            tolerance: 1e-6,
        }
    }

    /// `rows` are observations, `targets` are 0.0 / 1.0.
    pub fn fit(&self, rows: &[Vec<f64>], targets: &[f64]) -> Result<LassoFit> {
        let n = rows.len();
        if n == 0 || n != targets.len() {
            return Err(AnalysisError::Computation(format!(
                "lasso needs matching non-empty inputs, got {n} rows and {} targets",
                targets.len()
            )));
        }
        let positives = targets.iter().filter(|&&y| y > 0.5).count();
        if positives == 0 || positives == n {
            return Err(AnalysisError::Computation("lasso needs both classes in the training data".to_string()));
        }

        let p = rows[0].len();
        let columns: Vec<Vec<f64>> = (0..p).map(|j| rows.iter().map(|r| r[j]).collect()).collect();
        let n_f = n as f64;

        let prior = positives as f64 / n_f;
        let mut intercept = (prior / (1.0 - prior)).ln();
        let mut coefficients = vec![0.0; p];
        let mut eta = vec![intercept; n];

        for _ in 0..self.max_outer_iterations {
            let previous_intercept = intercept;
            let previous = coefficients.clone();

            let mut weights = vec![0.0; n];
            let mut residual = vec![0.0; n];
            for i in 0..n {
                let prob = sigmoid(eta[i]).clamp(PROBABILITY_FLOOR, 1.0 - PROBABILITY_FLOOR);
                weights[i] = prob * (1.0 - prob);
                residual[i] = (targets[i] - prob) / weights[i];
            }
            let weight_sum: f64 = weights.iter().sum();
            let curvature: Vec<f64> = columns
                .iter()
                .map(|col| col.iter().zip(&weights).map(|(x, w)| w * x * x).sum::<f64>() / n_f)
                .collect();

            let mut active_only = false;
            for _ in 0..self.max_inner_sweeps {
                let mut largest_step: f64 = 0.0;

                let shift = residual.iter().zip(&weights).map(|(r, w)| w * r).sum::<f64>() / weight_sum;
                if shift != 0.0 {
                    intercept += shift;
                    residual.iter_mut().for_each(|r| *r -= shift);
                    largest_step = largest_step.max(weight_sum / n_f * shift * shift);
                }

                for j in 0..p {
                    if curvature[j] <= 0.0 || (active_only && coefficients[j] == 0.0) {
                        continue;
                    }
                    let column = &columns[j];
                    let gradient = column
                        .iter()
                        .zip(&weights)
                        .zip(&residual)
                        .map(|((x, w), r)| w * x * r)
                        .sum::<f64>()
                        / n_f
                        + curvature[j] * coefficients[j];
                    let updated = soft_threshold(gradient, self.penalty) / curvature[j];
                    let step = updated - coefficients[j];
                    if step != 0.0 {
                        for (r, x) in residual.iter_mut().zip(column) {
                            *r -= step * x;
                        }
                        coefficients[j] = updated;
                        largest_step = largest_step.max(curvature[j] * step * step);
                    }
                }

                if largest_step < self.tolerance {
                    if active_only {
                        // confirm with a full sweep before stopping
                        active_only = false;
                        continue;
                    }
                    break;
                }
                active_only = true;
            }

            for i in 0..n {
                eta[i] = intercept
                    + (0..p)
                        .filter(|&j| coefficients[j] != 0.0)
                        .map(|j| coefficients[j] * columns[j][i])
                        .sum::<f64>();
            }

            let change = coefficients
                .iter()
                .zip(&previous)
                .map(|(a, b)| (a - b).abs())
                .fold((intercept - previous_intercept).abs(), f64::max);
            if change < self.tolerance.sqrt() {
                break;
            }
        }

        if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err(AnalysisError::Computation(format!(
                "lasso diverged at penalty {}",
                self.penalty
            )));
        }

        Ok(LassoFit {
            penalty: self.penalty,
            intercept,
            coefficients,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LassoFit {
    pub penalty: f64,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LassoFit {
    /// Probability of the event class for each row.
    pub fn predict_proba(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter()
            .map(|row| {
                let eta = self.intercept
                    + row
                        .iter()
                        .zip(&self.coefficients)
                        .map(|(x, b)| x * b)
                        .sum::<f64>();
                sigmoid(eta)
            })
            .collect()
    }

    pub fn nonzero(&self) -> usize {
        self.coefficients.iter().filter(|c| **c != 0.0).count()
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feature 0 drives the label, feature 1 is noise.
    fn data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut rows = Vec::new();
        let mut targets = Vec::new();
        for i in 0..60 {
            let y = if i % 2 == 0 { 1.0 } else { 0.0 };
            let signal = (if y > 0.5 { 1.0 } else { -1.0 }) + ((i % 7) as f64 - 3.0) * 0.2;
            let noise = ((i * 37 % 11) as f64 - 5.0) / 5.0;
            rows.push(vec![signal, noise]);
            targets.push(y);
        }
        (rows, targets)
    }

    #[test]
    fn large_penalty_zeroes_every_coefficient() {
        let (rows, targets) = data();
        let fit = LassoLogistic::new(10.0).fit(&rows, &targets).unwrap();
        assert_eq!(fit.nonzero(), 0);
        let probs = fit.predict_proba(&rows);
        assert!(probs.iter().all(|p| (p - 0.5).abs() < 1e-6));
    }

    #[test]
    fn small_penalty_learns_the_signal() {
        let (rows, targets) = data();
        let fit = LassoLogistic::new(0.01).fit(&rows, &targets).unwrap();
        assert!(fit.coefficients[0] > 1.0);
        assert!(fit.coefficients[0].abs() > fit.coefficients[1].abs());
        let probs = fit.predict_proba(&rows);
        let correct = probs
            .iter()
            .zip(&targets)
            .filter(|(p, y)| (**p > 0.5) == (**y > 0.5))
            .count();
        assert_eq!(correct, rows.len());
    }

    #[test]
    fn moderate_penalty_drops_noise_first() {
        let (rows, targets) = data();
        let fit = LassoLogistic::new(0.1).fit(&rows, &targets).unwrap();
        assert!(fit.coefficients[0] > 0.0);
        assert_eq!(fit.coefficients[1], 0.0);
    }

    #[test]
    fn single_class_is_rejected() {
        let rows = vec![vec![1.0], vec![2.0]];
        assert!(LassoLogistic::new(0.1).fit(&rows, &[1.0, 1.0]).is_err());
    }

    #[test]
    fn soft_threshold_shrinks_toward_zero() {
        assert!((soft_threshold(0.5, 0.2) - 0.3).abs() < 1e-12);
        assert!((soft_threshold(-0.5, 0.2) + 0.3).abs() < 1e-12);
        assert_eq!(soft_threshold(0.1, 0.2), 0.0);
    }
}
