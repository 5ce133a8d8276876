//! Prediction errors binned by true RUL.
//!
//! Errors here are `true - predicted`, so a positive mean means the model
//! under-predicts RUL (warns early) in that range.

use serde::{Deserialize, Serialize};

use super::ScoringError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    /// `None` for empty bins.
    pub mean_error: Option<f64>,
    pub mae: Option<f64>,
    pub mse: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorHistogram {
    pub bins: Vec<HistogramBin>,
}

impl ErrorHistogram {
    /// `nbins` equal-width bins over `[0, max true RUL]`.
    #[allow(clippy::cast_precision_loss)]
    pub fn equal_width(
        predictions: &[f64],
        true_labels: &[f64],
        nbins: usize,
    ) -> Result<Self, ScoringError> {
        check(predictions, true_labels)?;
        let nbins = nbins.max(1);
        let top = true_labels.iter().copied().fold(0.0_f64, f64::max);
        let edges: Vec<f64> = (0..=nbins)
            .map(|i| top * i as f64 / nbins as f64)
            .collect();
        Ok(Self::bin(predictions, true_labels, &edges))
    }

    /// Bins delimited by ascending `edges`; `n` edges give `n - 1` bins.
    pub fn with_edges(
        predictions: &[f64],
        true_labels: &[f64],
        edges: &[f64],
    ) -> Result<Self, ScoringError> {
        check(predictions, true_labels)?;
        Ok(Self::bin(predictions, true_labels, edges))
    }

    /// Bins are `[lower, upper)`, except the last which includes `upper`.
    #[allow(clippy::cast_precision_loss)]
    fn bin(predictions: &[f64], true_labels: &[f64], edges: &[f64]) -> Self {
        let last = edges.len().saturating_sub(2);
        let bins = edges
            .windows(2)
            .enumerate()
            .map(|(i, e)| {
                let (lower, upper) = (e[0], e[1]);
                let errors: Vec<f64> = predictions
                    .iter()
                    .zip(true_labels)
                    .filter(|(_, t)| **t >= lower && (**t < upper || (i == last && **t <= upper)))
                    .map(|(p, t)| t - p)
                    .collect();
                let n = errors.len() as f64;
                let stat = |f: fn(f64) -> f64| {
                    (!errors.is_empty()).then(|| errors.iter().map(|e| f(*e)).sum::<f64>() / n)
                };
                HistogramBin {
                    lower,
                    upper,
                    count: errors.len(),
                    mean_error: stat(|e| e),
                    mae: stat(f64::abs),
                    mse: stat(|e| e * e),
                }
            })
            .collect();
        Self { bins }
    }
}

fn check(predictions: &[f64], true_labels: &[f64]) -> Result<(), ScoringError> {
    if predictions.len() != true_labels.len() {
        return Err(ScoringError::LengthMismatch {
            predictions: predictions.len(),
            labels: true_labels.len(),
        });
    }
    if predictions.is_empty() {
        return Err(ScoringError::Empty);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_width_bins() {
        let truth = [0.0, 10.0, 50.0, 100.0];
        let pred = [5.0, 10.0, 40.0, 90.0];
        let h = ErrorHistogram::equal_width(&pred, &truth, 2).expect("valid");
        assert_eq!(h.bins.len(), 2);
        assert_eq!((h.bins[0].lower, h.bins[0].upper), (0.0, 50.0));
        assert_eq!(h.bins[0].count, 2);
        assert_eq!(h.bins[0].mean_error, Some(-2.5));
        assert_eq!(h.bins[0].mae, Some(2.5));
        // 50 and the maximum 100 fall in the closed last bin
        assert_eq!(h.bins[1].count, 2);
        assert_eq!(h.bins[1].mse, Some(100.0));
    }

    #[test]
    fn test_empty_bin_has_no_stats() {
        let h = ErrorHistogram::with_edges(&[1.0], &[1.0], &[0.0, 5.0, 10.0]).expect("valid");
        assert_eq!(h.bins[0].count, 1);
        assert_eq!(h.bins[1].count, 0);
        assert_eq!(h.bins[1].mae, None);
    }

    #[test]
    fn test_mismatch_rejected() {
        assert!(ErrorHistogram::equal_width(&[1.0], &[], 3).is_err());
    }
}
