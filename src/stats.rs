//! Market statistics consumed by the optimizer: an expected-return vector
//! and a covariance matrix, plus the portfolio arithmetic shared between
//! fitness evaluation and post-hoc reporting.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::consts::FLOAT_COMPARISON_EPSILON;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("expected-return vector is empty")]
    EmptyReturns,
    #[error("covariance matrix is {rows}x{cols}, expected {assets}x{assets}")]
    DimensionMismatch {
        rows: usize,
        cols: usize,
        assets: usize,
    },
    #[error("return series needs at least 2 periods, got {0}")]
    TooFewPeriods(usize),
    #[error("return series is ragged: row {row} has {got} entries, expected {expected}")]
    RaggedSeries {
        row: usize,
        got: usize,
        expected: usize,
    },
}

/// Expected returns and covariance of a fixed asset universe.
///
/// Construction validates the shapes once, so every downstream consumer can
/// assume a square covariance matrix whose dimension matches the return
/// vector. The data is read-only for the duration of an optimization run.
#[derive(Debug, Clone)]
pub struct MarketStatistics {
    expected_returns: DVector<f64>,
    covariance: DMatrix<f64>,
}

impl MarketStatistics {
    pub fn new(expected_returns: Vec<f64>, covariance: DMatrix<f64>) -> Result<Self, StatsError> {
        if expected_returns.is_empty() {
            return Err(StatsError::EmptyReturns);
        }
        let assets = expected_returns.len();
        if covariance.nrows() != assets || covariance.ncols() != assets {
            return Err(StatsError::DimensionMismatch {
                rows: covariance.nrows(),
                cols: covariance.ncols(),
                assets,
            });
        }
        Ok(Self {
            expected_returns: DVector::from_vec(expected_returns),
            covariance,
        })
    }

    /// Builds the covariance from nested rows, for callers that do not
    /// already hold a `DMatrix`.
    pub fn from_rows(
        expected_returns: Vec<f64>,
        covariance_rows: &[Vec<f64>],
    ) -> Result<Self, StatsError> {
        let assets = expected_returns.len();
        for (row, entries) in covariance_rows.iter().enumerate() {
            if entries.len() != assets {
                return Err(StatsError::RaggedSeries {
                    row,
                    got: entries.len(),
                    expected: assets,
                });
            }
        }
        if covariance_rows.len() != assets {
            return Err(StatsError::DimensionMismatch {
                rows: covariance_rows.len(),
                cols: assets,
                assets,
            });
        }
        let flat: Vec<f64> = covariance_rows.iter().flatten().copied().collect();
        Self::new(expected_returns, DMatrix::from_row_slice(assets, assets, &flat))
    }

    /// Derives per-asset mean returns and the sample covariance matrix
    /// (T-1 denominator) from a return series. Rows are periods, columns
    /// are assets.
    pub fn from_return_series(returns: &[Vec<f64>]) -> Result<Self, StatsError> {
        let periods = returns.len();
        if periods < 2 {
            return Err(StatsError::TooFewPeriods(periods));
        }
        let assets = returns[0].len();
        if assets == 0 {
            return Err(StatsError::EmptyReturns);
        }
        for (row, entries) in returns.iter().enumerate() {
            if entries.len() != assets {
                return Err(StatsError::RaggedSeries {
                    row,
                    got: entries.len(),
                    expected: assets,
                });
            }
        }

        let t = periods as f64;
        let means: Vec<f64> = (0..assets)
            .map(|j| returns.iter().map(|row| row[j]).sum::<f64>() / t)
            .collect();

        let mut covariance = DMatrix::zeros(assets, assets);
        for i in 0..assets {
            for j in i..assets {
                let cov = returns
                    .iter()
                    .map(|row| (row[i] - means[i]) * (row[j] - means[j]))
                    .sum::<f64>()
                    / (t - 1.0);
                covariance[(i, j)] = cov;
                covariance[(j, i)] = cov;
            }
        }

        Self::new(means, covariance)
    }

    pub fn num_assets(&self) -> usize {
        self.expected_returns.len()
    }

    pub fn expected_returns(&self) -> &DVector<f64> {
        &self.expected_returns
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    /// Expected portfolio return `w . mu`.
    pub fn portfolio_return(&self, weights: &[f64]) -> f64 {
        let w = DVector::from_column_slice(weights);
        w.dot(&self.expected_returns)
    }

    /// Portfolio volatility `sqrt(w' * Sigma * w)`.
    ///
    /// The quadratic form is clamped at zero before the square root: a
    /// positive-semidefinite covariance can produce a slightly negative
    /// value through floating-point noise, and that must not turn into NaN.
    pub fn portfolio_volatility(&self, weights: &[f64]) -> f64 {
        let w = DVector::from_column_slice(weights);
        let quadratic_form = (&self.covariance * &w).dot(&w);
        quadratic_form.max(0.0).sqrt()
    }

    /// Sharpe ratio `return / volatility`, defined as 0 when the volatility
    /// vanishes so that degenerate portfolios never propagate NaN through
    /// selection.
    pub fn sharpe_ratio(&self, weights: &[f64]) -> f64 {
        let volatility = self.portfolio_volatility(weights);
        if volatility > FLOAT_COMPARISON_EPSILON {
            self.portfolio_return(weights) / volatility
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_asset_stats() -> MarketStatistics {
        MarketStatistics::from_rows(
            vec![0.01, 0.02],
            &[vec![0.0004, 0.0], vec![0.0, 0.0009]],
        )
        .unwrap()
    }

    #[test]
    fn equal_split_volatility_matches_hand_computation() {
        let stats = two_asset_stats();
        let vol = stats.portfolio_volatility(&[0.5, 0.5]);
        // sqrt(0.25 * 0.0004 + 0.25 * 0.0009) = sqrt(0.000325)
        assert!((vol - 0.000325f64.sqrt()).abs() < 1e-12);
        assert!((vol - 0.01803).abs() < 1e-4);
    }

    #[test]
    fn equal_split_sharpe_matches_hand_computation() {
        let stats = two_asset_stats();
        let sharpe = stats.sharpe_ratio(&[0.5, 0.5]);
        assert!((sharpe - 0.015 / 0.000325f64.sqrt()).abs() < 1e-9);
        assert!((sharpe - 0.8321).abs() < 1e-3);
    }

    #[test]
    fn zero_covariance_yields_zero_sharpe() {
        let stats =
            MarketStatistics::from_rows(vec![0.01, 0.02], &[vec![0.0, 0.0], vec![0.0, 0.0]])
                .unwrap();
        assert_eq!(stats.portfolio_volatility(&[0.5, 0.5]), 0.0);
        assert_eq!(stats.sharpe_ratio(&[0.5, 0.5]), 0.0);
    }

    #[test]
    fn single_asset_volatility_is_sqrt_of_variance() {
        let stats = MarketStatistics::from_rows(vec![0.01], &[vec![0.0004]]).unwrap();
        assert!((stats.portfolio_volatility(&[1.0]) - 0.02).abs() < 1e-12);
    }

    #[test]
    fn negative_quadratic_noise_is_clamped() {
        // Not PSD, stands in for -1e-18-style numerical noise at scale.
        let stats =
            MarketStatistics::from_rows(vec![0.01], &[vec![-1e-18]]).unwrap();
        let vol = stats.portfolio_volatility(&[1.0]);
        assert_eq!(vol, 0.0);
        assert_eq!(stats.sharpe_ratio(&[1.0]), 0.0);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let err = MarketStatistics::from_rows(
            vec![0.01, 0.02, 0.03],
            &[vec![0.0004, 0.0], vec![0.0, 0.0009]],
        )
        .unwrap_err();
        assert!(matches!(err, StatsError::RaggedSeries { .. } | StatsError::DimensionMismatch { .. }));
    }

    #[test]
    fn sample_moments_match_hand_computation() {
        // Two assets, three periods.
        let series = vec![vec![0.01, 0.02], vec![0.03, -0.01], vec![0.02, 0.05]];
        let stats = MarketStatistics::from_return_series(&series).unwrap();

        assert!((stats.expected_returns()[0] - 0.02).abs() < 1e-12);
        assert!((stats.expected_returns()[1] - 0.02).abs() < 1e-12);

        // Sample variance of asset 0: ((-0.01)^2 + 0.01^2 + 0) / 2 = 1e-4.
        assert!((stats.covariance()[(0, 0)] - 1e-4).abs() < 1e-12);
        // Sample covariance: ((-0.01)(0) + (0.01)(-0.03) + (0)(0.03)) / 2.
        assert!((stats.covariance()[(0, 1)] - (-1.5e-4)).abs() < 1e-12);
        assert_eq!(stats.covariance()[(0, 1)], stats.covariance()[(1, 0)]);
    }

    #[test]
    fn short_series_is_rejected() {
        let err = MarketStatistics::from_return_series(&[vec![0.01, 0.02]]).unwrap_err();
        assert!(matches!(err, StatsError::TooFewPeriods(1)));
    }
}
