//! Post-hoc portfolio statistics: how a fixed allocation would have fared
//! over a realized return series.

use serde::{Deserialize, Serialize};

use crate::stats::{MarketStatistics, StatsError};

/// Summary of one allocation against one return window.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PortfolioSummary {
    /// Mean per-period portfolio return over the window.
    pub mean_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    /// Compounded return over the whole window, `(1 + mean)^T - 1`.
    pub total_return: f64,
    pub initial_investment: f64,
    pub final_value: f64,
}

impl PortfolioSummary {
    /// Evaluates `weights` against a realized return series (rows are
    /// periods, columns assets) and projects the terminal value of
    /// `initial_investment`.
    pub fn from_returns(
        weights: &[f64],
        returns: &[Vec<f64>],
        initial_investment: f64,
    ) -> Result<Self, StatsError> {
        let stats = MarketStatistics::from_return_series(returns)?;
        let mean_return = stats.portfolio_return(weights);
        let volatility = stats.portfolio_volatility(weights);
        let sharpe_ratio = stats.sharpe_ratio(weights);

        let periods = returns.len() as i32;
        let total_return = (1.0 + mean_return).powi(periods) - 1.0;
        let final_value = initial_investment * (1.0 + total_return);

        Ok(Self {
            mean_return,
            volatility,
            sharpe_ratio,
            total_return,
            initial_investment,
            final_value,
        })
    }
}
