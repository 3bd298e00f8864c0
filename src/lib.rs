//! Evolutionary portfolio allocation.
//!
//! The core is [`GeneticOptimizer`]: a single-threaded genetic algorithm
//! searching the weight simplex for the allocation that maximizes a
//! Sharpe-ratio objective with soft concentration and volatility penalties.
//! Around it sit the producers and consumers the binary wires together:
//! price ingestion ([`data`]), statistics derivation ([`stats`]), post-hoc
//! evaluation ([`portfolio`]) and text reporting ([`report`]).

pub mod consts;
pub mod data;
pub mod evolution;
pub mod portfolio;
pub mod report;
pub mod stats;

pub use data::{DataError, PriceHistory};
pub use evolution::{EvolutionConfig, EvolutionError, EvolutionResult, GeneticOptimizer};
pub use portfolio::PortfolioSummary;
pub use stats::{MarketStatistics, StatsError};
