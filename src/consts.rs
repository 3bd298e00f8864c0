//! Crate-wide numerical tuning constants.

/// Threshold under which a float is treated as zero.
pub const FLOAT_COMPARISON_EPSILON: f64 = 1e-9;

/// How far the component sum of a candidate may drift from 1 before the
/// feasibility check rejects it.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Number of top individuals copied unchanged into the next generation.
pub const ELITE_COUNT: usize = 2;

/// Number of contestants drawn per tournament when selecting a parent.
pub const TOURNAMENT_SIZE: usize = 3;

/// Portfolio weight above which the concentration penalty starts to bite.
pub const CONCENTRATION_THRESHOLD: f64 = 0.4;

/// Portfolio volatility above which the volatility penalty starts to bite.
pub const VOLATILITY_THRESHOLD: f64 = 0.03;

/// Floor of the linearly decaying mutation rate.
pub const MUTATION_RATE_FLOOR: f64 = 0.1;
