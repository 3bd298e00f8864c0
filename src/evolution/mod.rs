//! The evolutionary optimizer and its genetic operators.

pub mod engine;
pub mod operators;

pub use engine::{EvolutionConfig, EvolutionError, EvolutionResult, GeneticOptimizer};
