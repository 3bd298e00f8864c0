//! The evolutionary optimizer: population initialization, penalized-Sharpe
//! fitness, tournament selection, blend crossover, adaptive Gaussian
//! mutation, top-2 elitism and per-generation metric recording.

use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use thiserror::Error;
use tracing::{debug, warn};

use crate::consts::{
    CONCENTRATION_THRESHOLD, ELITE_COUNT, MUTATION_RATE_FLOOR, TOURNAMENT_SIZE,
    VOLATILITY_THRESHOLD, WEIGHT_SUM_TOLERANCE,
};
use crate::evolution::operators;
use crate::stats::MarketStatistics;

#[derive(Error, Debug)]
pub enum EvolutionError {
    #[error("population size must be at least {min}, got {got}")]
    PopulationTooSmall { got: usize, min: usize },
    #[error("generation count must be at least 1")]
    NoGenerations,
    #[error("mutation scale must be a positive finite number, got {0}")]
    InvalidMutationScale(f64),
    #[error("weight bounds are inverted or out of range: [{min_weight}, {max_weight}]")]
    InvertedBounds { min_weight: f64, max_weight: f64 },
    #[error(
        "weight bounds [{min_weight}, {max_weight}] admit no {assets}-asset allocation summing to 1"
    )]
    InfeasibleBounds {
        min_weight: f64,
        max_weight: f64,
        assets: usize,
    },
}

/// Hyperparameters of one optimization run.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Reserved for Sharpe numerator adjustment; the fitness Sharpe is
    /// deliberately `return / volatility` and does not subtract this rate.
    pub risk_free_rate: f64,
    pub population_size: usize,
    pub generations: usize,
    /// Weight of the penalty on any single allocation above 40%.
    pub concentration_penalty_weight: f64,
    /// Weight of the penalty on portfolio volatility above 3%.
    pub volatility_penalty_weight: f64,
    /// Standard deviation of the Gaussian mutation noise.
    pub mutation_scale: f64,
    /// Per-component lower bound an offspring must satisfy.
    pub min_weight: f64,
    /// Per-component upper bound an offspring must satisfy.
    pub max_weight: f64,
    /// How many infeasible children to resample for one slot before the
    /// candidate is projected onto the bounds instead.
    pub max_feasibility_retries: usize,
    /// Emit a tracing checkpoint every this many generations (0 = never).
    pub generation_check_interval: usize,
    /// Seed for the run's RNG; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.02,
            population_size: 50,
            generations: 100,
            concentration_penalty_weight: 1.0,
            volatility_penalty_weight: 1.0,
            mutation_scale: 0.05,
            min_weight: 0.05,
            max_weight: 0.5,
            max_feasibility_retries: 100,
            generation_check_interval: 10,
            seed: None,
        }
    }
}

/// Everything a run produces: the winning allocation and the full
/// per-generation history for downstream reporting.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EvolutionResult {
    /// The best vector over the entire history, not necessarily the final
    /// generation's best.
    pub best_weights: Vec<f64>,
    pub best_fitness: f64,
    /// Generation the winning vector was recorded in.
    pub best_generation: usize,
    pub best_fitness_per_generation: Vec<f64>,
    pub average_fitness_per_generation: Vec<f64>,
    pub best_weights_per_generation: Vec<Vec<f64>>,
    pub best_return_per_generation: Vec<f64>,
    pub best_volatility_per_generation: Vec<f64>,
}

#[derive(Debug)]
pub struct GeneticOptimizer {
    stats: MarketStatistics,
    config: EvolutionConfig,
    noise: Normal,
    rng: StdRng,
}

impl GeneticOptimizer {
    /// Validates the configuration against the asset universe. All failure
    /// modes of the optimizer surface here; `run` itself cannot fail.
    pub fn new(stats: MarketStatistics, config: EvolutionConfig) -> Result<Self, EvolutionError> {
        let min_viable = ELITE_COUNT + 1;
        if config.population_size < min_viable {
            return Err(EvolutionError::PopulationTooSmall {
                got: config.population_size,
                min: min_viable,
            });
        }
        if config.generations == 0 {
            return Err(EvolutionError::NoGenerations);
        }
        if !(config.min_weight >= 0.0 && config.min_weight < config.max_weight) {
            return Err(EvolutionError::InvertedBounds {
                min_weight: config.min_weight,
                max_weight: config.max_weight,
            });
        }
        let assets = stats.num_assets() as f64;
        if config.min_weight * assets > 1.0 + WEIGHT_SUM_TOLERANCE
            || config.max_weight * assets < 1.0 - WEIGHT_SUM_TOLERANCE
        {
            return Err(EvolutionError::InfeasibleBounds {
                min_weight: config.min_weight,
                max_weight: config.max_weight,
                assets: stats.num_assets(),
            });
        }
        let noise = Normal::new(0.0, config.mutation_scale)
            .map_err(|_| EvolutionError::InvalidMutationScale(config.mutation_scale))?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            stats,
            config,
            noise,
            rng,
        })
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    pub fn stats(&self) -> &MarketStatistics {
        &self.stats
    }

    /// Penalized Sharpe score of a candidate.
    ///
    /// The candidate is re-normalized onto the simplex first, so the score
    /// is well defined even for raw operator output. Pure with respect to
    /// the engine's fixed inputs; never NaN.
    pub fn fitness(&self, weights: &[f64]) -> f64 {
        let weights = operators::normalize(weights);

        let sharpe = self.stats.sharpe_ratio(&weights);
        let volatility = self.stats.portfolio_volatility(&weights);

        let max_weight = weights.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let concentration_penalty = (max_weight - CONCENTRATION_THRESHOLD).max(0.0);
        let volatility_penalty = (volatility - VOLATILITY_THRESHOLD).max(0.0);

        sharpe
            - self.config.concentration_penalty_weight * concentration_penalty
            - self.config.volatility_penalty_weight * volatility_penalty
    }

    /// Runs the full evolutionary loop and returns the winning allocation
    /// together with the recorded history.
    pub fn run(&mut self) -> EvolutionResult {
        let generations = self.config.generations;

        let mut best_fitness_per_generation = Vec::with_capacity(generations);
        let mut average_fitness_per_generation = Vec::with_capacity(generations);
        let mut best_weights_per_generation: Vec<Vec<f64>> = Vec::with_capacity(generations);
        let mut best_return_per_generation = Vec::with_capacity(generations);
        let mut best_volatility_per_generation = Vec::with_capacity(generations);

        let mut population = self.initialize_population();

        for generation in 0..generations {
            let fitnesses: Vec<f64> = population
                .iter()
                .map(|individual| self.fitness(individual))
                .collect();

            let best_index = argmax(&fitnesses);
            let best = population[best_index].clone();

            best_fitness_per_generation.push(fitnesses[best_index]);
            average_fitness_per_generation
                .push(fitnesses.iter().sum::<f64>() / fitnesses.len() as f64);
            best_return_per_generation.push(self.stats.portfolio_return(&best));
            best_volatility_per_generation.push(self.stats.portfolio_volatility(&best));
            best_weights_per_generation.push(best);

            let interval = self.config.generation_check_interval;
            if interval > 0 && generation % interval == 0 {
                debug!(
                    generation,
                    best_fitness = best_fitness_per_generation[generation],
                    average_fitness = average_fitness_per_generation[generation],
                    "generation checkpoint"
                );
            }

            population = self.breed_next_generation(&population, &fitnesses, generation);
        }

        let best_generation = argmax(&best_fitness_per_generation);
        EvolutionResult {
            best_weights: best_weights_per_generation[best_generation].clone(),
            best_fitness: best_fitness_per_generation[best_generation],
            best_generation,
            best_fitness_per_generation,
            average_fitness_per_generation,
            best_weights_per_generation,
            best_return_per_generation,
            best_volatility_per_generation,
        }
    }

    fn initialize_population(&mut self) -> Vec<Vec<f64>> {
        let assets = self.stats.num_assets();
        (0..self.config.population_size)
            .map(|_| {
                let raw: Vec<f64> = (&mut self.rng)
                    .sample_iter(rand::distributions::Uniform::new(0.0, 1.0))
                    .take(assets)
                    .collect();
                operators::normalize(&raw)
            })
            .collect()
    }

    /// Builds the next generation: the two fittest individuals are copied
    /// forward by value, the remaining slots are filled with validated
    /// offspring bred from the current population.
    fn breed_next_generation(
        &mut self,
        population: &[Vec<f64>],
        fitnesses: &[f64],
        generation: usize,
    ) -> Vec<Vec<f64>> {
        let mut ranking: Vec<usize> = (0..population.len()).collect();
        ranking.sort_by(|&a, &b| fitnesses[b].total_cmp(&fitnesses[a]));

        let mut next_generation: Vec<Vec<f64>> = ranking
            .iter()
            .take(ELITE_COUNT)
            .map(|&i| population[i].clone())
            .collect();

        let mutation_rate =
            (1.0 - generation as f64 / self.config.generations as f64).max(MUTATION_RATE_FLOOR);

        while next_generation.len() < self.config.population_size {
            next_generation.push(self.breed_offspring(population, fitnesses, mutation_rate));
        }
        next_generation
    }

    fn breed_offspring(
        &mut self,
        population: &[Vec<f64>],
        fitnesses: &[f64],
        mutation_rate: f64,
    ) -> Vec<f64> {
        let mut attempts = 0;
        loop {
            let parent_1 = self.tournament_selection(population, fitnesses);
            let parent_2 = self.tournament_selection(population, fitnesses);

            let child = operators::blend_crossover(&mut self.rng, parent_1, parent_2);
            let child = operators::mutate(&mut self.rng, &child, mutation_rate, &self.noise);

            if operators::is_valid(&child, self.config.min_weight, self.config.max_weight) {
                return child;
            }

            attempts += 1;
            if attempts >= self.config.max_feasibility_retries {
                warn!(
                    attempts,
                    "offspring kept failing feasibility, projecting onto bounds"
                );
                return operators::project_to_bounds(
                    &child,
                    self.config.min_weight,
                    self.config.max_weight,
                );
            }
        }
    }

    /// Tournament selection: draw `TOURNAMENT_SIZE` distinct individuals
    /// from the current population, keep the fittest.
    fn tournament_selection<'a>(
        &mut self,
        population: &'a [Vec<f64>],
        fitnesses: &[f64],
    ) -> &'a Vec<f64> {
        let contestants: Vec<usize> = (0..population.len())
            .collect::<Vec<usize>>()
            .choose_multiple(&mut self.rng, TOURNAMENT_SIZE)
            .copied()
            .collect();
        let winner = contestants
            .into_iter()
            .max_by(|&a, &b| fitnesses[a].total_cmp(&fitnesses[b]))
            .unwrap_or(0);
        &population[winner]
    }
}

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(i, _)| i)
        .unwrap_or(0)
}
