//! Single-objective minimizing evolutionary search over per-period control
//! modes.
//!
//! Intentionally small: random/heuristic population, tournament selection,
//! integer-vector crossover and mutation, deadline-based termination. The
//! seeded population already guarantees a cost floor at the all-BALANCING
//! candidate; the search only has to improve on it within the budget.

use std::time::{Duration, Instant};

use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

use crate::domain::ControlMode;
use crate::optimizer::params::{params_are_valid, Params};
use crate::optimizer::seeder::seed_candidates;
use crate::simulator::{total_cost, ScheduleCandidate};

/// Tuning knobs of the search. Defaults are deliberately conservative; the
/// deadline is the only stopping rule.
#[derive(Debug, Clone, Copy)]
pub struct SearchSettings {
    pub population_size: usize,
    pub tournament_size: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            population_size: 32,
            tournament_size: 3,
        }
    }
}

/// A genotype: one state index per period, indexing into `params.states`.
type Genotype = Vec<u8>;

/// Runs the search until `budget` elapses and returns the best candidate
/// found.
///
/// Degenerate params skip the search entirely and fall back to
/// all-BALANCING. A candidate replaces the incumbent only on strictly lower
/// cost, so the earliest seed wins all cost ties; re-running the optimizer
/// can never regress to a worse-but-equal-cost schedule.
pub fn run_search(
    params: &Params,
    budget: Duration,
    settings: SearchSettings,
    rng: &mut StdRng,
) -> ScheduleCandidate {
    let n = params.number_of_periods();
    let all_balancing = vec![ControlMode::Balancing; n];
    if !params_are_valid(params) {
        return all_balancing;
    }

    let deadline = Instant::now() + budget;
    let state_count = params.states.len() as u8;

    let mut population: Vec<Genotype> = seed_candidates(params)
        .iter()
        .map(|candidate| to_genotype(params, candidate))
        .collect();
    while population.len() < settings.population_size {
        population.push((0..n).map(|_| rng.gen_range(0..state_count)).collect());
    }

    let mut fitness: Vec<f64> = population
        .iter()
        .map(|g| total_cost(params, &to_candidate(params, g)))
        .collect();

    let (mut best, mut best_cost) = incumbent(&population, &fitness);
    let mut generations = 0u64;

    while Instant::now() < deadline {
        let mut next: Vec<Genotype> = Vec::with_capacity(population.len());
        // elitism: the incumbent always survives
        next.push(best.clone());
        while next.len() < population.len() {
            let a = tournament(&population, &fitness, settings.tournament_size, rng);
            let b = tournament(&population, &fitness, settings.tournament_size, rng);
            let mut child = crossover(a, b, rng);
            mutate(&mut child, state_count, rng);
            next.push(child);
        }
        population = next;
        fitness = population
            .iter()
            .map(|g| total_cost(params, &to_candidate(params, g)))
            .collect();

        let (generation_best, generation_cost) = incumbent(&population, &fitness);
        if generation_cost < best_cost {
            best = generation_best;
            best_cost = generation_cost;
        }
        generations += 1;
    }

    debug!(generations, best_cost, "search finished");
    to_candidate(params, &best)
}

/// The strictly cheapest genotype of a population; earlier entries win ties.
fn incumbent(population: &[Genotype], fitness: &[f64]) -> (Genotype, f64) {
    let mut best = 0;
    for i in 1..population.len() {
        if fitness[i] < fitness[best] {
            best = i;
        }
    }
    (population[best].clone(), fitness[best])
}

fn tournament<'a>(
    population: &'a [Genotype],
    fitness: &[f64],
    size: usize,
    rng: &mut StdRng,
) -> &'a Genotype {
    let mut winner = rng.gen_range(0..population.len());
    for _ in 1..size {
        let challenger = rng.gen_range(0..population.len());
        if OrderedFloat(fitness[challenger]) < OrderedFloat(fitness[winner]) {
            winner = challenger;
        }
    }
    &population[winner]
}

/// Single-point crossover.
fn crossover(a: &Genotype, b: &Genotype, rng: &mut StdRng) -> Genotype {
    if a.len() < 2 {
        return a.clone();
    }
    let point = rng.gen_range(1..a.len());
    a[..point].iter().chain(&b[point..]).copied().collect()
}

/// Per-gene mutation with an expected one flip per child.
fn mutate(genotype: &mut Genotype, state_count: u8, rng: &mut StdRng) {
    let rate = 1.0 / genotype.len().max(1) as f64;
    for gene in genotype.iter_mut() {
        if rng.gen_bool(rate) {
            *gene = rng.gen_range(0..state_count);
        }
    }
}

fn to_genotype(params: &Params, candidate: &[ControlMode]) -> Genotype {
    candidate
        .iter()
        .map(|mode| {
            params
                .states
                .iter()
                .position(|s| s == mode)
                .unwrap_or(0) as u8
        })
        .collect()
}

fn to_candidate(params: &Params, genotype: &Genotype) -> ScheduleCandidate {
    genotype
        .iter()
        .map(|i| params.states[*i as usize % params.states.len()])
        .collect()
}
