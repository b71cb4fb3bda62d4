use crate::data::Data;
use crate::error::Result;
use crate::individual::Individual;
use crate::knn::VotingPolicy;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::HashSet;
use std::fmt;

/// One generation of candidate feature subsets. Once evaluated, it is kept sorted by
/// decreasing fit.
#[derive(Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Population {
    pub individuals: Vec<Individual>,
}

impl Population {
    pub fn new() -> Population {
        Population {
            individuals: Vec::new(),
        }
    }

    /// populate the population with `population_size` random individuals of `n_features` bits
    pub fn generate(&mut self, population_size: usize, n_features: usize, rng: &mut ChaCha8Rng) {
        for _ in 0..population_size {
            self.individuals.push(Individual::random(n_features, rng))
        }
    }

    /// Computes the fit of every individual in parallel. Each task owns exactly one
    /// individual; the call returns once all of them are evaluated.
    pub fn fit(
        &mut self,
        training: &Data,
        testing: &Data,
        k: usize,
        vote: VotingPolicy,
    ) -> Result<()> {
        self.individuals
            .par_iter_mut()
            .try_for_each(|i| i.compute_fitness(training, testing, k, vote).map(|_| ()))
    }

    /// Sorts by decreasing fit; individuals of equal fit keep their relative order
    pub fn sort(mut self) -> Self {
        self.individuals.sort_by(|i, j| j.fit.total_cmp(&i.fit));
        self
    }

    pub fn best(&self) -> Option<&Individual> {
        self.individuals.first()
    }

    /// select the n first elements of a (sorted) population
    pub fn select_first(&self, n: usize) -> Population {
        Population {
            individuals: self.individuals.iter().take(n).cloned().collect(),
        }
    }

    /// Number of distinct genomes (hashes must be up to date)
    pub fn count_distinct(&self) -> usize {
        self.individuals
            .iter()
            .map(|i| i.hash)
            .collect::<HashSet<u64>>()
            .len()
    }

    /// Mean and standard deviation of the fits; the deviation is 0 below two individuals
    pub fn fit_stats(&self) -> (f64, f64) {
        if self.individuals.is_empty() {
            return (0.0, 0.0);
        }
        let fits: Vec<f64> = self.individuals.iter().map(|i| i.fit).collect();
        let mean = fits.iter().mean();
        let std = if fits.len() > 1 { fits.iter().std_dev() } else { 0.0 };
        (mean, std)
    }
}

impl fmt::Debug for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Population")
            .field("individuals", &self.individuals)
            .finish()
    }
}
