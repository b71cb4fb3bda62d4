use crate::cinfo;
use crate::data::Data;
use crate::error::Result;
use crate::individual::Individual;
use crate::param::Param;
use crate::population::Population;
use crate::utils::{display_epoch, display_epoch_legend};
use log::{debug, info, warn};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// What happened during one generation
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct GenerationSummary {
    pub epoch: usize,
    /// best fit of this generation
    pub best_fit: f64,
    pub mean_fit: f64,
    pub std_fit: f64,
    /// best fit seen since the start of the run
    pub best_so_far: f64,
    /// number of features selected by the generation's best individual
    pub n_selected: usize,
    /// number of distinct genomes in the generation
    pub distinct: usize,
    /// whether the running best was replaced during this generation
    pub improved: bool,
    /// seconds spent evaluating the generation
    pub duration: f64,
}

// timings differ between identical runs, so they take no part in the comparison
impl PartialEq for GenerationSummary {
    fn eq(&self, other: &Self) -> bool {
        self.epoch == other.epoch
            && self.best_fit == other.best_fit
            && self.mean_fit == other.mean_fit
            && self.std_fit == other.std_fit
            && self.best_so_far == other.best_so_far
            && self.n_selected == other.n_selected
            && self.distinct == other.distinct
            && self.improved == other.improved
    }
}

/// Outcome of a genetic algorithm run
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Evolution {
    /// Running best individual, None when no generation was evaluated
    pub best: Option<Individual>,
    pub history: Vec<GenerationSummary>,
    /// Last evaluated population, sorted by decreasing fit
    pub final_population: Population,
    pub interrupted: bool,
}

//-----------------------------------------------------------------------------
// Genetic Algorithm core functions
//-----------------------------------------------------------------------------

/// Main function to run the genetic algorithm
///
/// # Arguments
///
/// * `training` - Samples the k-NN classifier searches neighbours in.
/// * `testing` - Samples whose classification accuracy is the fitness.
/// * `param` - Parameters for the genetic algorithm.
/// * `running` - Cleared to stop the run after the current generation.
///
/// # Returns
///
/// The running best individual with the per-generation trace.
///
/// # Errors
///
/// Fails when the thread pool cannot be built or when an evaluation fails.
pub fn ga(
    training: &Data,
    testing: &Data,
    param: &Param,
    running: Arc<AtomicBool>,
) -> Result<Evolution> {
    let time = Instant::now();

    let n_features = if param.ga.feature_number > 0 {
        param.ga.feature_number
    } else {
        training.feature_len
    };

    let pool = ThreadPoolBuilder::new()
        .num_threads(param.general.thread_number)
        .build()?;
    debug!("Fitness evaluated on {} threads", pool.current_num_threads());

    let mut rng = ChaCha8Rng::seed_from_u64(param.general.seed);

    let base_pop = generate_pop(param.ga.population_size, n_features, &mut rng);

    info!(
        "Population size: {}, genome length {}, mutation rate {}, k {} ({:?} vote)",
        base_pop.individuals.len(),
        n_features,
        param.ga.mutation_rate,
        param.knn.k,
        param.knn.vote
    );

    cinfo!(param.general.display_colorful, "{}", display_epoch_legend());

    let evolution =
        pool.install(|| {
            iterative_evolution(base_pop, training, testing, param, running, &mut rng)
        })?;

    let elapsed = time.elapsed();
    info!(
        "Genetic algorithm computed {:?} generations in {:.2?}",
        evolution.history.last().map(|g| g.epoch).unwrap_or(0),
        elapsed
    );

    Ok(evolution)
}

/// Generate the initial population: `size` individuals of `n_features` fair random bits
pub fn generate_pop(size: usize, n_features: usize, rng: &mut ChaCha8Rng) -> Population {
    let mut pop = Population::new();
    pop.generate(size, n_features, rng);
    pop
}

/// Evaluate every individual in parallel, then sort by decreasing fit.
/// The generation's best individual is the first one of the returned population.
pub fn evaluate_generation(
    mut pop: Population,
    training: &Data,
    testing: &Data,
    param: &Param,
) -> Result<Population> {
    debug!("Fitting population...");
    pop.fit(training, testing, param.knn.k, param.knn.vote)?;
    Ok(pop.sort())
}

/// Run the generations: evaluate, record the best, then breed the next population
///
/// # Arguments
///
/// * `base_pop` - The initial population to start the evolution.
/// * `training` - Samples the k-NN classifier searches neighbours in.
/// * `testing` - Samples whose classification accuracy is the fitness.
/// * `param` - Parameters for the genetic algorithm.
/// * `running` - Cleared to stop the run after the current generation.
/// * `rng` - Random number generator.
pub fn iterative_evolution(
    base_pop: Population,
    training: &Data,
    testing: &Data,
    param: &Param,
    running: Arc<AtomicBool>,
    rng: &mut ChaCha8Rng,
) -> Result<Evolution> {
    let mut pop = base_pop;
    let mut best: Option<Individual> = None;
    let mut history: Vec<GenerationSummary> = vec![];
    let mut interrupted = false;

    for epoch in 1..=param.ga.generations {
        let generation_time = Instant::now();
        pop = evaluate_generation(pop, training, testing, param)?;

        let generation_best = match pop.best() {
            Some(i) => i.clone(),
            None => break,
        };

        let improved = match &best {
            Some(b) => generation_best.fit > b.fit,
            None => true,
        };
        if improved {
            cinfo!(
                param.general.display_colorful,
                "\x1b[1;92mNew best individual\x1b[0m\n{}",
                generation_best.display(training)
            );
            best = Some(generation_best.clone());
        }

        let (mean_fit, std_fit) = pop.fit_stats();
        let summary = GenerationSummary {
            epoch,
            best_fit: generation_best.fit,
            mean_fit,
            std_fit,
            best_so_far: best.as_ref().map(|b| b.fit).unwrap_or(0.0),
            n_selected: generation_best.n_selected,
            distinct: pop.count_distinct(),
            improved,
            duration: generation_time.elapsed().as_secs_f64(),
        };

        cinfo!(param.general.display_colorful, "{}", display_epoch(&summary));

        if param.general.keep_trace || epoch == param.ga.generations {
            history.push(summary);
        } else {
            history = vec![summary];
        }

        if !running.load(Ordering::Relaxed) {
            warn!("Signal received: stopping after generation {}", epoch);
            interrupted = true;
            break;
        }

        if epoch == param.ga.generations {
            break;
        }

        pop = evolve(&pop, param, epoch, rng);
    }

    Ok(Evolution {
        best,
        history,
        final_population: pop,
        interrupted,
    })
}

/// Run one breeding step: truncation selection, cross-over, mutation
///
/// # Arguments
///
/// * `pop` - The evaluated population, sorted by decreasing fit.
/// * `param` - Parameters for the genetic algorithm.
/// * `epoch` - The current generation number.
/// * `rng` - Random number generator.
///
/// # Returns
///
/// The next generation, of `param.ga.population_size` unevaluated individuals.
pub fn evolve(pop: &Population, param: &Param, epoch: usize, rng: &mut ChaCha8Rng) -> Population {
    let parents = select_parents(pop);

    let mut children = cross_over(&parents, rng);
    if children.individuals.len() > param.ga.population_size {
        debug!(
            "Dropping {} surplus children",
            children.individuals.len() - param.ga.population_size
        );
        children.individuals.truncate(param.ga.population_size);
    }

    let mut next = mutate(&children, param.ga.mutation_rate, rng);
    for i in next.individuals.iter_mut() {
        i.epoch = epoch;
    }

    next
}

/// Truncation selection: keeps the best ceil(size/2) individuals of a sorted population
pub fn select_parents(pop: &Population) -> Population {
    pop.select_first((pop.individuals.len() + 1) / 2)
}

/// Single point cross-over. For each parent slot, two parents are drawn with replacement
/// and a split point in [0, genome length) is drawn; the pair yields two complementary
/// children, so twice as many children as parents are produced.
///
/// # Arguments
///
/// * `parents` - The population of parents to crossover.
/// * `rng` - Random number generator.
pub fn cross_over(parents: &Population, rng: &mut ChaCha8Rng) -> Population {
    let mut children = Population::new();
    let n = parents.individuals.len();
    if n == 0 {
        return children;
    }

    for _ in 0..n {
        let p1 = &parents.individuals[rng.gen_range(0..n)];
        let p2 = &parents.individuals[rng.gen_range(0..n)];

        let genome_len = p1.genome.len();
        let split = if genome_len > 0 {
            rng.gen_range(0..genome_len)
        } else {
            0
        };

        let (genome1, genome2) = splice(&p1.genome, &p2.genome, split);
        children.individuals.push(Individual::child(genome1, p1, p2));
        children.individuals.push(Individual::child(genome2, p2, p1));
    }
    children
}

/// Complementary children of a split at `split`: the first takes bits 0..=split from
/// `a` and the rest from `b`, the second the other way round
pub fn splice(a: &[bool], b: &[bool], split: usize) -> (Vec<bool>, Vec<bool>) {
    let cut = (split + 1).min(a.len()).min(b.len());
    let child1 = a[..cut].iter().chain(b[cut..].iter()).copied().collect();
    let child2 = b[..cut].iter().chain(a[cut..].iter()).copied().collect();
    (child1, child2)
}

/// Flip every bit of every individual independently with probability `mutation_rate`.
/// Returns a new unevaluated population; the input is left untouched.
pub fn mutate(pop: &Population, mutation_rate: f64, rng: &mut ChaCha8Rng) -> Population {
    let mut mutated = Population::new();
    for individual in &pop.individuals {
        let genome = individual
            .genome
            .iter()
            .map(|bit| if rng.gen::<f64>() < mutation_rate { !bit } else { *bit })
            .collect();
        let mut m = Individual::from_genome(genome);
        m.parents = individual.parents.clone();
        m.epoch = individual.epoch;
        mutated.individuals.push(m);
    }
    mutated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Row;
    use crate::knn::VotingPolicy;

    fn bits(v: &[u8]) -> Vec<bool> {
        v.iter().map(|b| *b == 1).collect()
    }

    /// Helper function to create a population of given genomes with decreasing fit
    fn create_test_population(genomes: &[Vec<bool>]) -> Population {
        let mut pop = Population::new();
        for (n, g) in genomes.iter().enumerate() {
            let mut ind = Individual::from_genome(g.clone());
            ind.fit = 1.0 - n as f64 / genomes.len() as f64;
            pop.individuals.push(ind);
        }
        pop
    }

    fn random_population(size: usize, n: usize, seed: u64) -> Population {
        generate_pop(size, n, &mut ChaCha8Rng::seed_from_u64(seed))
    }

    /// Two classes separable on feature 0, feature 1 is noise
    fn separable_data() -> Data {
        Data::from_rows(vec![
            Row::new(vec![0.0, 3.0], "a"),
            Row::new(vec![0.5, -3.0], "a"),
            Row::new(vec![6.0, 2.5], "b"),
            Row::new(vec![6.5, -2.0], "b"),
        ])
        .unwrap()
    }

    fn create_test_params(population_size: usize, generations: usize) -> Param {
        let mut param = Param::default();
        param.general.seed = 42;
        param.general.display_colorful = false;
        param.ga.population_size = population_size;
        param.ga.generations = generations;
        param.ga.mutation_rate = 0.1;
        param.knn.k = 1;
        param.knn.vote = VotingPolicy::Nearest;
        param
    }

    #[test]
    fn test_generate_pop() {
        let pop = random_population(12, 9, 42);
        assert_eq!(pop.individuals.len(), 12);
        assert!(pop.individuals.iter().all(|i| i.genome.len() == 9 && i.fit == 0.0));
    }

    #[test]
    fn test_select_parents_even_and_odd() {
        let pop = create_test_population(&vec![bits(&[1, 0]); 6]);
        let parents = select_parents(&pop);
        assert_eq!(parents.individuals.len(), 3);
        assert_eq!(
            parents.individuals[0].fit,
            pop.individuals[0].fit,
            "selection should keep the best individuals first"
        );

        let odd = create_test_population(&vec![bits(&[1, 0]); 7]);
        assert_eq!(
            select_parents(&odd).individuals.len(),
            4,
            "odd sizes keep ceil(size/2) parents"
        );

        let single = create_test_population(&[bits(&[1])]);
        assert_eq!(select_parents(&single).individuals.len(), 1);
    }

    #[test]
    fn test_splice_literal_example() {
        let (child1, child2) = splice(&bits(&[1, 1, 0, 0]), &bits(&[0, 0, 1, 1]), 1);
        assert_eq!(child1, bits(&[1, 1, 1, 1]));
        assert_eq!(child2, bits(&[0, 0, 0, 0]));
    }

    #[test]
    fn test_splice_edges() {
        let a = bits(&[1, 0, 1]);
        let b = bits(&[0, 1, 0]);
        let (c1, c2) = splice(&a, &b, 0);
        assert_eq!(c1, bits(&[1, 1, 0]));
        assert_eq!(c2, bits(&[0, 0, 1]));
        let (c1, c2) = splice(&a, &b, 2);
        assert_eq!(c1, a, "splitting on the last bit copies the first parent");
        assert_eq!(c2, b);
    }

    #[test]
    fn test_cross_over_size_and_shape() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let parents = random_population(5, 16, 1);
        let children = cross_over(&parents, &mut rng);

        assert_eq!(
            children.individuals.len(),
            10,
            "cross-over should produce two children per parent"
        );
        for child in &children.individuals {
            assert_eq!(child.genome.len(), 16);
            assert_eq!(child.fit, 0.0, "children should not be evaluated");
            assert_eq!(
                child.parents.as_ref().map(|p| p.len()),
                Some(2),
                "child should know its two parents"
            );
        }
        assert!(cross_over(&Population::new(), &mut rng).individuals.is_empty());
    }

    #[test]
    fn test_cross_over_children_are_complementary() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let parents =
            create_test_population(&[bits(&[1, 1, 1, 1, 1, 1]), bits(&[0, 0, 0, 0, 0, 0])]);
        let children = cross_over(&parents, &mut rng);

        for pair in children.individuals.chunks(2) {
            let (c1, c2) = (&pair[0].genome, &pair[1].genome);
            let mixed_parents = c1.iter().zip(c2.iter()).any(|(x, y)| x != y);
            if mixed_parents {
                assert!(
                    c1.iter().zip(c2.iter()).all(|(x, y)| x != y),
                    "children of opposite parents should be complements"
                );
            } else {
                assert_eq!(c1, c2, "a parent crossed with itself yields two copies");
            }
            // every child is a prefix of one parent followed by a suffix of the other
            let switches = c1.windows(2).filter(|w| w[0] != w[1]).count();
            assert!(switches <= 1);
        }
    }

    #[test]
    fn test_cross_over_reproducible() {
        let parents = random_population(6, 10, 3);
        let a = cross_over(&parents, &mut ChaCha8Rng::seed_from_u64(9));
        let b = cross_over(&parents, &mut ChaCha8Rng::seed_from_u64(9));
        assert_eq!(a, b, "same seed should give the same children");
    }

    #[test]
    fn test_mutate_zero_rate_is_identity() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let pop = random_population(8, 20, 5);
        let mutated = mutate(&pop, 0.0, &mut rng);
        for (m, o) in mutated.individuals.iter().zip(pop.individuals.iter()) {
            assert_eq!(m.genome, o.genome, "mutation rate 0 should not flip any bit");
        }
    }

    #[test]
    fn test_mutate_full_rate_is_complement() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let pop = random_population(8, 20, 5);
        let mutated = mutate(&pop, 1.0, &mut rng);
        assert_eq!(mutated.individuals.len(), pop.individuals.len());
        for (m, o) in mutated.individuals.iter().zip(pop.individuals.iter()) {
            let complement: Vec<bool> = o.genome.iter().map(|b| !b).collect();
            assert_eq!(m.genome, complement, "mutation rate 1 should flip every bit");
        }
    }

    #[test]
    fn test_mutate_leaves_input_untouched() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut pop = random_population(4, 10, 5);
        pop.individuals[0].fit = 0.75;
        let before = pop.clone();
        let mutated = mutate(&pop, 0.5, &mut rng);
        assert_eq!(pop, before, "mutate() should not modify its input");
        assert!(
            mutated.individuals.iter().all(|i| i.fit == 0.0),
            "mutated individuals are unevaluated"
        );
    }

    #[test]
    fn test_mutate_rate_is_respected() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let pop = Population {
            individuals: vec![Individual::new(10_000)],
        };
        let flipped = mutate(&pop, 0.1, &mut rng).individuals[0].n_selected;
        assert!(
            (800..1200).contains(&flipped),
            "about 10% of the bits should flip, got {}",
            flipped
        );
    }

    #[test]
    fn test_evolve_keeps_population_size() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for size in [1, 2, 5, 10, 11] {
            let param = create_test_params(size, 1);
            let pop = random_population(size, 6, 1);
            let next = evolve(&pop, &param, 3, &mut rng);
            assert_eq!(
                next.individuals.len(),
                size,
                "population size should be invariant (size {})",
                size
            );
            assert!(
                next.individuals.iter().all(|i| i.genome.len() == 6 && i.fit == 0.0 && i.epoch == 3)
            );
        }
    }

    #[test]
    fn test_evaluate_generation_sorts() {
        let data = separable_data();
        let param = create_test_params(8, 1);
        let pop = random_population(8, 2, 11);
        let evaluated = evaluate_generation(pop, &data, &data, &param).unwrap();
        for w in evaluated.individuals.windows(2) {
            assert!(w[0].fit >= w[1].fit, "population should be sorted by decreasing fit");
        }
    }

    #[test]
    fn test_ga_single_generation_best_dominates_initial_population() {
        let data = separable_data();
        let param = create_test_params(4, 1);

        let evolution = ga(&data, &data, &param, Arc::new(AtomicBool::new(true))).unwrap();
        let best = evolution.best.expect("one generation should produce a best individual");

        // rebuild the initial population from the same seed
        let mut initial = generate_pop(4, 2, &mut ChaCha8Rng::seed_from_u64(42));
        initial.fit(&data, &data, 1, VotingPolicy::Nearest).unwrap();
        let initial_max = initial.individuals.iter().map(|i| i.fit).fold(0.0, f64::max);

        assert!(initial.individuals.iter().any(|i| best.fit >= i.fit));
        assert_eq!(
            best.fit,
            initial_max,
            "after one generation the best is the best initial individual"
        );
        assert_eq!(evolution.history.len(), 1);
        assert_eq!(evolution.final_population.individuals.len(), 4);
        assert!(!evolution.interrupted);
    }

    #[test]
    fn test_ga_running_best_never_decreases() {
        let data = separable_data();
        let param = create_test_params(6, 15);
        let evolution = ga(&data, &data, &param, Arc::new(AtomicBool::new(true))).unwrap();

        assert_eq!(evolution.history.len(), 15, "keep_trace should keep every generation");
        for w in evolution.history.windows(2) {
            assert!(w[1].best_so_far >= w[0].best_so_far, "running best should never decrease");
        }
        let best = evolution.best.unwrap();
        assert_eq!(best.fit, evolution.history.last().unwrap().best_so_far);
        assert!(evolution.history.iter().all(|g| g.best_fit <= best.fit));
        assert!(evolution.history[0].improved, "the first generation always establishes the best");
    }

    #[test]
    fn test_ga_records_generation_durations() {
        let data = separable_data();
        let param = create_test_params(6, 4);
        let evolution = ga(&data, &data, &param, Arc::new(AtomicBool::new(true))).unwrap();
        assert!(evolution.history.iter().all(|g| g.duration >= 0.0 && g.duration.is_finite()));

        let mut slower = evolution.history[0].clone();
        slower.duration += 10.0;
        assert_eq!(
            slower,
            evolution.history[0],
            "durations should not make identical generations differ"
        );
    }

    #[test]
    fn test_ga_is_reproducible_across_thread_counts() {
        let data = separable_data();
        let mut param = create_test_params(10, 5);
        param.general.thread_number = 1;
        let a = ga(&data, &data, &param, Arc::new(AtomicBool::new(true))).unwrap();
        param.general.thread_number = 4;
        let b = ga(&data, &data, &param, Arc::new(AtomicBool::new(true))).unwrap();
        assert_eq!(a, b, "results should not depend on the number of threads");
    }

    #[test]
    fn test_ga_zero_generations() {
        let data = separable_data();
        let param = create_test_params(4, 0);
        let evolution = ga(&data, &data, &param, Arc::new(AtomicBool::new(true))).unwrap();
        assert!(evolution.best.is_none());
        assert!(evolution.history.is_empty());
        assert_eq!(evolution.final_population.individuals.len(), 4);
    }

    #[test]
    fn test_ga_stops_when_signalled() {
        let data = separable_data();
        let param = create_test_params(4, 50);
        let evolution = ga(&data, &data, &param, Arc::new(AtomicBool::new(false))).unwrap();
        assert!(evolution.interrupted);
        assert_eq!(evolution.history.len(), 1, "the current generation completes before stopping");
        assert!(evolution.best.is_some());
    }

    #[test]
    fn test_ga_without_trace_keeps_last_generation() {
        let data = separable_data();
        let mut param = create_test_params(4, 6);
        param.general.keep_trace = false;
        let evolution = ga(&data, &data, &param, Arc::new(AtomicBool::new(true))).unwrap();
        assert_eq!(evolution.history.len(), 1);
        assert_eq!(evolution.history[0].epoch, 6);
    }
}
