use crate::data::{selected_indices, Data};
use crate::error::Result;
use crate::knn::{evaluate_accuracy, VotingPolicy};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Candidate feature subset and its fitness
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Individual {
    /// Feature mask, bit i set means feature i takes part in distance computations
    pub genome: Vec<bool>,
    /// Number of selected features
    pub n_selected: usize,

    /// Testing accuracy of the masked k-NN classifier, 0 until evaluated
    pub fit: f64,

    /// Generation that produced the individual
    pub epoch: usize,
    /// Parents of the individual when born from a crossover
    pub parents: Option<Vec<u64>>,

    /// Identifier hash of the genome
    pub hash: u64,
}

impl Individual {
    /// Creates an Individual of `n_features` unselected features
    ///
    /// # Examples
    ///
    /// ```
    /// # use gaknn::individual::Individual;
    /// let individual = Individual::new(4);
    /// assert_eq!(individual.genome, vec![false; 4]);
    /// assert_eq!(individual.fit, 0.0);
    /// ```
    pub fn new(n_features: usize) -> Individual {
        Individual::from_genome(vec![false; n_features])
    }

    /// Creates an unevaluated Individual carrying `genome`
    pub fn from_genome(genome: Vec<bool>) -> Individual {
        let mut i = Individual {
            genome,
            n_selected: 0,
            fit: 0.0,
            epoch: 0,
            parents: None,
            hash: 0,
        };
        i.count_selected();
        i.compute_hash();
        i
    }

    /// Generates an Individual whose bits are independently set with probability 0.5
    ///
    /// # Examples
    ///
    /// ```
    /// # use gaknn::individual::Individual;
    /// # use rand_chacha::ChaCha8Rng;
    /// # use rand::SeedableRng;
    /// let mut rng = ChaCha8Rng::seed_from_u64(42);
    /// let individual = Individual::random(10, &mut rng);
    /// assert_eq!(individual.genome.len(), 10);
    /// ```
    pub fn random(n_features: usize, rng: &mut ChaCha8Rng) -> Individual {
        Individual::from_genome((0..n_features).map(|_| rng.gen_bool(0.5)).collect())
    }

    /// Creates a child carrying `genome`, remembering the hashes of its two parents
    pub fn child(genome: Vec<bool>, p1: &Individual, p2: &Individual) -> Individual {
        let mut i = Individual::from_genome(genome);
        i.parents = Some(vec![p1.hash, p2.hash]);
        i
    }

    /// Hashes the genome so that identical masks share the same hash
    pub fn compute_hash(&mut self) {
        let mut hasher = DefaultHasher::new();
        self.genome.hash(&mut hasher);
        self.hash = hasher.finish();
    }

    pub fn count_selected(&mut self) {
        self.n_selected = self.genome.iter().filter(|bit| **bit).count();
    }

    /// Indices of the selected features
    pub fn selected_features(&self) -> Vec<usize> {
        selected_indices(&self.genome)
    }

    /// Computes the testing accuracy of the k-NN classifier restricted to this genome,
    /// stores it as the fit and returns it
    ///
    /// # Arguments
    ///
    /// * `training` - Samples the neighbours are searched in
    /// * `testing` - Samples whose labels are predicted
    /// * `k` - Number of neighbours taking part in the vote
    /// * `vote` - Voting policy
    ///
    /// # Errors
    ///
    /// Propagates `DimensionMismatch` and `EmptyDataset` from the classifier.
    pub fn compute_fitness(
        &mut self,
        training: &Data,
        testing: &Data,
        k: usize,
        vote: VotingPolicy,
    ) -> Result<f64> {
        self.fit = evaluate_accuracy(&self.genome, training, testing, k, vote)?;
        Ok(self.fit)
    }

    /// Genome as a comma separated list of 0 and 1
    pub fn genome_string(&self) -> String {
        self.genome
            .iter()
            .map(|bit| if *bit { "1" } else { "0" })
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Human-readable summary of the Individual, naming the selected features of `data`
    pub fn display(&self, data: &Data) -> String {
        let names = data.selected_feature_names(&self.genome);
        let names_display = if names.len() > 20 {
            format!("{}, ... ({} more)", names[..20].join(", "), names.len() - 20)
        } else {
            names.join(", ")
        };
        format!(
            "fit {:.4} | {} / {} features | epoch {}\ngenome: [{}]\nselected: {}",
            self.fit,
            self.n_selected,
            self.genome.len(),
            self.epoch,
            self.genome_string(),
            names_display
        )
    }
}

impl fmt::Debug for Individual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Individual {{ fit: {:.4}, n_selected: {}, epoch: {}, genome: [{}] }}",
            self.fit,
            self.n_selected,
            self.epoch,
            self.genome_string()
        )
    }
}
