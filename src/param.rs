use crate::data::Data as Dataset;
use crate::error::{GaKnnError, Result};
use crate::knn::VotingPolicy;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;

/// What to do when the population size is odd: truncation selection keeps ceil(size/2)
/// parents whose crossover yields one child too many
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[allow(non_camel_case_types)]
pub enum OddPopulation {
    /// drop the surplus last child
    truncate,
    /// refuse odd population sizes at validation
    reject,
}

// Field definitions and associated default values

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Param {
    #[serde(default)]
    pub general: General,
    #[serde(default)]
    pub data: Data,
    #[serde(default)]
    pub ga: GA,
    #[serde(default)]
    pub knn: KNN,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct General {
    #[serde(default = "seed_default")]
    pub seed: u64,
    #[serde(default = "uzero_default")]
    pub thread_number: usize,
    #[serde(default = "log_base_default")]
    pub log_base: String,
    #[serde(default = "log_suffix_default")]
    pub log_suffix: String,
    #[serde(default = "log_level_default")]
    pub log_level: String,
    #[serde(default = "true_default")]
    pub display_colorful: bool,
    #[serde(default = "true_default")]
    pub keep_trace: bool,
    #[serde(default = "empty_string")]
    pub save_exp: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Data {
    #[serde(default = "empty_string")]
    pub train: String,
    #[serde(default = "empty_string")]
    pub test: String,
    #[serde(default = "delimiter_default")]
    pub delimiter: char,
    #[serde(default = "false_default")]
    pub has_header: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GA {
    #[serde(default = "pop_size_default")]
    pub population_size: usize,
    #[serde(default = "uzero_default")]
    pub feature_number: usize,
    #[serde(default = "mutation_rate_default")]
    pub mutation_rate: f64,
    #[serde(default = "generations_default")]
    pub generations: usize,
    #[serde(default = "odd_population_default")]
    pub odd_population: OddPopulation,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct KNN {
    #[serde(default = "k_default")]
    pub k: usize,
    #[serde(default = "vote_default")]
    pub vote: VotingPolicy,
}

// Default section definitions

impl Default for General {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Data {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for GA {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for KNN {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Param {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Param {
    /// Delimiter as the byte expected by the CSV reader
    pub fn delimiter_byte(&self) -> Result<u8> {
        if self.data.delimiter.is_ascii() {
            Ok(self.data.delimiter as u8)
        } else {
            Err(GaKnnError::Config(format!(
                "delimiter '{}' must be an ASCII character",
                self.data.delimiter
            )))
        }
    }
}

pub fn get(param_file: String) -> Result<Param> {
    let param_file_reader = File::open(param_file)?;
    let param_reader = BufReader::new(param_file_reader);

    let mut config: Param = serde_yaml::from_reader(param_reader)?;

    validate(&mut config)?;

    Ok(config)
}

/// Checks the parameter ranges that do not depend on the datasets
pub fn validate(param: &mut Param) -> Result<()> {
    if param.general.log_base.len() > 0 {
        param.general.display_colorful = false;
    }

    if param.ga.population_size == 0 {
        return Err(GaKnnError::Config(
            "population_size must be greater than 0".to_string(),
        ));
    }

    if param.ga.population_size % 2 == 1 {
        match param.ga.odd_population {
            OddPopulation::reject => {
                return Err(GaKnnError::Config(format!(
                    "population_size={} is odd and odd_population is set to reject",
                    param.ga.population_size
                )))
            }
            OddPopulation::truncate => warn!(
                "population_size={} is odd: the last child of each generation will be dropped.",
                param.ga.population_size
            ),
        }
    }

    if !(0.0..=1.0).contains(&param.ga.mutation_rate) {
        return Err(GaKnnError::Config(format!(
            "Invalid mutation_rate={:.3}. Must be in range [0, 1].",
            param.ga.mutation_rate
        )));
    }

    if param.knn.k == 0 {
        return Err(GaKnnError::Config("k must be at least 1".to_string()));
    }

    if param.knn.vote == VotingPolicy::Nearest && param.knn.k > 1 {
        warn!(
            "k={} is ignored by the nearest voting policy, which always uses a single neighbour.",
            param.knn.k
        );
    }

    if param.ga.generations == 0 {
        warn!("generations=0: no individual will be evaluated.");
    }

    param.delimiter_byte()?;

    Ok(())
}

/// Checks the parameters that depend on the loaded training and testing sets
pub fn validate_against_data(param: &Param, train: &Dataset, test: &Dataset) -> Result<()> {
    train.check_not_empty("training")?;
    test.check_not_empty("testing")?;

    if !train.check_compatibility(test) {
        return Err(GaKnnError::Config(format!(
            "training set has {} features but testing set has {}",
            train.feature_len, test.feature_len
        )));
    }

    if param.ga.feature_number != 0 && param.ga.feature_number != train.feature_len {
        return Err(GaKnnError::Config(format!(
            "feature_number={} does not match the {} features of the datasets",
            param.ga.feature_number, train.feature_len
        )));
    }

    if param.knn.k > train.sample_len {
        return Err(GaKnnError::Config(format!(
            "k={} exceeds the {} training samples",
            param.knn.k, train.sample_len
        )));
    }

    Ok(())
}

// Default value definitions

fn seed_default() -> u64 {
    4815162342
}
fn empty_string() -> String {
    "".to_string()
}
fn log_base_default() -> String {
    "".to_string()
}
fn log_suffix_default() -> String {
    "log".to_string()
}
fn log_level_default() -> String {
    "info".to_string()
}
fn delimiter_default() -> char {
    ','
}
fn false_default() -> bool {
    false
}
fn true_default() -> bool {
    true
}
fn uzero_default() -> usize {
    0
}
fn pop_size_default() -> usize {
    100
}
fn mutation_rate_default() -> f64 {
    0.01
}
fn generations_default() -> usize {
    500
}
fn odd_population_default() -> OddPopulation {
    OddPopulation::truncate
}
fn k_default() -> usize {
    1
}
fn vote_default() -> VotingPolicy {
    VotingPolicy::Nearest
}
