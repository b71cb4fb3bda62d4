pub mod data;
pub mod error;
pub mod experiment;
pub mod ga;
pub mod individual;
pub mod knn;
pub mod param;
pub mod population;
pub mod utils;

use crate::experiment::{ClassAccuracy, Experiment};
use crate::ga::ga;
use chrono::Local;
use data::Data;
use error::Result;
use log::debug;
use param::Param;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Loads the training and testing sets named in `param` then runs the genetic algorithm
///
/// # Errors
///
/// Fails on unreadable or malformed datasets, on parameters that do not fit the data,
/// and on evaluation errors.
pub fn run(param: &Param, running: Arc<AtomicBool>) -> Result<Experiment> {
    let delimiter = param.delimiter_byte()?;

    // Load train data
    let mut train = Data::new();
    train.load_data(&param.data.train, delimiter, param.data.has_header)?;
    cinfo!(param.general.display_colorful, "\x1b[2;97m{:?}\x1b[0m", train);

    // Loading test data
    debug!("Loading test data...");
    let mut test = Data::new();
    test.load_data(&param.data.test, delimiter, param.data.has_header)?;
    cinfo!(param.general.display_colorful, "\x1b[2;97m{:?}\x1b[0m", test);

    run_on_data(&train, &test, param, running)
}

/// Runs the genetic algorithm on already loaded datasets and gathers the results
pub fn run_on_data(
    train: &Data,
    test: &Data,
    param: &Param,
    running: Arc<AtomicBool>,
) -> Result<Experiment> {
    let start = std::time::Instant::now();
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();

    let mut param = param.clone();
    param::validate(&mut param)?;
    param::validate_against_data(&param, train, test)?;

    let evolution = ga(train, test, &param, running)?;

    let class_accuracy = match &evolution.best {
        Some(best) => {
            knn::per_class_accuracy(&best.genome, train, test, param.knn.k, param.knn.vote)?
                .into_iter()
                .map(|(class, correct, total)| ClassAccuracy {
                    class,
                    correct,
                    total,
                })
                .collect()
        }
        None => vec![],
    };

    let exec_time = start.elapsed().as_secs_f64();

    Ok(Experiment {
        id: Experiment::build_id(&param.general.save_exp, &timestamp),
        version: utils::version(),
        timestamp,

        feature_names: train.features.clone(),
        train_samples: train.sample_len,
        test_samples: test.sample_len,

        best: evolution.best,
        class_accuracy,
        history: evolution.history,
        final_population: evolution.final_population,

        execution_time: exec_time,
        interrupted: evolution.interrupted,
        parameters: param,
    })
}
