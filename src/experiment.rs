use crate::error::{GaKnnError, Result};
use crate::ga::GenerationSummary;
use crate::individual::Individual;
use crate::param::Param;
use crate::population::Population;
use crate::utils::strip_ansi_if_needed;
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Test accuracy of the best genome on one class
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ClassAccuracy {
    pub class: String,
    pub correct: usize,
    pub total: usize,
}

impl ClassAccuracy {
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

/// Complete experiment data and results
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Experiment {
    /// Experiment ID, i.e., save name and timestamp
    pub id: String,
    /// gaknn version and git hash used
    pub version: String,
    /// Timestamp of the experiment
    pub timestamp: String,
    /// Parameters used
    pub parameters: Param,

    pub feature_names: Vec<String>,
    pub train_samples: usize,
    pub test_samples: usize,

    /// Running best individual, None when no generation ran
    pub best: Option<Individual>,
    /// Per-class test accuracy of the best individual
    pub class_accuracy: Vec<ClassAccuracy>,
    /// One summary per generation, or only the last one when keep_trace is off
    pub history: Vec<GenerationSummary>,
    /// Last evaluated population, sorted by decreasing fit
    pub final_population: Population,

    /// Execution time in seconds
    pub execution_time: f64,
    /// Whether the run was stopped by a signal before its last generation
    pub interrupted: bool,
}

impl Experiment {
    /// Experiment identifier: stem of the save file (or "gaknn") followed by the timestamp
    pub fn build_id(save_exp: &str, timestamp: &str) -> String {
        let stem = Path::new(save_exp)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("gaknn");
        format!("{}_{}", stem, timestamp)
    }

    /// Names of the features selected by the best individual
    pub fn selected_feature_names(&self) -> Vec<String> {
        match &self.best {
            Some(best) => best
                .selected_features()
                .into_iter()
                .filter_map(|i| self.feature_names.get(i).cloned())
                .collect(),
            None => vec![],
        }
    }

    pub fn display_results(&self) -> String {
        let colorful = self.parameters.general.display_colorful;
        let mut text = String::new();
        text.push_str(&format!(
            "\n=============== Experiment {} ===============\n\n",
            self.id
        ));
        text.push_str(&format!("gaknn version: v{}\n", self.version));
        text.push_str(&format!("Timestamp: {}\n", self.timestamp));
        text.push_str(&format!("Execution time: {:.2}s\n", self.execution_time));
        text.push_str(&format!(
            "Data: {} training samples, {} testing samples, {} features\n",
            self.train_samples,
            self.test_samples,
            self.feature_names.len()
        ));
        text.push_str(&format!(
            "k-NN: k={} ({:?} vote)\n",
            self.parameters.knn.k, self.parameters.knn.vote
        ));
        text.push_str(&format!(
            "Generations: {}{}\n\n",
            self.history.last().map(|g| g.epoch).unwrap_or(0),
            if self.interrupted { " (interrupted)" } else { "" }
        ));

        match &self.best {
            None => text.push_str("No generation was evaluated: there is no best individual.\n"),
            Some(best) => {
                text.push_str(&format!(
                    "\x1b[1;92mBest fit: {:.4}\x1b[0m (reached at generation {})\n",
                    best.fit,
                    self.best_epoch().unwrap_or(0)
                ));
                text.push_str(&format!(
                    "Selected features: {} / {}\n",
                    best.n_selected,
                    best.genome.len()
                ));
                text.push_str(&format!("Genome: [{}]\n", best.genome_string()));
                text.push_str(&format!(
                    "Selected: \x1b[1;94m{}\x1b[0m\n",
                    self.selected_feature_names().join(", ")
                ));
                if !self.class_accuracy.is_empty() {
                    text.push_str("\nTest accuracy per class:\n");
                    for c in &self.class_accuracy {
                        text.push_str(&format!(
                            "  {:<16} {:>5} / {:<5} {:.4}\n",
                            c.class,
                            c.correct,
                            c.total,
                            c.accuracy()
                        ));
                    }
                }
            }
        }

        strip_ansi_if_needed(&text, colorful)
    }

    /// Generation at which the running best was last replaced
    pub fn best_epoch(&self) -> Option<usize> {
        self.history
            .iter()
            .filter(|g| g.improved)
            .map(|g| g.epoch)
            .last()
    }

    /// Saves the experiment in a suitable format based on file extension.
    pub fn save_auto<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        match extension(path).as_str() {
            "json" => self.save_json(path),
            "bin" | "bincode" => self.save_bincode(path),
            _ => {
                warn!("Unknown format. Saving experiment in json.");
                self.save_json(path.with_extension("json"))
            }
        }
    }

    /// Saves to JSON (human readable, but may have slight inaccuracies for decimal values)
    fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Saves as Bincode (compact binary, Rust-only)
    fn save_bincode<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let encoded = bincode::serialize(self)?;
        std::fs::write(path, encoded)?;
        Ok(())
    }

    /// Loads the experiment from a file, automatically detecting the format based on file
    /// extension.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the experiment file.
    ///
    /// # Returns
    ///
    /// Result containing the loaded Experiment or an error.
    pub fn load_auto<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match extension(path).as_str() {
            "json" => Self::load_json(path),
            "bin" | "bincode" => Self::load_bincode(path),
            _ => Self::load_with_fallback(path),
        }
    }

    fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let experiment: Experiment = serde_json::from_str(&content)?;
        Ok(experiment)
    }

    fn load_bincode<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let experiment: Experiment = bincode::deserialize(&bytes)?;
        Ok(experiment)
    }

    /// Tries Bincode, then JSON
    fn load_with_fallback<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Ok(experiment) = Self::load_bincode(path) {
            return Ok(experiment);
        }

        Self::load_json(path).map_err(|e| {
            GaKnnError::Config(format!(
                "unable to load the experiment {}: {}",
                path.display(),
                e
            ))
        })
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}
