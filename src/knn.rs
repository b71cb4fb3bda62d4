use crate::data::{Data, MaskedView};
use crate::error::{GaKnnError, Result};
use serde::{Deserialize, Serialize};

/// How the k nearest training samples elect a label
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub enum VotingPolicy {
    /// Label of the single closest training sample (k is forced to 1)
    Nearest,
    /// Most frequent label among the k closest samples. Equal counts are resolved in
    /// favour of the label met first when walking the neighbours from nearest to farthest.
    Majority,
}

impl VotingPolicy {
    pub fn effective_k(&self, k: usize) -> usize {
        match self {
            VotingPolicy::Nearest => 1,
            VotingPolicy::Majority => k,
        }
    }
}

/// Euclidean distance between `a` and `b` restricted to the dimensions where `mask` is set
///
/// # Errors
///
/// `DimensionMismatch` if either vector length differs from the mask length.
pub fn distance(mask: &[bool], a: &[f64], b: &[f64]) -> Result<f64> {
    for v in [a, b] {
        if v.len() != mask.len() {
            return Err(GaKnnError::DimensionMismatch {
                expected: mask.len(),
                found: v.len(),
            });
        }
    }

    Ok(mask
        .iter()
        .zip(a.iter().zip(b.iter()))
        .filter(|(selected, _)| **selected)
        .map(|(_, (x, y))| (x - y).powi(2))
        .sum::<f64>()
        .sqrt())
}

/// Predict the label of `test_row` from the training samples of `training` under `mask`
pub fn classify<'a>(
    mask: &[bool],
    training: &'a Data,
    test_row: &[f64],
    k: usize,
    vote: VotingPolicy,
) -> Result<&'a str> {
    training.check_not_empty("training")?;
    check_k(k)?;
    let view = training.mask(mask)?;
    if test_row.len() != mask.len() {
        return Err(GaKnnError::DimensionMismatch {
            expected: mask.len(),
            found: test_row.len(),
        });
    }
    Ok(classify_view(&view, test_row, k, vote))
}

/// Classify without validation; `test_row` must have the view's feature length
pub(crate) fn classify_view<'a>(
    view: &MaskedView<'a>,
    test_row: &[f64],
    k: usize,
    vote: VotingPolicy,
) -> &'a str {
    let rows = view.rows();
    let neighbours = nearest_neighbours(view, test_row, vote.effective_k(k));

    match vote {
        VotingPolicy::Nearest => &rows[neighbours[0]].label,
        VotingPolicy::Majority => {
            // tallies keep first-encounter order so the first label reaching the top count wins
            let mut tallies: Vec<(&'a str, usize)> = Vec::new();
            for &idx in &neighbours {
                let label = rows[idx].label.as_str();
                match tallies.iter_mut().find(|(l, _)| *l == label) {
                    Some((_, count)) => *count += 1,
                    None => tallies.push((label, 1)),
                }
            }

            let mut winner = tallies[0];
            for &(label, count) in tallies.iter().skip(1) {
                if count > winner.1 {
                    winner = (label, count);
                }
            }
            winner.0
        }
    }
}

/// Indices of the k closest training rows, nearest first. Rows at equal distance keep
/// their training order.
fn nearest_neighbours(view: &MaskedView<'_>, test_row: &[f64], k: usize) -> Vec<usize> {
    let mut nearest: Vec<(f64, usize)> = Vec::with_capacity(k + 1);

    for (idx, row) in view.rows().iter().enumerate() {
        let d = view.distance(&row.features, test_row);
        // total order: a NaN distance ranks after every number instead of first
        let position = nearest.partition_point(|(other, _)| other.total_cmp(&d).is_le());
        if position < k {
            nearest.insert(position, (d, idx));
            nearest.truncate(k);
        }
    }

    nearest.into_iter().map(|(_, idx)| idx).collect()
}

/// Predicted label of every testing sample
pub fn predict<'a>(
    mask: &[bool],
    training: &'a Data,
    testing: &Data,
    k: usize,
    vote: VotingPolicy,
) -> Result<Vec<&'a str>> {
    training.check_not_empty("training")?;
    testing.check_not_empty("testing")?;
    check_k(k)?;
    let view = training.mask(mask)?;
    if testing.feature_len != mask.len() {
        return Err(GaKnnError::DimensionMismatch {
            expected: mask.len(),
            found: testing.feature_len,
        });
    }

    Ok(testing
        .rows
        .iter()
        .map(|row| classify_view(&view, &row.features, k, vote))
        .collect())
}

/// Fraction of testing samples whose label is predicted correctly, in [0, 1]
pub fn evaluate_accuracy(
    mask: &[bool],
    training: &Data,
    testing: &Data,
    k: usize,
    vote: VotingPolicy,
) -> Result<f64> {
    let predictions = predict(mask, training, testing, k, vote)?;
    let correct = predictions
        .iter()
        .zip(testing.rows.iter())
        .filter(|(predicted, row)| **predicted == row.label)
        .count();

    Ok(correct as f64 / testing.sample_len as f64)
}

/// Per-class (label, correct, total) counts on the testing set, classes in testing order
pub fn per_class_accuracy(
    mask: &[bool],
    training: &Data,
    testing: &Data,
    k: usize,
    vote: VotingPolicy,
) -> Result<Vec<(String, usize, usize)>> {
    let predictions = predict(mask, training, testing, k, vote)?;
    let mut counts: Vec<(String, usize, usize)> = testing
        .classes
        .iter()
        .map(|c| (c.clone(), 0, 0))
        .collect();

    for (predicted, row) in predictions.iter().zip(testing.rows.iter()) {
        if let Some(entry) = counts.iter_mut().find(|(c, _, _)| *c == row.label) {
            entry.2 += 1;
            if *predicted == row.label {
                entry.1 += 1;
            }
        }
    }

    Ok(counts)
}

fn check_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(GaKnnError::Config("k must be at least 1".to_string()));
    }
    Ok(())
}
