//! Fitness evaluation: leave-one-out nearest-neighbor accuracy under a
//! candidate weighting/selection of the feature space.

use et_types::TrainingSet;

/// Weighted squared distance over selected features only.
fn distance(a: &[f64], b: &[f64], weights: &[f64], selections: &[bool]) -> f64 {
    let mut sum = 0.0;
    for d in 0..a.len() {
        if selections[d] {
            let diff = a[d] - b[d];
            sum += weights[d] * diff * diff;
        }
    }
    sum
}

/// Leave-one-out k-NN accuracy of the training set classified against
/// itself. This is the objective the optimizer maximizes; 1.0 means every
/// sample's held-out neighbors vote for its true label.
pub fn loo_accuracy(training: &TrainingSet, k: usize, weights: &[f64], selections: &[bool]) -> f64 {
    let samples = &training.samples;
    if samples.len() < 2 {
        return 0.0;
    }
    let k = k.max(1).min(samples.len() - 1);

    let mut correct = 0usize;
    for (i, probe) in samples.iter().enumerate() {
        // (distance, index) of the k nearest other samples.
        let mut nearest: Vec<(f64, usize)> = Vec::with_capacity(k + 1);
        for (j, other) in samples.iter().enumerate() {
            if i == j {
                continue;
            }
            let dist = distance(&probe.features, &other.features, weights, selections);
            let pos = nearest
                .iter()
                .position(|(d, _)| dist < *d)
                .unwrap_or(nearest.len());
            if pos < k {
                nearest.insert(pos, (dist, j));
                nearest.truncate(k);
            }
        }

        // Majority vote; first-seen label wins ties, which favors the
        // nearest neighbor since `nearest` is distance-ordered.
        let mut votes: Vec<(&str, usize)> = Vec::new();
        for &(_, j) in &nearest {
            let label = samples[j].label.as_str();
            match votes.iter_mut().find(|(l, _)| *l == label) {
                Some((_, count)) => *count += 1,
                None => votes.push((label, 1)),
            }
        }
        let mut winner: Option<(&str, usize)> = None;
        for &(label, count) in &votes {
            if winner.map_or(true, |(_, best)| count > best) {
                winner = Some((label, count));
            }
        }
        let winner = winner.map(|(label, _)| label);

        if winner == Some(probe.label.as_str()) {
            correct += 1;
        }
    }

    correct as f64 / samples.len() as f64
}
