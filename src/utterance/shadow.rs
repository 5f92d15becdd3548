use std::collections::HashSet;

use super::accumulator::tokenize;

/// Score a shadow-speaking attempt
///
/// Fraction of the target's distinct words that appear anywhere in what was
/// recognized. This is a bag-of-words overlap, word order and repetitions are
/// ignored. An empty target scores 1.0.
pub fn score(target: &str, spoken: &str) -> f64 {
    let target: HashSet<String> = tokenize(target).into_iter().collect();
    if target.is_empty() {
        return 1.0;
    }
    let spoken: HashSet<String> = tokenize(spoken).into_iter().collect();

    target.intersection(&spoken).count() as f64 / target.len() as f64
}
