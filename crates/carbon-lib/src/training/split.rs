//! Train/test splitting

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::models::FeatureRow;

/// How engineered rows are divided into train and test sets
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SplitStrategy {
    /// Earliest rows train, latest rows test
    #[default]
    Chronological,
    /// Seeded shuffle, for cross-sectional data without temporal order
    Shuffled { seed: u64 },
}

/// Row indices of the train and test parts. The train part always receives
/// at least one row when any rows exist.
pub fn split_indices(
    rows: &[FeatureRow],
    strategy: SplitStrategy,
    train_fraction: f64,
) -> (Vec<usize>, Vec<usize>) {
    let n = rows.len();
    if n == 0 {
        return (Vec::new(), Vec::new());
    }

    let mut order: Vec<usize> = (0..n).collect();
    match strategy {
        SplitStrategy::Chronological => {
            order.sort_by(|&a, &b| {
                rows[a]
                    .timestamp
                    .cmp(&rows[b].timestamp)
                    .then_with(|| rows[a].site_id.cmp(&rows[b].site_id))
            });
        }
        SplitStrategy::Shuffled { seed } => {
            let mut rng = StdRng::seed_from_u64(seed);
            order.shuffle(&mut rng);
        }
    }

    let fraction = train_fraction.clamp(0.0, 1.0);
    let n_train = ((n as f64 * fraction).floor() as usize).clamp(1, n);
    let test = order.split_off(n_train);
    (order, test)
}
