//! Row splits for cross-validation and hold-out evaluation

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::{HockeyError, Result};

/// Train and test row indices
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Contiguous, unshuffled k-fold splits
///
/// Fold sizes differ by at most one row; the first `n % k` folds take the
/// extra row.
pub fn k_fold(n_samples: usize, n_folds: usize) -> Result<Vec<Split>> {
    if n_folds < 2 {
        return Err(HockeyError::Config(format!(
            "cross-validation needs at least 2 folds, got {}",
            n_folds
        )));
    }
    if n_samples < n_folds {
        return Err(HockeyError::InsufficientData(format!(
            "{} rows cannot be split into {} folds",
            n_samples, n_folds
        )));
    }

    let base = n_samples / n_folds;
    let extra = n_samples % n_folds;
    let mut splits = Vec::with_capacity(n_folds);
    let mut start = 0;

    for fold in 0..n_folds {
        let size = base + usize::from(fold < extra);
        let end = start + size;
        splits.push(Split {
            train: (0..start).chain(end..n_samples).collect(),
            test: (start..end).collect(),
        });
        start = end;
    }

    Ok(splits)
}

/// Seeded random train/test split
///
/// The test set is the first `ceil(test_size * n)` rows of a ChaCha
/// permutation; both sides keep that permuted order.
pub fn train_test_split(n_samples: usize, test_size: f64, seed: u64) -> Result<Split> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(HockeyError::Config(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }

    let n_test = (test_size * n_samples as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(HockeyError::InsufficientData(format!(
            "{} rows leave no room for a {} hold-out split",
            n_samples, test_size
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut rows: Vec<usize> = (0..n_samples).collect();
    rows.shuffle(&mut rng);
    let train = rows.split_off(n_test);

    log::info!("Hold-out split: {} train rows, {} test rows", train.len(), rows.len());
    Ok(Split { train, test: rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_k_fold_sizes_and_coverage() {
        let splits = k_fold(11, 3).unwrap();
        let sizes: Vec<usize> = splits.iter().map(|s| s.test.len()).collect();
        assert_eq!(sizes, vec![4, 4, 3]);
        assert_eq!(splits[0].test, vec![0, 1, 2, 3]);
        assert_eq!(splits[2].test, vec![8, 9, 10]);

        let mut covered: Vec<usize> = splits.iter().flat_map(|s| s.test.clone()).collect();
        covered.sort_unstable();
        assert_eq!(covered, (0..11).collect::<Vec<_>>());

        for split in &splits {
            assert_eq!(split.train.len() + split.test.len(), 11);
            assert!(split.test.iter().all(|i| !split.train.contains(i)));
        }
    }

    #[test]
    fn test_k_fold_rejects_bad_inputs() {
        assert!(matches!(k_fold(10, 1), Err(HockeyError::Config(_))));
        assert!(matches!(k_fold(3, 5), Err(HockeyError::InsufficientData(_))));
    }

    #[test]
    fn test_train_test_split_is_seeded() {
        let a = train_test_split(10, 0.2, 73).unwrap();
        let b = train_test_split(10, 0.2, 73).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.test.len(), 2);
        assert_eq!(a.train.len(), 8);

        let mut all: Vec<usize> = a.train.iter().chain(&a.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_train_test_split_rounds_test_up() {
        let split = train_test_split(11, 0.2, 1).unwrap();
        assert_eq!(split.test.len(), 3);
    }

    #[test]
    fn test_train_test_split_rejects_tiny_inputs() {
        assert!(train_test_split(1, 0.2, 0).is_err());
        assert!(train_test_split(10, 0.0, 0).is_err());
    }
}
