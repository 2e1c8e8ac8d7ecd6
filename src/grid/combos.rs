//! Predictor subset enumeration.
//!
//! The grid is exhaustive over subset sizes `min..=max`, so enumeration has to
//! be deterministic: subsets come out in lexicographic index order, and the
//! members of each subset keep the order of the candidate list.

use crate::error::AppError;

/// All `k`-element index combinations of `0..n`, lexicographic.
///
/// `k = 0` yields one empty combination; `k > n` yields none.
pub fn index_combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    if k > n {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        out.push(idx.clone());

        // Rightmost position that can still advance.
        let Some(pos) = (0..k).rev().find(|&i| idx[i] < n - k + i) else {
            return out;
        };
        idx[pos] += 1;
        for j in (pos + 1)..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
}

/// Every subset of `candidates` with size in `min..=max`, smallest first.
///
/// `max` is clamped to the number of candidates.
pub fn predictor_subsets(candidates: &[String], min: usize, max: usize) -> Result<Vec<Vec<String>>, AppError> {
    if min > max {
        return Err(AppError::invalid(format!(
            "Invalid predictor bounds: min={min} > max={max}."
        )));
    }
    let max = max.min(candidates.len());

    let mut out = Vec::new();
    for k in min..=max {
        for combo in index_combinations(candidates.len(), k) {
            out.push(combo.into_iter().map(|i| candidates[i].clone()).collect());
        }
    }
    Ok(out)
}
