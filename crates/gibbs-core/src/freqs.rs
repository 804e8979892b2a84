//! Transition tallies and stationary distributions of state sequences.

use ndarray::{Array1, Array2, ArrayView2};

use crate::error::{Error, Result};

const STEADY_STATE_TOL: f64 = 1e-12;
const STEADY_STATE_MAX_ITERS: usize = 10_000;

/// Count observed transitions in a state sequence.
///
/// Entry `(i, j)` is the number of timesteps where state `i` was followed
/// by state `j`. States at or beyond `n_states` are rejected.
pub fn transition_counts(states: &[usize], n_states: usize) -> Result<Array2<f64>> {
    let mut counts = Array2::zeros((n_states, n_states));
    for window in states.windows(2) {
        let (i, j) = (window[0], window[1]);
        if i >= n_states || j >= n_states {
            return Err(Error::Validation(format!(
                "state {} out of range for {n_states} states",
                i.max(j)
            )));
        }
        counts[[i, j]] += 1.0;
    }
    Ok(counts)
}

/// Empirical transition frequencies: row-normalized counts.
///
/// Rows with no outgoing transitions stay all-zero.
pub fn transition_freqs(states: &[usize], n_states: usize) -> Result<Array2<f64>> {
    let mut freqs = transition_counts(states, n_states)?;
    for mut row in freqs.rows_mut() {
        let total: f64 = row.sum();
        if total > 0.0 {
            row.mapv_inplace(|v| v / total);
        }
    }
    Ok(freqs)
}

/// Stationary distribution of a row-stochastic matrix.
///
/// Power iteration on the lazy chain `(gamma + I) / 2`, whose fixed point
/// coincides with the original chain's but converges for periodic matrices
/// as well.
pub fn steady_state(gamma: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
    let (rows, cols) = gamma.dim();
    if rows != cols || rows == 0 {
        return Err(Error::ShapeMismatch {
            context: "steady_state",
            expected: "square non-empty matrix".into(),
            actual: format!("{rows}x{cols}"),
        });
    }
    let k = rows;
    let mut pi = Array1::from_elem(k, 1.0 / k as f64);
    let mut next = Array1::zeros(k);
    for _ in 0..STEADY_STATE_MAX_ITERS {
        for j in 0..k {
            let mut acc = 0.0;
            for i in 0..k {
                acc += pi[i] * gamma[[i, j]];
            }
            next[j] = 0.5 * (acc + pi[j]);
        }
        let total: f64 = next.sum();
        if !(total.is_finite() && total > 0.0) {
            return Err(Error::NumericalInstability(
                "power iteration lost probability mass".into(),
            ));
        }
        next.mapv_inplace(|v| v / total);
        let delta = pi
            .iter()
            .zip(next.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f64, f64::max);
        std::mem::swap(&mut pi, &mut next);
        if delta < STEADY_STATE_TOL {
            return Ok(pi);
        }
    }
    Err(Error::NumericalInstability(
        "power iteration failed to converge".into(),
    ))
}
