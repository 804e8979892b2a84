//! A validated discrete-state Markov chain with per-timestep transitions.

use ndarray::{Array1, Array3};

use crate::error::{Error, Result};

/// Tolerance on each transition row summing to one.
pub const ROW_SUM_TOL: f64 = 1e-6;

/// A time-inhomogeneous Markov chain over `K` states.
///
/// `gammas` holds one `K x K` row-stochastic matrix per timestep, or a
/// single matrix broadcast across all of them. `pi0` is the distribution
/// of the pre-chain state; the matrix at index 0 carries it into the
/// first observed timestep.
#[derive(Debug, Clone)]
pub struct MarkovChain {
    gammas: Array3<f64>,
    pi0: Array1<f64>,
    len: usize,
}

impl MarkovChain {
    /// Build and validate a chain covering `len` timesteps.
    pub fn new(gammas: Array3<f64>, pi0: Array1<f64>, len: usize) -> Result<Self> {
        let (t_dim, k, k2) = gammas.dim();
        if k != k2 || k == 0 {
            return Err(Error::ShapeMismatch {
                context: "transition tensor",
                expected: "square (T, K, K) with K > 0".into(),
                actual: format!("({t_dim}, {k}, {k2})"),
            });
        }
        if t_dim != 1 && t_dim != len {
            return Err(Error::ShapeMismatch {
                context: "transition tensor",
                expected: format!("leading dimension 1 or {len}"),
                actual: format!("{t_dim}"),
            });
        }
        if pi0.len() != k {
            return Err(Error::ShapeMismatch {
                context: "initial distribution",
                expected: format!("length {k}"),
                actual: format!("{}", pi0.len()),
            });
        }
        for t in 0..t_dim {
            for i in 0..k {
                let row_sum: f64 = (0..k).map(|j| gammas[[t, i, j]]).sum();
                if !row_sum.is_finite() || (row_sum - 1.0).abs() > ROW_SUM_TOL {
                    return Err(Error::Validation(format!(
                        "transition row (t={t}, i={i}) sums to {row_sum}"
                    )));
                }
            }
        }
        let pi_sum: f64 = pi0.sum();
        if !pi_sum.is_finite() || (pi_sum - 1.0).abs() > ROW_SUM_TOL {
            return Err(Error::Validation(format!(
                "initial distribution sums to {pi_sum}"
            )));
        }
        Ok(Self { gammas, pi0, len })
    }

    pub fn n_states(&self) -> usize {
        self.gammas.dim().1
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn gammas(&self) -> &Array3<f64> {
        &self.gammas
    }

    pub fn pi0(&self) -> &Array1<f64> {
        &self.pi0
    }

    /// Index into the leading axis, honoring single-matrix broadcast.
    fn gamma_index(&self, t: usize) -> usize {
        if self.gammas.dim().0 == 1 {
            0
        } else {
            t
        }
    }

    /// Log probability of a state path under the chain alone.
    ///
    /// Transitions with zero mass contribute `-inf` rather than an error.
    pub fn log_prob(&self, states: &[usize]) -> Result<f64> {
        if states.len() != self.len {
            return Err(Error::ShapeMismatch {
                context: "state path",
                expected: format!("length {}", self.len),
                actual: format!("{}", states.len()),
            });
        }
        let k = self.n_states();
        if let Some(&bad) = states.iter().find(|s| **s >= k) {
            return Err(Error::Validation(format!(
                "state {bad} out of range for {k} states"
            )));
        }
        let Some(&first) = states.first() else {
            return Ok(0.0);
        };
        // pi0 describes the pre-chain state; gamma_0 moves it into t = 0,
        // so the first factor marginalizes over the unseen predecessor.
        let g0 = self.gamma_index(0);
        let mut p_first = 0.0;
        for j in 0..k {
            p_first += self.pi0[j] * self.gammas[[g0, j, first]];
        }
        let mut lp = p_first.ln();
        for t in 1..states.len() {
            let g = self.gamma_index(t);
            lp += self.gammas[[g, states[t - 1], states[t]]].ln();
        }
        Ok(lp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, Array3};

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    fn broadcast_gamma(rows: &[[f64; 2]; 2]) -> Array3<f64> {
        let mut g = Array3::zeros((1, 2, 2));
        for i in 0..2 {
            for j in 0..2 {
                g[[0, i, j]] = rows[i][j];
            }
        }
        g
    }

    #[test]
    fn new_validates_row_sums() {
        let g = broadcast_gamma(&[[0.9, 0.2], [0.5, 0.5]]);
        let err = MarkovChain::new(g, arr1(&[0.5, 0.5]), 4).unwrap_err();
        assert!(err.to_string().contains("sums to"));
    }

    #[test]
    fn new_validates_leading_dim() {
        let mut g = Array3::zeros((3, 2, 2));
        for t in 0..3 {
            g[[t, 0, 0]] = 1.0;
            g[[t, 1, 1]] = 1.0;
        }
        assert!(MarkovChain::new(g, arr1(&[1.0, 0.0]), 5).is_err());
    }

    #[test]
    fn new_validates_pi0() {
        let g = broadcast_gamma(&[[0.5, 0.5], [0.5, 0.5]]);
        assert!(MarkovChain::new(g.clone(), arr1(&[0.5]), 4).is_err());
        assert!(MarkovChain::new(g, arr1(&[0.9, 0.9]), 4).is_err());
    }

    #[test]
    fn log_prob_known_path() {
        let g = broadcast_gamma(&[[0.9, 0.1], [0.3, 0.7]]);
        let chain = MarkovChain::new(g, arr1(&[1.0, 0.0]), 3).unwrap();
        // First factor: pi0 . Gamma[:, 0] = 0.9, then 0 -> 1 -> 1.
        let lp = chain.log_prob(&[0, 1, 1]).unwrap();
        let expected = 0.9f64.ln() + 0.1f64.ln() + 0.7f64.ln();
        assert!(approx_eq(lp, expected, 1e-12));
    }

    #[test]
    fn log_prob_impossible_transition_is_neg_inf() {
        let g = broadcast_gamma(&[[1.0, 0.0], [0.0, 1.0]]);
        let chain = MarkovChain::new(g, arr1(&[1.0, 0.0]), 2).unwrap();
        assert_eq!(chain.log_prob(&[0, 1]).unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn log_prob_rejects_bad_paths() {
        let g = broadcast_gamma(&[[0.5, 0.5], [0.5, 0.5]]);
        let chain = MarkovChain::new(g, arr1(&[0.5, 0.5]), 2).unwrap();
        assert!(chain.log_prob(&[0]).is_err());
        assert!(chain.log_prob(&[0, 5]).is_err());
    }
}
