//! Dirichlet concentration vectors and their conjugate categorical update.
//!
//! The model served here is the classic pair
//!
//! - prior: `p = (p_1..p_K) ~ Dirichlet(alpha_1..alpha_K)`
//! - likelihood: categorical counts `n = (n_1..n_K)`
//! - posterior: `p | n ~ Dirichlet(alpha_i + n_i)`
//!
//! which is what the transition-matrix updater draws from, one row at a
//! time.

use serde::{Deserialize, Serialize};

use super::stable::ln_gamma;

/// A validated Dirichlet concentration vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirichletParams {
    /// Concentration parameters; all strictly positive.
    pub alpha: Vec<f64>,
}

impl DirichletParams {
    /// Create new parameters, rejecting empty, non-positive or NaN entries.
    pub fn new(alpha: Vec<f64>) -> Option<Self> {
        if alpha.is_empty() {
            return None;
        }
        if alpha.iter().any(|a| a.is_nan() || *a <= 0.0) {
            return None;
        }
        Some(Self { alpha })
    }

    /// Symmetric Dirichlet with all `alpha_i = value`.
    pub fn symmetric(k: usize, value: f64) -> Option<Self> {
        if k == 0 {
            return None;
        }
        Self::new(vec![value; k])
    }

    /// Uniform (flat) prior: all `alpha_i = 1`.
    pub fn uniform(k: usize) -> Option<Self> {
        Self::symmetric(k, 1.0)
    }

    /// Number of categories.
    pub fn k(&self) -> usize {
        self.alpha.len()
    }

    /// Total concentration `alpha_0 = sum_i alpha_i`.
    pub fn concentration(&self) -> f64 {
        self.alpha.iter().sum()
    }

    /// Mean vector `E[p_i] = alpha_i / alpha_0`.
    pub fn mean(&self) -> Vec<f64> {
        let sum = self.concentration();
        self.alpha.iter().map(|a| a / sum).collect()
    }

    /// Conjugate posterior after observing `counts`.
    ///
    /// Returns None on length mismatch or negative/NaN counts.
    pub fn posterior(&self, counts: &[f64]) -> Option<Self> {
        if counts.len() != self.k() {
            return None;
        }
        if counts.iter().any(|c| c.is_nan() || *c < 0.0) {
            return None;
        }
        let alpha = self
            .alpha
            .iter()
            .zip(counts)
            .map(|(a, n)| a + n)
            .collect();
        Self::new(alpha)
    }

    /// Log density at a point on the simplex.
    ///
    /// Returns `-inf` off the simplex support (a zero component with
    /// `alpha_i > 1` included), NaN for malformed input.
    pub fn ln_pdf(&self, x: &[f64]) -> f64 {
        if x.len() != self.k() {
            return f64::NAN;
        }
        let total: f64 = x.iter().sum();
        if x.iter().any(|v| *v < 0.0) || (total - 1.0).abs() > 1e-8 {
            return f64::NEG_INFINITY;
        }
        let mut lp = -ln_multivariate_beta(&self.alpha);
        for (a, v) in self.alpha.iter().zip(x) {
            if *v == 0.0 {
                if *a < 1.0 {
                    return f64::INFINITY;
                }
                if *a > 1.0 {
                    return f64::NEG_INFINITY;
                }
            } else {
                lp += (a - 1.0) * v.ln();
            }
        }
        lp
    }
}

/// Log of the multivariate Beta function,
/// `ln B(alpha) = sum_i ln Gamma(alpha_i) - ln Gamma(sum_i alpha_i)`.
pub fn ln_multivariate_beta(alpha: &[f64]) -> f64 {
    if alpha.is_empty() || alpha.iter().any(|a| a.is_nan() || *a <= 0.0) {
        return f64::NAN;
    }
    let sum: f64 = alpha.iter().sum();
    let lg_sum: f64 = alpha.iter().map(|a| ln_gamma(*a)).sum();
    lg_sum - ln_gamma(sum)
}
