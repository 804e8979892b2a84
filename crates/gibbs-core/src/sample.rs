//! Low-level random draws shared by the Gibbs steps.

use rand::Rng;
use rand_distr::{Distribution, Gamma};

use crate::error::{Error, Result};

/// Draw an index from unnormalized non-negative weights.
///
/// Uses inverse-CDF on the running cumulative sum, so the weights do not
/// need to be normalized. Fails when the total mass is zero or not finite.
pub fn sample_categorical<R: Rng + ?Sized>(rng: &mut R, weights: &[f64]) -> Result<usize> {
    let total: f64 = weights.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(Error::NumericalInstability(format!(
            "categorical weights sum to {total}"
        )));
    }
    let u = rng.random::<f64>() * total;
    let mut acc = 0.0;
    for (i, w) in weights.iter().enumerate() {
        acc += w;
        if u < acc {
            return Ok(i);
        }
    }
    // Rounding can leave u at or just past the final cumulative sum;
    // fall back to the last positive-weight index.
    weights
        .iter()
        .rposition(|w| *w > 0.0)
        .ok_or_else(|| Error::NumericalInstability("no positive categorical weight".into()))
}

/// Draw from `Dirichlet(alpha)` via normalized Gamma variates.
pub fn sample_dirichlet<R: Rng + ?Sized>(rng: &mut R, alpha: &[f64]) -> Result<Vec<f64>> {
    if alpha.is_empty() {
        return Err(Error::Validation("empty Dirichlet parameter vector".into()));
    }
    let mut draws = Vec::with_capacity(alpha.len());
    for &a in alpha {
        let gamma = Gamma::new(a, 1.0).map_err(|e| {
            Error::NumericalInstability(format!("Gamma({a}, 1) is invalid: {e}"))
        })?;
        draws.push(gamma.sample(rng));
    }
    let total: f64 = draws.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(Error::NumericalInstability(
            "Dirichlet draw underflowed to zero total mass".into(),
        ));
    }
    for d in &mut draws {
        *d /= total;
    }
    Ok(draws)
}
