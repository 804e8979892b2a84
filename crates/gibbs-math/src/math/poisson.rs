//! Poisson log-mass, used by the switching emission model.

use super::stable::ln_factorial;

/// Log probability mass `ln P(Y = y)` for `Y ~ Poisson(mu)`.
///
/// `mu = 0` is the point mass at zero. Negative or NaN rates give NaN.
pub fn ln_pmf(y: u64, mu: f64) -> f64 {
    if mu.is_nan() || mu < 0.0 {
        return f64::NAN;
    }
    if mu == 0.0 {
        return if y == 0 { 0.0 } else { f64::NEG_INFINITY };
    }
    y as f64 * mu.ln() - mu - ln_factorial(y)
}
