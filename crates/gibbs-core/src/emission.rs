//! Switching observation models: one density per hidden state.
//!
//! The canonical instance is the zero-inflated Poisson switcher where
//! state 0 emits an exact zero and the remaining states emit Poisson
//! counts, possibly with time-varying or point-resolved rates.

use ndarray::{Array1, Array2};
use rand::Rng;
use rand_distr::{Distribution, Poisson};

use gibbs_math::math::poisson;

use crate::error::{Error, Result};
use crate::point::Point;

/// Where a Poisson rate comes from at sampling time.
#[derive(Debug, Clone)]
pub enum RateSpec {
    /// One fixed rate for every timestep.
    Scalar(f64),
    /// A precomputed per-timestep rate series.
    Series(Array1<f64>),
    /// Look the rate up in the current point. A vector of length 1 is a
    /// scalar rate; length `T` is a per-timestep series.
    Var(String),
}

impl RateSpec {
    /// Rate at timestep `t` given the current point.
    fn at(&self, t: usize, point: &Point) -> Result<f64> {
        match self {
            RateSpec::Scalar(mu) => Ok(*mu),
            RateSpec::Series(series) => series.get(t).copied().ok_or_else(|| {
                Error::ShapeMismatch {
                    context: "rate series",
                    expected: format!("length > {t}"),
                    actual: format!("{}", series.len()),
                }
            }),
            RateSpec::Var(name) => {
                let v = point.vector(name)?;
                if v.len() == 1 {
                    Ok(v[0])
                } else {
                    v.get(t).copied().ok_or_else(|| Error::ShapeMismatch {
                        context: "rate variable",
                        expected: format!("length 1 or > {t}"),
                        actual: format!("{}", v.len()),
                    })
                }
            }
        }
    }
}

/// Per-state observation density.
#[derive(Debug, Clone)]
pub enum StateDensity {
    /// Degenerate emission of exactly zero.
    PointMassZero,
    /// Poisson counts at the given rate.
    Poisson(RateSpec),
}

/// A bank of state densities indexed by hidden state.
#[derive(Debug, Clone)]
pub struct SwitchingEmission {
    comps: Vec<StateDensity>,
}

impl SwitchingEmission {
    pub fn new(comps: Vec<StateDensity>) -> Result<Self> {
        if comps.is_empty() {
            return Err(Error::Validation("emission model has no components".into()));
        }
        Ok(Self { comps })
    }

    /// Zero-inflated Poisson switcher: state 0 is the structural zero,
    /// every other state shares the rate `mu`.
    pub fn poisson_zero(mu: RateSpec, n_states: usize) -> Result<Self> {
        if n_states < 2 {
            return Err(Error::Validation(
                "zero-inflated switcher needs at least two states".into(),
            ));
        }
        let mut comps = vec![StateDensity::PointMassZero];
        for _ in 1..n_states {
            comps.push(StateDensity::Poisson(mu.clone()));
        }
        Self::new(comps)
    }

    pub fn n_states(&self) -> usize {
        self.comps.len()
    }

    /// Log likelihood of each observation under each state density.
    ///
    /// Output is `K x T`: entry `(k, t)` is `ln p(y_t | S_t = k)`.
    pub fn log_lik_matrix(&self, observed: &Array1<u64>, point: &Point) -> Result<Array2<f64>> {
        let t_len = observed.len();
        let k = self.n_states();
        let mut out = Array2::zeros((k, t_len));
        for (s, comp) in self.comps.iter().enumerate() {
            match comp {
                StateDensity::PointMassZero => {
                    for t in 0..t_len {
                        out[[s, t]] = if observed[t] == 0 {
                            0.0
                        } else {
                            f64::NEG_INFINITY
                        };
                    }
                }
                StateDensity::Poisson(rate) => {
                    for t in 0..t_len {
                        let mu = rate.at(t, point)?;
                        let lp = poisson::ln_pmf(observed[t], mu);
                        if lp.is_nan() {
                            return Err(Error::NumericalInstability(format!(
                                "Poisson rate {mu} at timestep {t} is invalid"
                            )));
                        }
                        out[[s, t]] = lp;
                    }
                }
            }
        }
        Ok(out)
    }

    /// Draw one observation per timestep given a state path.
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        states: &[usize],
        point: &Point,
        rng: &mut R,
    ) -> Result<Array1<u64>> {
        let k = self.n_states();
        let mut out = Array1::zeros(states.len());
        for (t, &s) in states.iter().enumerate() {
            if s >= k {
                return Err(Error::Validation(format!(
                    "state {s} out of range for {k} emission components"
                )));
            }
            out[t] = match &self.comps[s] {
                StateDensity::PointMassZero => 0,
                StateDensity::Poisson(rate) => {
                    let mu = rate.at(t, point)?;
                    let dist = Poisson::new(mu).map_err(|e| {
                        Error::NumericalInstability(format!("Poisson({mu}) is invalid: {e}"))
                    })?;
                    dist.sample(rng) as u64
                }
            };
        }
        Ok(out)
    }
}
