//! Forward-filter backward-sample for discrete-state chains.
//!
//! The forward pass works in the probability domain with a per-timestep
//! rescaling: log likelihoods are shifted by their columnwise finite
//! maximum before exponentiation and the filtered vector is renormalized
//! at every step, so paths of any length stay away from underflow.
//!
//! The backward pass then draws the joint posterior state path one
//! timestep at a time, conditioning each state on its sampled successor.

use ndarray::{Array2, ArrayView1, ArrayView2, ArrayView3};
use rand::Rng;

use crate::error::{Error, Result};
use crate::sample::sample_categorical;

/// Pick the transition matrix for timestep `t`, honoring the
/// single-matrix broadcast on the leading axis.
fn time_slice<'a, 'b>(gammas: &'b ArrayView3<'a, f64>, t: usize) -> ArrayView2<'b, f64> {
    let idx = if gammas.dim().0 == 1 { 0 } else { t };
    gammas.index_axis(ndarray::Axis(0), idx)
}

fn check_shapes(
    pi0: &ArrayView1<'_, f64>,
    gammas: &ArrayView3<'_, f64>,
    log_lik: &ArrayView2<'_, f64>,
) -> Result<(usize, usize)> {
    let (k, t_len) = log_lik.dim();
    let (g_t, g_k, g_k2) = gammas.dim();
    if g_k != k || g_k2 != k {
        return Err(Error::ShapeMismatch {
            context: "forward filter",
            expected: format!("transition matrices of size {k}x{k}"),
            actual: format!("{g_k}x{g_k2}"),
        });
    }
    if g_t != 1 && g_t != t_len {
        return Err(Error::ShapeMismatch {
            context: "forward filter",
            expected: format!("transition tensor leading dimension 1 or {t_len}"),
            actual: format!("{g_t}"),
        });
    }
    if pi0.len() != k {
        return Err(Error::ShapeMismatch {
            context: "forward filter",
            expected: format!("initial distribution of length {k}"),
            actual: format!("{}", pi0.len()),
        });
    }
    Ok((k, t_len))
}

/// Run the forward filter, writing normalized filtered distributions
/// into `alphas` (shape `K x T`).
///
/// `pi0` is the pre-chain state distribution; the matrix at timestep 0
/// already moves it into the first observed step, so the filter applies
/// a transition at every `t` including the first.
pub fn forward_filter(
    pi0: ArrayView1<'_, f64>,
    gammas: ArrayView3<'_, f64>,
    log_lik: ArrayView2<'_, f64>,
    alphas: &mut Array2<f64>,
) -> Result<()> {
    let (k, t_len) = check_shapes(&pi0, &gammas, &log_lik)?;
    if alphas.dim() != (k, t_len) {
        return Err(Error::ShapeMismatch {
            context: "forward filter",
            expected: format!("alpha buffer of size {k}x{t_len}"),
            actual: format!("{}x{}", alphas.dim().0, alphas.dim().1),
        });
    }

    let mut prev: Vec<f64> = pi0.to_vec();
    let mut predictive = vec![0.0; k];
    for t in 0..t_len {
        let gamma = time_slice(&gammas, t);
        for (j, p) in predictive.iter_mut().enumerate() {
            let mut acc = 0.0;
            for (i, &w) in prev.iter().enumerate() {
                acc += w * gamma[[i, j]];
            }
            *p = acc;
        }

        // Shift by the largest finite log likelihood in this column so the
        // surviving weights exponentiate into a sane range.
        let shift = (0..k)
            .map(|i| log_lik[[i, t]])
            .filter(|v| v.is_finite())
            .fold(f64::NEG_INFINITY, f64::max);
        let shift = if shift.is_finite() { shift } else { 0.0 };

        let mut total = 0.0;
        for i in 0..k {
            let w = predictive[i] * (log_lik[[i, t]] - shift).exp();
            alphas[[i, t]] = w;
            total += w;
        }
        if !(total.is_finite() && total > 0.0) {
            tracing::warn!(timestep = t, total, "filtered mass collapsed");
            return Err(Error::DegenerateFilter { t });
        }
        for i in 0..k {
            alphas[[i, t]] /= total;
            prev[i] = alphas[[i, t]];
        }
    }
    Ok(())
}

/// Sample a state path backwards from filtered distributions.
///
/// `alphas` must come from [`forward_filter`] with the same `gammas`.
pub fn backward_sample<R: Rng + ?Sized>(
    gammas: ArrayView3<'_, f64>,
    alphas: &Array2<f64>,
    rng: &mut R,
) -> Result<Vec<usize>> {
    let (k, t_len) = alphas.dim();
    if t_len == 0 {
        return Ok(Vec::new());
    }
    let mut states = vec![0usize; t_len];
    let mut weights = vec![0.0; k];

    for i in 0..k {
        weights[i] = alphas[[i, t_len - 1]];
    }
    states[t_len - 1] = sample_categorical(rng, &weights)
        .map_err(|_| Error::DegenerateFilter { t: t_len - 1 })?;

    for t in (0..t_len - 1).rev() {
        let gamma_next = time_slice(&gammas, t + 1);
        let s_next = states[t + 1];
        for i in 0..k {
            weights[i] = alphas[[i, t]] * gamma_next[[i, s_next]];
        }
        states[t] =
            sample_categorical(rng, &weights).map_err(|_| Error::DegenerateFilter { t })?;
    }
    Ok(states)
}

/// One full joint draw of the posterior state path.
pub fn ffbs<R: Rng + ?Sized>(
    pi0: ArrayView1<'_, f64>,
    gammas: ArrayView3<'_, f64>,
    log_lik: ArrayView2<'_, f64>,
    rng: &mut R,
) -> Result<Vec<usize>> {
    let (k, t_len) = check_shapes(&pi0, &gammas, &log_lik)?;
    if t_len == 0 {
        return Ok(Vec::new());
    }
    let mut alphas = Array2::zeros((k, t_len));
    forward_filter(pi0, gammas, log_lik, &mut alphas)?;
    backward_sample(gammas, &alphas, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, Array3};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

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
    fn neg_inf_likelihood_forces_state_one() {
        let t_len = 10_000;
        let gammas = broadcast_gamma(&[[0.9, 0.1], [0.1, 0.9]]);
        let pi0 = arr1(&[0.5, 0.5]);
        let mut log_lik = Array2::zeros((2, t_len));
        for t in 0..t_len {
            log_lik[[0, t]] = f64::NEG_INFINITY;
        }
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let states = ffbs(pi0.view(), gammas.view(), log_lik.view(), &mut rng).unwrap();
        assert!(states.iter().all(|s| *s == 1));
    }

    #[test]
    fn neg_inf_likelihood_forces_state_zero() {
        let t_len = 10_000;
        let gammas = broadcast_gamma(&[[0.9, 0.1], [0.1, 0.9]]);
        let pi0 = arr1(&[0.5, 0.5]);
        let mut log_lik = Array2::zeros((2, t_len));
        for t in 0..t_len {
            log_lik[[1, t]] = f64::NEG_INFINITY;
        }
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
        let states = ffbs(pi0.view(), gammas.view(), log_lik.view(), &mut rng).unwrap();
        assert!(states.iter().all(|s| *s == 0));
    }

    #[test]
    fn deterministic_alternating_transitions() {
        // Four timesteps: swap, swap, hold, swap. The transitions fully
        // determine the path from pi0 = [1, 0]; the likelihood mildly
        // prefers the unreachable path [1, 0, 1, 0] and must lose.
        let mut gammas = Array3::zeros((4, 2, 2));
        for (t, hold) in [(0, false), (1, false), (2, true), (3, false)] {
            if hold {
                gammas[[t, 0, 0]] = 1.0;
                gammas[[t, 1, 1]] = 1.0;
            } else {
                gammas[[t, 0, 1]] = 1.0;
                gammas[[t, 1, 0]] = 1.0;
            }
        }
        let pi0 = arr1(&[1.0, 0.0]);
        let preferred = [1usize, 0, 1, 0];
        let mut log_lik = Array2::zeros((2, 4));
        for (t, &s) in preferred.iter().enumerate() {
            log_lik[[s, t]] = 0.9f64.ln();
            log_lik[[1 - s, t]] = 0.1f64.ln();
        }
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let states = ffbs(pi0.view(), gammas.view(), log_lik.view(), &mut rng).unwrap();
        assert_eq!(states, vec![1, 0, 0, 1]);
    }

    #[test]
    fn identity_transitions_freeze_the_chain() {
        let gammas = broadcast_gamma(&[[1.0, 0.0], [0.0, 1.0]]);
        let pi0 = arr1(&[1.0, 0.0]);
        let log_lik = Array2::zeros((2, 50));
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(4);
        let states = ffbs(pi0.view(), gammas.view(), log_lik.view(), &mut rng).unwrap();
        assert!(states.iter().all(|s| *s == 0));
    }

    #[test]
    fn same_seed_same_path() {
        let gammas = broadcast_gamma(&[[0.6, 0.4], [0.4, 0.6]]);
        let pi0 = arr1(&[0.5, 0.5]);
        let log_lik = Array2::zeros((2, 200));
        let mut rng_a = Xoshiro256PlusPlus::seed_from_u64(99);
        let mut rng_b = Xoshiro256PlusPlus::seed_from_u64(99);
        let a = ffbs(pi0.view(), gammas.view(), log_lik.view(), &mut rng_a).unwrap();
        let b = ffbs(pi0.view(), gammas.view(), log_lik.view(), &mut rng_b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn degenerate_filter_is_reported_with_timestep() {
        // pi0 puts all mass on state 0 and the identity transition keeps
        // it there, but the likelihood rules state 0 out at t = 0.
        let gammas = broadcast_gamma(&[[1.0, 0.0], [0.0, 1.0]]);
        let pi0 = arr1(&[1.0, 0.0]);
        let mut log_lik = Array2::zeros((2, 3));
        log_lik[[0, 0]] = f64::NEG_INFINITY;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        match ffbs(pi0.view(), gammas.view(), log_lik.view(), &mut rng) {
            Err(Error::DegenerateFilter { t }) => assert_eq!(t, 0),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn shape_mismatches_are_rejected() {
        let gammas = broadcast_gamma(&[[0.5, 0.5], [0.5, 0.5]]);
        let log_lik = Array2::zeros((2, 4));
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(6);

        let bad_pi0 = arr1(&[1.0]);
        assert!(ffbs(bad_pi0.view(), gammas.view(), log_lik.view(), &mut rng).is_err());

        let mut bad_gammas = Array3::zeros((3, 2, 2));
        for t in 0..3 {
            bad_gammas[[t, 0, 0]] = 1.0;
            bad_gammas[[t, 1, 1]] = 1.0;
        }
        let pi0 = arr1(&[0.5, 0.5]);
        assert!(ffbs(pi0.view(), bad_gammas.view(), log_lik.view(), &mut rng).is_err());
    }

    #[test]
    fn empty_observation_window() {
        let gammas = broadcast_gamma(&[[0.5, 0.5], [0.5, 0.5]]);
        let pi0 = arr1(&[0.5, 0.5]);
        let log_lik = Array2::zeros((2, 0));
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let states = ffbs(pi0.view(), gammas.view(), log_lik.view(), &mut rng).unwrap();
        assert!(states.is_empty());
    }

    #[test]
    fn filtered_columns_are_normalized() {
        let gammas = broadcast_gamma(&[[0.7, 0.3], [0.2, 0.8]]);
        let pi0 = arr1(&[0.5, 0.5]);
        let mut log_lik = Array2::zeros((2, 6));
        log_lik[[0, 2]] = -300.0;
        log_lik[[1, 4]] = -700.0;
        let mut alphas = Array2::zeros((2, 6));
        forward_filter(pi0.view(), gammas.view(), log_lik.view(), &mut alphas).unwrap();
        for t in 0..6 {
            let col_sum = alphas[[0, t]] + alphas[[1, t]];
            assert!((col_sum - 1.0).abs() < 1e-12);
        }
    }
}
