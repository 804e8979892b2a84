//! The two Gibbs transition kernels: the state-path sampler and the
//! conjugate transition-matrix updater.
//!
//! Steps are pure with respect to the point: each invocation reads the
//! current assignment, draws its block of variables, and returns a new
//! point with only that block replaced. Alternating the two steps yields
//! a full Gibbs sweep over states and transition rows.

use ndarray::{Array1, Array3};
use rand::RngCore;

use crate::emission::SwitchingEmission;
use crate::error::{Error, Result};
use crate::ffbs::ffbs;
use crate::freqs::{steady_state, transition_counts};
use crate::point::{Point, Value};
use crate::sample::sample_dirichlet;
use crate::structure::{MatrixExpr, RowGroup};

/// One block update of a Gibbs sweep.
pub trait GibbsStep {
    /// Resample this step's variables given the rest of the point.
    fn step(&self, point: &Point, rng: &mut dyn RngCore) -> Result<Point>;
}

/// How the state sampler obtains its transition matrices.
#[derive(Debug, Clone)]
pub enum TransitionSpec {
    /// Evaluate a row-structured expression at the current point.
    Expr(MatrixExpr),
    /// Read a matrix or `(T, K, K)` tensor variable from the point.
    Var(String),
}

/// How the state sampler obtains its initial state distribution.
#[derive(Debug, Clone)]
pub enum InitialSpec {
    /// A fixed distribution.
    Constant(Array1<f64>),
    /// A vector variable in the point.
    Var(String),
    /// The stationary distribution of the first transition matrix.
    SteadyState,
}

/// Joint posterior state-path sampler.
pub struct FfbsStep {
    states_var: String,
    transition: TransitionSpec,
    initial: InitialSpec,
    emission: SwitchingEmission,
    observed: Array1<u64>,
}

impl FfbsStep {
    pub fn new(
        states_var: impl Into<String>,
        transition: TransitionSpec,
        initial: InitialSpec,
        emission: SwitchingEmission,
        observed: Array1<u64>,
    ) -> Result<Self> {
        let states_var = states_var.into();
        if states_var.is_empty() {
            return Err(Error::Validation("empty state variable name".into()));
        }
        if let InitialSpec::Constant(pi0) = &initial {
            if pi0.len() != emission.n_states() {
                return Err(Error::ShapeMismatch {
                    context: "state sampler",
                    expected: format!(
                        "initial distribution of length {}",
                        emission.n_states()
                    ),
                    actual: format!("{}", pi0.len()),
                });
            }
        }
        tracing::debug!(
            states_var = %states_var,
            n_states = emission.n_states(),
            n_obs = observed.len(),
            "state-path sampler ready"
        );
        Ok(Self {
            states_var,
            transition,
            initial,
            emission,
            observed,
        })
    }

    /// Materialize the transition tensor for this invocation.
    fn resolve_gammas(&self, point: &Point) -> Result<Array3<f64>> {
        match &self.transition {
            TransitionSpec::Expr(expr) => {
                let m = expr.eval(point)?;
                let k = m.dim().0;
                let mut tensor = Array3::zeros((1, k, k));
                tensor.index_axis_mut(ndarray::Axis(0), 0).assign(&m);
                Ok(tensor)
            }
            TransitionSpec::Var(name) => {
                if matches!(point.get(name)?, Value::Tensor(_)) {
                    return Ok(point.tensor(name)?.clone());
                }
                let m = point.matrix(name)?;
                let k = m.dim().0;
                if m.dim().1 != k {
                    return Err(Error::ShapeMismatch {
                        context: "transition variable",
                        expected: "square matrix".into(),
                        actual: format!("{}x{}", m.dim().0, m.dim().1),
                    });
                }
                let mut tensor = Array3::zeros((1, k, k));
                tensor.index_axis_mut(ndarray::Axis(0), 0).assign(m);
                Ok(tensor)
            }
        }
    }

    fn resolve_pi0(&self, gammas: &Array3<f64>, point: &Point) -> Result<Array1<f64>> {
        match &self.initial {
            InitialSpec::Constant(pi0) => Ok(pi0.clone()),
            InitialSpec::Var(name) => Ok(point.vector(name)?.clone()),
            InitialSpec::SteadyState => {
                let first = gammas.index_axis(ndarray::Axis(0), 0);
                steady_state(first)
            }
        }
    }
}

impl GibbsStep for FfbsStep {
    fn step(&self, point: &Point, rng: &mut dyn RngCore) -> Result<Point> {
        let gammas = self.resolve_gammas(point)?;
        let pi0 = self.resolve_pi0(&gammas, point)?;
        let log_lik = self.emission.log_lik_matrix(&self.observed, point)?;
        let states = ffbs(pi0.view(), gammas.view(), log_lik.view(), rng)?;
        let mut next = point.clone();
        next.insert(self.states_var.clone(), Value::States(states));
        Ok(next)
    }
}

/// Conjugate Dirichlet updater for the free rows of a transition matrix.
pub struct TransMatConjugateStep {
    states_var: String,
    group: RowGroup,
}

impl TransMatConjugateStep {
    /// Analyze the expression once; the extracted row mapping drives
    /// every subsequent invocation.
    pub fn new(expr: &MatrixExpr, states_var: impl Into<String>) -> Result<Self> {
        let group = expr.analyze()?;
        if group.updates.is_empty() {
            return Err(Error::Structure(
                "no Dirichlet rows in transition-matrix expression".into(),
            ));
        }
        tracing::debug!(
            n_rows = group.n_rows,
            n_updates = group.updates.len(),
            "transition-matrix updater ready"
        );
        Ok(Self {
            states_var: states_var.into(),
            group,
        })
    }

    pub fn row_group(&self) -> &RowGroup {
        &self.group
    }
}

impl GibbsStep for TransMatConjugateStep {
    fn step(&self, point: &Point, rng: &mut dyn RngCore) -> Result<Point> {
        let states = point.states(&self.states_var)?;
        let counts = transition_counts(states, self.group.n_rows)?;
        let mut next = point.clone();
        for update in &self.group.updates {
            let row = counts.row(update.row);
            let restricted: Vec<f64> = match &update.cols {
                Some(cols) => cols.iter().map(|&c| row[c]).collect(),
                None => row.to_vec(),
            };
            let posterior = update.prior.posterior(&restricted).ok_or_else(|| {
                Error::Validation(format!(
                    "counts for row {} do not match prior of '{}'",
                    update.row, update.leaf
                ))
            })?;
            let draw = sample_dirichlet(rng, &posterior.alpha)?;
            next.insert(update.leaf.clone(), Value::Vector(Array1::from(draw)));
        }
        Ok(next)
    }
}
