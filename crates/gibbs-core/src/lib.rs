//! Gibbs sampling kernels for discrete-state hidden Markov models.
//!
//! Two block updates are provided, each exact (no tuning, no rejection):
//!
//! - [`steps::FfbsStep`] draws a full posterior state path by forward
//!   filtering and backward sampling;
//! - [`steps::TransMatConjugateStep`] redraws the Dirichlet-distributed
//!   rows of a transition matrix from their conjugate posteriors, guided
//!   by a one-time structural analysis of the matrix expression.
//!
//! Supporting modules cover the validated chain model, switching
//! emission densities, transition tallies and the shared sampling
//! primitives.

pub mod chain;
pub mod emission;
pub mod error;
pub mod ffbs;
pub mod freqs;
pub mod point;
pub mod sample;
pub mod steps;
pub mod structure;

pub use chain::MarkovChain;
pub use emission::{RateSpec, StateDensity, SwitchingEmission};
pub use error::{Error, ErrorCategory, Result};
pub use point::{Point, Value};
pub use steps::{FfbsStep, GibbsStep, InitialSpec, TransMatConjugateStep, TransitionSpec};
pub use structure::{MatrixExpr, RowGroup, RowUpdate};
