//! Error types for the inference core.
//!
//! Three families of failure exist here:
//! - construction/validation errors, raised eagerly when a chain or step
//!   is built against mismatched shapes or variables;
//! - structural-parse errors, raised once when a transition-matrix
//!   expression cannot be decomposed into Dirichlet rows;
//! - numerical degeneracy, raised per invocation when a filtered state
//!   distribution collapses to zero mass.
//!
//! All are values; library code never panics on bad input.

use thiserror::Error;

/// Result type alias for the inference core.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse grouping used by drivers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Shape or variable mismatches caught at construction.
    Validation,
    /// A transition-matrix expression outside the supported pattern.
    Structure,
    /// Runtime numerical failure inside one step invocation.
    Numerical,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Structure => write!(f, "structure"),
            ErrorCategory::Numerical => write!(f, "numerical"),
        }
    }
}

/// Unified error type for chain construction, structural analysis and
/// the sampling steps.
#[derive(Error, Debug)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: String,
        actual: String,
    },

    #[error("missing variable '{0}' in point")]
    MissingVariable(String),

    #[error("variable '{name}' is not a {expected}")]
    WrongKind {
        name: String,
        expected: &'static str,
    },

    #[error("structural parse error: {0}")]
    Structure(String),

    #[error("unsupported node in transition-matrix expression: {0}")]
    UnsupportedNode(&'static str),

    #[error("destination row {row} receives more than one Dirichlet vector")]
    RowCollision { row: usize },

    #[error("filtered state distribution has zero total mass at timestep {t}")]
    DegenerateFilter { t: usize },

    #[error("numerical instability: {0}")]
    NumericalInstability(String),
}

impl Error {
    /// Category for grouping and driver policy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation(_)
            | Error::ShapeMismatch { .. }
            | Error::MissingVariable(_)
            | Error::WrongKind { .. } => ErrorCategory::Validation,
            Error::Structure(_) | Error::UnsupportedNode(_) | Error::RowCollision { .. } => {
                ErrorCategory::Structure
            }
            Error::DegenerateFilter { .. } | Error::NumericalInstability(_) => {
                ErrorCategory::Numerical
            }
        }
    }

    /// Whether retrying the same invocation can ever help.
    ///
    /// Validation and structure errors are deterministic properties of the
    /// setup and never recover; numerical failures depend on the current
    /// parameter point and may pass on the next sweep.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Numerical)
    }
}
