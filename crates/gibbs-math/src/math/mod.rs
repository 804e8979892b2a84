//! Numerical building blocks shared by the inference steps.

pub mod dirichlet;
pub mod poisson;
pub mod stable;
