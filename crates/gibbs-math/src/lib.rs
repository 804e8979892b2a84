//! Log-domain math utilities for the Gibbs HMM crates.

pub mod math;

pub use math::dirichlet;
pub use math::poisson;
pub use math::stable::*;
