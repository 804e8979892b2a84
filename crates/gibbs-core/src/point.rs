//! Named variable assignments threaded through the Gibbs steps.
//!
//! A [`Point`] is one complete assignment of the model's free variables.
//! Steps never mutate their input; each invocation returns a fresh point
//! with the resampled variables replaced.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2, Array3};

use crate::error::{Error, Result};

/// One variable's value inside a point.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Probability vector or rate series.
    Vector(Array1<f64>),
    /// A fully evaluated transition matrix.
    Matrix(Array2<f64>),
    /// Per-timestep transition matrices, shaped `(T, K, K)` or `(1, K, K)`.
    Tensor(Array3<f64>),
    /// A discrete state sequence.
    States(Vec<usize>),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Vector(_) => "vector",
            Value::Matrix(_) => "matrix",
            Value::Tensor(_) => "tensor",
            Value::States(_) => "state sequence",
        }
    }
}

/// A map from variable name to current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Point {
    values: BTreeMap<String, Value>,
}

impl Point {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a variable.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<&Value> {
        self.values
            .get(name)
            .ok_or_else(|| Error::MissingVariable(name.to_string()))
    }

    /// Fetch a variable that must hold a vector.
    pub fn vector(&self, name: &str) -> Result<&Array1<f64>> {
        match self.get(name)? {
            Value::Vector(v) => Ok(v),
            other => Err(Error::WrongKind {
                name: format!("{name} ({})", other.kind()),
                expected: "vector",
            }),
        }
    }

    pub fn matrix(&self, name: &str) -> Result<&Array2<f64>> {
        match self.get(name)? {
            Value::Matrix(m) => Ok(m),
            other => Err(Error::WrongKind {
                name: format!("{name} ({})", other.kind()),
                expected: "matrix",
            }),
        }
    }

    pub fn tensor(&self, name: &str) -> Result<&Array3<f64>> {
        match self.get(name)? {
            Value::Tensor(t) => Ok(t),
            other => Err(Error::WrongKind {
                name: format!("{name} ({})", other.kind()),
                expected: "tensor",
            }),
        }
    }

    pub fn states(&self, name: &str) -> Result<&[usize]> {
        match self.get(name)? {
            Value::States(s) => Ok(s),
            other => Err(Error::WrongKind {
                name: format!("{name} ({})", other.kind()),
                expected: "state sequence",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use ndarray::arr1;

    #[test]
    fn insert_and_typed_get() {
        let mut point = Point::new();
        point.insert("p_0", Value::Vector(arr1(&[0.5, 0.5])));
        point.insert("S_t", Value::States(vec![0, 1, 1]));

        assert_eq!(point.vector("p_0").unwrap().len(), 2);
        assert_eq!(point.states("S_t").unwrap(), &[0, 1, 1]);
        assert!(point.contains("p_0"));
        assert!(!point.contains("p_1"));
    }

    #[test]
    fn missing_variable() {
        let point = Point::new();
        match point.vector("gamma") {
            Err(Error::MissingVariable(name)) => assert_eq!(name, "gamma"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn wrong_kind() {
        let mut point = Point::new();
        point.insert("S_t", Value::States(vec![0]));
        match point.vector("S_t") {
            Err(Error::WrongKind { expected, .. }) => assert_eq!(expected, "vector"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn insert_replaces() {
        let mut point = Point::new();
        point.insert("p", Value::Vector(arr1(&[1.0])));
        point.insert("p", Value::Vector(arr1(&[0.3, 0.7])));
        assert_eq!(point.vector("p").unwrap().len(), 2);
    }
}
