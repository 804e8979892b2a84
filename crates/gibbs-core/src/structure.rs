//! Transition-matrix expressions and their structural decomposition.
//!
//! A transition matrix is assembled row by row from a small closed set of
//! node kinds: named Dirichlet-distributed row vectors, constant rows,
//! scatters of a shorter Dirichlet vector into selected columns of a
//! constant base, a stack of rows, and a broadcast wrapper that repeats
//! one matrix across timesteps.
//!
//! [`MatrixExpr::analyze`] walks that tree once, up front, and produces a
//! [`RowGroup`]: for each Dirichlet leaf, which destination row it lands
//! in and which column subset it occupies. The conjugate updater is
//! driven entirely by that mapping.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use gibbs_math::math::dirichlet::DirichletParams;

use crate::error::{Error, Result};
use crate::point::Point;

/// A row-structured transition-matrix expression.
#[derive(Debug, Clone)]
pub enum MatrixExpr {
    /// A named free row vector with a Dirichlet prior.
    Leaf {
        name: String,
        prior: DirichletParams,
    },
    /// A fixed row.
    Constant(Array1<f64>),
    /// `values` written into `base` at the given column indices.
    Scatter {
        base: Box<MatrixExpr>,
        indices: Vec<usize>,
        values: Box<MatrixExpr>,
    },
    /// Rows stacked into a matrix.
    Stack(Vec<MatrixExpr>),
    /// A matrix repeated across every timestep.
    Broadcast(Box<MatrixExpr>),
}

/// Free helpers so call sites read like the expressions they build.
pub fn leaf(name: impl Into<String>, prior: DirichletParams) -> MatrixExpr {
    MatrixExpr::Leaf {
        name: name.into(),
        prior,
    }
}

pub fn constant(row: Array1<f64>) -> MatrixExpr {
    MatrixExpr::Constant(row)
}

pub fn scatter(base: MatrixExpr, indices: Vec<usize>, values: MatrixExpr) -> MatrixExpr {
    MatrixExpr::Scatter {
        base: Box::new(base),
        indices,
        values: Box::new(values),
    }
}

pub fn stack(rows: Vec<MatrixExpr>) -> MatrixExpr {
    MatrixExpr::Stack(rows)
}

pub fn broadcast(inner: MatrixExpr) -> MatrixExpr {
    MatrixExpr::Broadcast(Box::new(inner))
}

/// One Dirichlet row update extracted from the expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowUpdate {
    /// Name of the free vector in the point.
    pub leaf: String,
    /// Its prior concentration.
    pub prior: DirichletParams,
    /// Destination row in the assembled matrix.
    pub row: usize,
    /// Column subset the vector occupies; `None` means the full row.
    pub cols: Option<Vec<usize>>,
}

/// The full Dirichlet row decomposition of an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowGroup {
    pub updates: Vec<RowUpdate>,
    pub n_rows: usize,
}

impl MatrixExpr {
    /// Evaluate to a concrete matrix at the given point.
    ///
    /// The result must be square; each leaf is read from the point by
    /// name and must have its prior's length.
    pub fn eval(&self, point: &Point) -> Result<Array2<f64>> {
        let inner = match self {
            MatrixExpr::Broadcast(inner) => inner.as_ref(),
            other => other,
        };
        let rows = match inner {
            MatrixExpr::Stack(rows) => rows,
            MatrixExpr::Leaf { .. } | MatrixExpr::Constant(_) | MatrixExpr::Scatter { .. } => {
                return Err(Error::Structure(
                    "a transition matrix must be a stack of rows".into(),
                ))
            }
            MatrixExpr::Broadcast(_) => {
                return Err(Error::UnsupportedNode("nested broadcast"))
            }
        };
        let n = rows.len();
        if n == 0 {
            return Err(Error::Structure("empty row stack".into()));
        }
        let mut out = Array2::zeros((n, n));
        for (r, expr) in rows.iter().enumerate() {
            let row = expr.eval_row(point)?;
            if row.len() != n {
                return Err(Error::ShapeMismatch {
                    context: "transition matrix row",
                    expected: format!("length {n}"),
                    actual: format!("{}", row.len()),
                });
            }
            for (c, v) in row.iter().enumerate() {
                out[[r, c]] = *v;
            }
        }
        Ok(out)
    }

    fn eval_row(&self, point: &Point) -> Result<Vec<f64>> {
        match self {
            MatrixExpr::Leaf { name, prior } => {
                let v = point.vector(name)?;
                if v.len() != prior.k() {
                    return Err(Error::ShapeMismatch {
                        context: "Dirichlet row vector",
                        expected: format!("length {}", prior.k()),
                        actual: format!("{}", v.len()),
                    });
                }
                Ok(v.to_vec())
            }
            MatrixExpr::Constant(row) => Ok(row.to_vec()),
            MatrixExpr::Scatter {
                base,
                indices,
                values,
            } => {
                let mut row = base.eval_row(point)?;
                let vals = values.eval_row(point)?;
                if vals.len() != indices.len() {
                    return Err(Error::ShapeMismatch {
                        context: "scatter",
                        expected: format!("{} values", indices.len()),
                        actual: format!("{}", vals.len()),
                    });
                }
                let len = row.len();
                for (&idx, &v) in indices.iter().zip(&vals) {
                    let slot = row.get_mut(idx).ok_or_else(|| {
                        Error::Structure(format!(
                            "scatter index {idx} out of range for row of length {len}"
                        ))
                    })?;
                    *slot = v;
                }
                Ok(row)
            }
            MatrixExpr::Stack(_) => Err(Error::UnsupportedNode("stack inside a row")),
            MatrixExpr::Broadcast(_) => Err(Error::UnsupportedNode("broadcast inside a row")),
        }
    }

    /// Decompose the expression into per-leaf Dirichlet row updates.
    ///
    /// Fails when a row mixes Dirichlet content ambiguously, when a leaf
    /// name appears in more than one row, or when a node kind outside the
    /// supported pattern shows up.
    pub fn analyze(&self) -> Result<RowGroup> {
        let inner = match self {
            MatrixExpr::Broadcast(inner) => inner.as_ref(),
            other => other,
        };
        let MatrixExpr::Stack(rows) = inner else {
            return Err(Error::Structure(
                "a transition matrix must be a stack of rows".into(),
            ));
        };
        let mut updates = Vec::new();
        for (r, expr) in rows.iter().enumerate() {
            if let Some(update) = analyze_row(expr, r)? {
                if updates.iter().any(|u: &RowUpdate| u.leaf == update.leaf) {
                    return Err(Error::Structure(format!(
                        "leaf '{}' appears in more than one row",
                        update.leaf
                    )));
                }
                updates.push(update);
            }
        }
        Ok(RowGroup {
            updates,
            n_rows: rows.len(),
        })
    }
}

fn contains_leaf(expr: &MatrixExpr) -> bool {
    match expr {
        MatrixExpr::Leaf { .. } => true,
        MatrixExpr::Constant(_) => false,
        MatrixExpr::Scatter { base, values, .. } => contains_leaf(base) || contains_leaf(values),
        MatrixExpr::Stack(rows) => rows.iter().any(contains_leaf),
        MatrixExpr::Broadcast(inner) => contains_leaf(inner),
    }
}

fn analyze_row(expr: &MatrixExpr, row: usize) -> Result<Option<RowUpdate>> {
    match expr {
        MatrixExpr::Leaf { name, prior } => Ok(Some(RowUpdate {
            leaf: name.clone(),
            prior: prior.clone(),
            row,
            cols: None,
        })),
        MatrixExpr::Constant(_) => Ok(None),
        MatrixExpr::Scatter {
            base,
            indices,
            values,
        } => {
            if contains_leaf(base) {
                return Err(Error::RowCollision { row });
            }
            match values.as_ref() {
                MatrixExpr::Leaf { name, prior } => {
                    if indices.len() != prior.k() {
                        return Err(Error::ShapeMismatch {
                            context: "scatter",
                            expected: format!("{} column indices", prior.k()),
                            actual: format!("{}", indices.len()),
                        });
                    }
                    Ok(Some(RowUpdate {
                        leaf: name.clone(),
                        prior: prior.clone(),
                        row,
                        cols: Some(indices.clone()),
                    }))
                }
                MatrixExpr::Constant(_) => Ok(None),
                _ => Err(Error::UnsupportedNode("non-leaf scatter values")),
            }
        }
        MatrixExpr::Stack(_) => Err(Error::UnsupportedNode("stack inside a row")),
        MatrixExpr::Broadcast(_) => Err(Error::UnsupportedNode("broadcast inside a row")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Value;
    use ndarray::arr1;

    fn uniform(k: usize) -> DirichletParams {
        DirichletParams::uniform(k).unwrap()
    }

    #[test]
    fn eval_stack_of_leaves() {
        let expr = broadcast(stack(vec![
            leaf("p_0", uniform(2)),
            leaf("p_1", uniform(2)),
        ]));
        let mut point = Point::new();
        point.insert("p_0", Value::Vector(arr1(&[0.9, 0.1])));
        point.insert("p_1", Value::Vector(arr1(&[0.3, 0.7])));
        let m = expr.eval(&point).unwrap();
        assert_eq!(m[[0, 0]], 0.9);
        assert_eq!(m[[1, 1]], 0.7);
    }

    #[test]
    fn eval_scatter_into_constant_base() {
        let expr = stack(vec![
            constant(arr1(&[0.0, 0.0, 1.0])),
            scatter(
                constant(arr1(&[0.0, 0.0, 0.0])),
                vec![0, 2],
                leaf("d_0", uniform(2)),
            ),
            constant(arr1(&[0.2, 0.3, 0.5])),
        ]);
        let mut point = Point::new();
        point.insert("d_0", Value::Vector(arr1(&[0.4, 0.6])));
        let m = expr.eval(&point).unwrap();
        assert_eq!(m[[1, 0]], 0.4);
        assert_eq!(m[[1, 1]], 0.0);
        assert_eq!(m[[1, 2]], 0.6);
    }

    #[test]
    fn eval_rejects_scatter_index_out_of_range() {
        let expr = stack(vec![
            scatter(
                constant(arr1(&[0.0, 0.0])),
                vec![0, 5],
                leaf("d", uniform(2)),
            ),
            constant(arr1(&[0.0, 1.0])),
        ]);
        let mut point = Point::new();
        point.insert("d", Value::Vector(arr1(&[0.5, 0.5])));
        match expr.eval(&point) {
            Err(Error::Structure(msg)) => assert!(msg.contains("index 5")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn eval_rejects_non_square() {
        let expr = stack(vec![constant(arr1(&[0.5, 0.5, 0.0]))]);
        assert!(expr.eval(&Point::new()).is_err());
    }

    #[test]
    fn eval_rejects_wrong_leaf_length() {
        let expr = stack(vec![
            leaf("p", uniform(3)),
            constant(arr1(&[0.0, 1.0])),
        ]);
        let mut point = Point::new();
        point.insert("p", Value::Vector(arr1(&[0.5, 0.5])));
        assert!(expr.eval(&point).is_err());
    }

    #[test]
    fn analyze_full_rows() {
        let expr = broadcast(stack(vec![
            leaf("p_0", uniform(2)),
            leaf("p_1", uniform(2)),
        ]));
        let group = expr.analyze().unwrap();
        assert_eq!(group.n_rows, 2);
        assert_eq!(group.updates.len(), 2);
        assert_eq!(group.updates[0].leaf, "p_0");
        assert_eq!(group.updates[0].row, 0);
        assert_eq!(group.updates[0].cols, None);
        assert_eq!(group.updates[1].row, 1);
    }

    #[test]
    fn analyze_scattered_subrows() {
        // Row 0 is pinned, d_0 occupies columns {0, 2} of row 1, and d_1
        // occupies columns {1, 2} of row 2.
        let expr = stack(vec![
            constant(arr1(&[0.0, 0.0, 1.0])),
            scatter(
                constant(arr1(&[0.0, 0.0, 0.0])),
                vec![0, 2],
                leaf("d_0", uniform(2)),
            ),
            scatter(
                constant(arr1(&[0.0, 0.0, 0.0])),
                vec![1, 2],
                leaf("d_1", uniform(2)),
            ),
        ]);
        let group = expr.analyze().unwrap();
        assert_eq!(group.n_rows, 3);
        assert_eq!(group.updates.len(), 2);
        assert_eq!(group.updates[0].leaf, "d_0");
        assert_eq!(group.updates[0].row, 1);
        assert_eq!(group.updates[0].cols, Some(vec![0, 2]));
        assert_eq!(group.updates[1].leaf, "d_1");
        assert_eq!(group.updates[1].row, 2);
        assert_eq!(group.updates[1].cols, Some(vec![1, 2]));
    }

    #[test]
    fn analyze_rejects_leaf_in_scatter_base() {
        let expr = stack(vec![scatter(
            leaf("base", uniform(2)),
            vec![0],
            leaf("v", uniform(1)),
        )]);
        match expr.analyze() {
            Err(Error::RowCollision { row }) => assert_eq!(row, 0),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn analyze_rejects_duplicate_leaf_names() {
        let expr = stack(vec![leaf("p", uniform(2)), leaf("p", uniform(2))]);
        assert!(matches!(expr.analyze(), Err(Error::Structure(_))));
    }

    #[test]
    fn analyze_rejects_index_count_mismatch() {
        let expr = stack(vec![scatter(
            constant(arr1(&[0.0, 0.0, 0.0])),
            vec![0],
            leaf("d", uniform(2)),
        )]);
        assert!(matches!(expr.analyze(), Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn analyze_rejects_nested_stack() {
        let expr = stack(vec![stack(vec![constant(arr1(&[1.0]))])]);
        assert!(matches!(expr.analyze(), Err(Error::UnsupportedNode(_))));
    }

    #[test]
    fn analyze_rejects_bare_leaf() {
        let expr = leaf("p", uniform(2));
        assert!(matches!(expr.analyze(), Err(Error::Structure(_))));
    }

    #[test]
    fn row_group_round_trips_through_serde() {
        let expr = stack(vec![
            leaf("p_0", uniform(2)),
            scatter(
                constant(arr1(&[0.0, 0.0])),
                vec![0, 1],
                leaf("p_1", uniform(2)),
            ),
        ]);
        let group = expr.analyze().unwrap();
        let json = serde_json::to_string(&group).unwrap();
        let back: RowGroup = serde_json::from_str(&json).unwrap();
        assert_eq!(back, group);
    }
}
