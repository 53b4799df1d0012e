//! Solve linear programs of the form
//!
//! ```text
//! minimize cᵀx  subject to  A_ub·x ≤ b_ub,  A_eq·x = b_eq,  x ≥ 0  (optionally x ∈ ℤ)
//! ```
//!
//! Backed by [`microlp`]. Constraint matrices can be passed densely ([`solve`]) or as
//! sparse rows ([`LpProblem`]); infeasible and unbounded programs yield `None`.
use log::trace;
use microlp::{ComparisonOp, LinearExpr, OptimizationDirection, Problem};
use nalgebra::DMatrix;

/// Heuristic values above this bound are treated as numerically unstable and discarded
pub const MAX_ALLOWED_HEURISTICS: f64 = 1e15;

/// Tolerance for treating a coefficient as zero
const EPS: f64 = 1e-9;

/// Sparse matrix row: `(column, coefficient)` pairs
pub type SparseRow = Vec<(usize, f64)>;

/// Optimal solution of a linear program
#[derive(Debug, Clone, PartialEq)]
pub struct LpSolution {
    objective: f64,
    x: Vec<f64>,
}

impl LpSolution {
    /// Objective value `cᵀx`
    pub fn primal(&self) -> f64 {
        self.objective
    }

    /// Variable values (all non-negative)
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    /// Consume the solution, returning the variable values
    pub fn into_x(self) -> Vec<f64> {
        self.x
    }
}

/// A linear program with sparse constraint rows
#[derive(Debug, Clone, Default)]
pub struct LpProblem {
    /// Objective coefficients (one per variable)
    pub c: Vec<f64>,
    /// Upper-bounded rows
    pub a_ub: Vec<SparseRow>,
    /// Right-hand sides of `a_ub`
    pub b_ub: Vec<f64>,
    /// Equality rows
    pub a_eq: Vec<SparseRow>,
    /// Right-hand sides of `a_eq`
    pub b_eq: Vec<f64>,
    /// Solve as integer program
    pub integer: bool,
}

impl LpProblem {
    /// Convert a dense matrix into sparse rows
    pub fn sparse_rows(m: &DMatrix<f64>) -> Vec<SparseRow> {
        m.row_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .filter(|(_, v)| v.abs() > EPS)
                    .map(|(j, v)| (j, *v))
                    .collect()
            })
            .collect()
    }

    /// Solve the program, returning `None` if it is infeasible or unbounded
    pub fn solve(&self) -> Option<LpSolution> {
        let mut problem = Problem::new(OptimizationDirection::Minimize);
        let vars: Vec<_> = self
            .c
            .iter()
            .map(|c| {
                if self.integer {
                    problem.add_integer_var(*c, (0, i32::MAX))
                } else {
                    problem.add_var(*c, (0.0, f64::INFINITY))
                }
            })
            .collect();

        let rows = self
            .a_ub
            .iter()
            .zip(&self.b_ub)
            .map(|(r, b)| (r, *b, ComparisonOp::Le))
            .chain(
                self.a_eq
                    .iter()
                    .zip(&self.b_eq)
                    .map(|(r, b)| (r, *b, ComparisonOp::Eq)),
            );
        for (row, rhs, op) in rows {
            let mut expr = LinearExpr::empty();
            let mut empty = true;
            for (j, coeff) in row {
                if coeff.abs() > EPS {
                    expr.add(vars[*j], *coeff);
                    empty = false;
                }
            }
            if empty {
                // 0 ≤ b resp. 0 = b decides feasibility on its own
                let holds = match op {
                    ComparisonOp::Le => rhs >= -EPS,
                    _ => rhs.abs() <= EPS,
                };
                if !holds {
                    trace!("LP trivially infeasible (empty row with rhs {})", rhs);
                    return None;
                }
                continue;
            }
            problem.add_constraint(expr, op, rhs);
        }
        if vars.is_empty() {
            return Some(LpSolution {
                objective: 0.0,
                x: Vec::new(),
            });
        }

        match problem.solve() {
            Ok(solution) => Some(LpSolution {
                objective: solution.objective(),
                x: vars.iter().map(|v| solution[*v].max(0.0)).collect(),
            }),
            Err(e) => {
                trace!("LP without solution: {}", e);
                None
            }
        }
    }
}

///
/// Solve `min cᵀx` s.t. `A_ub·x ≤ b_ub`, `A_eq·x = b_eq`, `x ≥ 0` with dense constraint matrices
///
/// Pass empty (0-row) matrices for absent constraint blocks.
pub fn solve(
    c: &[f64],
    a_ub: &DMatrix<f64>,
    b_ub: &[f64],
    a_eq: &DMatrix<f64>,
    b_eq: &[f64],
    integer: bool,
) -> Option<LpSolution> {
    LpProblem {
        c: c.to_vec(),
        a_ub: LpProblem::sparse_rows(a_ub),
        b_ub: b_ub.to_vec(),
        a_eq: LpProblem::sparse_rows(a_eq),
        b_eq: b_eq.to_vec(),
        integer,
    }
    .solve()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_lp() {
        // min x + 2y s.t. x + y = 2, x <= 1.5
        let sol = solve(
            &[1.0, 2.0],
            &DMatrix::from_row_slice(1, 2, &[1.0, 0.0]),
            &[1.5],
            &DMatrix::from_row_slice(1, 2, &[1.0, 1.0]),
            &[2.0],
            false,
        )
        .unwrap();
        assert!((sol.primal() - 2.5).abs() < 1e-6);
        assert!((sol.x()[0] - 1.5).abs() < 1e-6);
        assert!((sol.x()[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn integer_lp() {
        // min x + 2y s.t. x + y = 2, x <= 1.5, x, y integer
        let sol = solve(
            &[1.0, 2.0],
            &DMatrix::from_row_slice(1, 2, &[1.0, 0.0]),
            &[1.5],
            &DMatrix::from_row_slice(1, 2, &[1.0, 1.0]),
            &[2.0],
            true,
        )
        .unwrap();
        assert!((sol.primal() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn infeasible_is_none() {
        let sol = solve(
            &[1.0],
            &DMatrix::zeros(0, 1),
            &[],
            &DMatrix::from_row_slice(1, 1, &[1.0]),
            &[-1.0],
            false,
        );
        assert!(sol.is_none());
    }

    #[test]
    fn empty_rows_are_checked_directly() {
        let problem = LpProblem {
            c: vec![1.0],
            a_eq: vec![vec![]],
            b_eq: vec![1.0],
            ..Default::default()
        };
        assert!(problem.solve().is_none());
        let problem = LpProblem {
            c: vec![1.0],
            a_eq: vec![vec![(0, 0.0)]],
            b_eq: vec![0.0],
            ..Default::default()
        };
        assert_eq!(problem.solve().map(|s| s.primal()), Some(0.0));
    }
}
