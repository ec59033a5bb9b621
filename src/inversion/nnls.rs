use crate::base::{Config, InversionError, DEFAULT_NNLS_TOLERANCE};
use crate::StrError;
use russell_lab::{mat_t_mat_mul, mat_vec_mul, vec_mat_mul, Matrix, Vector};

/// Solves the regularized non-negative least-squares problem
///
/// Finds `x ≥ 0` minimizing `‖G x - d‖² + ‖L x‖²`, i.e., the residual norm of the
/// augmented system `[G; L] x = [d; 0]`.
///
/// The active-set method of Lawson and Hanson is applied to the normal equations
/// `(GᵀG + LᵀL) x = Gᵀd`: variables are moved from the active (zero) set to the passive
/// (free) set while the gradient `w = Gᵀd - (GᵀG + LᵀL) x` has a positive entry on the
/// active set, and the unconstrained least-squares problem restricted to the passive set
/// is solved after each move, stepping back to the feasible region when needed.
///
/// The Cholesky factor of the passive-set matrix is updated when a variable enters or
/// leaves the passive set, hence each passive-set solve costs `O(m²)` for `m` free variables.
///
/// # Reference
///
/// 1. Lawson CL and Hanson RJ (1974) Solving Least Squares Problems, Prentice-Hall, Chapter 23
#[derive(Clone, Copy, Debug)]
pub struct NnlsSolver {
    /// Maximum number of passive-set solves (None means 3 × number of unknowns)
    pub max_iterations: Option<usize>,

    /// Relative tolerance on the KKT optimality condition
    pub tolerance: f64,
}

impl NnlsSolver {
    /// Allocates a new instance
    pub fn new(max_iterations: Option<usize>, tolerance: f64) -> Result<Self, InversionError> {
        if max_iterations == Some(0) {
            return Err(InversionError::InvalidInput("the maximum number of iterations must be ≥ 1"));
        }
        if !(tolerance > 0.0) || !tolerance.is_finite() {
            return Err(InversionError::InvalidInput("the NNLS tolerance must be > 0.0"));
        }
        Ok(NnlsSolver {
            max_iterations,
            tolerance,
        })
    }

    /// Allocates a new instance with the solver parameters of a configuration
    pub fn from_config(config: &Config) -> Result<Self, InversionError> {
        NnlsSolver::new(config.nnls_max_iterations, config.nnls_tolerance)
    }

    /// Solves the augmented system `[G; L] x = [d; 0]` subject to `x ≥ 0`
    ///
    /// # Input
    ///
    /// * `gg` -- the forward matrix G (nrow × n)
    /// * `ll` -- the penalty operator L (any number of rows × n)
    /// * `d` -- the data vector (nrow)
    ///
    /// # Output
    ///
    /// Returns the slip vector `x` (n) with all components ≥ 0. If the iteration limit is
    /// reached, or if a variable excluded because of a singular subproblem still violates
    /// the optimality conditions, returns [InversionError::Convergence] holding the best
    /// feasible iterate.
    pub fn solve(&self, gg: &Matrix, ll: &Matrix, d: &Vector) -> Result<Vector, InversionError> {
        let (nrow, n) = gg.dims();
        let ncol_l = ll.ncol();
        if d.dim() != nrow {
            return Err(InversionError::DimensionMismatch(format!(
                "G has {} rows but the data vector has {} values",
                nrow,
                d.dim()
            )));
        }
        if ncol_l != n {
            return Err(InversionError::DimensionMismatch(format!(
                "G has {} columns but L has {}",
                n, ncol_l
            )));
        }
        if n == 0 {
            return Err(InversionError::DimensionMismatch("there are no unknowns".to_string()));
        }
        if d.as_data().iter().any(|v| !v.is_finite()) {
            return Err(InversionError::InvalidInput("the data vector must be finite"));
        }

        let (ata, atb) = normal_equations(gg, ll, d)?;
        let max_iterations = self.max_iterations.unwrap_or(3 * n);
        let scale = atb.as_data().iter().fold(1.0, |acc: f64, v| f64::max(acc, f64::abs(*v)));
        let tol = self.tolerance * scale;

        let mut x = Vector::new(n);
        let mut w = Vector::new(n);
        let mut passive = vec![false; n];
        let mut blocked = vec![false; n];
        let mut factor = PassiveFactor::new();
        let mut iterations = 0;

        loop {
            // gradient of the negative objective: w = Aᵀb - AᵀA x
            mat_vec_mul(&mut w, -1.0, &ata, &x).map_err(InversionError::Numerical)?;
            for i in 0..n {
                w[i] += atb[i];
            }

            // most violating active variable
            let mut candidate = None;
            let mut w_max = tol;
            for i in 0..n {
                if !passive[i] && !blocked[i] && w[i] > w_max {
                    w_max = w[i];
                    candidate = Some(i);
                }
            }
            let t = match candidate {
                Some(t) => t,
                None => break,
            };
            if factor.add(&ata, t).is_err() {
                // column t depends on the passive columns
                x[t] = 0.0;
                blocked[t] = true;
                continue;
            }
            tracing::debug!(iterations, index = t, gradient = w_max, "NNLS: freeing variable");
            passive[t] = true;

            // inner loop: least squares on the passive set with feasibility steps
            let mut first = true;
            loop {
                if iterations >= max_iterations {
                    tracing::info!(iterations, "NNLS: iteration limit reached");
                    return Err(InversionError::Convergence {
                        iterations,
                        best: x.as_data().clone(),
                    });
                }
                iterations += 1;
                let z = factor.solve(&atb);
                if z.iter().any(|v| !v.is_finite()) {
                    return Err(InversionError::Numerical("the passive-set subproblem is not finite"));
                }
                if first {
                    first = false;
                    // t is the last free variable
                    let last = z.len() - 1;
                    if z[last] <= 0.0 {
                        // round-off made the gradient look positive
                        factor.remove(last);
                        x[t] = 0.0;
                        passive[t] = false;
                        blocked[t] = true;
                        break;
                    }
                }
                if z.iter().all(|v| *v > 0.0) {
                    for (k, i) in factor.free.iter().enumerate() {
                        x[*i] = z[k];
                    }
                    blocked.fill(false);
                    break;
                }

                // step from x towards z until the first passive variable hits zero
                let mut alpha = 0.0;
                let mut limiting = None;
                for (k, i) in factor.free.iter().enumerate() {
                    if z[k] <= 0.0 {
                        let denominator = x[*i] - z[k];
                        let ratio = if denominator > 0.0 { x[*i] / denominator } else { 0.0 };
                        if limiting.is_none() || ratio < alpha {
                            alpha = ratio;
                            limiting = Some(*i);
                        }
                    }
                }
                for (k, i) in factor.free.iter().enumerate() {
                    x[*i] += alpha * (z[k] - x[*i]);
                }
                if let Some(i) = limiting {
                    x[i] = 0.0;
                }
                for k in (0..factor.len()).rev() {
                    let i = factor.free[k];
                    if x[i] <= 0.0 {
                        x[i] = 0.0;
                        passive[i] = false;
                        factor.remove(k);
                    }
                }
            }
        }

        if (0..n).any(|i| blocked[i] && w[i] > tol) {
            tracing::info!(iterations, "NNLS: a singular subproblem prevents optimality");
            return Err(InversionError::Convergence {
                iterations,
                best: x.as_data().clone(),
            });
        }
        tracing::info!(iterations, n_free = factor.len(), "NNLS: converged");
        Ok(x)
    }
}

impl Default for NnlsSolver {
    fn default() -> Self {
        NnlsSolver {
            max_iterations: None,
            tolerance: DEFAULT_NNLS_TOLERANCE,
        }
    }
}

/// Computes `AᵀA` and `Aᵀb` of the augmented system with `A = [G; L]` and `b = [d; 0]`
fn normal_equations(gg: &Matrix, ll: &Matrix, d: &Vector) -> Result<(Matrix, Vector), InversionError> {
    let n = gg.ncol();
    let mut ata = Matrix::new(n, n);
    mat_t_mat_mul(&mut ata, 1.0, gg, gg, 0.0).map_err(InversionError::Numerical)?;
    if ll.nrow() > 0 {
        mat_t_mat_mul(&mut ata, 1.0, ll, ll, 1.0).map_err(InversionError::Numerical)?;
    }
    let mut atb = Vector::new(n);
    vec_mat_mul(&mut atb, 1.0, d, gg).map_err(InversionError::Numerical)?;
    if ata.as_data().iter().chain(atb.as_data()).any(|v| !v.is_finite()) {
        return Err(InversionError::Numerical("the normal equations are not finite"));
    }
    Ok((ata, atb))
}

/// Holds the upper-triangular Cholesky factor `R` of `AᵀA` restricted to the passive set
///
/// Column `k` of `R` is stored with its `k + 1` leading entries. Adding a variable appends
/// a column; removing one deletes a column and restores the triangle with Givens rotations.
struct PassiveFactor {
    /// Unknowns in the passive set, in the order of the columns of `R`
    free: Vec<usize>,
    columns: Vec<Vec<f64>>,
}

impl PassiveFactor {
    fn new() -> Self {
        PassiveFactor {
            free: Vec::new(),
            columns: Vec::new(),
        }
    }

    fn len(&self) -> usize {
        self.free.len()
    }

    /// Appends the unknown `i`; fails if its column is (numerically) dependent on the others
    fn add(&mut self, ata: &Matrix, i: usize) -> Result<(), StrError> {
        let m = self.free.len();
        let mut column = Vec::with_capacity(m + 1);
        for r in 0..m {
            let rr = &self.columns[r];
            let s = ata.get(self.free[r], i) - dot(&rr[..r], &column[..r]);
            column.push(s / rr[r]);
        }
        let diagonal = ata.get(i, i);
        let d2 = diagonal - dot(&column, &column);
        if !(d2 > f64::EPSILON * diagonal) {
            return Err("the passive-set subproblem is singular");
        }
        column.push(f64::sqrt(d2));
        self.free.push(i);
        self.columns.push(column);
        Ok(())
    }

    /// Removes the `k`-th free variable
    fn remove(&mut self, k: usize) {
        self.free.remove(k);
        self.columns.remove(k);
        for j in k..self.columns.len() {
            // column j has one entry below the diagonal now
            let a = self.columns[j][j];
            let b = self.columns[j][j + 1];
            let h = f64::hypot(a, b);
            let (c, s) = (a / h, b / h);
            for column in self.columns[j..].iter_mut() {
                let (u, v) = (column[j], column[j + 1]);
                column[j] = c * u + s * v;
                column[j + 1] = c * v - s * u;
            }
            self.columns[j].pop();
        }
    }

    /// Solves `RᵀR z = (Aᵀb)_free`
    fn solve(&self, atb: &Vector) -> Vec<f64> {
        let m = self.free.len();
        let mut z = vec![0.0; m];
        for r in 0..m {
            let rr = &self.columns[r];
            let s = atb[self.free[r]] - dot(&rr[..r], &z[..r]);
            z[r] = s / rr[r];
        }
        for c in (0..m).rev() {
            let rr = &self.columns[c];
            z[c] /= rr[c];
            let zc = z[c];
            for r in 0..c {
                z[r] -= rr[r] * zc;
            }
        }
        z
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{NnlsSolver, PassiveFactor};
    use crate::base::InversionError;
    use russell_lab::{approx_eq, solve_lin_sys, Matrix, Vector};

    fn small_identity(n: usize, value: f64) -> Matrix {
        let mut ll = Matrix::new(n, n);
        for i in 0..n {
            ll.set(i, i, value);
        }
        ll
    }

    #[test]
    fn new_captures_errors() {
        assert_eq!(
            NnlsSolver::new(Some(0), 1e-10).err(),
            Some(InversionError::InvalidInput("the maximum number of iterations must be ≥ 1"))
        );
        assert_eq!(
            NnlsSolver::new(None, 0.0).err(),
            Some(InversionError::InvalidInput("the NNLS tolerance must be > 0.0"))
        );
    }

    #[test]
    fn solve_captures_errors() {
        let solver = NnlsSolver::default();
        let gg = Matrix::from(&[[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]);
        let ll = small_identity(2, 1e-3);
        assert_eq!(
            solver.solve(&gg, &ll, &Vector::new(2)).err(),
            Some(InversionError::DimensionMismatch(
                "G has 3 rows but the data vector has 2 values".to_string()
            ))
        );
        assert_eq!(
            solver.solve(&gg, &small_identity(3, 1.0), &Vector::new(3)).err(),
            Some(InversionError::DimensionMismatch("G has 2 columns but L has 3".to_string()))
        );
        assert_eq!(
            solver.solve(&gg, &ll, &Vector::from(&[1.0, f64::NAN, 0.0])).err(),
            Some(InversionError::InvalidInput("the data vector must be finite"))
        );
    }

    #[test]
    fn solve_matches_least_squares_when_unconstrained() {
        let solver = NnlsSolver::default();
        let gg = Matrix::from(&[[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]);
        let ll = small_identity(2, 1e-8);
        let d = Vector::from(&[1.0, 2.0, 3.0]);
        let x = solver.solve(&gg, &ll, &d).unwrap();
        approx_eq(x[0], 1.0, 1e-10);
        approx_eq(x[1], 2.0, 1e-10);
    }

    #[test]
    fn solve_holds_negative_variables_at_zero() {
        let solver = NnlsSolver::default();
        let gg = Matrix::from(&[[1.0, 0.0], [0.0, 1.0]]);
        let damping = 1e-3;
        let ll = small_identity(2, damping);
        let d = Vector::from(&[1.0, -1.0]);
        let x = solver.solve(&gg, &ll, &d).unwrap();
        approx_eq(x[0], 1.0 / (1.0 + damping * damping), 1e-14);
        assert_eq!(x[1], 0.0);
    }

    #[test]
    fn solve_satisfies_kkt_conditions() {
        let solver = NnlsSolver::default();
        #[rustfmt::skip]
        let gg = Matrix::from(&[
            [ 1.0,  2.0, -1.0,  0.5],
            [ 0.0,  1.0,  3.0, -2.0],
            [ 2.0, -1.0,  1.0,  1.0],
            [-1.0,  0.5,  2.0,  3.0],
            [ 1.5,  1.0,  0.0, -1.0],
        ]);
        let ll = small_identity(4, 0.1);
        let d = Vector::from(&[1.0, -2.0, 3.0, -1.0, 2.0]);
        let x = solver.solve(&gg, &ll, &d).unwrap();
        // gradient w = Gᵀ(d - Gx) - LᵀL x
        for j in 0..4 {
            let mut w = -0.01 * x[j];
            for i in 0..5 {
                let gx: f64 = (0..4).map(|k| gg.get(i, k) * x[k]).sum();
                w += gg.get(i, j) * (d[i] - gx);
            }
            assert!(x[j] >= 0.0);
            if x[j] > 0.0 {
                approx_eq(w, 0.0, 1e-9);
            } else {
                assert!(w <= 1e-9);
            }
        }
    }

    #[test]
    fn solve_handles_rank_deficiency() {
        let solver = NnlsSolver::default();
        let gg = Matrix::from(&[[1.0, 1.0], [1.0, 1.0]]);
        let ll = small_identity(2, 0.1);
        let d = Vector::from(&[1.0, 1.0]);
        let x = solver.solve(&gg, &ll, &d).unwrap();
        approx_eq(x[0], 2.0 / 4.01, 1e-12);
        approx_eq(x[1], 2.0 / 4.01, 1e-12);
    }

    #[test]
    fn solve_reports_a_dependent_column_that_violates_optimality() {
        // the second column is parallel to the first in floating point (1 + 1e-18 == 1),
        // but its gradient stays positive after the first column is fitted
        let solver = NnlsSolver::default();
        let gg = Matrix::from(&[[2.0, 1.0], [0.0, 1e-9]]);
        let ll = Matrix::new(2, 2);
        let d = Vector::from(&[1.0, 1e3]);
        match solver.solve(&gg, &ll, &d) {
            Err(InversionError::Convergence { iterations, best }) => {
                assert_eq!(iterations, 1);
                approx_eq(best[0], 0.5, 1e-15);
                assert_eq!(best[1], 0.0);
            }
            _ => panic!("expected a convergence error"),
        }
    }

    #[test]
    fn solve_works_after_removing_variables() {
        // two feasibility steps remove variables from the passive set,
        // so the factor is downdated before the final solve
        let solver = NnlsSolver::default();
        #[rustfmt::skip]
        let gg = Matrix::from(&[
            [ 2.0, 0.5, -0.5, -1.0],
            [ 0.5, 0.5,  0.5, -1.0],
            [ 0.0, 0.0,  0.5, -1.0],
            [ 1.0, 1.0,  2.0,  0.5],
            [-0.5, 0.5,  1.0,  2.0],
        ]);
        let damping = 1e-3;
        let ll = small_identity(4, damping);
        let d = Vector::from(&[3.0, 2.0, 1.0, 3.0, 2.0]);
        let x = solver.solve(&gg, &ll, &d).unwrap();

        // compare with the brute-force minimum over all passive sets
        let mut best = f64::INFINITY;
        let mut best_x = vec![0.0; 4];
        for mask in 1..16_usize {
            let free: Vec<usize> = (0..4).filter(|i| mask & (1 << i) != 0).collect();
            let m = free.len();
            let mut a = Matrix::new(m, m);
            let mut b = Vector::new(m);
            for (r, i) in free.iter().enumerate() {
                b[r] = (0..5).map(|k| gg.get(k, *i) * d[k]).sum::<f64>();
                for (c, j) in free.iter().enumerate() {
                    let g: f64 = (0..5).map(|k| gg.get(k, *i) * gg.get(k, *j)).sum();
                    a.set(r, c, if i == j { g + damping * damping } else { g });
                }
            }
            solve_lin_sys(&mut b, &mut a).unwrap();
            if b.as_data().iter().any(|v| *v < 0.0) {
                continue;
            }
            let mut trial = vec![0.0; 4];
            for (r, i) in free.iter().enumerate() {
                trial[*i] = b[r];
            }
            let mut objective = damping * damping * trial.iter().map(|v| v * v).sum::<f64>();
            for k in 0..5 {
                let r = d[k] - (0..4).map(|j| gg.get(k, j) * trial[j]).sum::<f64>();
                objective += r * r;
            }
            if objective < best {
                best = objective;
                best_x = trial;
            }
        }
        approx_eq(best_x[0], 0.48888985876409, 1e-12);
        approx_eq(best_x[1], 3.15555264395381, 1e-12);
        for i in 0..4 {
            assert!(x[i] >= 0.0);
            approx_eq(x[i], best_x[i], 1e-10);
        }
        assert_eq!(x[2], 0.0);
        assert_eq!(x[3], 0.0);
    }

    #[test]
    fn passive_factor_add_and_remove_work() {
        #[rustfmt::skip]
        let ata = Matrix::from(&[
            [4.0, 1.0, 0.5, 0.2],
            [1.0, 3.0, 0.3, 0.1],
            [0.5, 0.3, 2.0, 0.4],
            [0.2, 0.1, 0.4, 1.5],
        ]);
        let atb = Vector::from(&[1.0, -2.0, 0.5, 3.0]);
        let mut factor = PassiveFactor::new();
        for i in [3, 0, 1, 2] {
            factor.add(&ata, i).unwrap();
        }
        assert_eq!(factor.len(), 4);
        factor.remove(2); // unknown 1
        factor.remove(0); // unknown 3
        assert_eq!(factor.free, &[0, 2]);
        let z = factor.solve(&atb);

        // reference: direct solve of the 2 × 2 subproblem
        let mut a = Matrix::from(&[[4.0, 0.5], [0.5, 2.0]]);
        let mut b = Vector::from(&[1.0, 0.5]);
        solve_lin_sys(&mut b, &mut a).unwrap();
        approx_eq(z[0], b[0], 1e-15);
        approx_eq(z[1], b[1], 1e-15);

        // a repeated column is dependent on the passive set
        assert_eq!(factor.add(&ata, 0).err(), Some("the passive-set subproblem is singular"));
        assert_eq!(factor.len(), 2);
    }

    #[test]
    fn solve_reports_the_best_iterate() {
        let solver = NnlsSolver::new(Some(1), 1e-10).unwrap();
        let gg = Matrix::from(&[[1.0, 1.0], [1.0, 1.0]]);
        let ll = small_identity(2, 0.1);
        let d = Vector::from(&[1.0, 1.0]);
        match solver.solve(&gg, &ll, &d) {
            Err(InversionError::Convergence { iterations, best }) => {
                assert_eq!(iterations, 1);
                approx_eq(best[0], 2.0 / 2.01, 1e-12);
                assert_eq!(best[1], 0.0);
            }
            _ => panic!("expected a convergence error"),
        }
    }
}
