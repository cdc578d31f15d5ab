use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::sim::linalg::{CsrMatrix, Ilu0, LinalgError};
use crate::vecutils::{dot, l2_norm};

/// Configuration for restarted GMRES.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct GmresConfig {
    /// Number of outer (restart) iterations.
    pub max_restarts: usize,
    /// Size of the Krylov basis built per restart.
    pub krylov_dim: usize,
    /// Absolute tolerance on the preconditioned residual.
    pub abs_tolerance: f64,
    /// Tolerance relative to the first preconditioned residual.
    pub rel_tolerance: f64,
    /// Relative size below which an ILU(0) pivot is replaced instead of
    /// used. The default 0 makes every zero pivot fatal.
    pub pivot_tolerance: f64,
}

impl Default for GmresConfig {
    fn default() -> Self {
        Self {
            max_restarts: 1,
            krylov_dim: 2000,
            abs_tolerance: 1e-8,
            rel_tolerance: 1e-8,
            pivot_tolerance: 0.0,
        }
    }
}

/// Outcome of a GMRES solve.
#[derive(Debug, Clone, Copy, Default)]
pub struct GmresReport {
    /// Total Arnoldi steps over all restarts.
    pub iterations: usize,
    /// Last preconditioned residual estimate.
    pub residual: f64,
    pub converged: bool,
}

/// Orthogonality loss is assumed when the new vector shrinks below this
/// fraction of its length during Gram-Schmidt.
const REORTHOGONALIZATION_DELTA: f64 = 1e-3;

/// Solves `A x = b` with restarted GMRES, left-preconditioned by ILU(0).
///
/// `x` holds the initial guess on entry and the solution on exit. Reaching
/// the iteration limit without meeting both tolerances is not an error; the
/// report tells whether the solve converged.
pub fn solve_ilu_gmres(
    a: &CsrMatrix,
    b: &[f64],
    x: &mut [f64],
    config: &GmresConfig,
) -> Result<GmresReport, LinalgError> {
    let n = a.n();
    if b.len() != n {
        return Err(LinalgError::DimensionMismatch { expected: n, found: b.len() });
    }
    if x.len() != n {
        return Err(LinalgError::DimensionMismatch { expected: n, found: x.len() });
    }
    if n == 0 {
        return Ok(GmresReport { converged: true, ..GmresReport::default() });
    }
    let mr = config.krylov_dim;
    if mr == 0 || mr > n {
        return Err(LinalgError::KrylovDimension { dim: mr, n });
    }

    let ilu = Ilu0::with_pivot_tolerance(a, config.pivot_tolerance)?;

    let mut report = GmresReport::default();
    let mut rho_tol = 0.0;
    let mut r = vec![0.0; n];

    for itr in 0..config.max_restarts {
        // r = M^-1 (b - A x)
        a.mul_vec(x, &mut r);
        for (ri, bi) in r.iter_mut().zip(b) {
            *ri = bi - *ri;
        }
        ilu.solve_in_place(&mut r);
        let mut rho = l2_norm(&r);

        if itr == 0 {
            rho_tol = rho * config.rel_tolerance;
        }
        report.residual = rho;
        if rho == 0.0 || (rho <= rho_tol && rho <= config.abs_tolerance) {
            report.converged = true;
            break;
        }

        // Krylov basis and the Hessenberg matrix stored column by column;
        // column k holds rows 0..=k+1.
        let mut v: Vec<Vec<f64>> = Vec::with_capacity(mr + 1);
        v.push(r.iter().map(|ri| ri / rho).collect());
        let mut h: Vec<Vec<f64>> = Vec::with_capacity(mr);
        let mut c = Vec::with_capacity(mr);
        let mut s = Vec::with_capacity(mr);
        let mut g = vec![0.0; mr + 1];
        g[0] = rho;

        for k in 0..mr {
            let mut w = vec![0.0; n];
            a.mul_vec(&v[k], &mut w);
            ilu.solve_in_place(&mut w);
            let av = l2_norm(&w);

            let mut col = vec![0.0; k + 2];
            for j in 0..=k {
                col[j] = dot(&w, &v[j]);
                axpy(-col[j], &v[j], &mut w);
            }
            col[k + 1] = l2_norm(&w);

            if (av + REORTHOGONALIZATION_DELTA * col[k + 1]) == av {
                for j in 0..=k {
                    let htmp = dot(&w, &v[j]);
                    col[j] += htmp;
                    axpy(-htmp, &v[j], &mut w);
                }
                col[k + 1] = l2_norm(&w);
            }

            let breakdown = col[k + 1] == 0.0;
            if !breakdown {
                let inv = 1.0 / col[k + 1];
                for wi in w.iter_mut() {
                    *wi *= inv;
                }
            }

            // Apply previous rotations to the new column
            for j in 0..k {
                let (t0, t1) = givens(c[j], s[j], col[j], col[j + 1]);
                col[j] = t0;
                col[j + 1] = t1;
            }

            let mu = col[k].hypot(col[k + 1]);
            if mu == 0.0 {
                // Singular Hessenberg column, keep the basis built so far
                break;
            }
            c.push(col[k] / mu);
            s.push(-col[k + 1] / mu);
            col[k] = c[k] * col[k] - s[k] * col[k + 1];
            col[k + 1] = 0.0;
            let (g0, g1) = givens(c[k], s[k], g[k], g[k + 1]);
            g[k] = g0;
            g[k + 1] = g1;

            h.push(col);
            v.push(w);
            report.iterations += 1;

            rho = g[k + 1].abs();
            report.residual = rho;
            trace!("GMRES restart {} step {}: residual {:.3e}", itr, k, rho);

            if rho <= rho_tol && rho <= config.abs_tolerance {
                report.converged = true;
                break;
            }
            if breakdown {
                break;
            }
        }

        // Back substitution on the triangular part of H
        let m = h.len();
        if m > 0 {
            let mut y = vec![0.0; m];
            for i in (0..m).rev() {
                let mut sum = g[i];
                for (j, yj) in y.iter().enumerate().skip(i + 1) {
                    sum -= h[j][i] * yj;
                }
                y[i] = sum / h[i][i];
            }
            for (j, yj) in y.iter().enumerate() {
                axpy(*yj, &v[j], x);
            }
        }

        if report.converged {
            break;
        }
    }

    debug!(
        "GMRES: {} iterations, residual {:.3e}, converged={}",
        report.iterations, report.residual, report.converged
    );

    Ok(report)
}

/// Applies a Givens rotation to the pair `(a, b)`.
fn givens(c: f64, s: f64, a: f64, b: f64) -> (f64, f64) {
    (c * a - s * b, s * a + c * b)
}

/// y += alpha * x
fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
}
