use log::debug;

use crate::sim::linalg::{CsrMatrix, LinalgError};

/// Incomplete LU factorization with zero fill-in.
///
/// L (unit lower) and U share the sparsity pattern of the source matrix.
/// A zero pivot is an error. With a positive `pivot_tolerance`, pivots
/// whose magnitude falls below it times the largest entry of their row are
/// replaced by that entry's magnitude instead; a zero pivot in an all-zero
/// row stays an error.
#[derive(Debug, Clone)]
pub struct Ilu0 {
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    lu: Vec<f64>,
    diag: Vec<usize>,
    replaced_pivots: usize,
}

impl Ilu0 {
    /// Strict factorization: any zero pivot is fatal.
    pub fn new(a: &CsrMatrix) -> Result<Self, LinalgError> {
        Self::with_pivot_tolerance(a, 0.0)
    }

    pub fn with_pivot_tolerance(a: &CsrMatrix, pivot_tolerance: f64) -> Result<Self, LinalgError> {
        let n = a.n();
        let row_ptr = a.row_ptr().to_vec();
        let col_idx = a.col_idx().to_vec();
        let mut lu = a.values().to_vec();
        let mut diag = vec![0usize; n];
        let mut iw = vec![usize::MAX; n];
        let mut replaced_pivots = 0;

        for i in 0..n {
            let (start, end) = (row_ptr[i], row_ptr[i + 1]);
            for k in start..end {
                iw[col_idx[k]] = k;
            }

            let mut j = start;
            while j < end {
                let jrow = col_idx[j];
                if jrow >= i {
                    break;
                }
                let tl = lu[j] / lu[diag[jrow]];
                lu[j] = tl;
                for jj in diag[jrow] + 1..row_ptr[jrow + 1] {
                    let jw = iw[col_idx[jj]];
                    if jw != usize::MAX {
                        lu[jw] -= tl * lu[jj];
                    }
                }
                j += 1;
            }

            if j >= end || col_idx[j] != i {
                return Err(LinalgError::MissingDiagonal { row: i });
            }
            diag[i] = j;

            let scale = a.row_max_abs(i);
            let pivot = lu[j];
            if pivot_tolerance > 0.0 && scale > 0.0 && pivot.abs() <= pivot_tolerance * scale {
                let sign = if pivot != 0.0 {
                    pivot.signum()
                } else if a.values()[j] != 0.0 {
                    a.values()[j].signum()
                } else {
                    1.0
                };
                lu[j] = sign * scale;
                replaced_pivots += 1;
            } else if pivot == 0.0 {
                return Err(LinalgError::ZeroPivot { row: i });
            }

            for k in start..end {
                iw[col_idx[k]] = usize::MAX;
            }
        }

        if replaced_pivots > 0 {
            debug!("ILU(0): replaced {} vanishing pivots out of {}", replaced_pivots, n);
        }

        Ok(Self {
            row_ptr,
            col_idx,
            lu,
            diag,
            replaced_pivots,
        })
    }

    pub fn n(&self) -> usize {
        self.diag.len()
    }

    /// Number of pivots replaced during factorization.
    pub fn replaced_pivots(&self) -> usize {
        self.replaced_pivots
    }

    /// Solves `L U z = r` in place (`z` holds `r` on entry).
    pub fn solve_in_place(&self, z: &mut [f64]) {
        let n = self.n();
        for i in 0..n {
            let mut sum = z[i];
            for k in self.row_ptr[i]..self.diag[i] {
                sum -= self.lu[k] * z[self.col_idx[k]];
            }
            z[i] = sum;
        }
        for i in (0..n).rev() {
            let mut sum = z[i];
            for k in self.diag[i] + 1..self.row_ptr[i + 1] {
                sum -= self.lu[k] * z[self.col_idx[k]];
            }
            z[i] = sum / self.lu[self.diag[i]];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::linalg::TripletMatrix;

    fn csr(n: usize, entries: &[(usize, usize, f64)]) -> CsrMatrix {
        let mut t = TripletMatrix::new(n);
        t.extend(entries.iter().copied());
        CsrMatrix::from_triplets(&t).unwrap()
    }

    #[test]
    fn test_exact_on_tridiagonal() {
        // No fill-in is produced, so ILU(0) is the exact LU
        let a = csr(
            4,
            &[
                (0, 0, 4.), (0, 1, -1.),
                (1, 0, -1.), (1, 1, 4.), (1, 2, -1.),
                (2, 1, -1.), (2, 2, 4.), (2, 3, -1.),
                (3, 2, -1.), (3, 3, 4.),
            ],
        );
        let ilu = Ilu0::new(&a).unwrap();
        let x = [1.0, -2.0, 0.5, 3.0];
        let mut b = vec![0.0; 4];
        a.mul_vec(&x, &mut b);
        ilu.solve_in_place(&mut b);
        for i in 0..4 {
            assert!((b[i] - x[i]).abs() < 1e-12, "i={} got={}", i, b[i]);
        }
        assert_eq!(ilu.replaced_pivots(), 0);
    }

    #[test]
    fn test_missing_diagonal() {
        let a = csr(2, &[(0, 0, 1.), (0, 1, 2.), (1, 0, 3.)]);
        assert_eq!(Ilu0::new(&a).unwrap_err(), LinalgError::MissingDiagonal { row: 1 });
    }

    #[test]
    fn test_zero_pivot_is_fatal_in_strict_mode() {
        // Second pivot is 4 - 2 * 2 = 0
        let a = csr(2, &[(0, 0, 1.), (0, 1, 2.), (1, 0, 2.), (1, 1, 4.)]);
        assert_eq!(Ilu0::new(&a).unwrap_err(), LinalgError::ZeroPivot { row: 1 });
    }

    #[test]
    fn test_vanishing_pivot_is_replaced() {
        let a = csr(2, &[(0, 0, 1.), (0, 1, 2.), (1, 0, 2.), (1, 1, 4.)]);
        let ilu = Ilu0::with_pivot_tolerance(&a, 1e-10).unwrap();
        assert_eq!(ilu.replaced_pivots(), 1);
        let mut z = vec![1.0, 2.0];
        ilu.solve_in_place(&mut z);
        assert!(z.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_empty_row_is_fatal_even_with_tolerance() {
        let a = csr(2, &[(0, 0, 1.), (1, 1, 0.)]);
        assert_eq!(
            Ilu0::with_pivot_tolerance(&a, 1e-10).unwrap_err(),
            LinalgError::ZeroPivot { row: 1 }
        );
    }
}
