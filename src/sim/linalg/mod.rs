//! Sparse linear algebra for the Newton step.
//!
//! # Architecture
//!
//! ```text
//! TripletMatrix ──► CsrMatrix (rows sorted by column) ──► Ilu0
//!                                                          │
//!                                  solve_ilu_gmres() ◄─────┘
//! ```
//!
//! The Jacobian is assembled as unordered triplets, compressed to CSR,
//! factored incompletely without fill-in and used as a left preconditioner
//! for restarted GMRES.

pub mod gmres;
pub mod ilu;
pub mod sparse;

pub use gmres::{GmresConfig, GmresReport, solve_ilu_gmres};
pub use ilu::Ilu0;
pub use sparse::{CsrMatrix, TripletMatrix};

use thiserror::Error;

/// Fatal failures of the sparse solver.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinalgError {
    #[error("row {row} has no diagonal entry")]
    MissingDiagonal { row: usize },
    #[error("zero pivot in row {row} of the incomplete factorization")]
    ZeroPivot { row: usize },
    #[error("Krylov dimension {dim} is invalid for a system of size {n}")]
    KrylovDimension { dim: usize, n: usize },
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("entry ({row}, {col}) is outside a {n}x{n} matrix")]
    IndexOutOfRange { row: usize, col: usize, n: usize },
}
