use thiserror::Error;

/// Failures of the boundary-layer solver that callers may want to match on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoundaryLayerError {
    #[error("{field} has {found} entries, expected {expected}")]
    SizeMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("non-finite residual on face {face}")]
    NonFiniteResidual { face: usize },
    #[error("non-finite Jacobian entry in the rows of face {face}")]
    NonFiniteJacobian { face: usize },
}
