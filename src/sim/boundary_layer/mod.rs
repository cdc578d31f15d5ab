//! Viscous integral boundary layer on a triangulated surface.
//!
//! Six unknowns per face (`δ, A, B, Ψ, Cτ1, Cτ2`) describe the streamwise and
//! crossflow velocity profiles. Their integral momentum, kinetic-energy,
//! lateral-curvature and shear-lag balances are driven to zero by a damped
//! Newton iteration with a finite-difference Jacobian.
//!
//! # Architecture
//!
//! ```text
//! ShapeParameters ──► generate_profile() ──► IntegralThickness ──► FaceFlux
//!                                                                    │
//! SurfaceFlow ──► StreamlineFrame, FaceGradients      FluxVectors ◄──┘
//!                          │                              │
//!                          └──► EquationResiduals ◄── FaceDivergences
//!                                      │
//!                     ResidualAssembly::linearize() ──► ILU(0) + GMRES
//!                                      │
//!                         BoundaryLayerSolver::solve_from()
//!                                      │
//!                 transpiration, wall shear ──► BoundaryLayerSolution
//! ```
//!
//! The closure of a face depends only on its own unknowns and edge flow.
//! Faces couple solely through the divergence terms, which read the fluxes
//! of every face sharing a vertex.

pub mod closure;
pub mod config;
pub mod error;
pub mod operators;
pub mod profile;
pub mod report;
pub mod residual;
pub mod solver;
pub mod state;

pub use closure::{FaceFlux, IntegralThickness};
pub use config::{BoundaryLayerConfig, Freestream, NewtonConfig, ProfileConfig};
pub use error::BoundaryLayerError;
pub use profile::{FlowRegime, LocalFreestream, ProfileSample, find_exp_ratio, generate_profile};
pub use report::{BoundaryLayerReport, BoundaryLayerSolution, FieldValues, ResidualSummary};
pub use residual::EquationResiduals;
pub use solver::BoundaryLayerSolver;
pub use state::{BoundaryLayerState, ShapeParameters};
