use serde::{Deserialize, Serialize};

use crate::Vector;
use crate::geom::topology::VertexInterpolation;
use crate::sim::boundary_layer::residual::EquationResiduals;
use crate::sim::boundary_layer::state::ShapeParameters;
use crate::sim::coupling::SurfaceFlow;

/// Residual statistics of one outer iteration, taken before the update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResidualSummary {
    pub iteration: usize,
    /// Largest absolute residual per equation.
    pub max: EquationResiduals,
    /// L2 norm of the full residual vector.
    pub norm: f64,
    /// GMRES iterations spent on the Newton step.
    pub linear_iterations: usize,
    pub linear_converged: bool,
    /// Fraction of the Newton increment applied, 0 if every trial was
    /// rejected.
    pub step: f64,
}

/// Result of a boundary-layer solve, per face.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoundaryLayerSolution {
    pub parameters: Vec<ShapeParameters>,
    /// Blowing velocity `|∇·M| / ρ` [m/s].
    pub transpiration: Vec<f64>,
    /// Wall shear stress as a global vector [Pa].
    pub wall_shear: Vec<Vector>,
    /// Wall shear stress in streamline components [Pa].
    pub wall_shear_local: Vec<[f64; 2]>,
    /// Inviscid flow the final state was evaluated against.
    pub flow: SurfaceFlow,
    pub history: Vec<ResidualSummary>,
}

impl BoundaryLayerSolution {
    pub fn face_count(&self) -> usize {
        self.parameters.len()
    }
}

/// Scalar and vector fields of a solution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldValues {
    pub delta: Vec<f64>,
    pub a: Vec<f64>,
    pub b: Vec<f64>,
    pub psi: Vec<f64>,
    pub ctau1: Vec<f64>,
    pub ctau2: Vec<f64>,
    pub transpiration: Vec<f64>,
    pub cp: Vec<f64>,
    pub mach: Vec<f64>,
    pub velocity: Vec<Vector>,
    pub wall_shear: Vec<Vector>,
}

/// Solution fields on faces and carried to vertices, for post-processing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoundaryLayerReport {
    pub faces: FieldValues,
    pub vertices: FieldValues,
    pub history: Vec<ResidualSummary>,
}

impl BoundaryLayerReport {
    pub fn new(solution: &BoundaryLayerSolution, interpolation: &VertexInterpolation) -> Self {
        let pick = |f: fn(&ShapeParameters) -> f64| solution.parameters.iter().map(f).collect::<Vec<f64>>();
        let faces = FieldValues {
            delta: pick(|p| p.delta),
            a: pick(|p| p.a),
            b: pick(|p| p.b),
            psi: pick(|p| p.psi),
            ctau1: pick(|p| p.ctau1),
            ctau2: pick(|p| p.ctau2),
            transpiration: solution.transpiration.clone(),
            cp: solution.flow.cp.clone(),
            mach: solution.flow.mach.clone(),
            velocity: solution.flow.velocity.clone(),
            wall_shear: solution.wall_shear.clone(),
        };
        let vertices = FieldValues {
            delta: interpolation.vertex_values(&faces.delta),
            a: interpolation.vertex_values(&faces.a),
            b: interpolation.vertex_values(&faces.b),
            psi: interpolation.vertex_values(&faces.psi),
            ctau1: interpolation.vertex_values(&faces.ctau1),
            ctau2: interpolation.vertex_values(&faces.ctau2),
            transpiration: interpolation.vertex_values(&faces.transpiration),
            cp: interpolation.vertex_values(&faces.cp),
            mach: interpolation.vertex_values(&faces.mach),
            velocity: interpolation.vertex_values(&faces.velocity),
            wall_shear: interpolation.vertex_values(&faces.wall_shear),
        };
        Self {
            faces,
            vertices,
            history: solution.history.clone(),
        }
    }
}
