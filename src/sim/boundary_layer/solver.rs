use anyhow::{Context, Result};
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::Mesh;
use crate::geom::frame::{FaceFrame, face_frames};
use crate::geom::topology::{FaceAdjacency, VertexInterpolation};
use crate::sim::boundary_layer::BoundaryLayerError;
use crate::sim::boundary_layer::config::BoundaryLayerConfig;
use crate::sim::boundary_layer::operators::{FaceGradients, StreamlineFrame, streamline_frames};
use crate::sim::boundary_layer::report::{BoundaryLayerReport, BoundaryLayerSolution, ResidualSummary};
use crate::sim::boundary_layer::residual::{EquationResiduals, LinearizedSystem, ResidualAssembly};
use crate::sim::boundary_layer::state::{BoundaryLayerState, VARIABLES};
use crate::sim::coupling::{PanelSolver, SurfaceFlow};
use crate::sim::linalg::{CsrMatrix, GmresConfig, solve_ilu_gmres};
use crate::vecutils::{l2_norm, max_abs};

/// Quantities that only change when the inviscid flow does.
struct FlowContext {
    streamlines: Vec<StreamlineFrame>,
    gradients: Vec<FaceGradients>,
}

/// Damped Newton solver for the integral boundary-layer equations on a
/// triangulated surface.
///
/// Geometry, vertex interpolation and face adjacency are built once in the
/// constructor; each solve then works against a given inviscid surface flow.
pub struct BoundaryLayerSolver {
    mesh: Mesh,
    frames: Vec<FaceFrame>,
    interpolation: VertexInterpolation,
    adjacency: FaceAdjacency,
    config: BoundaryLayerConfig,
}

impl BoundaryLayerSolver {
    pub fn new(mesh: Mesh) -> Result<Self> {
        Self::with_config(mesh, BoundaryLayerConfig::default())
    }

    pub fn with_config(mesh: Mesh, config: BoundaryLayerConfig) -> Result<Self> {
        config.validate()?;
        mesh.validate()?;
        let frames = face_frames(&mesh)?;
        let interpolation = VertexInterpolation::build(&mesh)?;
        let adjacency = FaceAdjacency::build(&mesh, &interpolation);
        debug!(
            "Boundary-layer solver: {} vertices, {} faces",
            mesh.vertex_count(),
            mesh.face_count()
        );
        Ok(Self {
            mesh,
            frames,
            interpolation,
            adjacency,
            config,
        })
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn frames(&self) -> &[FaceFrame] {
        &self.frames
    }

    pub fn interpolation(&self) -> &VertexInterpolation {
        &self.interpolation
    }

    pub fn adjacency(&self) -> &FaceAdjacency {
        &self.adjacency
    }

    pub fn config(&self) -> &BoundaryLayerConfig {
        &self.config
    }

    pub fn initial_state(&self) -> BoundaryLayerState {
        BoundaryLayerState::initial(&self.mesh, &self.frames, &self.config.freestream)
    }

    /// Solves from the default initial state with no transpiration.
    pub fn solve(&self, flow: SurfaceFlow) -> Result<BoundaryLayerSolution> {
        let mut state = self.initial_state();
        let transpiration = vec![0.0; self.mesh.face_count()];
        self.solve_from(&mut state, flow, &transpiration, None)
    }

    /// Queries the panel solver for the initial flow, then solves with
    /// periodic re-coupling if `newton.recouple_every` is set.
    pub fn solve_coupled(&self, panel: &dyn PanelSolver) -> Result<BoundaryLayerSolution> {
        let transpiration = vec![0.0; self.mesh.face_count()];
        let flow = self.flow_from_panel(panel, &transpiration)?;
        let mut state = self.initial_state();
        self.solve_from(&mut state, flow, &transpiration, Some(panel))
    }

    /// Runs the fixed number of damped Newton steps from `state`, then
    /// evaluates transpiration and wall shear at the final state.
    ///
    /// `state` holds the final unknowns on return.
    pub fn solve_from(
        &self,
        state: &mut BoundaryLayerState,
        flow: SurfaceFlow,
        transpiration: &[f64],
        panel: Option<&dyn PanelSolver>,
    ) -> Result<BoundaryLayerSolution> {
        let n = self.mesh.face_count();
        check_len("surface velocity", n, flow.face_count())?;
        check_len("surface speed", n, flow.speed.len())?;
        check_len("surface Mach number", n, flow.mach.len())?;
        check_len("transpiration", n, transpiration.len())?;
        check_len("state", n, state.face_count())?;

        let newton = self.config.newton;
        let unknowns = VARIABLES * n;
        let gmres = GmresConfig {
            krylov_dim: self.config.gmres.krylov_dim.min(unknowns),
            ..self.config.gmres
        };

        let mut flow = flow;
        let mut transpiration = transpiration.to_vec();
        let mut context = self.flow_context(&flow, &transpiration);
        let mut increment = vec![0.0; unknowns];
        let mut history = Vec::with_capacity(newton.max_iterations);

        info!(
            "Boundary layer: {} faces, {} unknowns, {} iterations",
            n, unknowns, newton.max_iterations
        );
        info!(
            "{:>9} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}",
            "iteration", "momentum x", "momentum y", "kinetic", "lateral", "shear x", "shear y"
        );

        for iteration in 0..newton.max_iterations {
            let assembly = self.assembly(&flow, &context);
            let system = assembly.linearize(state, newton.fd_step)?;

            let mut rhs: Vec<f64> = system
                .residuals
                .iter()
                .flat_map(|r| r.to_array())
                .map(|v| -v)
                .collect();
            let norm = l2_norm(&rhs);
            let mut jacobian = system.jacobian.clone();
            if norm > 0.0 {
                for v in rhs.iter_mut() {
                    *v /= norm;
                }
                jacobian.scale(1.0 / norm);
            } else {
                warn!("Residual vanished at iteration {}, system left unscaled", iteration);
            }

            let matrix = CsrMatrix::from_triplets(&jacobian)?;
            let linear = solve_ilu_gmres(&matrix, &rhs, &mut increment, &gmres)
                .with_context(|| format!("Linear solve failed at iteration {}", iteration))?;
            if !linear.converged {
                warn!(
                    "GMRES stopped at residual {:.3e} after {} iterations",
                    linear.residual, linear.iterations
                );
            }
            system.project_increment(&mut increment);
            let step = self.damped_update(&assembly, &system, state, &increment)?;
            debug!(
                "Iteration {}: max |dx| {:.3e}, step {:.3e}",
                iteration,
                max_abs(&increment),
                step
            );

            let summary = ResidualSummary {
                iteration,
                max: EquationResiduals::max_abs(&system.residuals),
                norm,
                linear_iterations: linear.iterations,
                linear_converged: linear.converged,
                step,
            };
            let m = summary.max;
            info!(
                "{:>9} {:>12.4e} {:>12.4e} {:>12.4e} {:>12.4e} {:>12.4e} {:>12.4e}",
                iteration,
                m.momentum_x,
                m.momentum_y,
                m.kinetic_energy,
                m.lateral_curvature,
                m.shear_stress_x,
                m.shear_stress_y
            );
            history.push(summary);

            if let Some(every) = newton.recouple_every {
                if (iteration + 1) % every == 0 && iteration + 1 < newton.max_iterations {
                    match panel {
                        Some(panel) => {
                            transpiration = self.transpiration(&flow, &context, state);
                            flow = self.flow_from_panel(panel, &transpiration)?;
                            context = self.flow_context(&flow, &transpiration);
                            debug!("Re-coupled surface flow after iteration {}", iteration);
                        }
                        None => warn!("Re-coupling requested but no panel solver was given"),
                    }
                }
            }
        }

        Ok(self.finish(state, flow, &context, history))
    }

    /// Applies `increment` with the configured damping, halving it until the
    /// state stays admissible, every residual is finite and the merit norm
    /// does not grow. Returns the step taken, 0 if none was acceptable.
    fn damped_update(
        &self,
        assembly: &ResidualAssembly,
        system: &LinearizedSystem,
        state: &mut BoundaryLayerState,
        increment: &[f64],
    ) -> Result<f64> {
        let newton = self.config.newton;
        let base = system.merit(&system.residuals);
        let mut step = newton.damping;
        for _ in 0..=newton.max_step_halvings {
            let mut trial = state.clone();
            trial.apply_increment(increment, step)?;
            if trial.is_admissible() {
                let residuals = assembly.residuals(&trial);
                if residuals.iter().all(EquationResiduals::is_finite) && system.merit(&residuals) <= base {
                    *state = trial;
                    return Ok(step);
                }
            }
            step *= 0.5;
        }
        warn!(
            "No admissible step after {} halvings, state left unchanged",
            newton.max_step_halvings
        );
        Ok(0.0)
    }

    /// Face fields carried to vertices, for post-processing.
    pub fn report(&self, solution: &BoundaryLayerSolution) -> BoundaryLayerReport {
        BoundaryLayerReport::new(solution, &self.interpolation)
    }

    fn flow_context(&self, flow: &SurfaceFlow, transpiration: &[f64]) -> FlowContext {
        let streamlines = streamline_frames(&self.frames, flow, transpiration);
        let gradients = FaceGradients::compute(&self.mesh, &self.frames, &self.interpolation, flow, &streamlines);
        FlowContext { streamlines, gradients }
    }

    fn assembly<'a>(&'a self, flow: &'a SurfaceFlow, context: &'a FlowContext) -> ResidualAssembly<'a> {
        ResidualAssembly {
            mesh: &self.mesh,
            frames: &self.frames,
            interpolation: &self.interpolation,
            adjacency: &self.adjacency,
            flow,
            streamlines: &context.streamlines,
            gradients: &context.gradients,
            freestream: &self.config.freestream,
            layers: self.config.profile.layers,
        }
    }

    /// `|∇·M| / ρ` per face.
    fn transpiration(&self, flow: &SurfaceFlow, context: &FlowContext, state: &BoundaryLayerState) -> Vec<f64> {
        let assembly = self.assembly(flow, context);
        let fluxes = assembly.face_fluxes(state);
        let vectors = assembly.flux_vectors(&fluxes);
        let density = self.config.freestream.density;
        (0..self.mesh.face_count())
            .into_par_iter()
            .map(|fi| assembly.divergences(fi, |j| vectors[j]).m.abs() / density)
            .collect()
    }

    fn flow_from_panel(&self, panel: &dyn PanelSolver, transpiration: &[f64]) -> Result<SurfaceFlow> {
        let velocity = panel
            .surface_velocity(transpiration)
            .context("Panel solver failed")?;
        check_len("panel surface velocity", self.mesh.face_count(), velocity.len())?;
        let fs = &self.config.freestream;
        SurfaceFlow::from_velocities(velocity, fs.velocity, fs.sound_speed)
    }

    fn finish(
        &self,
        state: &BoundaryLayerState,
        flow: SurfaceFlow,
        context: &FlowContext,
        history: Vec<ResidualSummary>,
    ) -> BoundaryLayerSolution {
        let assembly = self.assembly(&flow, context);
        let fluxes = assembly.face_fluxes(state);
        let vectors = assembly.flux_vectors(&fluxes);
        let density = self.config.freestream.density;

        let transpiration: Vec<f64> = (0..self.mesh.face_count())
            .into_par_iter()
            .map(|fi| assembly.divergences(fi, |j| vectors[j]).m.abs() / density)
            .collect();
        let wall_shear_local: Vec<[f64; 2]> = fluxes.iter().map(|f| f.tau_w).collect();
        let wall_shear = wall_shear_local
            .iter()
            .zip(&context.streamlines)
            .map(|(tau, s)| s.to_global(*tau))
            .collect();

        BoundaryLayerSolution {
            parameters: state.all_parameters(),
            transpiration,
            wall_shear,
            wall_shear_local,
            flow,
            history,
        }
    }
}

fn check_len(field: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(BoundaryLayerError::SizeMismatch { field, expected, found }.into());
    }
    Ok(())
}
