//! Residuals of the six integral equations and their Jacobian.

use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::Mesh;
use crate::geom::frame::FaceFrame;
use crate::geom::topology::{FaceAdjacency, VertexInterpolation};
use crate::sim::boundary_layer::BoundaryLayerError;
use crate::sim::boundary_layer::closure::FaceFlux;
use crate::sim::boundary_layer::config::Freestream;
use crate::sim::boundary_layer::operators::{FaceDivergences, FaceGradients, FluxVectors, StreamlineFrame};
use crate::sim::boundary_layer::profile::{FlowRegime, LocalFreestream};
use crate::sim::boundary_layer::state::{BoundaryLayerState, ShapeParameters, VARIABLES};
use crate::sim::coupling::SurfaceFlow;
use crate::sim::linalg::TripletMatrix;
use crate::vecutils::safe_div;

/// Residuals of one face, each normalized by a freestream flux.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EquationResiduals {
    pub momentum_x: f64,
    pub momentum_y: f64,
    pub kinetic_energy: f64,
    pub lateral_curvature: f64,
    pub shear_stress_x: f64,
    pub shear_stress_y: f64,
}

impl EquationResiduals {
    pub fn evaluate(
        flux: &FaceFlux,
        div: &FaceDivergences,
        grad: &FaceGradients,
        fs: &LocalFreestream,
    ) -> Self {
        let u = fs.velocity;
        let rho = fs.density;
        let rho_u2 = rho * u * u;
        let rho_u3 = rho_u2 * u;
        let [gx, gy] = grad.q2;
        let [phix, phiy] = grad.phi;

        let momentum_x = safe_div(div.j_x - u * div.m - flux.tau_w[0], rho_u2);
        let momentum_y = safe_div(div.j_y - flux.tau_w[1], rho_u2);
        let kinetic_energy = safe_div(
            div.e - u * u * div.m - rho * (flux.q[0] * gx + flux.q[1] * gy) - 2.0 * flux.d,
            rho_u3,
        );
        let lateral_curvature = safe_div(
            div.k_o + (flux.e[0] * phix + flux.e[1] * phiy)
                + 0.5 * rho * (flux.q[0] * gy - flux.q[1] * gx)
                - rho * (flux.q_o[0] * gx + flux.q_o[1] * gy)
                + flux.d_x
                - 2.0 * flux.d_o,
            rho_u3,
        );
        let shear_stress_x = safe_div(div.k_tau_x - flux.s_tau[0], rho_u2);
        // Only the source term is normalized here
        let shear_stress_y = div.k_tau_y - safe_div(flux.s_tau[1], rho_u2);

        Self {
            momentum_x,
            momentum_y,
            kinetic_energy,
            lateral_curvature,
            shear_stress_x,
            shear_stress_y,
        }
    }

    pub fn to_array(&self) -> [f64; VARIABLES] {
        [
            self.momentum_x,
            self.momentum_y,
            self.kinetic_energy,
            self.lateral_curvature,
            self.shear_stress_x,
            self.shear_stress_y,
        ]
    }

    pub fn from_array(v: [f64; VARIABLES]) -> Self {
        Self {
            momentum_x: v[0],
            momentum_y: v[1],
            kinetic_energy: v[2],
            lateral_curvature: v[3],
            shear_stress_x: v[4],
            shear_stress_y: v[5],
        }
    }

    /// Component-wise largest absolute value over faces.
    pub fn max_abs<'a, I>(residuals: I) -> Self
    where
        I: IntoIterator<Item = &'a EquationResiduals>,
    {
        let mut out = [0.0_f64; VARIABLES];
        for r in residuals {
            for (m, v) in out.iter_mut().zip(r.to_array()) {
                *m = m.max(v.abs());
            }
        }
        Self::from_array(out)
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

/// Closure output of one face together with its lifted fluxes.
#[derive(Debug, Clone, Copy)]
struct FaceEvaluation {
    flux: FaceFlux,
    vectors: FluxVectors,
}

impl FaceEvaluation {
    fn new(params: &ShapeParameters, fs: &LocalFreestream, streamline: &StreamlineFrame, layers: usize) -> Self {
        let flux = FaceFlux::evaluate(params, fs, layers);
        Self {
            flux,
            vectors: FluxVectors::new(&flux, streamline),
        }
    }
}

// Positions of the shear-lag unknowns and equations within a face block
const CTAU1: usize = 4;
const CTAU2: usize = 5;
const SHEAR_X: usize = 4;
const SHEAR_Y: usize = 5;

/// Index of `∂R_eq/∂x_var` among the self-block entries of one face.
fn self_entry(var: usize, eq: usize) -> usize {
    var * VARIABLES + eq
}

/// Residual vector and Jacobian at one state.
#[derive(Debug, Clone)]
pub struct LinearizedSystem {
    pub residuals: Vec<EquationResiduals>,
    /// `∂R/∂x` with respect to the normalized unknowns; row `6 j + eq`,
    /// column `6 c + var`.
    pub jacobian: TripletMatrix,
    /// Unit `(Cτ1, Cτ2)` direction of each laminar face, `None` for
    /// turbulent faces.
    pub laminar_axes: Vec<Option<[f64; 2]>>,
}

impl LinearizedSystem {
    /// Keeps only the radial part of each laminar face's `Cτ` increment.
    ///
    /// Laminar residuals see `|Cτ|` alone, so turning `Cτ` is in the null
    /// space of the Jacobian.
    pub fn project_increment(&self, increment: &mut [f64]) {
        for (fi, axis) in self.laminar_axes.iter().enumerate() {
            if let Some([a1, a2]) = *axis {
                let base = VARIABLES * fi;
                let radial = increment[base + CTAU1] * a1 + increment[base + CTAU2] * a2;
                increment[base + CTAU1] = radial * a1;
                increment[base + CTAU2] = radial * a2;
            }
        }
    }

    /// L2 norm of `residuals` over the equations the Newton step targets:
    /// all of them on turbulent faces, all but the lateral shear-lag
    /// equation on laminar ones.
    pub fn merit(&self, residuals: &[EquationResiduals]) -> f64 {
        residuals
            .iter()
            .zip(&self.laminar_axes)
            .map(|(r, axis)| {
                let mut v = r.to_array();
                if axis.is_some() {
                    v[SHEAR_Y] = 0.0;
                }
                v.iter().map(|x| x * x).sum::<f64>()
            })
            .sum::<f64>()
            .sqrt()
    }
}

/// Everything fixed during one outer iteration: geometry, inviscid flow and
/// the flow-only gradients.
pub struct ResidualAssembly<'a> {
    pub mesh: &'a Mesh,
    pub frames: &'a [FaceFrame],
    pub interpolation: &'a VertexInterpolation,
    pub adjacency: &'a FaceAdjacency,
    pub flow: &'a SurfaceFlow,
    pub streamlines: &'a [StreamlineFrame],
    pub gradients: &'a [FaceGradients],
    pub freestream: &'a Freestream,
    pub layers: usize,
}

impl ResidualAssembly<'_> {
    pub fn local_freestream(&self, fi: usize) -> LocalFreestream {
        LocalFreestream::new(self.flow.speed[fi], self.flow.mach[fi], self.freestream)
    }

    /// Closure fluxes of all faces at `state`.
    pub fn face_fluxes(&self, state: &BoundaryLayerState) -> Vec<FaceFlux> {
        (0..self.mesh.face_count())
            .into_par_iter()
            .map(|fi| FaceFlux::evaluate(&state.parameters(fi), &self.local_freestream(fi), self.layers))
            .collect()
    }

    /// Lifted fluxes for a set of face fluxes.
    pub fn flux_vectors(&self, fluxes: &[FaceFlux]) -> Vec<FluxVectors> {
        fluxes
            .iter()
            .zip(self.streamlines)
            .map(|(f, s)| FluxVectors::new(f, s))
            .collect()
    }

    pub fn divergences<F>(&self, fi: usize, flux: F) -> FaceDivergences
    where
        F: Fn(usize) -> FluxVectors,
    {
        FaceDivergences::compute(self.mesh, self.frames, self.interpolation, fi, flux)
    }

    /// Residuals of all faces at `state`.
    pub fn residuals(&self, state: &BoundaryLayerState) -> Vec<EquationResiduals> {
        let fluxes = self.face_fluxes(state);
        let vectors = self.flux_vectors(&fluxes);
        (0..self.mesh.face_count())
            .into_par_iter()
            .map(|fi| {
                let div = self.divergences(fi, |j| vectors[j]);
                EquationResiduals::evaluate(&fluxes[fi], &div, &self.gradients[fi], &self.local_freestream(fi))
            })
            .collect()
    }

    /// Residuals and forward-difference Jacobian at `state`.
    ///
    /// Each face's closure is evaluated once at the base state and once per
    /// perturbed unknown. Face `j` then depends on its own unknowns and on
    /// those of every face sharing a vertex with it, through the divergence.
    ///
    /// On a laminar face `Cτ` enters through `|Cτ|` only, which leaves the
    /// two shear-lag columns parallel. The lateral shear-lag row of such a
    /// face gets an extra entry along the direction that turns `Cτ`, scaled
    /// like the streamwise row, so that the matrix stays invertible. The
    /// matching part of the solution is removed by
    /// [`LinearizedSystem::project_increment`].
    pub fn linearize(&self, state: &BoundaryLayerState, fd_step: f64) -> anyhow::Result<LinearizedSystem> {
        let n = self.mesh.face_count();

        let evaluations: Vec<[FaceEvaluation; VARIABLES + 1]> = (0..n)
            .into_par_iter()
            .map(|fi| {
                let fs = self.local_freestream(fi);
                let streamline = &self.streamlines[fi];
                std::array::from_fn(|k| {
                    let params = if k == 0 {
                        state.parameters(fi)
                    } else {
                        state.perturbed(fi, k - 1, fd_step)
                    };
                    FaceEvaluation::new(&params, &fs, streamline, self.layers)
                })
            })
            .collect();

        let laminar_axes: Vec<Option<[f64; 2]>> = (0..n)
            .map(|fi| {
                let params = state.parameters(fi);
                match FlowRegime::from_shear_lag(params.ctau_magnitude()) {
                    FlowRegime::Laminar => Some(params.shear_lag_axis()),
                    FlowRegime::Turbulent => None,
                }
            })
            .collect();

        let rows: Vec<(EquationResiduals, Vec<(usize, usize, f64)>)> = (0..n)
            .into_par_iter()
            .map(|j| {
                let fs = self.local_freestream(j);
                let grad = &self.gradients[j];
                let base_div = self.divergences(j, |fi| evaluations[fi][0].vectors);
                let base = EquationResiduals::evaluate(&evaluations[j][0].flux, &base_div, grad, &fs);
                let r0 = base.to_array();

                let neighbors = self.adjacency.neighbors(j);
                let mut entries = Vec::with_capacity((neighbors.len() + 1) * VARIABLES * VARIABLES);
                for c in std::iter::once(j).chain(neighbors.iter().copied()) {
                    for var in 0..VARIABLES {
                        let perturbed = &evaluations[c][var + 1];
                        let div = self.divergences(j, |fi| {
                            if fi == c {
                                perturbed.vectors
                            } else {
                                evaluations[fi][0].vectors
                            }
                        });
                        let flux = if c == j { &perturbed.flux } else { &evaluations[j][0].flux };
                        let r = EquationResiduals::evaluate(flux, &div, grad, &fs).to_array();
                        for eq in 0..VARIABLES {
                            let d = (r[eq] - r0[eq]) / fd_step;
                            entries.push((VARIABLES * j + eq, VARIABLES * c + var, d));
                        }
                    }
                }

                if let Some([a1, a2]) = laminar_axes[j] {
                    let scale = entries[self_entry(CTAU1, SHEAR_X)]
                        .2
                        .hypot(entries[self_entry(CTAU2, SHEAR_X)].2);
                    let scale = if scale > 0.0 { scale } else { 1.0 };
                    entries[self_entry(CTAU1, SHEAR_Y)].2 -= scale * a2;
                    entries[self_entry(CTAU2, SHEAR_Y)].2 += scale * a1;
                }
                (base, entries)
            })
            .collect();

        let nnz: usize = rows.iter().map(|(_, e)| e.len()).sum();
        let mut jacobian = TripletMatrix::with_capacity(VARIABLES * n, nnz);
        let mut residuals = Vec::with_capacity(n);
        for (face, (r, entries)) in rows.into_iter().enumerate() {
            if !r.is_finite() {
                return Err(BoundaryLayerError::NonFiniteResidual { face }.into());
            }
            if entries.iter().any(|(_, _, d)| !d.is_finite()) {
                return Err(BoundaryLayerError::NonFiniteJacobian { face }.into());
            }
            residuals.push(r);
            jacobian.extend(entries);
        }
        debug!("Jacobian: {} faces, {} non-zeros", n, jacobian.nnz());

        Ok(LinearizedSystem {
            residuals,
            jacobian,
            laminar_axes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vector;
    use crate::geom::frame::face_frames;
    use crate::sim::boundary_layer::operators::streamline_frames;
    use crate::sim::linalg::{CsrMatrix, Ilu0};

    fn fs() -> LocalFreestream {
        LocalFreestream {
            velocity: 10.0,
            density: 2.0,
            viscosity: 1e-5,
            mach: 0.1,
        }
    }

    #[test]
    fn test_residual_formulas() {
        let flux = FaceFlux {
            m: [1.0, 0.0],
            tau_w: [3.0, 4.0],
            e: [2.0, -1.0],
            q: [0.5, 0.25],
            q_o: [0.1, 0.2],
            d: 5.0,
            d_x: 6.0,
            d_o: 7.0,
            s_tau: [8.0, 400.0],
            ..FaceFlux::default()
        };
        let div = FaceDivergences {
            m: 0.5,
            j_x: 100.0,
            j_y: 20.0,
            e: 1000.0,
            k_o: 50.0,
            k_tau_x: 30.0,
            k_tau_y: 0.75,
        };
        let grad = FaceGradients {
            q2: [2.0, 1.0],
            phi: [0.5, -0.5],
        };
        let r = EquationResiduals::evaluate(&flux, &div, &grad, &fs());
        // ρU² = 200, ρU³ = 2000
        assert!((r.momentum_x - (100.0 - 10.0 * 0.5 - 3.0) / 200.0).abs() < 1e-14);
        assert!((r.momentum_y - (20.0 - 4.0) / 200.0).abs() < 1e-14);
        let ke = 1000.0 - 100.0 * 0.5 - 2.0 * (0.5 * 2.0 + 0.25 * 1.0) - 2.0 * 5.0;
        assert!((r.kinetic_energy - ke / 2000.0).abs() < 1e-14);
        let lat = 50.0 + (2.0 * 0.5 - 1.0 * -0.5) + 0.5 * 2.0 * (0.5 * 1.0 - 0.25 * 2.0)
            - 2.0 * (0.1 * 2.0 + 0.2 * 1.0)
            + 6.0
            - 14.0;
        assert!((r.lateral_curvature - lat / 2000.0).abs() < 1e-14);
        assert!((r.shear_stress_x - (30.0 - 8.0) / 200.0).abs() < 1e-14);
        // Divergence term left unnormalized
        assert!((r.shear_stress_y - (0.75 - 400.0 / 200.0)).abs() < 1e-14);
    }

    #[test]
    fn test_max_abs() {
        let a = EquationResiduals::from_array([1.0, -2.0, 0.0, 0.5, -0.1, 0.0]);
        let b = EquationResiduals::from_array([-3.0, 1.0, 0.0, 0.25, 0.2, 0.0]);
        let m = EquationResiduals::max_abs([a, b].iter());
        assert_eq!(m.to_array(), [3.0, 2.0, 0.0, 0.5, 0.2, 0.0]);
        assert_eq!(EquationResiduals::max_abs(&Vec::new()).to_array(), [0.0; 6]);
    }

    /// Residual inputs of a 2x1 plate in a uniform 50 m/s flow along -x.
    struct Plate {
        mesh: Mesh,
        frames: Vec<FaceFrame>,
        interpolation: VertexInterpolation,
        adjacency: FaceAdjacency,
        freestream: Freestream,
        flow: SurfaceFlow,
        streamlines: Vec<StreamlineFrame>,
        gradients: Vec<FaceGradients>,
    }

    impl Plate {
        fn new() -> Self {
            let mesh = Mesh::flat_plate(2, 1, 0.4, 0.2).unwrap();
            let n = mesh.face_count();
            let frames = face_frames(&mesh).unwrap();
            let interpolation = VertexInterpolation::build(&mesh).unwrap();
            let adjacency = FaceAdjacency::build(&mesh, &interpolation);
            let flow = SurfaceFlow::uniform(n, Vector::new(-50., 0., 0.), 50., 340.).unwrap();
            let streamlines = streamline_frames(&frames, &flow, &vec![0.0; n]);
            let gradients = FaceGradients::compute(&mesh, &frames, &interpolation, &flow, &streamlines);
            Self {
                mesh,
                frames,
                interpolation,
                adjacency,
                freestream: Freestream::default(),
                flow,
                streamlines,
                gradients,
            }
        }

        fn assembly(&self) -> ResidualAssembly<'_> {
            ResidualAssembly {
                mesh: &self.mesh,
                frames: &self.frames,
                interpolation: &self.interpolation,
                adjacency: &self.adjacency,
                flow: &self.flow,
                streamlines: &self.streamlines,
                gradients: &self.gradients,
                freestream: &self.freestream,
                layers: 80,
            }
        }

        fn initial_state(&self) -> BoundaryLayerState {
            BoundaryLayerState::initial(&self.mesh, &self.frames, &self.freestream)
        }
    }

    #[test]
    fn test_linearize_matches_direct_evaluation() {
        let plate = Plate::new();
        let assembly = plate.assembly();
        let adjacency = &plate.adjacency;
        let n = plate.mesh.face_count();

        let state = plate.initial_state();
        let step = 1e-6;

        let system = assembly.linearize(&state, step).unwrap();
        assert_eq!(system.residuals, assembly.residuals(&state));

        // Faces 1 and 2 share no vertex, the other pairs do
        let blocks: usize = (0..n).map(|fi| 1 + adjacency.neighbors(fi).len()).sum();
        assert_eq!(blocks, 14);
        assert_eq!(system.jacobian.nnz(), blocks * VARIABLES * VARIABLES);
        let jac = CsrMatrix::from_triplets(&system.jacobian).unwrap();
        assert_eq!(jac.get(VARIABLES, 2 * VARIABLES), 0.0);

        // Column of face 0, variable delta, against a direct re-evaluation
        let mut perturbed = state.clone();
        let mut dx = vec![0.0; VARIABLES * n];
        dx[0] = step;
        perturbed.apply_increment(&dx, 1.0).unwrap();
        let r1 = assembly.residuals(&perturbed);
        for j in [0, 1, 3] {
            let base = system.residuals[j].to_array();
            let moved = r1[j].to_array();
            for eq in 0..VARIABLES {
                let fd = (moved[eq] - base[eq]) / step;
                let entry = jac.get(VARIABLES * j + eq, 0);
                assert!(
                    (fd - entry).abs() <= 1e-6 * fd.abs().max(1e-12),
                    "face {} eq {}: fd={} jacobian={}",
                    j,
                    eq,
                    fd,
                    entry
                );
            }
        }
    }

    #[test]
    fn test_laminar_blocks_factor_without_zero_pivots() {
        let plate = Plate::new();
        let state = plate.initial_state();
        let system = plate.assembly().linearize(&state, 1e-8).unwrap();
        assert!(system.laminar_axes.iter().all(|axis| axis.is_some()));

        let jac = CsrMatrix::from_triplets(&system.jacobian).unwrap();
        assert!(Ilu0::new(&jac).is_ok());

        // The shear-lag rows see |Cτ| alone; the lateral one also turns Cτ
        let [a1, a2] = state.parameters(0).shear_lag_axis();
        let sx = [jac.get(SHEAR_X, CTAU1), jac.get(SHEAR_X, CTAU2)];
        let sy = [jac.get(SHEAR_Y, CTAU1), jac.get(SHEAR_Y, CTAU2)];
        let scale = sx[0].hypot(sx[1]);
        assert!(scale > 0.0);
        assert!((sx[0] * a2 - sx[1] * a1).abs() < 1e-6 * scale);
        assert!((sy[1] * a1 - sy[0] * a2 - scale).abs() < 1e-6 * scale);
    }

    #[test]
    fn test_laminar_increment_keeps_radial_part() {
        let plate = Plate::new();
        let state = plate.initial_state();
        let system = plate.assembly().linearize(&state, 1e-8).unwrap();
        let [a1, a2] = state.parameters(1).shear_lag_axis();

        let mut increment = vec![1.0; VARIABLES * plate.mesh.face_count()];
        increment[VARIABLES + CTAU1] = -3.0 * a2;
        increment[VARIABLES + CTAU2] = 3.0 * a1;
        increment[2 * VARIABLES + CTAU1] = 2.0 * a1;
        increment[2 * VARIABLES + CTAU2] = 2.0 * a2;
        system.project_increment(&mut increment);

        // Turning is dropped, growing is kept, other unknowns untouched
        assert!(increment[VARIABLES + CTAU1].abs() < 1e-15);
        assert!(increment[VARIABLES + CTAU2].abs() < 1e-15);
        assert!((increment[2 * VARIABLES + CTAU1] - 2.0 * a1).abs() < 1e-15);
        assert!((increment[2 * VARIABLES + CTAU2] - 2.0 * a2).abs() < 1e-15);
        assert_eq!(increment[VARIABLES], 1.0);
        assert_eq!(increment[VARIABLES + 3], 1.0);

        // Lateral shear-lag residuals of laminar faces stay out of the merit
        let mut residuals = system.residuals.clone();
        residuals[0].shear_stress_y += 1e3;
        assert_eq!(system.merit(&residuals), system.merit(&system.residuals));
        residuals[0].momentum_x += 1e3;
        assert!(system.merit(&residuals) > system.merit(&system.residuals));
    }

    #[test]
    fn test_overflowing_perturbation_is_rejected() {
        let plate = Plate::new();
        let state = plate.initial_state();
        assert!(plate.assembly().residuals(&state).iter().all(EquationResiduals::is_finite));
        let err = plate.assembly().linearize(&state, 1e300).unwrap_err();
        assert_eq!(
            err.downcast_ref::<BoundaryLayerError>(),
            Some(&BoundaryLayerError::NonFiniteJacobian { face: 0 })
        );
    }
}
