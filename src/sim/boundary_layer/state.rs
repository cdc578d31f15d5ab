use std::f64::consts::FRAC_1_SQRT_2;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::Mesh;
use crate::geom::frame::FaceFrame;
use crate::sim::boundary_layer::BoundaryLayerError;
use crate::sim::boundary_layer::config::Freestream;

/// Number of unknowns per face.
pub const VARIABLES: usize = 6;

/// Physical value = scale x normalized value, in the order
/// δ, A, B, Ψ, Cτ1, Cτ2.
pub const SCALES: [f64; VARIABLES] = [1e-3, 1.0, 1.0, 1.0, 1e-4, 1e-4];

/// Physical shape parameters of one face.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ShapeParameters {
    /// Boundary-layer thickness [m].
    pub delta: f64,
    /// Streamwise profile shape factor.
    pub a: f64,
    /// Crossflow wall-shear factor.
    pub b: f64,
    /// Crossflow outer-shape factor.
    pub psi: f64,
    pub ctau1: f64,
    pub ctau2: f64,
}

impl ShapeParameters {
    pub fn from_array(v: [f64; VARIABLES]) -> Self {
        Self {
            delta: v[0],
            a: v[1],
            b: v[2],
            psi: v[3],
            ctau1: v[4],
            ctau2: v[5],
        }
    }

    pub fn to_array(&self) -> [f64; VARIABLES] {
        [self.delta, self.a, self.b, self.psi, self.ctau1, self.ctau2]
    }

    /// `|Cτ|`, which selects the profile branch.
    pub fn ctau_magnitude(&self) -> f64 {
        self.ctau1.hypot(self.ctau2)
    }

    /// Unit vector along `(Cτ1, Cτ2)`, or the diagonal when `Cτ` vanishes.
    pub fn shear_lag_axis(&self) -> [f64; 2] {
        let m = self.ctau_magnitude();
        if m > 0.0 {
            [self.ctau1 / m, self.ctau2 / m]
        } else {
            [FRAC_1_SQRT_2, FRAC_1_SQRT_2]
        }
    }
}

/// Normalized unknowns of every face, indexed like `Mesh::faces`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoundaryLayerState {
    normalized: Vec<[f64; VARIABLES]>,
}

impl BoundaryLayerState {
    /// Starting guess: a flat-plate laminar thickness measured from the
    /// largest vertex x-coordinate, attached streamwise profile, small
    /// crossflow and shear-lag values.
    pub fn initial(mesh: &Mesh, frames: &[FaceFrame], freestream: &Freestream) -> Self {
        let max_x = mesh.max_x();
        let normalized = frames
            .iter()
            .map(|frame| {
                let d = (max_x - frame.centroid.x).max(0.0);
                // 5 d / sqrt(Re_d), written without the division by Re_d
                let growth = 5.0 * (d * freestream.viscosity / (freestream.density * freestream.velocity)).sqrt();
                [(0.001 + growth) / SCALES[0], 1.0, 0.001, 0.001, 0.001, 0.001]
            })
            .collect();
        Self { normalized }
    }

    /// Builds a state from physical parameters.
    pub fn from_parameters(parameters: &[ShapeParameters]) -> Self {
        let normalized = parameters
            .iter()
            .map(|p| {
                let mut v = p.to_array();
                for (x, s) in v.iter_mut().zip(SCALES) {
                    *x /= s;
                }
                v
            })
            .collect();
        Self { normalized }
    }

    pub fn face_count(&self) -> usize {
        self.normalized.len()
    }

    pub fn normalized(&self, fi: usize) -> [f64; VARIABLES] {
        self.normalized[fi]
    }

    /// Physical parameters of face `fi`.
    pub fn parameters(&self, fi: usize) -> ShapeParameters {
        Self::to_physical(self.normalized[fi])
    }

    pub fn all_parameters(&self) -> Vec<ShapeParameters> {
        (0..self.face_count()).map(|fi| self.parameters(fi)).collect()
    }

    /// Physical parameters of face `fi` with normalized variable `var`
    /// shifted by `step`.
    pub fn perturbed(&self, fi: usize, var: usize, step: f64) -> ShapeParameters {
        let mut v = self.normalized[fi];
        v[var] += step;
        Self::to_physical(v)
    }

    /// True if every unknown is finite and every thickness positive.
    pub fn is_admissible(&self) -> bool {
        self.normalized
            .iter()
            .all(|v| v[0] > 0.0 && v.iter().all(|x| x.is_finite()))
    }

    /// `x += damping * increment`, with the increment laid out face by face.
    pub fn apply_increment(&mut self, increment: &[f64], damping: f64) -> Result<()> {
        let expected = VARIABLES * self.face_count();
        if increment.len() != expected {
            return Err(BoundaryLayerError::SizeMismatch {
                field: "increment",
                expected,
                found: increment.len(),
            }
            .into());
        }
        for (face, dx) in self.normalized.iter_mut().zip(increment.chunks_exact(VARIABLES)) {
            for (x, d) in face.iter_mut().zip(dx) {
                *x += damping * d;
            }
        }
        Ok(())
    }

    fn to_physical(v: [f64; VARIABLES]) -> ShapeParameters {
        let mut p = v;
        for (x, s) in p.iter_mut().zip(SCALES) {
            *x *= s;
        }
        ShapeParameters::from_array(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::frame::face_frames;

    #[test]
    fn test_initial_state() {
        let mesh = Mesh::flat_plate(4, 1, 1.0, 0.25).unwrap();
        let frames = face_frames(&mesh).unwrap();
        let fs = Freestream {
            velocity: 50.0,
            density: 1.2,
            viscosity: 1.8e-5,
            sound_speed: 340.0,
        };
        let state = BoundaryLayerState::initial(&mesh, &frames, &fs);
        assert_eq!(state.face_count(), 8);

        for fi in 0..state.face_count() {
            let d = 1.0 - frames[fi].centroid.x;
            let re = fs.density * fs.velocity * d / fs.viscosity;
            let expected = 0.001 + 5.0 * d / re.sqrt();
            let p = state.parameters(fi);
            assert!((p.delta - expected).abs() < 1e-12, "face {} delta={} expected={}", fi, p.delta, expected);
            assert_eq!(p.a, 1.0);
            assert!((p.b - 0.001).abs() < 1e-15);
            assert!((p.ctau1 - 1e-7).abs() < 1e-20);
        }
        // Thicker away from the largest x
        assert!(state.parameters(0).delta > state.parameters(6).delta);
    }

    #[test]
    fn test_perturb_and_update() {
        let params = vec![ShapeParameters {
            delta: 2e-3,
            a: 1.0,
            b: 0.1,
            psi: 0.2,
            ctau1: 1e-5,
            ctau2: 2e-5,
        }];
        let mut state = BoundaryLayerState::from_parameters(&params);
        assert_eq!(state.normalized(0), [2.0, 1.0, 0.1, 0.2, 0.1, 0.2]);

        let p = state.perturbed(0, 0, 1.0);
        assert!((p.delta - 3e-3).abs() < 1e-15);
        assert_eq!(state.parameters(0), params[0]);

        state.apply_increment(&[10.0, 0.0, 0.0, 0.0, 0.0, -2.0], 0.1).unwrap();
        let n = state.normalized(0);
        assert!((n[0] - 3.0).abs() < 1e-12);
        assert!((n[5] - 0.0).abs() < 1e-12);
        assert!(state.apply_increment(&[1.0], 0.1).is_err());
    }

    #[test]
    fn test_shear_lag_axis() {
        let p = ShapeParameters {
            ctau1: 3e-5,
            ctau2: -4e-5,
            ..ShapeParameters::default()
        };
        let [a1, a2] = p.shear_lag_axis();
        assert!((a1 - 0.6).abs() < 1e-12 && (a2 + 0.8).abs() < 1e-12);
        assert_eq!(ShapeParameters::default().shear_lag_axis(), [FRAC_1_SQRT_2, FRAC_1_SQRT_2]);
    }

    #[test]
    fn test_admissible_state() {
        let p = ShapeParameters {
            delta: 1e-3,
            a: 1.0,
            ..ShapeParameters::default()
        };
        let mut state = BoundaryLayerState::from_parameters(&[p, p]);
        assert!(state.is_admissible());
        state.apply_increment(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, -2.0, 0.0, 0.0, 0.0, 0.0, 0.0], 1.0).unwrap();
        assert!(!state.is_admissible());

        let mut state = BoundaryLayerState::from_parameters(&[p]);
        state.apply_increment(&[0.0, f64::NAN, 0.0, 0.0, 0.0, 0.0], 1.0).unwrap();
        assert!(!state.is_admissible());
    }
}
