//! Viscous-inviscid coupling payloads.
//!
//! The boundary-layer core never assembles the potential-flow problem
//! itself. It receives a per-face surface velocity from a panel solver and
//! hands back a per-face transpiration velocity. These types define that
//! contract.
//!
//! The core guideline is:
//! - index every per-face field like `Mesh::faces`,
//! - keep values in SI units (m/s, Pa, kg/m³),
//! - derive pressure coefficient and Mach number in one place.

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

use crate::Vector;

/// External potential-flow solver.
///
/// Given a transpiration (blowing) velocity per face [m/s], returns the
/// inviscid surface velocity per face [m/s].
pub trait PanelSolver {
    fn surface_velocity(&self, transpiration: &[f64]) -> Result<Vec<Vector>>;
}

/// Inviscid surface flow seen by the boundary layer, per face.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurfaceFlow {
    /// Surface velocity [m/s].
    pub velocity: Vec<Vector>,
    /// Velocity magnitude [m/s].
    pub speed: Vec<f64>,
    /// Pressure coefficient, `1 - (|v| / U∞)²`.
    pub cp: Vec<f64>,
    /// Local Mach number, `|v| / a`.
    pub mach: Vec<f64>,
}

impl SurfaceFlow {
    /// Derives magnitude, pressure coefficient and Mach number from velocities.
    pub fn from_velocities(
        velocity: Vec<Vector>,
        freestream_speed: f64,
        sound_speed: f64,
    ) -> Result<Self> {
        ensure!(
            freestream_speed > 0.0,
            "Freestream speed must be positive, got {}",
            freestream_speed
        );
        ensure!(sound_speed > 0.0, "Sound speed must be positive, got {}", sound_speed);

        let speed: Vec<f64> = velocity.iter().map(|v| v.length()).collect();
        let cp = speed
            .iter()
            .map(|s| 1.0 - (s / freestream_speed).powi(2))
            .collect();
        let mach = speed.iter().map(|s| s / sound_speed).collect();

        Ok(Self {
            velocity,
            speed,
            cp,
            mach,
        })
    }

    /// The same velocity on every face.
    pub fn uniform(
        face_count: usize,
        velocity: Vector,
        freestream_speed: f64,
        sound_speed: f64,
    ) -> Result<Self> {
        Self::from_velocities(vec![velocity; face_count], freestream_speed, sound_speed)
    }

    pub fn face_count(&self) -> usize {
        self.velocity.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_parameters() {
        let flow = SurfaceFlow::from_velocities(
            vec![Vector::new(30., 40., 0.), Vector::new(0., 0., 0.)],
            50.,
            340.,
        )
        .unwrap();
        assert_eq!(flow.speed, vec![50., 0.]);
        assert!(flow.cp[0].abs() < 1e-12);
        assert_eq!(flow.cp[1], 1.0);
        assert!((flow.mach[0] - 50. / 340.).abs() < 1e-12);
        assert_eq!(flow.face_count(), 2);
    }

    #[test]
    fn test_invalid_freestream() {
        assert!(SurfaceFlow::uniform(3, Vector::new(1., 0., 0.), 0., 340.).is_err());
        assert!(SurfaceFlow::uniform(3, Vector::new(1., 0., 0.), 10., -1.).is_err());
    }
}
