use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::sim::boundary_layer::BoundaryLayerError;
use crate::sim::linalg::GmresConfig;

/// Undisturbed flow far from the surface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Freestream {
    /// Freestream speed U∞ [m/s].
    pub velocity: f64,
    /// Density [kg/m³].
    pub density: f64,
    /// Dynamic viscosity [Pa·s].
    pub viscosity: f64,
    /// Speed of sound [m/s].
    pub sound_speed: f64,
}

impl Default for Freestream {
    fn default() -> Self {
        Self {
            velocity: 50.0,
            density: 1.225,
            viscosity: 1.8e-5,
            sound_speed: 340.0,
        }
    }
}

/// Outer nonlinear iteration settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct NewtonConfig {
    /// Number of Newton steps taken. The loop does not stop earlier.
    pub max_iterations: usize,
    /// Largest fraction of the Newton increment applied per step.
    pub damping: f64,
    /// Forward-difference step on the normalized unknowns.
    pub fd_step: f64,
    /// Times the damping may be halved before a step is given up.
    pub max_step_halvings: usize,
    /// Re-evaluate the panel solution every N steps. `None` keeps the
    /// surface flow fixed.
    pub recouple_every: Option<usize>,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 11,
            damping: 0.1,
            fd_step: 1e-8,
            max_step_halvings: 10,
            recouple_every: None,
        }
    }
}

/// Wall-normal discretization of the velocity profiles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub layers: usize,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self { layers: 300 }
    }
}

/// Complete solver configuration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryLayerConfig {
    pub freestream: Freestream,
    pub newton: NewtonConfig,
    pub gmres: GmresConfig,
    pub profile: ProfileConfig,
}

impl BoundaryLayerConfig {
    pub fn validate(&self) -> Result<()> {
        let fs = &self.freestream;
        let checks = [
            (fs.velocity > 0.0, "freestream velocity must be positive"),
            (fs.density > 0.0, "freestream density must be positive"),
            (fs.viscosity > 0.0, "freestream viscosity must be positive"),
            (fs.sound_speed > 0.0, "speed of sound must be positive"),
            (self.newton.damping > 0.0, "damping must be positive"),
            (self.newton.fd_step > 0.0, "finite-difference step must be positive"),
            (self.newton.recouple_every != Some(0), "recouple_every must be at least 1"),
            (self.gmres.krylov_dim > 0, "Krylov dimension must be at least 1"),
            (self.profile.layers >= 2, "profiles need at least 2 layers"),
        ];
        for (ok, msg) in checks {
            if !ok {
                return Err(BoundaryLayerError::InvalidConfig(msg.to_string()).into());
            }
        }
        Ok(())
    }
}
