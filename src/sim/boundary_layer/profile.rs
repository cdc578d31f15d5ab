//! Wall-normal velocity profiles.
//!
//! A face's shape parameters define a streamwise profile `U(η)` and a
//! crossflow profile `W(η)` on `η ∈ [0, 1]`, together with the density
//! ratio `R`, the derivatives `dU/dη`, `dW/dη` and the shear components
//! `S`, `T`. Two families exist: polynomial laminar profiles and a
//! wall-law based turbulent family. `|Cτ|` selects between them.

use serde::{Deserialize, Serialize};

use crate::sim::boundary_layer::config::Freestream;
use crate::sim::boundary_layer::state::ShapeParameters;
use crate::vecutils::safe_div;

/// `|Cτ|` above which a face is treated as turbulent.
pub const CTAU_CRIT: f64 = 0.1;

/// Smallest wall distance of the geometric turbulent grid, in wall units.
const FIRST_CELL_PLUS: f64 = 0.1;

// Wall-law constants
const KAPPA: f64 = 0.41;
const LOG_CONSTANT: f64 = 5.0;
const BUFFER_START: f64 = 5.0;
const BUFFER_END: f64 = 200.0;
const U_PLUS_BUFFER_END: f64 = 17.922725284263503;

/// Flow conditions at the edge of one face's boundary layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalFreestream {
    /// Edge velocity magnitude [m/s].
    pub velocity: f64,
    pub density: f64,
    pub viscosity: f64,
    pub mach: f64,
}

impl LocalFreestream {
    pub fn new(velocity: f64, mach: f64, freestream: &Freestream) -> Self {
        Self {
            velocity,
            density: freestream.density,
            viscosity: freestream.viscosity,
            mach,
        }
    }

    /// `U ρ δ / μ`
    pub fn reynolds(&self, delta: f64) -> f64 {
        self.velocity * self.density * delta / self.viscosity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowRegime {
    Laminar,
    Turbulent,
}

impl FlowRegime {
    pub fn from_shear_lag(ctau_magnitude: f64) -> Self {
        if ctau_magnitude > CTAU_CRIT {
            FlowRegime::Turbulent
        } else {
            FlowRegime::Laminar
        }
    }
}

/// Sampled velocity profile of one face.
#[derive(Debug, Clone, Default)]
pub struct ProfileSample {
    pub eta: Vec<f64>,
    pub u: Vec<f64>,
    pub w: Vec<f64>,
    /// Density ratio `ρ / ρ_edge`.
    pub r: Vec<f64>,
    pub du: Vec<f64>,
    pub dw: Vec<f64>,
    pub s: Vec<f64>,
    pub t: Vec<f64>,
}

impl ProfileSample {
    fn with_capacity(n: usize) -> Self {
        Self {
            eta: Vec::with_capacity(n),
            u: Vec::with_capacity(n),
            w: Vec::with_capacity(n),
            r: Vec::with_capacity(n),
            du: Vec::with_capacity(n),
            dw: Vec::with_capacity(n),
            s: Vec::with_capacity(n),
            t: Vec::with_capacity(n),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn push(&mut self, eta: f64, u: f64, w: f64, r: f64, du: f64, dw: f64, s: f64, t: f64) {
        self.eta.push(eta);
        self.u.push(u);
        self.w.push(w);
        self.r.push(r);
        self.du.push(du);
        self.dw.push(dw);
        self.s.push(s);
        self.t.push(t);
    }

    pub fn len(&self) -> usize {
        self.eta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eta.is_empty()
    }
}

/// Samples the profile of one face on `layers` points.
pub fn generate_profile(
    params: &ShapeParameters,
    freestream: &LocalFreestream,
    layers: usize,
) -> (FlowRegime, ProfileSample) {
    let re_delta = freestream.reynolds(params.delta);
    let compressibility = 0.2 * freestream.mach * freestream.mach;
    let shear_scale = (params.a * params.a + params.b * params.b).powf(0.25);
    let denom = shear_scale * re_delta.sqrt() + 1e-10;
    let u_tau = params.a / denom;
    let w_tau = params.b / denom;

    let regime = FlowRegime::from_shear_lag(params.ctau_magnitude());
    let sample = match regime {
        FlowRegime::Laminar => laminar_profile(params, re_delta, compressibility, layers),
        FlowRegime::Turbulent => turbulent_profile(
            params,
            re_delta,
            compressibility,
            shear_scale,
            u_tau,
            w_tau,
            layers,
        ),
    };
    (regime, sample)
}

fn density_ratio(compressibility: f64, u: f64, w: f64) -> f64 {
    1.0 / (1.0 + compressibility * (1.0 - u * u - w * w))
}

/// Viscosity ratio for a given inverse density ratio.
fn viscosity_ratio(inv_r: f64) -> f64 {
    inv_r.powf(1.5) * 2.0 / (inv_r + 1.0)
}

fn laminar_profile(
    params: &ShapeParameters,
    re_delta: f64,
    compressibility: f64,
    layers: usize,
) -> ProfileSample {
    let ShapeParameters { a, b, psi, .. } = *params;
    let mut out = ProfileSample::with_capacity(layers);
    let last = (layers.max(2) - 1) as f64;

    for i in 0..layers {
        let eta = i as f64 / last;
        let eta2 = eta * eta;
        let eta3 = eta2 * eta;
        let eta4 = eta3 * eta;
        let eta5 = eta4 * eta;
        let one_minus = 1.0 - eta;
        let one_minus2 = one_minus * one_minus;

        let f0 = 6.0 * eta2 - 8.0 * eta3 + 3.0 * eta4;
        let f1 = eta - 3.0 * eta2 + 3.0 * eta3 - eta4;
        let f2_poly = eta - 4.0 * eta2 + 6.0 * eta3 - 4.0 * eta4 + eta5;
        let f3_poly = eta2 - 3.0 * eta3 + 3.0 * eta4 - eta5;
        let f2 = f2_poly * one_minus2;
        let f3 = f3_poly * one_minus2;

        let shape = a * (1.0 - 0.6 * (a - 3.0) * eta3);
        let u = shape * f1 + f0;
        let w = b * f2 + psi * f3;
        let r = density_ratio(compressibility, u, w);

        let df0 = 12.0 * eta - 24.0 * eta2 + 12.0 * eta3;
        let df1 = 1.0 - 6.0 * eta + 9.0 * eta2 - 4.0 * eta3;
        let df2 = (1.0 - 8.0 * eta + 18.0 * eta2 - 16.0 * eta3 + 5.0 * eta4) * one_minus2
            - 2.0 * one_minus * f2_poly;
        let df3 = (2.0 * eta - 9.0 * eta2 + 12.0 * eta3 - 5.0 * eta4) * one_minus2
            - 2.0 * one_minus * f3_poly;

        let du = -1.8 * a * (a - 3.0) * eta2 * f1 + shape * df1 + df0;
        let dw = b * df2 + psi * df3;

        let nu = safe_div(viscosity_ratio(1.0 / r), re_delta);
        out.push(eta, u, w, r, du, dw, nu * du, nu * dw);
    }
    out
}

fn turbulent_profile(
    params: &ShapeParameters,
    re_delta: f64,
    compressibility: f64,
    shear_scale: f64,
    u_tau: f64,
    w_tau: f64,
    layers: usize,
) -> ProfileSample {
    let ShapeParameters { psi, ctau1, ctau2, .. } = *params;
    let h = 1.0 + compressibility;
    let delta_plus = re_delta.sqrt() / viscosity_ratio(h) / h * shear_scale;
    let y_plus = wall_grid(delta_plus, layers);

    let u_plus_max = wall_law_u_plus(delta_plus);
    let outer_w = w_tau * u_plus_max;
    let outer_u = 1.0 - u_tau * u_plus_max;
    let k_mag = outer_w.hypot(outer_u);
    let upsilon = safe_div(outer_w, outer_u).atan();
    let wall_shear = u_tau.hypot(w_tau);

    let emkc = (-KAPPA * LOG_CONSTANT).exp();
    let mut out = ProfileSample::with_capacity(layers);

    for yp in y_plus {
        let eta = safe_div(yp, delta_plus);
        let one_minus = 1.0 - eta;
        let theta = upsilon - psi * one_minus * one_minus;
        let (sin_t, cos_t) = theta.sin_cos();
        let g0 = 3.0 * eta * eta - 2.0 * eta * eta * eta;
        let dg0 = 6.0 * eta - 6.0 * eta * eta;
        // d(theta)/d(eta)
        let dtheta = 2.0 * psi * one_minus;

        let up = wall_law_u_plus(yp);
        let ku = KAPPA * up;
        // du+/dy+ from Spalding's inverse law
        let spalding = 1.0 / (1.0 + emkc * (KAPPA * ku.exp() - KAPPA - KAPPA * ku - 0.5 * KAPPA * ku * ku));

        let u = u_tau * up + k_mag * cos_t * g0;
        let w = w_tau * up - k_mag * sin_t * g0;
        let r = density_ratio(compressibility, u, w);

        let du = u_tau * delta_plus * spalding - dtheta * k_mag * sin_t * g0 + k_mag * cos_t * dg0;
        let dw = w_tau * delta_plus * spalding - dtheta * k_mag * cos_t * g0 - k_mag * sin_t * dg0;

        let s = r * u_tau * wall_shear * (1.0 - g0) + r * ctau1 * k_mag * cos_t * dg0;
        let t = r * w_tau * wall_shear * (1.0 - g0) + r * ctau2 * k_mag * sin_t * dg0;
        out.push(eta, u, w, r, du, dw, s, t);
    }
    out
}

/// Wall distances `y⁺` from the wall to `δ⁺`.
///
/// Geometric growth from a first cell of 0.1 when the layer is thick enough,
/// uniform otherwise.
fn wall_grid(delta_plus: f64, layers: usize) -> Vec<f64> {
    if layers < 2 {
        return vec![0.0; layers];
    }
    let intervals = layers - 1;
    if delta_plus / intervals as f64 > FIRST_CELL_PLUS {
        let ratio = find_exp_ratio(delta_plus, FIRST_CELL_PLUS, intervals, 0.95);
        let mut y = Vec::with_capacity(layers);
        y.push(0.0);
        let mut step = FIRST_CELL_PLUS;
        for i in 1..intervals {
            let prev = y[i - 1];
            y.push(prev + step);
            step *= ratio;
        }
        y.push(delta_plus);
        y
    } else {
        (0..layers)
            .map(|i| delta_plus * i as f64 / intervals as f64)
            .collect()
    }
}

/// Continuous wall law `u⁺(y⁺)`: viscous sublayer, a quartic Bernstein
/// blend in `log10 y⁺` over the buffer layer, then the log law.
pub fn wall_law_u_plus(y_plus: f64) -> f64 {
    if y_plus < BUFFER_START {
        y_plus
    } else if y_plus <= BUFFER_END {
        let ln10 = std::f64::consts::LN_10;
        let log10_e = std::f64::consts::LOG10_E;
        let a = BUFFER_START + 10.0 * BUFFER_START.log10() * ln10 * 0.26957378;
        let b = 14.2135593;
        let c = U_PLUS_BUFFER_END - (1.0 / (KAPPA * log10_e)) * 0.51958278;
        let t = (y_plus.log10() - BUFFER_START.log10()) / (BUFFER_END.log10() - BUFFER_START.log10());
        let s = 1.0 - t;
        s.powi(4) * BUFFER_START
            + 4.0 * s.powi(3) * t * a
            + 6.0 * s * s * t * t * b
            + 4.0 * s * t.powi(3) * c
            + t.powi(4) * U_PLUS_BUFFER_END
    } else {
        y_plus.ln() / KAPPA + LOG_CONSTANT
    }
}

/// Ratio `r` of a geometric series with first term `a0` and `n` terms
/// summing to `total`.
///
/// Brackets the root by stepping from `r0` in increments of 0.01, then
/// bisects. Ratios within 1e-8 of 1 are nudged off the removable
/// singularity of the series formula.
pub fn find_exp_ratio(total: f64, a0: f64, n: usize, r0: f64) -> f64 {
    const TOL: f64 = 1e-8;
    const STEP: f64 = 0.01;
    const MAX_STEPS: usize = 100_000;
    const MAX_BISECTIONS: usize = 500;

    let off_one = |r: f64| if (r - 1.0).abs() < TOL { 1.0 + TOL } else { r };
    let f = |r: f64| a0 * (1.0 - r.powi(n as i32)) / (1.0 - r) - total;

    let mut r = off_one(r0);
    let fr = f(r);
    if fr.abs() < TOL {
        return r;
    }

    let (mut lo, mut hi);
    if fr < 0.0 {
        lo = r;
        let mut steps = 0;
        while f(r) <= 0.0 && steps < MAX_STEPS {
            lo = r;
            r = off_one(r + STEP);
            steps += 1;
        }
        hi = r;
    } else {
        hi = r;
        let mut steps = 0;
        while f(r) >= 0.0 && steps < MAX_STEPS {
            hi = r;
            r = off_one(r - STEP);
            steps += 1;
        }
        lo = r;
    }

    let mut mid = off_one(0.5 * (lo + hi));
    for _ in 0..MAX_BISECTIONS {
        mid = off_one(0.5 * (lo + hi));
        let fm = f(mid);
        if fm.abs() < TOL {
            break;
        }
        if fm < 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    mid
}
