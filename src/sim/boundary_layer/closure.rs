//! Integral closure: from a sampled profile to the defect fluxes that enter
//! the integral equations.
//!
//! Two-component quantities are stored as `[x, y]` in the face's streamline
//! frame (x along the edge velocity, y the crossflow direction).

use crate::sim::boundary_layer::profile::{FlowRegime, LocalFreestream, ProfileSample, generate_profile};
use crate::sim::boundary_layer::state::ShapeParameters;
use crate::vecutils::{integrate_trapezoid_with, safe_div};

/// Thickness integrals of one profile.
///
/// Lengths are dimensional (scaled by `δ`); the dissipation integrals and
/// skin-friction coefficients are not.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IntegralThickness {
    pub delta_1_ast: f64,
    pub delta_2_ast: f64,
    pub phi_11: f64,
    pub phi_12: f64,
    pub phi_21: f64,
    pub phi_22: f64,
    pub phi_1_ast: f64,
    pub phi_2_ast: f64,
    pub delta_1_line: f64,
    pub delta_2_line: f64,
    pub delta_q: f64,
    pub delta_q_o: f64,
    pub theta_1_o: f64,
    pub theta_2_o: f64,
    pub delta_1_o: f64,
    pub delta_2_o: f64,
    pub c_d: f64,
    pub c_d_x: f64,
    pub c_d_o: f64,
    pub c_f_1: f64,
    pub c_f_2: f64,
    pub theta_11: f64,
    pub theta_22: f64,
}

impl IntegralThickness {
    pub fn from_profile(p: &ProfileSample, delta: f64, psi: f64) -> Self {
        let eta = &p.eta;
        let q2 = |i: usize| p.u[i] * p.u[i] + p.w[i] * p.w[i];
        let int = |mult: f64, f: &dyn Fn(usize) -> f64| integrate_trapezoid_with(eta, mult, f);

        let delta_1_ast = int(delta, &|i| 1.0 - p.r[i] * p.u[i]);
        let delta_2_ast = int(delta, &|i| -p.r[i] * p.w[i]);
        let phi_11 = int(delta, &|i| 1.0 - p.r[i] * p.u[i] * p.u[i]);
        let phi_12 = int(delta, &|i| -p.r[i] * p.u[i] * p.w[i]);
        let phi_22 = int(delta, &|i| -p.r[i] * p.w[i] * p.w[i]);
        let phi_1_ast = int(delta, &|i| 1.0 - p.r[i] * p.u[i] * q2(i));
        let phi_2_ast = int(delta, &|i| -p.r[i] * p.w[i] * q2(i));
        let delta_1_line = int(delta, &|i| 1.0 - p.u[i]);
        let delta_2_line = int(delta, &|i| -p.w[i]);
        let delta_q_o = int(delta, &|i| -psi * p.r[i] * q2(i));
        let theta_1_o = int(delta, &|i| -psi * p.r[i] * p.u[i] * q2(i));
        let theta_2_o = int(delta, &|i| -psi * p.r[i] * p.w[i] * q2(i));
        let delta_1_o = int(delta, &|i| -psi * p.u[i]);
        let delta_2_o = int(delta, &|i| -psi * p.w[i]);

        let c_d = int(1.0, &|i| p.s[i] * p.du[i] + p.t[i] * p.dw[i]);
        let c_d_x = int(1.0, &|i| p.s[i] * p.dw[i] - p.t[i] * p.du[i]);
        let c_d_o = int(1.0, &|i| psi * (p.s[i] * p.dw[i] - p.t[i] * p.du[i]));

        let (c_f_1, c_f_2) = match (p.s.first(), p.t.first()) {
            (Some(s), Some(t)) => (2.0 * s, 2.0 * t),
            _ => (0.0, 0.0),
        };

        Self {
            delta_1_ast,
            delta_2_ast,
            phi_11,
            phi_12,
            phi_21: phi_12,
            phi_22,
            phi_1_ast,
            phi_2_ast,
            delta_1_line,
            delta_2_line,
            delta_q: phi_11 + phi_22,
            delta_q_o,
            theta_1_o,
            theta_2_o,
            delta_1_o,
            delta_2_o,
            c_d,
            c_d_x,
            c_d_o,
            c_f_1,
            c_f_2,
            theta_11: phi_11 - delta_1_line,
            theta_22: phi_22 - delta_2_line,
        }
    }
}

/// Defect fluxes and sources of one face, the inputs of the residuals.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FaceFlux {
    /// Mass defect `ρ U δ*`.
    pub m: [f64; 2],
    /// Momentum defect rows, `j_x = [Jxx, Jxy]`, `j_y = [Jyx, Jyy]`.
    pub j_x: [f64; 2],
    pub j_y: [f64; 2],
    /// Kinetic-energy defect `ρ U³ φ*`.
    pub e: [f64; 2],
    /// Outer kinetic-energy defect `ρ U³ θo`.
    pub k_o: [f64; 2],
    pub q: [f64; 2],
    pub q_o: [f64; 2],
    /// Wall shear stress [Pa].
    pub tau_w: [f64; 2],
    /// Dissipation integrals.
    pub d: f64,
    pub d_x: f64,
    pub d_o: f64,
    /// Shear-lag source.
    pub s_tau: [f64; 2],
    /// Shear-stress transport, `k_tau_x = [Kτxx, Kτxy]`, `k_tau_y = [Kτyx, Kτyy]`.
    pub k_tau_x: [f64; 2],
    pub k_tau_y: [f64; 2],
}

impl FaceFlux {
    /// Profile, thickness integrals and fluxes of one face.
    pub fn evaluate(params: &ShapeParameters, fs: &LocalFreestream, layers: usize) -> Self {
        let (regime, profile) = generate_profile(params, fs, layers);
        let thickness = IntegralThickness::from_profile(&profile, params.delta, params.psi);
        Self::from_profile(regime, &profile, &thickness, params, fs)
    }

    pub fn from_profile(
        regime: FlowRegime,
        p: &ProfileSample,
        th: &IntegralThickness,
        params: &ShapeParameters,
        fs: &LocalFreestream,
    ) -> Self {
        let u = fs.velocity;
        let rho = fs.density;
        let aux_1 = rho * u;
        let aux_2 = aux_1 * u;
        let aux_3 = aux_2 * u;

        let s_tau = match regime {
            FlowRegime::Laminar => laminar_shear_lag(th, params, fs),
            FlowRegime::Turbulent => turbulent_shear_lag(p, params.delta, fs),
        };

        // Reynolds-stress transport, tau = U² S / R
        let delta = params.delta;
        let tau = |i: usize| {
            let inv_r = safe_div(1.0, p.r[i]);
            (u * u * p.s[i] * inv_r, u * u * p.t[i] * inv_r)
        };
        let k_tau = |pick_tau: fn((f64, f64)) -> f64, vel: &[f64]| {
            integrate_trapezoid_with(&p.eta, delta, |i| p.r[i] * rho * pick_tau(tau(i)) * u * vel[i])
        };

        Self {
            m: [aux_1 * th.delta_1_ast, aux_1 * th.delta_2_ast],
            j_x: [aux_2 * th.phi_11, aux_2 * th.phi_12],
            j_y: [aux_2 * th.phi_21, aux_2 * th.phi_22],
            e: [aux_3 * th.phi_1_ast, aux_3 * th.phi_2_ast],
            k_o: [aux_3 * th.theta_1_o, aux_3 * th.theta_2_o],
            q: [u * th.delta_1_line, u * th.delta_2_line],
            q_o: [u * th.theta_1_o, u * th.theta_2_o],
            tau_w: [0.5 * aux_2 * th.c_f_1, 0.5 * aux_2 * th.c_f_2],
            d: aux_3 * th.c_d,
            d_x: aux_3 * th.c_d_x,
            d_o: aux_3 * th.c_d_o,
            s_tau,
            k_tau_x: [k_tau(|t| t.0, &p.u), k_tau(|t| t.0, &p.w)],
            k_tau_y: [k_tau(|t| t.1, &p.u), k_tau(|t| t.1, &p.w)],
        }
    }
}

/// Amplification-rate source of the laminar shear-lag equations.
fn laminar_shear_lag(th: &IntegralThickness, params: &ShapeParameters, fs: &LocalFreestream) -> [f64; 2] {
    let ctau = params.ctau_magnitude();
    let growth = |displacement: f64, theta: f64| {
        let m2 = fs.mach * fs.mach;
        let h_k = (safe_div(displacement, theta) - 0.29 * m2) / (1.0 + 0.113 * m2);
        let re_theta = fs.velocity * fs.density * theta / fs.viscosity;
        let shape = 2.4 * h_k - 3.7 + 2.5 * (1.5 * h_k - 4.65).tanh();
        let hm1 = h_k - 1.0;
        let exponent = (safe_div(1.415, hm1) - 0.489) * (safe_div(20.0, hm1) - 12.9).tanh();
        let f = 0.01 * (shape * shape + 0.25).sqrt() * (re_theta - 10f64.powf(exponent));
        safe_div(f * fs.velocity * ctau, theta)
    };

    let x = growth(th.delta_1_ast, th.theta_11);
    let y = if th.theta_22.abs() < 1e-10 {
        0.0
    } else {
        growth(th.delta_2_ast, th.theta_22)
    };
    [x, y]
}

/// Production minus dissipation of the turbulent shear-lag equations.
fn turbulent_shear_lag(p: &ProfileSample, delta: f64, fs: &LocalFreestream) -> [f64; 2] {
    let u = fs.velocity;
    let rho = fs.density;
    let eta = &p.eta;

    let production = |dv: &[f64]| {
        integrate_trapezoid_with(eta, 1.0, |i| {
            let shear = p.s[i].hypot(p.t[i]);
            rho * p.r[i] * safe_div(u * u, p.r[i]) * shear * u * dv[i]
        })
    };
    let tau = |i: usize| {
        let inv_r = safe_div(1.0, p.r[i]);
        (u * u * p.s[i] * inv_r, u * u * p.t[i] * inv_r)
    };
    let dissipation = |pick: fn((f64, f64)) -> f64| {
        integrate_trapezoid_with(eta, delta, |i| {
            let (tx, ty) = tau(i);
            2.0 * rho * p.r[i] * (tx * tx + ty * ty).powf(0.25) * pick((tx, ty))
        })
    };

    [
        0.30 * (production(&p.du) - dissipation(|t| t.0)),
        0.30 * (production(&p.dw) - dissipation(|t| t.1)),
    ]
}
