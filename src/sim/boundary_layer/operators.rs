//! Discrete surface operators on a triangle mesh.
//!
//! Face values are carried to the vertices with the angle-weighted
//! interpolation. A divergence is the boundary flux of the linearly
//! interpolated field over the triangle, divided by its area. A gradient is
//! the slope of the plane fitted through the face center and its three
//! corners.
//!
//! In-plane vector fields travel between faces as global 3D vectors: each
//! face lifts its streamline components with its own `(s1, s2)` and the
//! receiving face projects the interpolated vertex vectors onto its
//! `(e1, e2)`.

use std::ops::{Add, Mul};

use rayon::prelude::*;

use crate::Vector;
use crate::geom::frame::FaceFrame;
use crate::geom::topology::VertexInterpolation;
use crate::sim::boundary_layer::closure::FaceFlux;
use crate::sim::coupling::SurfaceFlow;
use crate::vecutils::safe_div;
use crate::Mesh;

/// Orthonormal in-plane axes aligned with the edge velocity of a face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamlineFrame {
    pub s1: Vector,
    pub s2: Vector,
}

impl StreamlineFrame {
    /// `s1` follows the surface velocity minus the transpiration along the
    /// normal; `s2 = e3 x s1`. A face at rest falls back to `e1`.
    pub fn new(frame: &FaceFrame, velocity: Vector, transpiration: f64) -> Self {
        let s1 = (velocity - frame.e3 * transpiration)
            .normalize()
            .unwrap_or(frame.e1);
        Self {
            s1,
            s2: frame.e3.cross(s1),
        }
    }

    pub fn to_global(&self, a: [f64; 2]) -> Vector {
        self.s1 * a[0] + self.s2 * a[1]
    }

    pub fn to_streamline(&self, v: Vector) -> [f64; 2] {
        [v.dot(self.s1), v.dot(self.s2)]
    }
}

/// Streamline frames of all faces.
pub fn streamline_frames(frames: &[FaceFrame], flow: &SurfaceFlow, transpiration: &[f64]) -> Vec<StreamlineFrame> {
    frames
        .iter()
        .zip(&flow.velocity)
        .zip(transpiration)
        .map(|((frame, v), t)| StreamlineFrame::new(frame, *v, *t))
        .collect()
}

/// Divergence of a linear field given at the corners of a counter-clockwise
/// triangle, in the triangle's own plane coordinates.
pub fn divergence(corners: &[[f64; 2]; 3], values: &[[f64; 2]; 3], area: f64) -> f64 {
    let mut flux = 0.0;
    for k in 0..3 {
        let (a, b) = (corners[k], corners[(k + 1) % 3]);
        let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
        let len = dx.hypot(dy);
        if len == 0.0 {
            continue;
        }
        // Outward normal of a counter-clockwise edge
        let n = [dy / len, -dx / len];
        let va = n[0] * values[k][0] + n[1] * values[k][1];
        let vb = n[0] * values[(k + 1) % 3][0] + n[1] * values[(k + 1) % 3][1];
        flux += 0.5 * len * (va + vb);
    }
    safe_div(flux, area)
}

/// Gradient of the plane through `(c, center_value)` and the three
/// `(corner, corner_value)` points, where `c` is the corner centroid.
pub fn plane_gradient(center_value: f64, corners: &[[f64; 2]; 3], corner_values: [f64; 3]) -> [f64; 2] {
    let cx = (corners[0][0] + corners[1][0] + corners[2][0]) / 3.0;
    let cy = (corners[0][1] + corners[1][1] + corners[2][1]) / 3.0;
    let p0 = Vector::new(cx, cy, center_value);
    let rel: [Vector; 3] = std::array::from_fn(|k| {
        Vector::new(corners[k][0], corners[k][1], corner_values[k]) - p0
    });
    let n = rel[0].cross(rel[1]) + rel[1].cross(rel[2]) + rel[2].cross(rel[0]);
    [-safe_div(n.dx, n.dz), -safe_div(n.dy, n.dz)]
}

/// Surface gradients that depend only on the inviscid flow, in streamline
/// components.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FaceGradients {
    /// Gradient of `q² = |v|²`.
    pub q2: [f64; 2],
    /// Gradient of the streamline turning angle.
    pub phi: [f64; 2],
}

impl FaceGradients {
    /// Gradients of all faces.
    pub fn compute(
        mesh: &Mesh,
        frames: &[FaceFrame],
        interpolation: &VertexInterpolation,
        flow: &SurfaceFlow,
        streamlines: &[StreamlineFrame],
    ) -> Vec<FaceGradients> {
        let q2: Vec<f64> = flow.speed.iter().map(|s| s * s).collect();
        let q2_vertices = interpolation.vertex_values(&q2);
        let velocity_vertices = interpolation.vertex_values(&flow.velocity);

        (0..mesh.face_count())
            .into_par_iter()
            .map(|fi| {
                let frame = &frames[fi];
                let streamline = &streamlines[fi];
                let idx = mesh.faces[fi].to_array();
                let lift = |g: [f64; 2]| streamline.to_streamline(frame.to_global(g));

                let q2_grad = plane_gradient(q2[fi], &frame.corners, idx.map(|vi| q2_vertices[vi]));

                // Turning angle of the vertex velocities relative to the face velocity
                let tangent = flow.velocity[fi].reject(frame.e3).normalize().unwrap_or(frame.e1);
                let lateral = tangent.cross(frame.e3);
                let angles = idx.map(|vi| {
                    let v = velocity_vertices[vi].reject(frame.e3).normalize().unwrap_or(tangent);
                    safe_div(lateral.dot(v), tangent.dot(v)).atan()
                });
                let phi_grad = plane_gradient(0.0, &frame.corners, angles);

                FaceGradients {
                    q2: lift(q2_grad),
                    phi: lift(phi_grad),
                }
            })
            .collect()
    }
}

/// In-plane fluxes of a face lifted to global vectors.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FluxVectors {
    pub m: Vector,
    pub j_x: Vector,
    pub j_y: Vector,
    pub e: Vector,
    pub k_o: Vector,
    pub k_tau_x: Vector,
    pub k_tau_y: Vector,
}

impl FluxVectors {
    pub fn new(flux: &FaceFlux, streamline: &StreamlineFrame) -> Self {
        let g = |a: [f64; 2]| streamline.to_global(a);
        Self {
            m: g(flux.m),
            j_x: g(flux.j_x),
            j_y: g(flux.j_y),
            e: g(flux.e),
            k_o: g(flux.k_o),
            k_tau_x: g(flux.k_tau_x),
            k_tau_y: g(flux.k_tau_y),
        }
    }
}

impl Add for FluxVectors {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            m: self.m + other.m,
            j_x: self.j_x + other.j_x,
            j_y: self.j_y + other.j_y,
            e: self.e + other.e,
            k_o: self.k_o + other.k_o,
            k_tau_x: self.k_tau_x + other.k_tau_x,
            k_tau_y: self.k_tau_y + other.k_tau_y,
        }
    }
}

impl Mul<f64> for FluxVectors {
    type Output = Self;

    fn mul(self, w: f64) -> Self {
        Self {
            m: self.m * w,
            j_x: self.j_x * w,
            j_y: self.j_y * w,
            e: self.e * w,
            k_o: self.k_o * w,
            k_tau_x: self.k_tau_x * w,
            k_tau_y: self.k_tau_y * w,
        }
    }
}

/// Divergences of the flux fields on one face.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FaceDivergences {
    pub m: f64,
    pub j_x: f64,
    pub j_y: f64,
    pub e: f64,
    pub k_o: f64,
    pub k_tau_x: f64,
    pub k_tau_y: f64,
}

impl FaceDivergences {
    /// Divergences on face `fi`; `flux` supplies the lifted fluxes of any
    /// face sharing a vertex with it.
    pub fn compute<F>(
        mesh: &Mesh,
        frames: &[FaceFrame],
        interpolation: &VertexInterpolation,
        fi: usize,
        flux: F,
    ) -> Self
    where
        F: Fn(usize) -> FluxVectors,
    {
        let frame = &frames[fi];
        let vertex_flux = mesh.faces[fi].to_array().map(|vi| interpolation.interpolate(vi, &flux));
        let div = |pick: fn(&FluxVectors) -> Vector| {
            let values = vertex_flux.map(|f| frame.to_local(pick(&f)));
            divergence(&frame.corners, &values, frame.area)
        };
        Self {
            m: div(|f| f.m),
            j_x: div(|f| f.j_x),
            j_y: div(|f| f.j_y),
            e: div(|f| f.e),
            k_o: div(|f| f.k_o),
            k_tau_x: div(|f| f.k_tau_x),
            k_tau_y: div(|f| f.k_tau_y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Point;

    fn tri() -> FaceFrame {
        FaceFrame::new(
            Point::new(0., 0., 0.),
            Point::new(2., 0., 0.),
            Point::new(0.5, 1.5, 0.),
        )
        .unwrap()
    }

    #[test]
    fn test_divergence_of_constant_field_is_zero() {
        let frame = tri();
        let values = [[3.0, -1.0]; 3];
        assert!(divergence(&frame.corners, &values, frame.area).abs() < 1e-12);
    }

    #[test]
    fn test_divergence_of_linear_field() {
        // v = (2x, -0.5y) has divergence 1.5
        let frame = tri();
        let values = frame.corners.map(|c| [2.0 * c[0], -0.5 * c[1]]);
        let d = divergence(&frame.corners, &values, frame.area);
        assert!((d - 1.5).abs() < 1e-12, "div={}", d);
    }

    #[test]
    fn test_plane_gradient_of_linear_field() {
        let frame = tri();
        let f = |p: [f64; 2]| 2.0 * p[0] - 3.0 * p[1] + 1.0;
        let center = f([0.0, 0.0]);
        let g = plane_gradient(center, &frame.corners, frame.corners.map(f));
        assert!((g[0] - 2.0).abs() < 1e-12);
        assert!((g[1] + 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_streamline_frame() {
        let frame = tri();
        let s = StreamlineFrame::new(&frame, Vector::new(0., 3., 0.5), 0.5);
        assert!(s.s1.is_close(&Vector::new(0., 1., 0.)));
        assert!(s.s2.is_close(&Vector::new(-1., 0., 0.)));
        assert_eq!(s.to_streamline(Vector::new(1., 2., 0.)), [2.0, -1.0]);

        let rest = StreamlineFrame::new(&frame, Vector::zero(), 0.0);
        assert!(rest.s1.is_close(&frame.e1));
    }

    #[test]
    fn test_uniform_flow_has_zero_gradients_and_divergence() {
        let mesh = Mesh::flat_plate(3, 3, 1.0, 1.0).unwrap();
        let frames = crate::geom::frame::face_frames(&mesh).unwrap();
        let interp = VertexInterpolation::build(&mesh).unwrap();
        let flow = SurfaceFlow::uniform(mesh.face_count(), Vector::new(-10., 0., 0.), 10., 340.).unwrap();
        let transpiration = vec![0.0; mesh.face_count()];
        let streamlines = streamline_frames(&frames, &flow, &transpiration);

        let grads = FaceGradients::compute(&mesh, &frames, &interp, &flow, &streamlines);
        for g in &grads {
            assert!(g.q2[0].abs() < 1e-9 && g.q2[1].abs() < 1e-9, "{:?}", g);
            assert!(g.phi[0].abs() < 1e-12 && g.phi[1].abs() < 1e-12, "{:?}", g);
        }

        let flux = FaceFlux {
            m: [0.3, 0.1],
            j_x: [1.0, 0.0],
            ..FaceFlux::default()
        };
        let vectors = FluxVectors::new(&flux, &streamlines[0]);
        for fi in 0..mesh.face_count() {
            let div = FaceDivergences::compute(&mesh, &frames, &interp, fi, |_| vectors);
            assert!(div.m.abs() < 1e-9 && div.j_x.abs() < 1e-9, "face {}: {:?}", fi, div);
        }
    }

    #[test]
    fn test_divergence_of_growing_mass_flux() {
        // Mass flux along -x growing linearly downstream: m_s1 = c * (L - x)
        let mesh = Mesh::flat_plate(4, 2, 1.0, 0.5).unwrap();
        let frames = crate::geom::frame::face_frames(&mesh).unwrap();
        let interp = VertexInterpolation::build(&mesh).unwrap();
        let flow = SurfaceFlow::uniform(mesh.face_count(), Vector::new(-10., 0., 0.), 10., 340.).unwrap();
        let streamlines = streamline_frames(&frames, &flow, &vec![0.0; mesh.face_count()]);
        let vectors: Vec<FluxVectors> = frames
            .iter()
            .zip(&streamlines)
            .map(|(f, s)| {
                let flux = FaceFlux {
                    m: [2.0 * (1.0 - f.centroid.x), 0.0],
                    ..FaceFlux::default()
                };
                FluxVectors::new(&flux, s)
            })
            .collect();

        // Div of (-2 (1 - x), 0) in global x is +2. Faces away from the
        // x-boundaries see vertex values linear in x and y.
        for fi in [2, 3, 4, 5, 10, 11, 12, 13] {
            let div = FaceDivergences::compute(&mesh, &frames, &interp, fi, |j| vectors[j]);
            assert!((div.m - 2.0).abs() < 1e-9, "face {}: {}", fi, div.m);
        }
    }
}
