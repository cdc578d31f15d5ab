//! Local orthonormal frames of mesh faces.

use anyhow::{Context, Result};

use crate::geom::triangles::triangle_area;
use crate::{Mesh, Point, Vector};

/// Geometry of a single face expressed in its own in-plane frame.
///
/// `e1` runs along the first edge, `e3` is the unit normal and
/// `e2 = e3 x e1`. Corners are stored relative to the centroid, in the
/// face's winding order, which is counter-clockwise in `(e1, e2)`.
#[derive(Debug, Clone, Copy)]
pub struct FaceFrame {
    pub area: f64,
    pub centroid: Point,
    pub e1: Vector,
    pub e2: Vector,
    pub e3: Vector,
    pub corners: [[f64; 2]; 3],
}

impl FaceFrame {
    /// Returns None for collinear corners.
    pub fn new(p0: Point, p1: Point, p2: Point) -> Option<Self> {
        let e3 = Vector::normal(p0, p1, p2)?;
        let e1 = (p1 - p0).normalize()?;
        let e2 = e3.cross(e1);
        let centroid = Point::centroid(&[p0, p1, p2]);

        let local = |p: Point| {
            let v = p - centroid;
            [v.dot(e1), v.dot(e2)]
        };

        Some(Self {
            area: triangle_area(p0, p1, p2),
            centroid,
            e1,
            e2,
            e3,
            corners: [local(p0), local(p1), local(p2)],
        })
    }

    /// In-plane components of `v` in `(e1, e2)`.
    pub fn to_local(&self, v: Vector) -> [f64; 2] {
        [v.dot(self.e1), v.dot(self.e2)]
    }

    /// Global vector from in-plane components.
    pub fn to_global(&self, a: [f64; 2]) -> Vector {
        self.e1 * a[0] + self.e2 * a[1]
    }
}

/// Frames of all faces of `mesh`, indexed like `mesh.faces`.
pub fn face_frames(mesh: &Mesh) -> Result<Vec<FaceFrame>> {
    (0..mesh.face_count())
        .map(|fi| {
            let [p0, p1, p2] = mesh.face_points(fi);
            FaceFrame::new(p0, p1, p2).with_context(|| format!("Face {} is degenerate", fi))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_is_orthonormal() {
        let frame = FaceFrame::new(
            Point::new(0., 0., 1.),
            Point::new(2., 1., 1.),
            Point::new(-1., 3., 2.),
        )
        .unwrap();
        assert!((frame.e1.length() - 1.).abs() < 1e-12);
        assert!((frame.e2.length() - 1.).abs() < 1e-12);
        assert!((frame.e3.length() - 1.).abs() < 1e-12);
        assert!(frame.e1.dot(frame.e2).abs() < 1e-12);
        assert!(frame.e1.dot(frame.e3).abs() < 1e-12);
        assert!(frame.e2.dot(frame.e3).abs() < 1e-12);
    }

    #[test]
    fn test_corners_are_counter_clockwise() {
        let frame = FaceFrame::new(
            Point::new(0., 0., 0.),
            Point::new(1., 0., 0.),
            Point::new(0., 1., 0.),
        )
        .unwrap();
        let [a, b, c] = frame.corners;
        let signed = 0.5 * ((b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1]));
        assert!((signed - frame.area).abs() < 1e-12, "signed={}", signed);
        // Corners are centered on the centroid
        let cx = (a[0] + b[0] + c[0]) / 3.;
        let cy = (a[1] + b[1] + c[1]) / 3.;
        assert!(cx.abs() < 1e-12 && cy.abs() < 1e-12);
    }

    #[test]
    fn test_local_global_roundtrip_in_plane() {
        let frame = FaceFrame::new(
            Point::new(0., 0., 0.),
            Point::new(1., 1., 0.),
            Point::new(-1., 1., 0.),
        )
        .unwrap();
        let v = Vector::new(0.3, -0.7, 0.);
        let back = frame.to_global(frame.to_local(v));
        assert!(back.is_close(&v), "{}", back);
        assert!(v.dot(frame.e3).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_frame() {
        let p = Point::new(0., 0., 0.);
        assert!(FaceFrame::new(p, Point::new(1., 0., 0.), Point::new(2., 0., 0.)).is_none());
    }
}
