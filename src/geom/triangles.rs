use crate::Point;
use crate::geom::vector::Vector;
use serde::{Deserialize, Serialize};

/// Type for holding vertex indices for a triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriangleIndex(pub usize, pub usize, pub usize);

impl TriangleIndex {
    /// Vertex indices as an array, in winding order.
    pub fn to_array(&self) -> [usize; 3] {
        [self.0, self.1, self.2]
    }

    /// Returns true if the triangle references vertex `vi`.
    pub fn contains(&self, vi: usize) -> bool {
        self.0 == vi || self.1 == vi || self.2 == vi
    }

    /// Returns the triangle corners starting at vertex `vi`, keeping the winding order.
    pub fn rotated_to(&self, vi: usize) -> Option<[usize; 3]> {
        match vi {
            v if v == self.0 => Some([self.0, self.1, self.2]),
            v if v == self.1 => Some([self.1, self.2, self.0]),
            v if v == self.2 => Some([self.2, self.0, self.1]),
            _ => None,
        }
    }
}

/// Interior angle (radians) at `p0` of the triangle `p0, p1, p2`.
pub fn corner_angle(p0: Point, p1: Point, p2: Point) -> f64 {
    let e1 = Vector::from_points(p0, p1);
    let e2 = Vector::from_points(p0, p2);
    e1.angle(e2)
}

/// Area of the triangle `p0, p1, p2`.
pub fn triangle_area(p0: Point, p1: Point, p2: Point) -> f64 {
    let e1 = Vector::from_points(p0, p1);
    let e2 = Vector::from_points(p0, p2);
    0.5 * e1.cross(e2).length()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    #[test]
    fn test_rotated_to() {
        let tri = TriangleIndex(4, 7, 9);
        assert_eq!(tri.rotated_to(4), Some([4, 7, 9]));
        assert_eq!(tri.rotated_to(7), Some([7, 9, 4]));
        assert_eq!(tri.rotated_to(9), Some([9, 4, 7]));
        assert_eq!(tri.rotated_to(1), None);
        assert!(tri.contains(9));
        assert!(!tri.contains(5));
    }

    #[test]
    fn test_corner_angle() {
        let p0 = Point::new(0., 0., 0.);
        let p1 = Point::new(1., 0., 0.);
        let p2 = Point::new(0., 1., 0.);
        assert!((corner_angle(p0, p1, p2) - FRAC_PI_2).abs() < 1e-12);
        assert!((corner_angle(p1, p2, p0) - FRAC_PI_4).abs() < 1e-12);
        assert!((corner_angle(p2, p0, p1) - FRAC_PI_4).abs() < 1e-12);
    }

    #[test]
    fn test_triangle_area() {
        let p0 = Point::new(0., 0., 0.);
        let p1 = Point::new(2., 0., 0.);
        let p2 = Point::new(0., 3., 0.);
        assert!((triangle_area(p0, p1, p2) - 3.0).abs() < 1e-12);
        assert!(triangle_area(p0, p1, Point::new(4., 0., 0.)).abs() < 1e-12);
    }
}
