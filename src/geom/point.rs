use crate::Vector;
use crate::geom::EPS;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Returns true if both points are very close to each other.
    pub fn is_close(&self, other: &Self) -> bool {
        (self.x - other.x).abs() < EPS
            && (self.y - other.y).abs() < EPS
            && (self.z - other.z).abs() < EPS
    }

    /// Arithmetic mean of the given points.
    ///
    /// Returns the origin for an empty slice.
    pub fn centroid(pts: &[Self]) -> Self {
        if pts.is_empty() {
            return Self::new(0., 0., 0.);
        }
        let n = pts.len() as f64;
        let (sx, sy, sz) = pts
            .iter()
            .fold((0., 0., 0.), |(sx, sy, sz), p| (sx + p.x, sy + p.y, sz + p.z));
        Self::new(sx / n, sy / n, sz / n)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prec = f.precision().unwrap_or(2); // Default 2 decimals
        write!(
            f,
            "Point({:.prec$}, {:.prec$}, {:.prec$})",
            self.x,
            self.y,
            self.z,
            prec = prec
        )
    }
}

// Implement +
impl Add<Vector> for Point {
    type Output = Point;
    fn add(self, other: Vector) -> Self {
        Self {
            x: self.x + other.dx,
            y: self.y + other.dy,
            z: self.z + other.dz,
        }
    }
}

// Implement -
// Point - Point gives the vector pointing from `other` to `self`
impl Sub for Point {
    type Output = Vector;
    fn sub(self, other: Self) -> Vector {
        Vector::from_points(other, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_close() {
        let pa = Point::new(5., 5., 5.);
        let pb = Point::new(5.00000000000001, 5., 5.);
        let pc = Point::new(5.0001, 5., 5.);
        assert!(pa.is_close(&pb));
        assert!(!pa.is_close(&pc));
    }

    #[test]
    fn test_centroid() {
        let pts = [
            Point::new(0., 0., 0.),
            Point::new(3., 0., 0.),
            Point::new(0., 3., 0.),
        ];
        assert!(Point::centroid(&pts).is_close(&Point::new(1., 1., 0.)));
        assert!(Point::centroid(&[]).is_close(&Point::new(0., 0., 0.)));
    }

    #[test]
    fn test_sub_gives_vector() {
        let p0 = Point::new(1., 1., 1.);
        let p1 = Point::new(2., 3., 4.);
        let v = p1 - p0;
        assert!(v.is_close(&Vector::new(1., 2., 3.)));
        assert!((p0 + v).is_close(&p1));
    }
}
