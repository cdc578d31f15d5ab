pub mod frame;
pub mod mesh;
pub mod point;
pub mod topology;
pub mod triangles;
pub mod vector;

/// Geometric precision
const EPS: f64 = 1e-13;
