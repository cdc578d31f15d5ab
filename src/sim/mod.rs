pub mod boundary_layer;
pub mod coupling;
pub mod linalg;
