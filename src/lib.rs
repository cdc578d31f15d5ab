pub mod geom;
pub mod io;
pub mod sim;
pub mod vecutils;

// Prelude
pub use geom::mesh::Mesh;
pub use geom::point::Point;
pub use geom::triangles::TriangleIndex;
pub use geom::vector::Vector;
pub use sim::boundary_layer::{BoundaryLayerConfig, BoundaryLayerSolution, BoundaryLayerSolver};
pub use sim::coupling::{PanelSolver, SurfaceFlow};
