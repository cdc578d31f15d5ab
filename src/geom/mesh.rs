use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::Point;
use crate::TriangleIndex;
use crate::geom::triangles::triangle_area;

/// Triangulated surface the boundary layer lives on.
///
/// Faces are stored with a consistent winding; the face normal is
/// `(p1 - p0) x (p2 - p0)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Point>,
    pub faces: Vec<TriangleIndex>,
}

impl Mesh {
    /// Creates a mesh after checking that every face references existing,
    /// distinct vertices and has a non-zero area.
    pub fn new(vertices: Vec<Point>, faces: Vec<TriangleIndex>) -> Result<Self> {
        let mesh = Self { vertices, faces };
        mesh.validate()?;
        Ok(mesh)
    }

    pub fn validate(&self) -> Result<()> {
        let nv = self.vertices.len();
        for (fi, face) in self.faces.iter().enumerate() {
            let [a, b, c] = face.to_array();
            if a >= nv || b >= nv || c >= nv {
                bail!(
                    "Face {} references vertex out of range ({:?}, {} vertices)",
                    fi,
                    face,
                    nv
                );
            }
            if a == b || b == c || a == c {
                bail!("Face {} has repeated vertex indices: {:?}", fi, face);
            }
            let [p0, p1, p2] = self.face_points(fi);
            if triangle_area(p0, p1, p2) <= 0.0 {
                bail!("Face {} is degenerate (zero area)", fi);
            }
        }
        Ok(())
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Corner points of face `fi` in winding order.
    pub fn face_points(&self, fi: usize) -> [Point; 3] {
        let [a, b, c] = self.faces[fi].to_array();
        [self.vertices[a], self.vertices[b], self.vertices[c]]
    }

    /// Largest vertex x-coordinate (0 for an empty mesh).
    pub fn max_x(&self) -> f64 {
        self.vertices
            .iter()
            .map(|p| p.x)
            .fold(None, |acc: Option<f64>, x| Some(acc.map_or(x, |a| a.max(x))))
            .unwrap_or(0.)
    }

    /// Builds a flat rectangular plate in the z=0 plane.
    ///
    /// The plate spans `[0, length] x [0, width]` and is split into
    /// `nx * ny` cells, each cut into two triangles along the same diagonal.
    /// All faces have their normal pointing to +z.
    pub fn flat_plate(nx: usize, ny: usize, length: f64, width: f64) -> Result<Self> {
        if nx == 0 || ny == 0 {
            bail!("Flat plate needs at least one cell per direction (nx={}, ny={})", nx, ny);
        }
        if length <= 0. || width <= 0. {
            bail!("Flat plate dimensions must be positive (length={}, width={})", length, width);
        }

        let mut vertices = Vec::with_capacity((nx + 1) * (ny + 1));
        for j in 0..=ny {
            for i in 0..=nx {
                let x = length * i as f64 / nx as f64;
                let y = width * j as f64 / ny as f64;
                vertices.push(Point::new(x, y, 0.));
            }
        }

        let idx = |i: usize, j: usize| j * (nx + 1) + i;
        let mut faces = Vec::with_capacity(2 * nx * ny);
        for j in 0..ny {
            for i in 0..nx {
                let v00 = idx(i, j);
                let v10 = idx(i + 1, j);
                let v01 = idx(i, j + 1);
                let v11 = idx(i + 1, j + 1);
                faces.push(TriangleIndex(v00, v10, v11));
                faces.push(TriangleIndex(v00, v11, v01));
            }
        }

        Self::new(vertices, faces)
    }
}
