//! Vertex interpolation weights and face adjacency of a triangulated mesh.
//!
//! Face-centered quantities are moved to vertices with angle-weighted
//! averages: a face contributes to each of its corners proportionally to
//! the interior angle at that corner.

use std::ops::{Add, Mul};

use anyhow::{Result, bail};
use log::debug;

use crate::Mesh;
use crate::geom::triangles::corner_angle;

/// Per-vertex list of `(face, weight)` pairs.
///
/// The weights of a vertex with at least one incident face sum to 1.
#[derive(Debug, Clone, Default)]
pub struct VertexInterpolation {
    weights: Vec<Vec<(usize, f64)>>,
}

impl VertexInterpolation {
    pub fn build(mesh: &Mesh) -> Result<Self> {
        let mut weights: Vec<Vec<(usize, f64)>> = vec![Vec::new(); mesh.vertex_count()];

        for (fi, face) in mesh.faces.iter().enumerate() {
            for vi in face.to_array() {
                let Some([v0, v1, v2]) = face.rotated_to(vi) else {
                    continue;
                };
                let angle = corner_angle(
                    mesh.vertices[v0],
                    mesh.vertices[v1],
                    mesh.vertices[v2],
                );
                weights[vi].push((fi, angle));
            }
        }

        for (vi, list) in weights.iter_mut().enumerate() {
            if list.is_empty() {
                continue;
            }
            let sum: f64 = list.iter().map(|(_, a)| a).sum();
            if sum <= 0. {
                bail!("Vertex {} has zero total corner angle", vi);
            }
            for (_, w) in list.iter_mut() {
                *w /= sum;
            }
        }

        debug!(
            "Vertex interpolation: {} vertices, {} face-vertex pairs",
            weights.len(),
            weights.iter().map(Vec::len).sum::<usize>()
        );

        Ok(Self { weights })
    }

    pub fn vertex_count(&self) -> usize {
        self.weights.len()
    }

    /// Faces incident to `vi` with their weights, in ascending face order.
    pub fn weights(&self, vi: usize) -> &[(usize, f64)] {
        &self.weights[vi]
    }

    /// Weighted sum of face values at vertex `vi`.
    ///
    /// `face_value` is queried for each incident face. A vertex without
    /// incident faces yields `T::default()`.
    pub fn interpolate<T, F>(&self, vi: usize, face_value: F) -> T
    where
        T: Copy + Default + Add<Output = T> + Mul<f64, Output = T>,
        F: Fn(usize) -> T,
    {
        self.weights[vi]
            .iter()
            .fold(T::default(), |acc, &(fi, w)| acc + face_value(fi) * w)
    }

    /// Interpolates a whole face field to all vertices.
    pub fn vertex_values<T>(&self, face_values: &[T]) -> Vec<T>
    where
        T: Copy + Default + Add<Output = T> + Mul<f64, Output = T>,
    {
        (0..self.vertex_count())
            .map(|vi| self.interpolate(vi, |fi| face_values[fi]))
            .collect()
    }
}

/// Per-face list of faces sharing at least one vertex, excluding the face itself.
#[derive(Debug, Clone, Default)]
pub struct FaceAdjacency {
    neighbors: Vec<Vec<usize>>,
}

impl FaceAdjacency {
    pub fn build(mesh: &Mesh, interpolation: &VertexInterpolation) -> Self {
        let neighbors: Vec<Vec<usize>> = mesh
            .faces
            .iter()
            .enumerate()
            .map(|(fi, face)| {
                let mut list: Vec<usize> = Vec::new();
                for vi in face.to_array() {
                    for &(other, _) in interpolation.weights(vi) {
                        if other != fi && !list.contains(&other) {
                            list.push(other);
                        }
                    }
                }
                list
            })
            .collect();

        debug!(
            "Face adjacency: {} faces, max {} neighbors",
            neighbors.len(),
            neighbors.iter().map(Vec::len).max().unwrap_or(0)
        );

        Self { neighbors }
    }

    pub fn face_count(&self) -> usize {
        self.neighbors.len()
    }

    pub fn neighbors(&self, fi: usize) -> &[usize] {
        &self.neighbors[fi]
    }
}
