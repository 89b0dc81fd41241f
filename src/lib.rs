//! meshlod-rs
//!
//! Half-edge based quadric mesh simplification for level-of-detail generation, plus a KD-tree used for
//! approximate nearest-cluster assignment of point sets.
//!
//! # Features
//!
//! * `trace`: emits extra per-pass statistics through `log::trace!`

#![allow(clippy::identity_op)]

pub mod cluster;
pub mod error;
pub mod halfedge;
pub mod kdtree;
pub mod parents;
pub mod quadric;
pub mod queue;
pub mod simplify;
pub mod transfer;
mod util;
pub mod weld;

use std::ops::{Add, Mul, Sub};

pub use crate::error::{Error, Result};

pub const INVALID_INDEX: u32 = u32::MAX;

/// Anything that can be used as a 3D point.
pub trait Position {
    fn pos(&self) -> [f32; 3];
}

impl Position for [f32; 3] {
    #[inline]
    fn pos(&self) -> [f32; 3] {
        *self
    }
}

/// An indexed triangle mesh with optional, independently indexed texture coordinates.
///
/// `tex_indices` is either empty or parallel to `indices`: corner `i` uses position `indices[i]` and texture
/// coordinate `tex_indices[i]`. Position and UV topology are allowed to diverge at seams.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    pub tex_coords: Vec<[f32; 2]>,
    pub tex_indices: Vec<u32>,
}

impl Mesh {
    pub fn new(positions: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            indices,
            tex_coords: Vec::new(),
            tex_indices: Vec::new(),
        }
    }

    /// Creates a mesh from any vertex type exposing a position.
    ///
    /// # Example
    ///
    /// ```
    /// use meshlod_rs::Mesh;
    ///
    /// let vertices = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    /// let mesh = Mesh::from_vertices(&vertices, &[0, 1, 2]);
    ///
    /// assert_eq!(mesh.triangle_count(), 1);
    /// ```
    pub fn from_vertices<V>(vertices: &[V], indices: &[u32]) -> Self
    where
        V: Position,
    {
        Self::new(vertices.iter().map(Position::pos).collect(), indices.to_vec())
    }

    pub fn with_tex_coords(mut self, tex_coords: Vec<[f32; 2]>, tex_indices: Vec<u32>) -> Self {
        self.tex_coords = tex_coords;
        self.tex_indices = tex_indices;
        self
    }

    pub fn has_tex_coords(&self) -> bool {
        !self.tex_indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Checks that the index buffers describe whole triangles and only reference existing buffer slots.
    pub fn validate(&self) -> Result<()> {
        if self.indices.len() % 3 != 0 {
            return Err(Error::IndexCountNotTriangles { len: self.indices.len() });
        }

        if let Some((at, index)) = self.indices.iter().enumerate().find(|(_, i)| **i as usize >= self.positions.len()) {
            return Err(Error::VertexIndexOutOfRange {
                at,
                index: *index,
                count: self.positions.len(),
            });
        }

        if self.has_tex_coords() {
            if self.tex_indices.len() != self.indices.len() {
                return Err(Error::TexIndexCountMismatch {
                    len: self.tex_indices.len(),
                    expected: self.indices.len(),
                });
            }

            if let Some((at, index)) = self
                .tex_indices
                .iter()
                .enumerate()
                .find(|(_, i)| **i as usize >= self.tex_coords.len())
            {
                return Err(Error::TexIndexOutOfRange {
                    at,
                    index: *index,
                    count: self.tex_coords.len(),
                });
            }
        }

        Ok(())
    }
}

#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub(crate) struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub fn new(x: f32, y: f32, z: f32) -> Vector3 {
        Self { x, y, z }
    }

    pub fn dot(&self, other: &Vector3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Vector3) -> Vector3 {
        Vector3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length_squared(&self) -> f32 {
        self.dot(self)
    }

    pub fn length(&self) -> f32 {
        self.length_squared().sqrt()
    }

    pub fn normalize(&mut self) -> f32 {
        let length = self.length();

        if length > 0.0 {
            self.x /= length;
            self.y /= length;
            self.z /= length;
        }

        length
    }

    pub fn distance_squared(&self, other: &Vector3) -> f32 {
        (*self - *other).length_squared()
    }
}

impl From<[f32; 3]> for Vector3 {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Vector3> for [f32; 3] {
    fn from(v: Vector3) -> Self {
        [v.x, v.y, v.z]
    }
}

impl Add for Vector3 {
    type Output = Vector3;

    fn add(self, other: Vector3) -> Vector3 {
        Vector3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Vector3 {
    type Output = Vector3;

    fn sub(self, other: Vector3) -> Vector3 {
        Vector3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Mul<f32> for Vector3 {
    type Output = Vector3;

    fn mul(self, s: f32) -> Vector3 {
        Vector3::new(self.x * s, self.y * s, self.z * s)
    }
}

impl Position for Vector3 {
    fn pos(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_validate() {
        let positions = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];

        assert_eq!(Mesh::new(positions.clone(), vec![0, 1, 2]).validate(), Ok(()));

        assert_eq!(
            Mesh::new(positions.clone(), vec![0, 1]).validate(),
            Err(Error::IndexCountNotTriangles { len: 2 })
        );

        assert_eq!(
            Mesh::new(positions.clone(), vec![0, 1, 3]).validate(),
            Err(Error::VertexIndexOutOfRange { at: 2, index: 3, count: 3 })
        );

        let uv = vec![[0.0, 0.0], [1.0, 0.0]];

        assert_eq!(
            Mesh::new(positions.clone(), vec![0, 1, 2])
                .with_tex_coords(uv.clone(), vec![0, 1])
                .validate(),
            Err(Error::TexIndexCountMismatch { len: 2, expected: 3 })
        );

        assert_eq!(
            Mesh::new(positions, vec![0, 1, 2])
                .with_tex_coords(uv, vec![0, 1, 2])
                .validate(),
            Err(Error::TexIndexOutOfRange { at: 2, index: 2, count: 2 })
        );
    }

    #[test]
    fn test_vector_ops() {
        let a = Vector3::new(1.0, 0.0, 0.0);
        let b = Vector3::new(0.0, 1.0, 0.0);

        assert_eq!(a.cross(&b), Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(a.dot(&b), 0.0);
        assert_eq!((a - b).length_squared(), 2.0);

        let mut c = Vector3::new(3.0, 4.0, 0.0);
        assert_eq!(c.normalize(), 5.0);
        assert_eq!(c, Vector3::new(0.6, 0.8, 0.0));
    }
}
