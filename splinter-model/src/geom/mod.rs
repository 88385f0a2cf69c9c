pub mod bounds;
pub mod tri;

use na::Matrix3xX;
use thiserror::Error;

/// Vertex positions, one column per vertex.
pub type VMat = Matrix3xX<f32>;
/// Triangle indices, one column per triangle.
pub type FMat = Matrix3xX<u32>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeomError {
    #[error("submesh {slot} references vertex {index} but the mesh only has {verts} vertices")]
    IndexOutOfRange { slot: usize, index: u32, verts: usize },
    #[error("mesh has {verts} vertices but {uvs} uvs")]
    UvCountMismatch { verts: usize, uvs: usize },
}

/// Surface description shared between renderers. Identity is by `Arc` pointer where it matters.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub diffuse: [f32; 4],
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            diffuse: [1., 1., 1., 1.],
        }
    }

    pub fn with_diffuse(mut self, diffuse: [f32; 4]) -> Self {
        self.diffuse = diffuse;
        self
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new("Default-Material")
    }
}
