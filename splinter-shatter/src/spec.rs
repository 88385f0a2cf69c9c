use std::sync::Arc;

use crate::error::ConfigurationError;

use model::TriMesh;
use na::{Point3, Vector3};

/// How the UVs of generated inside triangles are scaled.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum UvMode {
    /// Mapped to a box the size of the original mesh.
    EntireMesh,
    /// Mapped to a box the size of the piece.
    #[default]
    Piece,
}

/// One fracture request. Built with the consuming `with_*` methods, then handed off whole.
#[derive(Debug, Clone)]
pub struct FractureSpec {
    mesh: Option<Arc<TriMesh>>,
    piece_count: u32,
    iteration_count: u32,
    center: Point3<f32>,
    radius: f32,
    scale: Vector3<f32>,
    uv_mode: UvMode,
    asynchronous: bool,
}

impl FractureSpec {
    /// `piece_count` pieces per pass over `iteration_count` passes, so up to
    /// `piece_count ^ iteration_count` pieces in total.
    pub fn new(piece_count: u32, iteration_count: u32) -> Self {
        Self {
            mesh: None,
            piece_count,
            iteration_count,
            center: Point3::origin(),
            radius: 0.,
            scale: Vector3::zeros(),
            uv_mode: UvMode::default(),
            asynchronous: false,
        }
    }

    /// Without a mesh, the requester's mesh filter supplies one at submit.
    pub fn with_mesh(mut self, mesh: Arc<TriMesh>) -> Self {
        self.mesh = Some(mesh);
        self
    }
    pub fn at(mut self, center: Point3<f32>) -> Self {
        self.center = center;
        self
    }
    /// Clamped into `[0, 1]`. 0 and 1 spread fractures evenly; anything between clusters them
    /// within that fraction of the mesh around the center.
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = if radius.is_nan() { 0. } else { radius.clamp(0., 1.) };
        self
    }
    /// Zero means "use the requester's local scale".
    pub fn with_scale(mut self, scale: Vector3<f32>) -> Self {
        self.scale = scale;
        self
    }
    pub fn with_uv_mode(mut self, uv_mode: UvMode) -> Self {
        self.uv_mode = uv_mode;
        self
    }
    pub fn asynchronous(mut self, asynchronous: bool) -> Self {
        self.asynchronous = asynchronous;
        self
    }

    pub fn mesh(&self) -> Option<&Arc<TriMesh>> {
        self.mesh.as_ref()
    }
    pub fn piece_count(&self) -> u32 {
        self.piece_count
    }
    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }
    pub fn center(&self) -> Point3<f32> {
        self.center
    }
    pub fn radius(&self) -> f32 {
        self.radius
    }
    pub fn scale(&self) -> Vector3<f32> {
        self.scale
    }
    pub fn uv_mode(&self) -> UvMode {
        self.uv_mode
    }
    pub fn is_asynchronous(&self) -> bool {
        self.asynchronous
    }
    pub fn is_clustered(&self) -> bool {
        self.radius > 0. && self.radius < 1.
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.piece_count < 1 {
            return Err(ConfigurationError::InvalidPieceCount(self.piece_count));
        }
        if self.iteration_count < 1 {
            return Err(ConfigurationError::InvalidIterationCount(self.iteration_count));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_is_clamped() {
        assert_eq!(FractureSpec::new(5, 1).with_radius(3.).radius(), 1.);
        assert_eq!(FractureSpec::new(5, 1).with_radius(-1.).radius(), 0.);
        assert!(FractureSpec::new(5, 1).with_radius(0.3).is_clustered());
        assert!(!FractureSpec::new(5, 1).with_radius(1.).is_clustered());
    }

    #[test]
    fn counts_must_be_positive() {
        assert_eq!(FractureSpec::new(0, 1).validate(), Err(ConfigurationError::InvalidPieceCount(0)));
        assert_eq!(FractureSpec::new(2, 0).validate(), Err(ConfigurationError::InvalidIterationCount(0)));
        assert_eq!(FractureSpec::new(2, 2).validate(), Ok(()));
    }
}
