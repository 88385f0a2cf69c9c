pub mod geom;
pub mod scene;

pub use geom::{bounds::Aabb, tri::TriMesh, GeomError, Material};
pub use scene::{Joint, JointKind, MeshCollider, MeshFilter, MeshRenderer, Node, NodeId, RigidBody, Scene, SceneError};

use na::{Matrix4, Point3, UnitQuaternion, Vector3};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AffineTransform {
    pub pos: Vector3<f32>,
    pub ori: UnitQuaternion<f32>,
    pub scaling: Vector3<f32>,
}

impl AffineTransform {
    pub fn identity() -> Self {
        Self {
            pos: Vector3::zeros(),
            ori: UnitQuaternion::identity(),
            scaling: Vector3::new(1., 1., 1.),
        }
    }

    pub fn from_pos(pos: Vector3<f32>) -> Self {
        Self {
            pos,
            ..Self::identity()
        }
    }

    /// Scale, then rotate, then translate.
    pub fn mat(&self) -> Matrix4<f32> {
        let mut t_mat = self.ori.to_homogeneous() * Matrix4::new_nonuniform_scaling(&self.scaling);
        t_mat.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.pos);
        t_mat
    }

    fn inv_scaling(&self) -> Vector3<f32> {
        self.scaling.map(|s| if s.abs() > f32::EPSILON { 1. / s } else { 0. })
    }

    pub fn transform_point(&self, p: &Point3<f32>) -> Point3<f32> {
        Point3::from(self.ori * p.coords.component_mul(&self.scaling) + self.pos)
    }

    pub fn inverse_transform_point(&self, p: &Point3<f32>) -> Point3<f32> {
        let unrotated = self.ori.inverse() * (p.coords - self.pos);
        Point3::from(unrotated.component_mul(&self.inv_scaling()))
    }

    pub fn transform_vector(&self, v: &Vector3<f32>) -> Vector3<f32> {
        self.ori * v.component_mul(&self.scaling)
    }

    pub fn inverse_transform_vector(&self, v: &Vector3<f32>) -> Vector3<f32> {
        (self.ori.inverse() * v).component_mul(&self.inv_scaling())
    }

    /// Composes `self` (the parent) with a transform expressed in its local space.
    /// Shear from non-uniform parent scaling is dropped.
    pub fn then(&self, local: &AffineTransform) -> AffineTransform {
        AffineTransform {
            pos: self.transform_point(&Point3::from(local.pos)).coords,
            ori: self.ori * local.ori,
            scaling: self.scaling.component_mul(&local.scaling),
        }
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Generates the mesh of a unit cube, centered on the origin, with outward facing triangles in a
/// single submesh.
pub fn unit_cube() -> TriMesh {
    TriMesh::new(
        geom::VMat::from_iterator(
            8,
            [
                -0.5, -0.5, -0.5, // left bottom rear
                -0.5, -0.5,  0.5, // left bottom front
                -0.5,  0.5, -0.5, // left top rear
                -0.5,  0.5,  0.5, // left top front
                 0.5, -0.5, -0.5, // right bottom rear
                 0.5, -0.5,  0.5, // right bottom front
                 0.5,  0.5, -0.5, // right top rear
                 0.5,  0.5,  0.5, // right top front
            ]
            .into_iter(),
        ),
        vec![geom::FMat::from_iterator(
            12,
            [
                0, 1, 3, 0, 3, 2, // left
                4, 6, 7, 4, 7, 5, // right
                0, 4, 5, 0, 5, 1, // bottom
                2, 3, 7, 2, 7, 6, // top
                0, 2, 6, 0, 6, 4, // rear
                1, 5, 7, 1, 7, 3, // front
            ]
            .into_iter(),
        )],
        vec![
            [0., 0.],
            [0., 1.],
            [1., 0.],
            [1., 1.],
            [1., 0.],
            [1., 1.],
            [0., 0.],
            [0., 1.],
        ],
    )
    .unwrap_or_else(|_| TriMesh::empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_round_trips_points() {
        let t = AffineTransform {
            pos: Vector3::new(1., 2., 3.),
            ori: UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.7),
            scaling: Vector3::new(2., 1., 0.5),
        };
        let p = Point3::new(0.3, -1.2, 4.);
        let back = t.inverse_transform_point(&t.transform_point(&p));
        assert!((back - p).norm() < 1e-5, "{:?} != {:?}", back, p);
        let m = t.mat();
        let via_mat = m.transform_point(&p);
        assert!((via_mat - t.transform_point(&p)).norm() < 1e-5);
    }

    #[test]
    fn unit_cube_is_closed_and_unit_volume() {
        let cube = unit_cube();
        assert_eq!(cube.vertex_count(), 8);
        assert_eq!(cube.triangle_count(), 12);
        assert!((cube.volume() - 1.).abs() < 1e-5);
    }
}
