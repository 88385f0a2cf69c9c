use super::{bounds::Aabb, FMat, GeomError, VMat};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use na::{Point3, Vector3};

/// Triangle mesh split into submeshes, one per material slot.
#[derive(Clone, Debug, PartialEq)]
pub struct TriMesh {
    vv: VMat,
    uvs: Vec<[f32; 2]>,
    submeshes: Vec<FMat>,
}

impl TriMesh {
    /// Builds a mesh, checking every index against the vertex count. An empty `uvs` fills in zeroes.
    pub fn new(vv: VMat, submeshes: Vec<FMat>, uvs: Vec<[f32; 2]>) -> Result<TriMesh, GeomError> {
        let verts = vv.ncols();
        let uvs = if uvs.is_empty() {
            vec![[0., 0.]; verts]
        } else if uvs.len() != verts {
            return Err(GeomError::UvCountMismatch { verts, uvs: uvs.len() });
        } else {
            uvs
        };
        for (slot, ff) in submeshes.iter().enumerate() {
            if let Some(&index) = ff.iter().find(|&&i| i as usize >= verts) {
                return Err(GeomError::IndexOutOfRange { slot, index, verts });
            }
        }
        Ok(TriMesh { vv, uvs, submeshes })
    }

    pub fn from_parts(
        positions: &[Point3<f32>],
        uvs: Vec<[f32; 2]>,
        submeshes: Vec<Vec<[u32; 3]>>,
    ) -> Result<TriMesh, GeomError> {
        let vv = VMat::from_iterator(positions.len(), positions.iter().flat_map(|p| [p.x, p.y, p.z]));
        let submeshes = submeshes
            .iter()
            .map(|tris| FMat::from_iterator(tris.len(), tris.iter().flat_map(|t| *t)))
            .collect();
        Self::new(vv, submeshes, uvs)
    }

    pub fn empty() -> TriMesh {
        TriMesh {
            vv: VMat::zeros(0),
            uvs: vec![],
            submeshes: vec![],
        }
    }

    pub fn verts(&self) -> &VMat {
        &self.vv
    }

    pub fn vertex_count(&self) -> usize {
        self.vv.ncols()
    }

    pub fn position(&self, i: usize) -> Point3<f32> {
        let c = self.vv.column(i);
        Point3::new(c[0], c[1], c[2])
    }

    pub fn positions(&self) -> impl Iterator<Item = Point3<f32>> + '_ {
        self.vv.column_iter().map(|c| Point3::new(c[0], c[1], c[2]))
    }

    pub fn uvs(&self) -> &[[f32; 2]] {
        &self.uvs
    }

    pub fn submesh_count(&self) -> usize {
        self.submeshes.len()
    }

    pub fn submesh(&self, slot: usize) -> Option<&FMat> {
        self.submeshes.get(slot)
    }

    pub fn triangles(&self, slot: usize) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.submeshes
            .get(slot)
            .into_iter()
            .flat_map(|ff| ff.column_iter().map(|c| [c[0], c[1], c[2]]))
    }

    pub fn triangle_count(&self) -> usize {
        self.submeshes.iter().map(|ff| ff.ncols()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.triangle_count() == 0
    }

    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.positions())
    }

    /// Enclosed volume from the divergence theorem. Only meaningful for closed meshes.
    pub fn volume(&self) -> f32 {
        let signed: f32 = (0..self.submesh_count())
            .flat_map(|slot| self.triangles(slot))
            .map(|[a, b, c]| {
                let (a, b, c) = (
                    self.position(a as usize).coords,
                    self.position(b as usize).coords,
                    self.position(c as usize).coords,
                );
                a.dot(&b.cross(&c)) / 6.
            })
            .sum();
        signed.abs()
    }

    /// Copy with every position multiplied per axis by `s`.
    pub fn scaled(&self, s: &Vector3<f32>) -> TriMesh {
        let n = self.vertex_count();
        TriMesh {
            vv: VMat::from_iterator(
                n,
                self.positions().flat_map(|p| {
                    let q = p.coords.component_mul(s);
                    [q.x, q.y, q.z]
                }),
            ),
            uvs: self.uvs.clone(),
            submeshes: self.submeshes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri() -> Vec<Point3<f32>> {
        vec![Point3::new(0., 0., 0.), Point3::new(1., 0., 0.), Point3::new(0., 1., 0.)]
    }

    #[test]
    fn rejects_out_of_range_indices() {
        let err = TriMesh::from_parts(&tri(), vec![], vec![vec![[0, 1, 3]]]).unwrap_err();
        assert_eq!(err, GeomError::IndexOutOfRange { slot: 0, index: 3, verts: 3 });
    }

    #[test]
    fn rejects_mismatched_uvs() {
        let err = TriMesh::from_parts(&tri(), vec![[0., 0.]], vec![vec![[0, 1, 2]]]).unwrap_err();
        assert_eq!(err, GeomError::UvCountMismatch { verts: 3, uvs: 1 });
    }

    #[test]
    fn scaling_scales_volume() {
        let cube = crate::unit_cube();
        let scaled = cube.scaled(&Vector3::new(2., 3., 0.5));
        assert!((scaled.volume() - 3.).abs() < 1e-4);
        assert_eq!(scaled.bounds().map(|b| b.size()), Some(Vector3::new(2., 3., 0.5)));
    }
}
