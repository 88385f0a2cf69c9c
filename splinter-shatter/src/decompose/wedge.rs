//! # Wedge decomposition
//!
//! Splits a mesh by slicing its triangles into angular wedges around the fracture center,
//! then closes every piece with fans over the cut edge loops.

use std::collections::HashMap;

use super::{DecompositionResult, PieceMesh};
use crate::spec::{FractureSpec, UvMode};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use model::{Aabb, TriMesh};
use na::{Point3, Vector3};
use th::KillSignal;

#[derive(Debug, Copy, Clone)]
struct Tri {
    slot: usize,
    idx: [u32; 3],
}

struct Source {
    positions: Vec<Point3<f32>>,
    uvs: Vec<[f32; 2]>,
    tris: Vec<Tri>,
    slot_count: usize,
    bounds: Aabb,
}
impl Source {
    fn centroid(&self, t: usize) -> Point3<f32> {
        let [a, b, c] = self.tris[t].idx;
        let sum = self.positions[a as usize].coords + self.positions[b as usize].coords + self.positions[c as usize].coords;
        Point3::from(sum / 3.)
    }

    fn group_bounds(&self, group: &[usize]) -> Aabb {
        Aabb::from_points(
            group
                .iter()
                .flat_map(|t| self.tris[*t].idx.iter())
                .map(|i| self.positions[*i as usize]),
        )
        .unwrap_or_else(Aabb::zero)
    }
}

fn stopped(signal: Option<&KillSignal>) -> bool {
    signal.map(KillSignal::should_stop).unwrap_or(false)
}

/// Runs the whole decomposition. None only if `signal` asked us to stop.
pub fn decompose(spec: &FractureSpec, mesh: &TriMesh, signal: Option<&KillSignal>) -> Option<DecompositionResult> {
    let scale = if spec.scale() == Vector3::zeros() {
        Vector3::repeat(1.)
    } else {
        spec.scale()
    };
    let mesh = mesh.scaled(&scale);
    let center = Point3::from(spec.center().coords.component_mul(&scale));

    let mut tris = vec![];
    for slot in 0..mesh.submesh_count() {
        tris.extend(mesh.triangles(slot).map(|idx| Tri { slot, idx }));
    }
    let src = Source {
        positions: mesh.positions().collect(),
        uvs: mesh.uvs().to_vec(),
        tris,
        slot_count: mesh.submesh_count(),
        bounds: mesh.bounds().unwrap_or_else(Aabb::zero),
    };
    if src.tris.is_empty() {
        debug!("Nothing to decompose, mesh has no triangles.");
        return Some(DecompositionResult {
            pieces: vec![],
            bounds: src.bounds,
        });
    }

    let mut groups: Vec<Vec<usize>> = vec![(0..src.tris.len()).collect()];
    for pass in 0..spec.iteration_count() {
        let mut next = Vec::with_capacity(groups.len() * spec.piece_count() as usize);
        for group in groups.iter() {
            if stopped(signal) {
                debug!("Decomposition stopped during pass {}.", pass);
                return None;
            }
            next.extend(split(&src, spec, &center, group, pass as usize));
        }
        groups = next;
    }

    let mut owner = vec![0; src.tris.len()];
    let mut edges = HashMap::with_capacity(src.tris.len() * 3);
    for (gi, group) in groups.iter().enumerate() {
        for &t in group.iter() {
            owner[t] = gi;
            let [a, b, c] = src.tris[t].idx;
            for e in [(a, b), (b, c), (c, a)] {
                edges.insert(e, t);
            }
        }
    }

    let mut pieces = Vec::with_capacity(groups.len());
    for (gi, group) in groups.iter().enumerate() {
        if stopped(signal) {
            debug!("Decomposition stopped after {} pieces.", pieces.len());
            return None;
        }
        let cut = group
            .iter()
            .flat_map(|t| {
                let [a, b, c] = src.tris[*t].idx;
                [(a, b), (b, c), (c, a)]
            })
            .filter(|(a, b)| edges.get(&(*b, *a)).map(|t| owner[*t] != gi).unwrap_or(false))
            .collect::<Vec<_>>();
        match build_piece(&src, spec.uv_mode(), group, &cut) {
            Some(p) => pieces.push(p),
            None => error!("Dropping piece {} with invalid geometry.", gi),
        }
    }
    trace!("Decomposed {} triangles into {} pieces.", src.tris.len(), pieces.len());
    Some(DecompositionResult {
        pieces,
        bounds: src.bounds,
    })
}

fn split(src: &Source, spec: &FractureSpec, center: &Point3<f32>, group: &[usize], pass: usize) -> Vec<Vec<usize>> {
    let k = spec.piece_count() as usize;
    if k <= 1 || group.len() <= 1 {
        return vec![group.to_vec()];
    }
    let size = src.group_bounds(group).size();
    let thinnest = (0..3).min_by(|a, b| size[*a].total_cmp(&size[*b])).unwrap_or(0);
    let axis = (thinnest + pass) % 3;

    if spec.is_clustered() {
        let reach = spec.radius() * src.bounds.extents().norm();
        let (inside, outside): (Vec<usize>, Vec<usize>) = group
            .iter()
            .partition(|t| (src.centroid(**t).coords - center.coords).norm() <= reach);
        if !inside.is_empty() && !outside.is_empty() {
            let mut out = wedges(src, center, axis, inside, k - 1);
            out.push(outside);
            return out;
        }
    }
    wedges(src, center, axis, group.to_vec(), k)
}

/// Orders `ids` by angle around `axis` through `center`, then cuts them into `k` contiguous runs.
fn wedges(src: &Source, center: &Point3<f32>, axis: usize, mut ids: Vec<usize>, k: usize) -> Vec<Vec<usize>> {
    let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
    let mut keyed = ids
        .drain(..)
        .map(|t| {
            let d = src.centroid(t).coords - center.coords;
            (d[v].atan2(d[u]), d.norm(), t)
        })
        .collect::<Vec<_>>();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)).then(a.2.cmp(&b.2)));

    let k = k.clamp(1, keyed.len().max(1));
    let (base, extra) = (keyed.len() / k, keyed.len() % k);
    let mut out = Vec::with_capacity(k);
    let mut it = keyed.into_iter().map(|(_, _, t)| t);
    for i in 0..k {
        let n = base + usize::from(i < extra);
        out.push(it.by_ref().take(n).collect());
    }
    out
}

fn build_piece(src: &Source, uv_mode: UvMode, group: &[usize], cut: &[(u32, u32)]) -> Option<PieceMesh> {
    let bounds = src.group_bounds(group);
    let offset = bounds.center().coords;

    let mut positions = vec![];
    let mut uvs = vec![];
    let mut remap = vec![u32::MAX; src.positions.len()];
    let mut submeshes = vec![];
    let mut empty_slots = vec![true; src.slot_count];

    for (slot, empty) in empty_slots.iter_mut().enumerate() {
        let mut tris = vec![];
        for t in group.iter().map(|t| &src.tris[*t]).filter(|t| t.slot == slot) {
            let mut out = [0; 3];
            for (o, i) in out.iter_mut().zip(t.idx.iter()) {
                let i = *i as usize;
                if remap[i] == u32::MAX {
                    remap[i] = positions.len() as u32;
                    positions.push(src.positions[i] - offset);
                    uvs.push(src.uvs.get(i).copied().unwrap_or([0., 0.]));
                }
                *o = remap[i];
            }
            tris.push(out);
        }
        if !tris.is_empty() {
            *empty = false;
            submeshes.push(tris);
        }
    }

    let uv_box = match uv_mode {
        UvMode::EntireMesh => src.bounds,
        UvMode::Piece => bounds,
    };
    let mut inside = vec![];
    for ring in cut_loops(cut) {
        let pts = ring.iter().map(|i| src.positions[*i as usize]).collect::<Vec<_>>();
        let c = Point3::from(pts.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / pts.len() as f32);
        let normal = pts
            .iter()
            .zip(pts.iter().cycle().skip(1))
            .fold(Vector3::zeros(), |acc, (a, b)| acc + (a.coords - c.coords).cross(&(b.coords - c.coords)));
        let dominant = (0..3).max_by(|a, b| normal[*a].abs().total_cmp(&normal[*b].abs())).unwrap_or(2);
        let (u, v) = ((dominant + 1) % 3, (dominant + 2) % 3);
        let planar = |p: &Point3<f32>| {
            let size = uv_box.size();
            let along = |ax: usize| {
                if size[ax] > f32::EPSILON {
                    (p[ax] - uv_box.min[ax]) / size[ax]
                } else {
                    0.
                }
            };
            [along(u), along(v)]
        };

        let hub = positions.len() as u32;
        positions.push(c - offset);
        uvs.push(planar(&c));
        for p in pts.iter() {
            positions.push(*p - offset);
            uvs.push(planar(p));
        }
        let n = pts.len() as u32;
        for i in 0..n {
            inside.push([hub, hub + 1 + i, hub + 1 + (i + 1) % n]);
        }
    }
    submeshes.push(inside);

    match TriMesh::from_parts(&positions, uvs, submeshes) {
        Ok(mesh) => Some(PieceMesh {
            mesh,
            offset,
            empty_slots,
        }),
        Err(e) => {
            error!("Failed to build piece mesh: {}", e);
            None
        }
    }
}

/// Chains the reversed cut edges into closed loops. Every vertex has as many reversed edges
/// leaving as arriving, so each walk ends where it started unless the mesh is not manifold.
fn cut_loops(cut: &[(u32, u32)]) -> Vec<Vec<u32>> {
    let mut outgoing: HashMap<u32, Vec<u32>> = HashMap::new();
    for (a, b) in cut.iter() {
        outgoing.entry(*b).or_default().push(*a);
    }
    let mut starts = outgoing.keys().copied().collect::<Vec<_>>();
    starts.sort_unstable();

    let mut loops = vec![];
    for s in starts {
        while let Some(first) = outgoing.get_mut(&s).and_then(Vec::pop) {
            let mut ring = vec![s];
            let mut cur = first;
            while cur != s && ring.len() <= cut.len() {
                ring.push(cur);
                match outgoing.get_mut(&cur).and_then(Vec::pop) {
                    Some(n) => cur = n,
                    None => break,
                }
            }
            if cur == s && ring.len() >= 3 {
                loops.push(ring);
            } else {
                trace!("Dropping open cut chain of {} vertices.", ring.len());
            }
        }
    }
    loops
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total_volume(res: &DecompositionResult) -> f32 {
        res.pieces.iter().map(|p| p.mesh.volume()).sum()
    }

    #[test]
    fn piece_count_multiplies_per_iteration() {
        let cube = model::unit_cube();
        let res = decompose(&FractureSpec::new(2, 2), &cube, None).unwrap();
        assert_eq!(res.pieces.len(), 4);
        let res = decompose(&FractureSpec::new(5, 1), &cube, None).unwrap();
        assert_eq!(res.pieces.len(), 5);
    }

    #[test]
    fn more_pieces_than_triangles() {
        let cube = model::unit_cube();
        let res = decompose(&FractureSpec::new(20, 1), &cube, None).unwrap();
        assert_eq!(res.pieces.len(), 12);
        for p in res.pieces.iter() {
            assert_eq!(p.mesh.submesh_count(), 2);
        }
    }

    #[test]
    fn caps_close_halves() {
        let cube = model::unit_cube();
        let res = decompose(&FractureSpec::new(2, 1), &cube, None).unwrap();
        assert_eq!(res.pieces.len(), 2);
        for p in res.pieces.iter() {
            assert!(p.mesh.submesh(1).map(|s| s.ncols() > 0).unwrap_or(false));
            assert!(p.mesh.volume() > 0.);
        }
        assert!((total_volume(&res) - 1.).abs() < 1e-4);
    }

    #[test]
    fn scale_is_baked() {
        let cube = model::unit_cube();
        let spec = FractureSpec::new(1, 1).with_scale(Vector3::new(2., 1., 1.));
        let res = decompose(&spec, &cube, None).unwrap();
        assert_eq!(res.pieces.len(), 1);
        assert!((res.bounds.size().x - 2.).abs() < 1e-6);
        assert!((total_volume(&res) - 2.).abs() < 1e-4);
    }

    #[test]
    fn clustered_keeps_far_triangles_together() {
        let cube = model::unit_cube();
        // Only the three faces meeting at the corner are within reach.
        let spec = FractureSpec::new(3, 1).at(Point3::new(0.5, 0.5, 0.5)).with_radius(0.9);
        let res = decompose(&spec, &cube, None).unwrap();
        let mut sizes = res
            .pieces
            .iter()
            .map(|p| p.mesh.submesh(0).map(|s| s.ncols()).unwrap_or(0))
            .collect::<Vec<_>>();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![3, 3, 6]);
    }

    #[test]
    fn empty_slots_are_reported() {
        let a = Point3::new(0., 0., 0.);
        let b = Point3::new(1., 0., 0.);
        let c = Point3::new(0., 1., 0.);
        let d = Point3::new(5., 5., 0.);
        let e = Point3::new(6., 5., 0.);
        let f = Point3::new(5., 6., 0.);
        let mesh = TriMesh::from_parts(&[a, b, c, d, e, f], vec![], vec![vec![[0, 1, 2]], vec![[3, 4, 5]]]).unwrap();
        let res = decompose(&FractureSpec::new(2, 1).at(Point3::new(3., 3., 0.)), &mesh, None).unwrap();
        assert_eq!(res.pieces.len(), 2);
        for p in res.pieces.iter() {
            assert_eq!(p.empty_triangle_count(), 1);
            assert_eq!(p.mesh.submesh_count(), 2);
        }
    }
}
