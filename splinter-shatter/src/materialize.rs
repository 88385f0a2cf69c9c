//! # Materialization
//!
//! Turns a finished decomposition into live nodes under a new root, then tells everyone.

use std::{iter, sync::Arc};

use crate::{
    decompose::{DecompositionResult, PieceMesh},
    error::{ConfigurationError, ShatterError},
    geometry::FractureGeometry,
    notify::FractureEvent,
    operation::FractureOperation,
    FractureCtx,
};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use model::{AffineTransform, Aabb, Material, MeshFilter, NodeId, Scene};

/// The source's density, found by setting a density of 1 and reading back the mass.
/// The original mass is restored. None if there is no body or no volume.
pub fn probe_density(scene: &mut Scene, id: NodeId) -> Option<f32> {
    let mass = scene.get(id)?.body.as_ref()?.mass;
    if !scene.set_density(id, 1.) {
        return None;
    }
    let body = scene.get_mut(id)?.body.as_mut()?;
    let volume = body.mass;
    body.mass = mass;
    if volume <= f32::EPSILON {
        warn!("Cannot transfer mass from {:?}, it has no volume.", id);
        None
    } else {
        Some(mass / volume)
    }
}

/// Drops the materials of slots the piece has no triangles in, then appends `inside`.
pub fn remap_materials(shared: &[Arc<Material>], empty_slots: &[bool], inside: &Arc<Material>) -> Vec<Arc<Material>> {
    shared
        .iter()
        .enumerate()
        .filter(|(i, _)| !empty_slots.get(*i).copied().unwrap_or(false))
        .map(|(_, m)| m.clone())
        .chain(iter::once(inside.clone()))
        .collect()
}

/// Builds the piece hierarchy for `op` and delivers the fracture notifications.
///
/// # Remarks
///
/// Order of delivery: the requester's geometry, its listeners, its notify list, then
/// (after the requester is hidden, if asked) every piece.
pub(crate) fn materialize(
    ctx: &mut FractureCtx<'_>,
    op: &FractureOperation,
    result: DecompositionResult,
) -> Result<(NodeId, Aabb), ShatterError> {
    let requester = op.requester();
    let geometry = ctx
        .geometries
        .get(requester)
        .cloned()
        .ok_or(ConfigurationError::NotFracturable(requester))?;
    let template = geometry
        .piece_template
        .ok_or(ConfigurationError::MissingTemplate(requester))?;

    let source = ctx.scene.node(requester)?;
    let name = source.name.clone();
    let materials = source.renderer.as_ref().map(|r| r.materials.clone()).unwrap_or_default();
    let has_body = source.body.is_some();
    let world = ctx.scene.world_transform(requester).unwrap_or_else(AffineTransform::identity);
    let density = if op.transfers_mass() && has_body {
        probe_density(ctx.scene, requester)
    } else {
        None
    };

    // The template may have gone away while an asynchronous fracture was running.
    ctx.scene.node(template)?;

    let root = ctx.scene.spawn(format!("{} - Fracture Root", name));
    let parent = op.pieces_parent().or_else(|| ctx.scene.parent(requester));
    let pieces = match build_pieces(ctx, &geometry, template, root, parent, &world, &materials, density, result.pieces) {
        Ok(p) => p,
        Err(e) => {
            ctx.scene.despawn(root);
            ctx.geometries.purge(ctx.scene);
            return Err(e);
        }
    };
    debug!("Materialized {} pieces of {:?} under {:?}.", pieces.len(), requester, root);

    let event = FractureEvent {
        original: requester,
        pieces_root: Some(root),
        bounds: result.bounds,
    };
    if let Some(g) = ctx.geometries.get_mut(requester) {
        g.on_fracture(ctx.scene, requester, &event);
    }
    ctx.listeners.dispatch(ctx.scene, requester, &event);
    for n in geometry.notify.iter() {
        ctx.listeners.dispatch(ctx.scene, *n, &event);
    }
    if op.hides_source() {
        ctx.scene.set_active(requester, false);
    }
    for p in pieces.iter() {
        if let Some(g) = ctx.geometries.get_mut(*p) {
            g.on_fracture(ctx.scene, *p, &event);
        }
        ctx.listeners.dispatch(ctx.scene, *p, &event);
    }
    Ok((root, result.bounds))
}

#[allow(clippy::too_many_arguments)]
fn build_pieces(
    ctx: &mut FractureCtx<'_>,
    geometry: &FractureGeometry,
    template: NodeId,
    root: NodeId,
    parent: Option<NodeId>,
    world: &AffineTransform,
    materials: &[Arc<Material>],
    density: Option<f32>,
    meshes: Vec<PieceMesh>,
) -> Result<Vec<NodeId>, ShatterError> {
    ctx.scene.set_parent(root, parent)?;
    ctx.scene.set_world_position(root, &world.pos.into())?;
    ctx.scene.set_world_rotation(root, &world.ori)?;

    let template_geometry = ctx.geometries.get(template).cloned();
    let mut pieces = Vec::with_capacity(meshes.len());
    for (i, piece) in meshes.into_iter().enumerate() {
        let id = ctx.scene.instantiate(template)?;
        ctx.scene.set_parent(id, Some(root))?;
        let mesh = Arc::new(piece.mesh);
        {
            let n = ctx.scene.node_mut(id)?;
            n.name = format!("Fracture Object {}", i);
            n.local = AffineTransform::from_pos(piece.offset);
            match n.mesh_filter.as_mut() {
                Some(mf) => mf.mesh = Some(mesh.clone()),
                None => n.mesh_filter = Some(MeshFilter { mesh: Some(mesh.clone()) }),
            }
            if let Some(c) = n.collider.as_mut() {
                c.mesh = Some(mesh.clone());
            }
            let remapped = remap_materials(materials, &piece.empty_slots, &geometry.inside_material);
            match n.renderer.as_mut() {
                Some(r) => r.materials = remapped,
                None => trace!("Piece template {:?} has no renderer.", template),
            }
        }
        ctx.scene.set_active(id, true);
        if let Some(d) = density {
            ctx.scene.set_density(id, d);
        }
        if let Some(tg) = template_geometry.as_ref() {
            ctx.geometries.insert(id, tg.for_piece(geometry));
        }
        ctx.listeners.duplicate_onto(template, id);
        pieces.push(id);
    }
    Ok(pieces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{unit_cube, Node, RigidBody};

    #[test]
    fn remap_drops_empty_slots_and_appends_inside() {
        let shared = (0..3).map(|i| Arc::new(Material::new(format!("m{}", i)))).collect::<Vec<_>>();
        let inside = Arc::new(Material::new("inside"));
        let out = remap_materials(&shared, &[false, true, false], &inside);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].name, "m0");
        assert_eq!(out[1].name, "m2");
        assert!(Arc::ptr_eq(&out[2], &inside));

        let out = remap_materials(&shared, &[true, true, true], &inside);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn probe_restores_mass() {
        let mut sc = Scene::new();
        let id = sc.insert(
            Node::new("heavy")
                .with_mesh(Arc::new(unit_cube()))
                .with_body(RigidBody::with_mass(4.)),
        );
        let d = probe_density(&mut sc, id).unwrap();
        assert!((d - 4.).abs() < 1e-4);
        assert_eq!(sc.get(id).and_then(|n| n.body.as_ref()).map(|b| b.mass), Some(4.));
    }
}
