//! # Fracture geometry
//!
//! The component that makes a node fracturable. `Runtime` computes pieces on every fracture,
//! `PreFractured` computes them once and reuses the cached hierarchy.

use std::{collections::HashMap, sync::Arc};

use crate::{
    notify::FractureEvent,
    result::AsyncFractureResult,
    spec::{FractureSpec, UvMode},
};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use model::{Aabb, Material, NodeId, Scene};
use na::Point3;

#[derive(Debug, Clone)]
pub enum GeometryKind {
    Runtime {
        /// Decompose on a worker thread and finish over later ticks.
        asynchronous: bool,
    },
    PreFractured {
        /// Root of the cached pieces, kept inactive until the node fractures.
        generated_pieces: Option<NodeId>,
        entire_mesh_bounds: Aabb,
    },
}

#[derive(Debug, Clone)]
pub struct FractureGeometry {
    /// Assigned to the cap triangles of every piece.
    pub inside_material: Arc<Material>,
    /// Cloned for each piece. Must carry a mesh filter.
    pub piece_template: Option<NodeId>,
    /// Where piece roots go. Defaults to the fractured node's parent.
    pub pieces_parent: Option<NodeId>,
    pub piece_count: u32,
    pub iteration_count: u32,
    /// Remaining fracture budget. 0 disables fracturing, negative never runs out.
    pub num_generations: i32,
    pub fracture_radius: f32,
    pub uv_mode: UvMode,
    /// Give each piece the density of the original body.
    pub distribute_mass: bool,
    /// Extra nodes told about every fracture of this one.
    pub notify: Vec<NodeId>,
    processing: bool,
    /// The guarded fracture holding `processing`, once it is known to be asynchronous.
    in_flight: Option<AsyncFractureResult>,
    pub kind: GeometryKind,
}

impl FractureGeometry {
    fn with_kind(kind: GeometryKind) -> Self {
        Self {
            inside_material: Arc::new(Material::default()),
            piece_template: None,
            pieces_parent: None,
            piece_count: 5,
            iteration_count: 2,
            num_generations: 1,
            fracture_radius: 0.,
            uv_mode: UvMode::Piece,
            distribute_mass: true,
            notify: vec![],
            processing: false,
            in_flight: None,
            kind,
        }
    }

    pub fn runtime() -> Self {
        Self::with_kind(GeometryKind::Runtime { asynchronous: true })
    }

    pub fn pre_fractured() -> Self {
        Self::with_kind(GeometryKind::PreFractured {
            generated_pieces: None,
            entire_mesh_bounds: Aabb::zero(),
        })
    }

    pub fn with_template(mut self, template: NodeId) -> Self {
        self.piece_template = Some(template);
        self
    }
    pub fn with_inside_material(mut self, material: Arc<Material>) -> Self {
        self.inside_material = material;
        self
    }
    pub fn with_counts(mut self, piece_count: u32, iteration_count: u32) -> Self {
        self.piece_count = piece_count;
        self.iteration_count = iteration_count;
        self
    }
    pub fn with_generations(mut self, num_generations: i32) -> Self {
        self.num_generations = num_generations;
        self
    }
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.fracture_radius = radius;
        self
    }
    /// Only meaningful for `Runtime`.
    pub fn asynchronous(mut self, asynchronous: bool) -> Self {
        if let GeometryKind::Runtime { asynchronous: a } = &mut self.kind {
            *a = asynchronous;
        }
        self
    }

    pub fn is_processing_fracture(&self) -> bool {
        self.processing
    }
    pub(crate) fn set_processing(&mut self, processing: bool) {
        self.processing = processing;
        if !processing {
            self.in_flight = None;
        }
    }

    /// The asynchronous fracture started through this geometry's guard, if one is running.
    pub fn running_fracture(&self) -> Option<&AsyncFractureResult> {
        self.in_flight.as_ref()
    }
    pub(crate) fn hold(&mut self, res: &AsyncFractureResult) {
        self.in_flight = Some(res.clone());
    }
    pub(crate) fn take_running(&mut self) -> Option<AsyncFractureResult> {
        self.in_flight.take()
    }

    /// Clears the guard if `res` is the fracture holding it. A fracture that was stopped and
    /// replaced leaves its successor's guard alone.
    pub(crate) fn release(&mut self, res: &AsyncFractureResult) -> bool {
        match &self.in_flight {
            Some(held) if held.is_same(res) => {
                self.set_processing(false);
                true
            }
            _ => false,
        }
    }

    pub fn is_pre_fractured(&self) -> bool {
        matches!(self.kind, GeometryKind::PreFractured { .. })
    }

    pub fn generated_pieces(&self) -> Option<NodeId> {
        match &self.kind {
            GeometryKind::PreFractured { generated_pieces, .. } => *generated_pieces,
            GeometryKind::Runtime { .. } => None,
        }
    }

    pub fn entire_mesh_bounds(&self) -> Aabb {
        match &self.kind {
            GeometryKind::PreFractured { entire_mesh_bounds, .. } => *entire_mesh_bounds,
            GeometryKind::Runtime { .. } => Aabb::zero(),
        }
    }

    /// True if this instance may start a fracture right now.
    pub fn can_fracture(&self) -> bool {
        self.num_generations != 0 && !self.processing
    }

    /// The request this geometry issues for a fracture centred on `point`.
    pub fn spec_at(&self, point: Point3<f32>, asynchronous: bool) -> FractureSpec {
        FractureSpec::new(self.piece_count, self.iteration_count)
            .at(point)
            .with_radius(self.fracture_radius)
            .with_uv_mode(self.uv_mode)
            .asynchronous(asynchronous)
    }

    /// The geometry a piece gets when its template carries `self`.
    pub fn for_piece(&self, parent: &FractureGeometry) -> FractureGeometry {
        let mut g = self.clone();
        g.num_generations = parent.num_generations.saturating_sub(1);
        g.inside_material = parent.inside_material.clone();
        g.piece_template = parent.piece_template;
        g.pieces_parent = parent.pieces_parent;
        g.distribute_mass = parent.distribute_mass;
        g.processing = false;
        g.in_flight = None;
        if let GeometryKind::PreFractured {
            generated_pieces,
            entire_mesh_bounds,
        } = &mut g.kind
        {
            *generated_pieces = None;
            *entire_mesh_bounds = Aabb::zero();
        }
        g
    }

    /// The node's own reaction to a fracture. Anything but its own fracture is ignored.
    /// The guard is left to whoever started the fracture.
    pub(crate) fn on_fracture(&mut self, scene: &mut Scene, own: NodeId, event: &FractureEvent) {
        if event.original != own {
            return;
        }
        if let GeometryKind::PreFractured {
            generated_pieces,
            entire_mesh_bounds,
        } = &mut self.kind
        {
            *generated_pieces = event.pieces_root;
            *entire_mesh_bounds = event.bounds;
            if let Some(root) = event.pieces_root {
                scene.set_active(root, false);
            }
        }
    }
}

/// Every `FractureGeometry` in a scene, keyed by node.
#[derive(Debug, Default)]
pub struct Geometries {
    map: HashMap<NodeId, FractureGeometry>,
}

impl Geometries {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn insert(&mut self, node: NodeId, geometry: FractureGeometry) -> Option<FractureGeometry> {
        self.map.insert(node, geometry)
    }
    pub fn remove(&mut self, node: NodeId) -> Option<FractureGeometry> {
        self.map.remove(&node)
    }
    pub fn get(&self, node: NodeId) -> Option<&FractureGeometry> {
        self.map.get(&node)
    }
    pub fn get_mut(&mut self, node: NodeId) -> Option<&mut FractureGeometry> {
        self.map.get_mut(&node)
    }
    pub fn contains(&self, node: NodeId) -> bool {
        self.map.contains_key(&node)
    }
    pub fn len(&self) -> usize {
        self.map.len()
    }
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
    /// Drops the geometry of every node that no longer exists.
    pub fn purge(&mut self, scene: &Scene) {
        self.map.retain(|id, _| scene.contains(*id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pieces_inherit_from_parent() {
        let mut sc = Scene::new();
        let template = sc.spawn("template");
        let inside = Arc::new(Material::new("Inside"));
        let parent = FractureGeometry::runtime()
            .with_template(template)
            .with_inside_material(inside.clone())
            .with_generations(3);
        let on_template = FractureGeometry::runtime().with_counts(2, 1).with_generations(9);

        let child = on_template.for_piece(&parent);
        assert_eq!(child.num_generations, 2);
        assert_eq!(child.piece_template, Some(template));
        assert!(Arc::ptr_eq(&child.inside_material, &inside));
        assert_eq!(child.piece_count, 2);
        assert!(!child.is_processing_fracture());
    }

    #[test]
    fn negative_generations_never_run_out() {
        let parent = FractureGeometry::runtime().with_generations(-1);
        let child = FractureGeometry::runtime().for_piece(&parent);
        assert!(child.num_generations < 0);
        assert!(child.can_fracture());
        let spent = FractureGeometry::runtime().for_piece(&FractureGeometry::runtime());
        assert_eq!(spent.num_generations, 0);
        assert!(!spent.can_fracture());
    }

    #[test]
    fn only_own_fracture_is_handled() {
        let mut sc = Scene::new();
        let own = sc.spawn("own");
        let other = sc.spawn("other");
        let root = sc.spawn("root");
        let mut g = FractureGeometry::pre_fractured();
        g.set_processing(true);

        let foreign = FractureEvent {
            original: other,
            pieces_root: Some(root),
            bounds: Aabb::zero(),
        };
        g.on_fracture(&mut sc, own, &foreign);
        assert_eq!(g.generated_pieces(), None);

        let mine = FractureEvent { original: own, ..foreign };
        g.on_fracture(&mut sc, own, &mine);
        assert_eq!(g.generated_pieces(), Some(root));
        assert!(!sc.active_self(root));
        assert!(g.is_processing_fracture());
    }

    #[test]
    fn only_the_holder_releases_the_guard() {
        let mut g = FractureGeometry::runtime();
        let stale = AsyncFractureResult::pending();
        let current = AsyncFractureResult::pending();
        g.set_processing(true);
        g.hold(&current);

        assert!(!g.release(&stale));
        assert!(g.is_processing_fracture());
        assert!(g.release(&current.clone()));
        assert!(!g.is_processing_fracture());
        assert!(g.running_fracture().is_none());
    }
}
