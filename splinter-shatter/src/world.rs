//! # FractureWorld
//!
//! Owns a scene, its fracture geometries and listeners, and the scheduler that fractures them.
//! This is where the reentrancy guard and generation budget of each geometry are enforced.

use crate::{
    decompose::Decomposer,
    error::ConfigurationError,
    geometry::{FractureGeometry, Geometries, GeometryKind},
    notify::{FractureEvent, Listeners},
    result::AsyncFractureResult,
    scheduler::{FractureScheduler, SuspendSwitch},
    spec::FractureSpec,
    FractureCtx,
};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use model::{Aabb, NodeId, Scene};
use na::{Point3, Vector3};

#[derive(Default)]
pub struct FractureWorld {
    pub scene: Scene,
    pub geometries: Geometries,
    pub listeners: Listeners,
    scheduler: FractureScheduler,
}

impl FractureWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_decomposer(decomposer: Box<dyn Decomposer>) -> Self {
        Self {
            scene: Scene::new(),
            geometries: Geometries::new(),
            listeners: Listeners::new(),
            scheduler: FractureScheduler::new(decomposer),
        }
    }

    pub fn ctx(&mut self) -> FractureCtx<'_> {
        self.parts().0
    }

    fn parts(&mut self) -> (FractureCtx<'_>, &mut FractureScheduler) {
        (
            FractureCtx {
                scene: &mut self.scene,
                geometries: &mut self.geometries,
                listeners: &mut self.listeners,
            },
            &mut self.scheduler,
        )
    }

    pub fn scheduler(&self) -> &FractureScheduler {
        &self.scheduler
    }

    /// Issues a request directly, bypassing the geometry's guard and budget.
    pub fn submit(
        &mut self,
        spec: FractureSpec,
        requester: NodeId,
        pieces_parent: Option<NodeId>,
        transfer_mass: bool,
        hide_after: bool,
    ) -> Result<AsyncFractureResult, crate::ShatterError> {
        let (mut ctx, scheduler) = self.parts();
        scheduler.submit(&mut ctx, spec, requester, pieces_parent, transfer_mass, hide_after)
    }

    pub fn add_geometry(&mut self, node: NodeId, geometry: FractureGeometry) {
        if self.geometries.insert(node, geometry).is_some() {
            debug!("Replaced fracture geometry on {:?}.", node);
        }
    }
    pub fn geometry(&self, node: NodeId) -> Option<&FractureGeometry> {
        self.geometries.get(node)
    }
    pub fn geometry_mut(&mut self, node: NodeId) -> Option<&mut FractureGeometry> {
        self.geometries.get_mut(node)
    }

    /// Despawns `node` and its subtree along with their geometries.
    pub fn despawn(&mut self, node: NodeId) -> bool {
        let removed = self.scene.despawn(node);
        self.geometries.purge(&self.scene);
        removed
    }

    /// Advances every asynchronous fracture once.
    pub fn tick(&mut self) {
        let (mut ctx, scheduler) = self.parts();
        scheduler.tick(&mut ctx);
    }

    pub fn has_fractures_in_progress(&self) -> bool {
        self.scheduler.has_operations_in_progress()
    }
    pub fn is_suspended(&self) -> bool {
        self.scheduler.is_suspended()
    }
    pub fn set_suspended(&self, suspended: bool) {
        self.scheduler.set_suspended(suspended);
    }
    pub fn suspend_switch(&self) -> SuspendSwitch {
        self.scheduler.suspend_switch()
    }

    /// Fractures at the node's origin.
    pub fn fracture(&mut self, node: NodeId) -> Option<AsyncFractureResult> {
        self.fracture_at(node, Point3::origin())
    }

    /// Fractures around `point`, in the node's local space.
    ///
    /// # Remarks
    ///
    /// None when the node cannot fracture right now: its budget is spent, a fracture of it is
    /// still running, or the request was rejected (which is logged).
    pub fn fracture_at(&mut self, node: NodeId, point: Point3<f32>) -> Option<AsyncFractureResult> {
        let geometry = match self.geometries.get(node) {
            Some(g) => g,
            None => {
                error!("{}", ConfigurationError::NotFracturable(node));
                return None;
            }
        };
        if !geometry.can_fracture() {
            trace!("Ignoring fracture of {:?}, busy or out of generations.", node);
            return None;
        }
        match geometry.kind {
            GeometryKind::Runtime { asynchronous } => {
                let spec = geometry.spec_at(point, asynchronous);
                self.guarded_submit(node, spec, true)
            }
            GeometryKind::PreFractured { .. } => self.fracture_pre_fractured(node, point),
        }
    }

    fn guarded_submit(&mut self, node: NodeId, spec: FractureSpec, hide_after: bool) -> Option<AsyncFractureResult> {
        let geometry = self.geometries.get_mut(node)?;
        let (pieces_parent, transfer_mass) = (geometry.pieces_parent, geometry.distribute_mass);
        geometry.set_processing(true);

        let outcome = self.submit(spec, node, pieces_parent, transfer_mass, hide_after);
        match outcome {
            Ok(res) => {
                if res.is_complete() {
                    self.clear_processing(node);
                } else if let Some(g) = self.geometries.get_mut(node) {
                    g.hold(&res);
                }
                Some(res)
            }
            Err(e) => {
                error!("Cannot fracture {:?}: {}", node, e);
                self.clear_processing(node);
                None
            }
        }
    }

    fn clear_processing(&mut self, node: NodeId) {
        if let Some(g) = self.geometries.get_mut(node) {
            g.set_processing(false);
        }
    }

    fn fracture_pre_fractured(&mut self, node: NodeId, point: Point3<f32>) -> Option<AsyncFractureResult> {
        if !self.scene.active_self(node) {
            return Some(AsyncFractureResult::completed(None, Aabb::zero()));
        }
        let cached = self
            .geometries
            .get(node)
            .and_then(FractureGeometry::generated_pieces)
            .filter(|root| self.scene.contains(*root));

        let root = match cached {
            Some(root) => {
                self.enable_pieces(node, root);
                let event = FractureEvent {
                    original: node,
                    pieces_root: Some(root),
                    bounds: self.geometries.get(node).map(|g| g.entire_mesh_bounds()).unwrap_or_default(),
                };
                let notify = self.geometries.get(node).map(|g| g.notify.clone()).unwrap_or_default();
                self.listeners.dispatch(&mut self.scene, node, &event);
                for n in notify {
                    self.listeners.dispatch(&mut self.scene, n, &event);
                }
                for piece in self.scene.children(root).to_vec() {
                    self.listeners.dispatch(&mut self.scene, piece, &event);
                }
                root
            }
            None => {
                let res = self.generate_fracture_meshes(node, point, false)?;
                match res.pieces_root() {
                    Some(root) => {
                        self.enable_pieces(node, root);
                        root
                    }
                    None => {
                        warn!("Pre-fracturing {:?} produced no pieces.", node);
                        return Some(res);
                    }
                }
            }
        };
        self.scene.set_active(node, false);
        let bounds = self.geometries.get(node).map(|g| g.entire_mesh_bounds()).unwrap_or_default();
        Some(AsyncFractureResult::completed(Some(root), bounds))
    }

    fn enable_pieces(&mut self, node: NodeId, root: NodeId) {
        if let Some(world) = self.scene.world_transform(node) {
            let placed = self
                .scene
                .set_world_position(root, &world.pos.into())
                .and_then(|_| self.scene.set_world_rotation(root, &world.ori));
            if let Err(e) = placed {
                error!("Cannot place cached pieces of {:?}: {}", node, e);
            }
        }
        if let Some(n) = self.scene.get_mut(root) {
            n.local.scaling = Vector3::repeat(1.);
        }
        self.scene.set_active(root, true);
    }

    /// (Re)builds the cached pieces of a pre-fractured node. Any previous cache is despawned.
    pub fn generate_fracture_meshes(
        &mut self,
        node: NodeId,
        point: Point3<f32>,
        asynchronous: bool,
    ) -> Option<AsyncFractureResult> {
        let geometry = self.geometries.get_mut(node)?;
        if !geometry.is_pre_fractured() {
            error!("{:?} is not pre-fractured.", node);
            return None;
        }
        if !geometry.can_fracture() {
            trace!("Ignoring generation for {:?}, busy or out of generations.", node);
            return None;
        }
        let stale = geometry.generated_pieces();
        if let GeometryKind::PreFractured { generated_pieces, .. } = &mut geometry.kind {
            *generated_pieces = None;
        }
        let spec = geometry.spec_at(point, asynchronous);
        if let Some(root) = stale {
            self.scene.despawn(root);
            self.geometries.purge(&self.scene);
        }
        debug!("Generating pre-fractured pieces for {:?}.", node);

        self.guarded_submit(node, spec, false)
    }

    /// Stops the in-flight fracture or generation of `node` and frees it to start another.
    ///
    /// # Remarks
    ///
    /// The stopped operation is dropped on the next tick. It no longer holds the guard, so a
    /// fracture started in between keeps it.
    pub fn stop_running_fracture(&mut self, node: NodeId) {
        if let Some(g) = self.geometries.get_mut(node) {
            if let Some(r) = g.take_running() {
                r.stop_fracture();
            }
            g.set_processing(false);
        }
    }

    /// Toggles the cached pieces on and off once while the node is hidden, then restores the node.
    pub fn prime(&mut self, node: NodeId) {
        let root = match self.geometries.get(node).and_then(FractureGeometry::generated_pieces) {
            Some(r) => r,
            None => return,
        };
        let was_active = self.scene.active_self(node);
        self.scene.set_active(node, false);
        self.scene.set_active(root, true);
        self.scene.set_active(root, false);
        self.scene.set_active(node, was_active);
    }
}
