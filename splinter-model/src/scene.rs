//! # Scene
//!
//! A small node hierarchy standing in for a host engine's scene: transforms, activity, and the
//! handful of components fracturing reads or writes.

use std::sync::Arc;

use crate::{
    geom::{bounds::Aabb, tri::TriMesh, Material},
    AffineTransform,
};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use na::{Point3, UnitQuaternion, Vector3};
use thiserror::Error;

/// Generational handle to a node. Handles to despawned nodes never resolve again.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone)]
pub struct NodeId {
    index: u32,
    gen: u32,
}
impl NodeId {
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SceneError {
    #[error("node {0:?} does not exist")]
    MissingNode(NodeId),
    #[error("parenting {child:?} under {parent:?} would create a cycle")]
    Cycle { child: NodeId, parent: NodeId },
}

#[derive(Debug, Clone, Default)]
pub struct MeshFilter {
    pub mesh: Option<Arc<TriMesh>>,
}

#[derive(Debug, Clone, Default)]
pub struct MeshRenderer {
    /// One material per submesh.
    pub materials: Vec<Arc<Material>>,
}

#[derive(Debug, Clone, Default)]
pub struct MeshCollider {
    pub mesh: Option<Arc<TriMesh>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RigidBody {
    pub mass: f32,
    pub velocity: Vector3<f32>,
    pub angular_velocity: Vector3<f32>,
    pub kinematic: bool,
    pub use_gravity: bool,
    /// Every axis of motion is locked. Impulses are ignored.
    pub frozen: bool,
}
impl RigidBody {
    pub fn with_mass(mass: f32) -> Self {
        Self {
            mass,
            ..Default::default()
        }
    }
}
impl Default for RigidBody {
    fn default() -> Self {
        Self {
            mass: 1.,
            velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            kinematic: false,
            use_gravity: true,
            frozen: false,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum JointKind {
    Fixed,
    Hinge,
    Spring,
}

/// Constraint between a node's body and `connected_body` (or the world when unset).
/// Anchors are in the owning node's local space.
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub kind: JointKind,
    pub anchor: Point3<f32>,
    pub connected_anchor: Point3<f32>,
    pub axis: Vector3<f32>,
    pub connected_body: Option<NodeId>,
    pub break_force: f32,
    pub break_torque: f32,
    pub enable_collision: bool,
    pub spring: f32,
    pub damper: f32,
}
impl Joint {
    pub fn new(kind: JointKind) -> Self {
        Self {
            kind,
            anchor: Point3::origin(),
            connected_anchor: Point3::origin(),
            axis: Vector3::x(),
            connected_body: None,
            break_force: f32::INFINITY,
            break_torque: f32::INFINITY,
            enable_collision: false,
            spring: 0.,
            damper: 0.,
        }
    }

    /// Copies every setting of `other` onto `self`.
    pub fn copy_settings_from(&mut self, other: &Joint) {
        self.kind = other.kind;
        self.anchor = other.anchor;
        self.connected_anchor = other.connected_anchor;
        self.axis = other.axis;
        self.connected_body = other.connected_body;
        self.break_force = other.break_force;
        self.break_torque = other.break_torque;
        self.enable_collision = other.enable_collision;
        self.spring = other.spring;
        self.damper = other.damper;
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub local: AffineTransform,
    active: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,

    pub mesh_filter: Option<MeshFilter>,
    pub renderer: Option<MeshRenderer>,
    pub collider: Option<MeshCollider>,
    pub body: Option<RigidBody>,
    pub joint: Option<Joint>,
}
impl Node {
    pub fn new(name: impl Into<String>) -> Node {
        Node {
            name: name.into(),
            local: AffineTransform::identity(),
            active: true,
            parent: None,
            children: vec![],

            mesh_filter: None,
            renderer: None,
            collider: None,
            body: None,
            joint: None,
        }
    }

    pub fn at(mut self, pos: Vector3<f32>) -> Self {
        self.local.pos = pos;
        self
    }
    pub fn with_mesh(mut self, mesh: Arc<TriMesh>) -> Self {
        self.mesh_filter = Some(MeshFilter { mesh: Some(mesh) });
        self
    }
    pub fn with_mesh_filter(mut self) -> Self {
        self.mesh_filter = Some(MeshFilter::default());
        self
    }
    pub fn with_materials(mut self, materials: Vec<Arc<Material>>) -> Self {
        self.renderer = Some(MeshRenderer { materials });
        self
    }
    pub fn with_collider(mut self) -> Self {
        let mesh = self.mesh();
        self.collider = Some(MeshCollider { mesh });
        self
    }
    pub fn with_body(mut self, body: RigidBody) -> Self {
        self.body = Some(body);
        self
    }
    pub fn with_joint(mut self, joint: Joint) -> Self {
        self.joint = Some(joint);
        self
    }

    pub fn active_self(&self) -> bool {
        self.active
    }
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
    pub fn mesh(&self) -> Option<Arc<TriMesh>> {
        self.mesh_filter.as_ref().and_then(|mf| mf.mesh.clone())
    }
    /// The mesh physics sees: the collider's if there is one, the rendered one otherwise.
    pub fn shape_mesh(&self) -> Option<Arc<TriMesh>> {
        self.collider
            .as_ref()
            .and_then(|c| c.mesh.clone())
            .or_else(|| self.mesh())
    }
}

#[derive(Debug)]
struct Slot {
    gen: u32,
    node: Option<Node>,
}

#[derive(Debug, Default)]
pub struct Scene {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn spawn(&mut self, name: impl Into<String>) -> NodeId {
        self.insert(Node::new(name))
    }

    /// Adds `node` as an unparented root. Any hierarchy links it carried are discarded.
    pub fn insert(&mut self, mut node: Node) -> NodeId {
        node.parent = None;
        node.children.clear();
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId { index, gen: slot.gen }
            }
            None => {
                self.slots.push(Slot { gen: 0, node: Some(node) });
                NodeId {
                    index: (self.slots.len() - 1) as u32,
                    gen: 0,
                }
            }
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index())
            .filter(|s| s.gen == id.gen)
            .and_then(|s| s.node.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index())
            .filter(|s| s.gen == id.gen)
            .and_then(|s| s.node.as_mut())
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.get(id).ok_or(SceneError::MissingNode(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.get_mut(id).ok_or(SceneError::MissingNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.node.as_ref().map(|n| {
                (
                    NodeId {
                        index: i as u32,
                        gen: s.gen,
                    },
                    n,
                )
            })
        })
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Every node below `id`, depth first, parents before children.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = vec![];
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    /// Reparents `child`, keeping its local transform.
    pub fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) -> Result<(), SceneError> {
        self.node(child)?;
        if let Some(p) = parent {
            self.node(p)?;
            let mut cursor = Some(p);
            while let Some(c) = cursor {
                if c == child {
                    return Err(SceneError::Cycle { child, parent: p });
                }
                cursor = self.parent(c);
            }
        }
        if let Some(old) = self.parent(child) {
            if let Some(old) = self.get_mut(old) {
                old.children.retain(|c| *c != child);
            }
        }
        if let Some(p) = parent {
            self.node_mut(p)?.children.push(child);
        }
        self.node_mut(child)?.parent = parent;
        Ok(())
    }

    /// Removes `id` and everything below it. Returns false if it was already gone.
    pub fn despawn(&mut self, id: NodeId) -> bool {
        if !self.contains(id) {
            return false;
        }
        if let Some(p) = self.parent(id) {
            if let Some(p) = self.get_mut(p) {
                p.children.retain(|c| *c != id);
            }
        }
        let mut doomed = self.descendants(id);
        doomed.push(id);
        for d in doomed {
            let slot = &mut self.slots[d.index()];
            slot.node = None;
            slot.gen = slot.gen.wrapping_add(1);
            self.free.push(d.index);
        }
        true
    }

    /// Deep copies the subtree at `template` into a new, unparented subtree and returns its root.
    pub fn instantiate(&mut self, template: NodeId) -> Result<NodeId, SceneError> {
        let copied = self.node(template)?.clone();
        let root = self.insert(copied);
        let mut pending = vec![(template, root)];
        while let Some((src, dst)) = pending.pop() {
            for child in self.children(src).to_vec() {
                let copied = self.node(child)?.clone();
                let copy = self.insert(copied);
                self.set_parent(copy, Some(dst))?;
                pending.push((child, copy));
            }
        }
        Ok(root)
    }

    pub fn set_active(&mut self, id: NodeId, active: bool) -> bool {
        match self.get_mut(id) {
            Some(n) => {
                n.active = active;
                true
            }
            None => false,
        }
    }

    pub fn active_self(&self, id: NodeId) -> bool {
        self.get(id).map(|n| n.active).unwrap_or(false)
    }

    pub fn active_in_hierarchy(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(c) = cursor {
            match self.get(c) {
                Some(n) if n.active => cursor = n.parent,
                _ => return false,
            }
        }
        true
    }

    pub fn world_transform(&self, id: NodeId) -> Option<AffineTransform> {
        let mut chain = vec![];
        let mut cursor = Some(id);
        while let Some(c) = cursor {
            let n = self.get(c)?;
            chain.push(n.local);
            cursor = n.parent;
        }
        Some(
            chain
                .iter()
                .rev()
                .fold(AffineTransform::identity(), |acc, local| acc.then(local)),
        )
    }

    fn parent_world(&self, id: NodeId) -> AffineTransform {
        self.parent(id)
            .and_then(|p| self.world_transform(p))
            .unwrap_or_else(AffineTransform::identity)
    }

    pub fn world_position(&self, id: NodeId) -> Option<Point3<f32>> {
        self.world_transform(id).map(|t| Point3::from(t.pos))
    }

    pub fn set_world_position(&mut self, id: NodeId, pos: &Point3<f32>) -> Result<(), SceneError> {
        let local = self.parent_world(id).inverse_transform_point(pos);
        self.node_mut(id)?.local.pos = local.coords;
        Ok(())
    }

    pub fn set_world_rotation(&mut self, id: NodeId, ori: &UnitQuaternion<f32>) -> Result<(), SceneError> {
        let local = self.parent_world(id).ori.inverse() * ori;
        self.node_mut(id)?.local.ori = local;
        Ok(())
    }

    /// World space box around the node's collider (or mesh).
    pub fn world_bounds(&self, id: NodeId) -> Option<Aabb> {
        let bounds = self.get(id)?.shape_mesh()?.bounds()?;
        Some(bounds.transformed(&self.world_transform(id)?))
    }

    /// Sets the body's mass from its shape volume. Returns false if there is no body to set.
    pub fn set_density(&mut self, id: NodeId, density: f32) -> bool {
        let volume = match (self.get(id), self.world_transform(id)) {
            (Some(n), Some(t)) if n.body.is_some() => {
                let s = t.scaling;
                n.shape_mesh().map(|m| m.volume()).unwrap_or(0.) * (s.x * s.y * s.z).abs()
            }
            _ => return false,
        };
        match self.get_mut(id).and_then(|n| n.body.as_mut()) {
            Some(body) => {
                body.mass = density * volume;
                true
            }
            None => false,
        }
    }

    /// Instantaneous impulse at a world point. Kinematic, frozen and massless bodies ignore it.
    pub fn add_impulse_at(&mut self, id: NodeId, impulse: &Vector3<f32>, point: &Point3<f32>) -> bool {
        let center = match self.world_position(id) {
            Some(c) => c,
            None => return false,
        };
        match self.get_mut(id).and_then(|n| n.body.as_mut()) {
            Some(body) if !body.kinematic && !body.frozen && body.mass > 0. => {
                body.velocity += impulse / body.mass;
                body.angular_velocity += (point.coords - center.coords).cross(impulse) / body.mass;
                true
            }
            _ => false,
        }
    }

    /// Pushes the body away from `center` with a linear falloff to zero at `radius`.
    /// A non-positive radius means no falloff.
    pub fn add_explosion_force(&mut self, id: NodeId, force: f32, center: &Point3<f32>, radius: f32) -> bool {
        let pos = match self.world_position(id) {
            Some(p) => p,
            None => return false,
        };
        let offset = pos.coords - center.coords;
        let dist = offset.norm();
        if radius > 0. && dist > radius {
            return false;
        }
        let falloff = if radius > 0. { 1. - dist / radius } else { 1. };
        let dir = if dist > f32::EPSILON { offset / dist } else { Vector3::y() };
        self.add_impulse_at(id, &(dir * force * falloff), &pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_handles_do_not_resolve() {
        let mut sc = Scene::new();
        let a = sc.spawn("a");
        assert!(sc.despawn(a));
        let b = sc.spawn("b");
        assert_eq!(a.index(), b.index());
        assert!(sc.get(a).is_none());
        assert_eq!(sc.node(b).map(|n| n.name.as_str()), Ok("b"));
    }

    #[test]
    fn despawn_removes_subtree() {
        let mut sc = Scene::new();
        let root = sc.spawn("root");
        let child = sc.spawn("child");
        let grandchild = sc.spawn("grandchild");
        sc.set_parent(child, Some(root)).unwrap();
        sc.set_parent(grandchild, Some(child)).unwrap();
        assert_eq!(sc.descendants(root), vec![child, grandchild]);
        sc.despawn(child);
        assert!(sc.children(root).is_empty());
        assert_eq!(sc.len(), 1);
    }

    #[test]
    fn parenting_cycles_are_rejected() {
        let mut sc = Scene::new();
        let a = sc.spawn("a");
        let b = sc.spawn("b");
        sc.set_parent(b, Some(a)).unwrap();
        assert_eq!(sc.set_parent(a, Some(b)), Err(SceneError::Cycle { child: a, parent: b }));
    }

    #[test]
    fn instantiate_copies_subtree() {
        let mut sc = Scene::new();
        let t = sc.insert(Node::new("template").with_body(RigidBody::with_mass(3.)));
        let c = sc.spawn("part");
        sc.set_parent(c, Some(t)).unwrap();
        let copy = sc.instantiate(t).unwrap();
        assert_ne!(copy, t);
        assert_eq!(sc.parent(copy), None);
        assert_eq!(sc.children(copy).len(), 1);
        assert_ne!(sc.children(copy)[0], c);
        assert_eq!(sc.node(copy).unwrap().body.as_ref().map(|b| b.mass), Some(3.));
    }

    #[test]
    fn world_position_follows_parent() {
        let mut sc = Scene::new();
        let p = sc.insert(Node::new("p").at(Vector3::new(1., 0., 0.)));
        let c = sc.insert(Node::new("c").at(Vector3::new(0., 2., 0.)));
        sc.set_parent(c, Some(p)).unwrap();
        assert_eq!(sc.world_position(c), Some(Point3::new(1., 2., 0.)));
        sc.set_world_position(c, &Point3::new(5., 5., 5.)).unwrap();
        assert_eq!(sc.node(c).unwrap().local.pos, Vector3::new(4., 5., 5.));
        sc.set_active(p, false);
        assert!(sc.active_self(c));
        assert!(!sc.active_in_hierarchy(c));
    }

    #[test]
    fn density_uses_shape_volume() {
        let mut sc = Scene::new();
        let mut node = Node::new("cube")
            .with_mesh(Arc::new(crate::unit_cube()))
            .with_body(RigidBody::with_mass(10.));
        node.local.scaling = Vector3::new(2., 2., 2.);
        let id = sc.insert(node);
        assert!(sc.set_density(id, 1.));
        let mass = sc.node(id).unwrap().body.as_ref().unwrap().mass;
        assert!((mass - 8.).abs() < 1e-4);
    }

    #[test]
    fn kinematic_bodies_ignore_impulses() {
        let mut sc = Scene::new();
        let mut body = RigidBody::with_mass(2.);
        body.kinematic = true;
        let k = sc.insert(Node::new("k").with_body(body));
        let d = sc.insert(Node::new("d").with_body(RigidBody::with_mass(2.)));
        assert!(!sc.add_impulse_at(k, &Vector3::x(), &Point3::origin()));
        assert!(sc.add_impulse_at(d, &Vector3::new(4., 0., 0.), &Point3::origin()));
        assert_eq!(sc.node(d).unwrap().body.as_ref().unwrap().velocity, Vector3::new(2., 0., 0.));
    }
}
