//! # Fracture notifications
//!
//! Typed listeners keyed by the node they sit on. Dispatch hands each listener a `Notice`
//! so it can touch the scene and queue listeners for other nodes.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use model::{Aabb, NodeId, Scene};

/// What every receiver of a fracture is told.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FractureEvent {
    /// The node that was fractured.
    pub original: NodeId,
    pub pieces_root: Option<NodeId>,
    /// Bounds of the original mesh, in its local space.
    pub bounds: Aabb,
}

pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub trait FractureListener: AsAny + Send {
    fn on_fracture(&mut self, notice: &mut Notice<'_>, event: &FractureEvent);

    /// A copy to put on each piece instantiated from a template this listener sits on.
    fn duplicate(&self) -> Option<Box<dyn FractureListener>> {
        None
    }
}

/// The receiving side of a dispatch.
pub struct Notice<'a> {
    scene: &'a mut Scene,
    this: NodeId,
    attachments: Vec<(NodeId, TypeId, Box<dyn FractureListener>)>,
}
impl<'a> Notice<'a> {
    pub fn scene(&self) -> &Scene {
        self.scene
    }
    pub fn scene_mut(&mut self) -> &mut Scene {
        self.scene
    }
    /// The node being notified.
    pub fn this(&self) -> NodeId {
        self.this
    }
    /// Registers `listener` on `node` once dispatch is done, unless `node` already has one of this type.
    pub fn attach<L: FractureListener>(&mut self, node: NodeId, listener: L) {
        self.attachments.push((node, TypeId::of::<L>(), Box::new(listener)));
    }
}

type Entry = (TypeId, Box<dyn FractureListener>);

#[derive(Default)]
pub struct Listeners {
    buckets: HashMap<NodeId, Vec<Entry>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener. Listeners on a node are notified in registration order.
    pub fn register<L: FractureListener>(&mut self, node: NodeId, listener: L) {
        self.push(node, TypeId::of::<L>(), Box::new(listener));
    }

    fn push(&mut self, node: NodeId, ty: TypeId, listener: Box<dyn FractureListener>) {
        self.buckets.entry(node).or_insert_with(|| Vec::with_capacity(1)).push((ty, listener));
    }

    fn has_type(&self, node: NodeId, ty: TypeId) -> bool {
        self.buckets
            .get(&node)
            .map(|b| b.iter().any(|(t, _)| *t == ty))
            .unwrap_or(false)
    }

    pub fn has<L: FractureListener>(&self, node: NodeId) -> bool {
        self.has_type(node, TypeId::of::<L>())
    }

    /// The first listener of type `L` on `node`.
    pub fn get<L: FractureListener>(&self, node: NodeId) -> Option<&L> {
        self.buckets
            .get(&node)?
            .iter()
            .find_map(|(_, l)| (**l).as_any().downcast_ref::<L>())
    }

    pub fn get_mut<L: FractureListener>(&mut self, node: NodeId) -> Option<&mut L> {
        self.buckets
            .get_mut(&node)?
            .iter_mut()
            .find_map(|(_, l)| (**l).as_any_mut().downcast_mut::<L>())
    }

    pub fn count(&self, node: NodeId) -> usize {
        self.buckets.get(&node).map(Vec::len).unwrap_or(0)
    }

    pub fn remove_node(&mut self, node: NodeId) {
        self.buckets.remove(&node);
    }

    /// Copies every listener on `template` that can duplicate itself onto `piece`.
    pub fn duplicate_onto(&mut self, template: NodeId, piece: NodeId) {
        let dups = match self.buckets.get(&template) {
            Some(bucket) => bucket
                .iter()
                .filter_map(|(ty, l)| l.duplicate().map(|d| (*ty, d)))
                .collect::<Vec<_>>(),
            None => return,
        };
        for (ty, d) in dups {
            self.push(piece, ty, d);
        }
    }

    /// Notifies every listener on `node`. Missing receivers are not an error.
    pub fn dispatch(&mut self, scene: &mut Scene, node: NodeId, event: &FractureEvent) {
        self.buckets.retain(|id, _| scene.contains(*id));
        let mut bucket = match self.buckets.remove(&node) {
            Some(b) => b,
            None => return,
        };
        trace!("Dispatching fracture of {:?} to {} listeners on {:?}.", event.original, bucket.len(), node);

        let mut notice = Notice {
            scene,
            this: node,
            attachments: vec![],
        };
        for (_, l) in bucket.iter_mut() {
            l.on_fracture(&mut notice, event);
        }
        let Notice { scene, attachments, .. } = notice;

        if scene.contains(node) {
            self.buckets.insert(node, bucket);
        }
        for (target, ty, l) in attachments {
            if scene.contains(target) && !self.has_type(target, ty) {
                self.push(target, ty, l);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Count(u32);
    impl FractureListener for Count {
        fn on_fracture(&mut self, _: &mut Notice<'_>, _: &FractureEvent) {
            self.0 += 1;
        }
        fn duplicate(&self) -> Option<Box<dyn FractureListener>> {
            Some(Box::new(Count(0)))
        }
    }

    struct Spread;
    impl FractureListener for Spread {
        fn on_fracture(&mut self, notice: &mut Notice<'_>, event: &FractureEvent) {
            if let Some(root) = event.pieces_root {
                for c in notice.scene().children(root).to_vec() {
                    notice.attach(c, Count(100));
                }
            }
        }
    }

    fn event(original: NodeId) -> FractureEvent {
        FractureEvent {
            original,
            pieces_root: None,
            bounds: Aabb::zero(),
        }
    }

    #[test]
    fn dispatch_reaches_only_target() {
        let mut sc = Scene::new();
        let a = sc.spawn("a");
        let b = sc.spawn("b");
        let mut ls = Listeners::new();
        ls.register(a, Count(0));
        ls.register(b, Count(0));
        ls.dispatch(&mut sc, a, &event(a));
        ls.dispatch(&mut sc, a, &event(a));
        assert_eq!(ls.get::<Count>(a).map(|c| c.0), Some(2));
        assert_eq!(ls.get::<Count>(b).map(|c| c.0), Some(0));
    }

    #[test]
    fn dead_nodes_are_purged() {
        let mut sc = Scene::new();
        let a = sc.spawn("a");
        let b = sc.spawn("b");
        let mut ls = Listeners::new();
        ls.register(b, Count(0));
        sc.despawn(b);
        ls.dispatch(&mut sc, a, &event(a));
        assert_eq!(ls.count(b), 0);
    }

    #[test]
    fn attachments_apply_after_dispatch() {
        let mut sc = Scene::new();
        let a = sc.spawn("a");
        let root = sc.spawn("root");
        let p0 = sc.spawn("p0");
        let p1 = sc.spawn("p1");
        sc.set_parent(p0, Some(root)).unwrap();
        sc.set_parent(p1, Some(root)).unwrap();

        let mut ls = Listeners::new();
        ls.register(a, Spread);
        ls.register(p1, Count(0));
        let ev = FractureEvent {
            original: a,
            pieces_root: Some(root),
            bounds: Aabb::zero(),
        };
        ls.dispatch(&mut sc, a, &ev);
        assert_eq!(ls.get::<Count>(p0).map(|c| c.0), Some(100));
        assert_eq!(ls.get::<Count>(p1).map(|c| c.0), Some(0));
        assert_eq!(ls.count(p1), 1);
    }

    #[test]
    fn duplicates_only_what_can_duplicate() {
        let mut sc = Scene::new();
        let template = sc.spawn("template");
        let piece = sc.spawn("piece");
        let mut ls = Listeners::new();
        ls.register(template, Count(7));
        ls.register(template, Spread);
        ls.duplicate_onto(template, piece);
        assert!(ls.has::<Count>(piece));
        assert!(!ls.has::<Spread>(piece));
        assert_eq!(ls.get::<Count>(piece).map(|c| c.0), Some(0));
    }
}
