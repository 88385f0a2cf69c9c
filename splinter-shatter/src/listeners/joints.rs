use crate::notify::{FractureEvent, FractureListener, Notice};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use model::{Joint, NodeId, Scene};
use na::Point3;

/// Moves joints onto the pieces of a fractured node: its own joint goes to the pieces near
/// the anchor, and joints elsewhere that held on to it are pointed at those pieces instead.
#[derive(Debug, Clone)]
pub struct TransferJointsOnFracture {
    /// Where to look for joints connected to the fractured body. The whole scene when unset.
    pub search_root: Option<NodeId>,
    pub distance_tolerance: f32,
}

impl Default for TransferJointsOnFracture {
    fn default() -> Self {
        Self {
            search_root: None,
            distance_tolerance: 0.05,
        }
    }
}

impl TransferJointsOnFracture {
    pub fn new(search_root: Option<NodeId>) -> Self {
        Self {
            search_root,
            ..Default::default()
        }
    }

    /// A piece takes a joint if `point` is inside its world collider bounds, or within tolerance of them.
    fn close_enough(&self, scene: &Scene, piece: NodeId, point: &Point3<f32>, fallback: &Point3<f32>) -> bool {
        let center = match scene.world_position(piece) {
            Some(p) => p.coords,
            None => return false,
        };
        let closest = scene
            .world_bounds(piece)
            .map(|b| b.closest_point(point))
            .unwrap_or(*fallback);
        (point.coords - center).norm_squared()
            < (closest.coords - center).norm_squared() + self.distance_tolerance * self.distance_tolerance
    }

    fn transfer_own_joint(&self, notice: &mut Notice<'_>, original: NodeId, pieces: &[NodeId]) {
        let scene = notice.scene();
        let (joint, world) = match (scene.get(original).and_then(|n| n.joint.clone()), scene.world_transform(original)) {
            (Some(j), Some(w)) => (j, w),
            _ => return,
        };
        let anchor = world.transform_point(&joint.anchor);
        let connected_anchor = world.transform_point(&joint.connected_anchor);
        let axis = world.transform_vector(&joint.axis);
        let fallback = Point3::from(world.pos);

        let mut taken = vec![];
        for piece in pieces.iter() {
            if !self.close_enough(scene, *piece, &anchor, &fallback) {
                continue;
            }
            let local = match scene.world_transform(*piece) {
                Some(t) => t,
                None => continue,
            };
            let mut ours = Joint::new(joint.kind);
            ours.copy_settings_from(&joint);
            ours.anchor = local.inverse_transform_point(&anchor);
            ours.connected_anchor = local.inverse_transform_point(&connected_anchor);
            ours.axis = local
                .inverse_transform_vector(&axis)
                .try_normalize(f32::EPSILON)
                .unwrap_or(joint.axis);
            taken.push((*piece, ours));
        }
        trace!("Joint of {:?} moves to {} of {} pieces.", original, taken.len(), pieces.len());
        for (piece, ours) in taken {
            if let Some(n) = notice.scene_mut().get_mut(piece) {
                n.joint = Some(ours);
            }
        }
        for piece in pieces.iter() {
            notice.attach(*piece, self.clone());
        }
    }

    fn rewrite_other_joints(&self, notice: &mut Notice<'_>, original: NodeId, pieces: &[NodeId]) {
        let scene = notice.scene();
        let candidates = match self.search_root {
            Some(root) => {
                let mut all = vec![root];
                all.extend(scene.descendants(root));
                all
            }
            None => scene.iter().map(|(id, _)| id).collect(),
        };
        let fallback = match scene.world_position(original) {
            Some(p) => p,
            None => return,
        };

        let mut retargets = vec![];
        for holder in candidates {
            let anchor = match scene.get(holder).and_then(|n| n.joint.as_ref()) {
                Some(j) if j.connected_body == Some(original) => j.anchor,
                _ => continue,
            };
            let world_anchor = match scene.world_transform(holder) {
                Some(t) => t.transform_point(&anchor),
                None => continue,
            };
            for piece in pieces.iter() {
                if self.close_enough(scene, *piece, &world_anchor, &fallback) {
                    let body = scene.get(*piece).filter(|n| n.body.is_some()).map(|_| *piece);
                    retargets.push((holder, body));
                }
            }
        }
        for (holder, body) in retargets {
            if let Some(j) = notice.scene_mut().get_mut(holder).and_then(|n| n.joint.as_mut()) {
                j.connected_body = body;
            }
        }
    }
}

impl FractureListener for TransferJointsOnFracture {
    fn on_fracture(&mut self, notice: &mut Notice<'_>, event: &FractureEvent) {
        if event.original != notice.this() {
            return;
        }
        let pieces = match event.pieces_root {
            Some(root) => notice.scene().children(root).to_vec(),
            None => return,
        };
        self.transfer_own_joint(notice, event.original, &pieces);
        self.rewrite_other_joints(notice, event.original, &pieces);
    }

    fn duplicate(&self) -> Option<Box<dyn FractureListener>> {
        Some(Box::new(self.clone()))
    }
}
