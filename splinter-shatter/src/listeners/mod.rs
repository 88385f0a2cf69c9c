//! Stock listeners for common reactions to a fracture.

mod disable;
mod glue;
mod impulse;
mod joints;

pub use disable::DisableNodesOnFracture;
pub use glue::GlueEdgeOnFracture;
pub use impulse::ImpulseOnFracture;
pub use joints::TransferJointsOnFracture;

use model::{Aabb, NodeId, Scene};

/// Pushes every piece under `root` away from the world space center of `bounds`.
/// Returns how many pieces were pushed.
pub fn explode(scene: &mut Scene, root: NodeId, bounds: &Aabb, force: f32, radius: f32) -> usize {
    let center = match scene.world_transform(root) {
        Some(t) => t.transform_point(&bounds.center()),
        None => return 0,
    };
    scene
        .children(root)
        .to_vec()
        .into_iter()
        .filter(|piece| scene.add_explosion_force(*piece, force, &center, radius))
        .count()
}
