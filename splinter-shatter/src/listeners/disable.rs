use crate::notify::{FractureEvent, FractureListener, Notice};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use model::NodeId;

/// Deactivates a fixed set of nodes whenever the node it sits on is told about a fracture.
#[derive(Debug, Clone, Default)]
pub struct DisableNodesOnFracture {
    pub nodes: Vec<NodeId>,
}

impl DisableNodesOnFracture {
    pub fn new(nodes: Vec<NodeId>) -> Self {
        Self { nodes }
    }
}

impl FractureListener for DisableNodesOnFracture {
    fn on_fracture(&mut self, notice: &mut Notice<'_>, _: &FractureEvent) {
        for n in self.nodes.iter() {
            if !notice.scene_mut().set_active(*n, false) {
                trace!("Node {:?} to disable is gone.", n);
            }
        }
    }
}
