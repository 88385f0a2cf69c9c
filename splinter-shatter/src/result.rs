use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

use model::{Aabb, NodeId};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

#[derive(Debug, Default)]
struct Outcome {
    complete: bool,
    pieces_root: Option<NodeId>,
    bounds: Aabb,
}

#[derive(Debug, Default)]
struct Shared {
    outcome: Mutex<Outcome>,
    stop_requested: AtomicBool,
}

/// The result of a fracture. Clones observe the same fracture.
#[derive(Debug, Clone, Default)]
pub struct AsyncFractureResult {
    shared: Arc<Shared>,
}

impl AsyncFractureResult {
    pub(crate) fn pending() -> Self {
        Self::default()
    }

    pub(crate) fn completed(pieces_root: Option<NodeId>, bounds: Aabb) -> Self {
        let res = Self::pending();
        res.set_result(pieces_root, bounds);
        res
    }

    fn outcome(&self) -> MutexGuard<'_, Outcome> {
        self.shared.outcome.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True once the fracture finished or was stopped. Always true for synchronous fractures.
    pub fn is_complete(&self) -> bool {
        self.outcome().complete
    }

    /// The root of the generated pieces. None until complete, and for stopped or suspended fractures.
    pub fn pieces_root(&self) -> Option<NodeId> {
        self.outcome().pieces_root
    }

    /// Bounds of the original mesh, in its local space.
    pub fn entire_mesh_bounds(&self) -> Aabb {
        self.outcome().bounds
    }

    /// Asks the scheduler to drop the fracture on its next tick.
    pub fn stop_fracture(&self) {
        self.shared.stop_requested.store(true, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.shared.stop_requested.load(Ordering::Acquire)
    }

    /// True if both handles observe the same fracture.
    pub fn is_same(&self, other: &AsyncFractureResult) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Write once. Returns false, keeping the first values, if a result was already set.
    pub(crate) fn set_result(&self, pieces_root: Option<NodeId>, bounds: Aabb) -> bool {
        let mut outcome = self.outcome();
        if outcome.complete {
            warn!("Setting a fracture result twice. Keeping {:?}.", outcome.pieces_root);
            false
        } else {
            outcome.pieces_root = pieces_root;
            outcome.bounds = bounds;
            outcome.complete = true;
            true
        }
    }
}
