//! Decomposition contract: turn a spec + mesh into piece meshes, possibly over several polls.

pub mod wedge;

use std::sync::Arc;

use crate::{error::ShatterError, spec::FractureSpec};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use model::{Aabb, TriMesh};
use na::Vector3;
use th::KillableThread;

/// One output piece, in piece local space.
#[derive(Debug, Clone)]
pub struct PieceMesh {
    /// Non-empty source submeshes in source order, then one inside submesh.
    pub mesh: TriMesh,
    /// Where the piece's origin sits in the source's local space.
    pub offset: Vector3<f32>,
    /// One entry per source submesh, true if the piece has none of its triangles.
    pub empty_slots: Vec<bool>,
}
impl PieceMesh {
    pub fn empty_triangle_count(&self) -> usize {
        self.empty_slots.iter().filter(|e| **e).count()
    }
}

#[derive(Debug, Clone)]
pub struct DecompositionResult {
    pub pieces: Vec<PieceMesh>,
    /// Bounds of the whole (scaled) source mesh in its local space.
    pub bounds: Aabb,
}
impl DecompositionResult {
    pub fn empty() -> Self {
        Self {
            pieces: vec![],
            bounds: Aabb::zero(),
        }
    }
}

/// A decomposition in flight.
pub trait OperationHandle: Send {
    /// Polls the decomposition. Synchronous specs must report true on the first poll.
    fn is_complete(&mut self) -> bool;
    /// The result, once. None if the decomposition died without producing one.
    fn take_result(&mut self) -> Option<DecompositionResult>;
    /// Best effort request to abandon work. The result is never read afterwards.
    fn cancel(&mut self) {}
}

pub trait Decomposer {
    /// `spec` already carries the resolved scale; `mesh` is the resolved source mesh.
    fn decompose(&self, spec: &FractureSpec, mesh: Arc<TriMesh>) -> Result<Box<dyn OperationHandle>, ShatterError>;
}

/// Handle for work that finished inside `decompose`.
pub struct ReadyHandle(Option<DecompositionResult>);
impl ReadyHandle {
    pub fn new(result: Option<DecompositionResult>) -> Self {
        Self(result)
    }
}
impl OperationHandle for ReadyHandle {
    fn is_complete(&mut self) -> bool {
        true
    }
    fn take_result(&mut self) -> Option<DecompositionResult> {
        self.0.take()
    }
}

/// Handle for work running on a `KillableThread`. The result crosses back when a poll joins it.
pub struct ThreadedHandle {
    worker: Option<KillableThread<Option<DecompositionResult>>>,
    result: Option<DecompositionResult>,
}
impl ThreadedHandle {
    pub fn new(worker: KillableThread<Option<DecompositionResult>>) -> Self {
        Self {
            worker: Some(worker),
            result: None,
        }
    }
}
impl OperationHandle for ThreadedHandle {
    fn is_complete(&mut self) -> bool {
        let polled = match self.worker.as_mut() {
            Some(w) => w.poll(),
            None => return true,
        };
        match polled {
            None => false,
            Some(Ok(result)) => {
                self.result = result;
                self.worker = None;
                true
            }
            Some(Err(_)) => {
                error!("Decomposition worker panicked.");
                self.worker = None;
                true
            }
        }
    }
    fn take_result(&mut self) -> Option<DecompositionResult> {
        self.result.take()
    }
    fn cancel(&mut self) {
        if let Some(w) = self.worker.as_mut() {
            w.kill();
        }
    }
}

/// Wedge decomposition, inline for synchronous specs and on a worker thread otherwise.
#[derive(Debug, Default, Copy, Clone)]
pub struct WedgeDecomposer;

impl Decomposer for WedgeDecomposer {
    fn decompose(&self, spec: &FractureSpec, mesh: Arc<TriMesh>) -> Result<Box<dyn OperationHandle>, ShatterError> {
        if spec.is_asynchronous() {
            let spec = spec.clone();
            let worker = KillableThread::new("Fracture".to_string(), move |signal| {
                wedge::decompose(&spec, &mesh, Some(&signal))
            })?;
            Ok(Box::new(ThreadedHandle::new(worker)))
        } else {
            Ok(Box::new(ReadyHandle::new(wedge::decompose(spec, &mesh, None))))
        }
    }
}
