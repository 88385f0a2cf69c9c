use std::sync::Arc;

use crate::{
    decompose::{Decomposer, DecompositionResult, OperationHandle},
    error::ShatterError,
    result::AsyncFractureResult,
    spec::FractureSpec,
};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use model::{Aabb, NodeId, TriMesh};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Status {
    Pending,
    Running,
    Complete,
    Cancelled,
}

/// What one `advance` produced.
pub(crate) enum Step {
    /// Still decomposing, come back next tick.
    Yield,
    /// Decomposition finished. None if the decomposer lost its result.
    Done(Option<DecompositionResult>),
    Cancelled,
}

/// One registered fracture, from submit until it is materialized or dropped.
pub struct FractureOperation {
    spec: FractureSpec,
    mesh: Arc<TriMesh>,
    status: Status,
    handle: Option<Box<dyn OperationHandle>>,
    requester: NodeId,
    pieces_parent: Option<NodeId>,
    transfer_mass: bool,
    hide_after: bool,
    output: AsyncFractureResult,
    steps: u32,
}

impl FractureOperation {
    pub(crate) fn new(
        spec: FractureSpec,
        mesh: Arc<TriMesh>,
        requester: NodeId,
        pieces_parent: Option<NodeId>,
        transfer_mass: bool,
        hide_after: bool,
    ) -> Self {
        Self {
            spec,
            mesh,
            status: Status::Pending,
            handle: None,
            requester,
            pieces_parent,
            transfer_mass,
            hide_after,
            output: AsyncFractureResult::pending(),
            steps: 0,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }
    pub fn spec(&self) -> &FractureSpec {
        &self.spec
    }
    pub fn requester(&self) -> NodeId {
        self.requester
    }
    pub fn pieces_parent(&self) -> Option<NodeId> {
        self.pieces_parent
    }
    pub fn transfers_mass(&self) -> bool {
        self.transfer_mass
    }
    pub fn hides_source(&self) -> bool {
        self.hide_after
    }
    /// Number of times `advance` has run.
    pub fn steps(&self) -> u32 {
        self.steps
    }
    pub fn output(&self) -> &AsyncFractureResult {
        &self.output
    }

    /// Runs one unit of work. The first call starts the decomposition.
    pub(crate) fn advance(&mut self, decomposer: &dyn Decomposer) -> Result<Step, ShatterError> {
        match self.status {
            Status::Complete | Status::Cancelled => return Ok(Step::Cancelled),
            Status::Pending | Status::Running => (),
        }
        if self.output.stop_requested() {
            debug!("Fracture of {:?} stopped after {} steps.", self.requester, self.steps);
            self.cancel();
            return Ok(Step::Cancelled);
        }
        self.steps += 1;
        if self.handle.is_none() {
            self.status = Status::Running;
            self.handle = Some(decomposer.decompose(&self.spec, self.mesh.clone())?);
        }
        let done = self.handle.as_mut().map_or(true, |h| h.is_complete());
        if !done {
            return Ok(Step::Yield);
        }
        let result = self.handle.take().and_then(|mut h| h.take_result());
        self.status = Status::Complete;
        Ok(Step::Done(result))
    }

    /// Drops the operation without materializing. The handle reads complete with no pieces.
    pub(crate) fn cancel(&mut self) {
        if let Some(mut h) = self.handle.take() {
            h.cancel();
        }
        self.status = Status::Cancelled;
        if !self.output.is_complete() {
            self.output.set_result(None, Aabb::zero());
        }
    }
}
