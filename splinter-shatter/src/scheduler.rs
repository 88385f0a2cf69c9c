//! # Fracture scheduler
//!
//! Registry of in-flight fractures. Synchronous requests run to completion inside `submit`,
//! asynchronous ones advance once per `tick` in registration order.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use crate::{
    decompose::{Decomposer, DecompositionResult, WedgeDecomposer},
    error::{ConfigurationError, ShatterError},
    materialize,
    operation::{FractureOperation, Step},
    result::AsyncFractureResult,
    spec::FractureSpec,
    FractureCtx,
};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use model::{Aabb, NodeId};
use na::Vector3;

/// Shared suspension flag. Flipping it only affects requests made afterwards.
#[derive(Debug, Clone, Default)]
pub struct SuspendSwitch(Arc<AtomicBool>);
impl SuspendSwitch {
    pub fn is_suspended(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
    pub fn set_suspended(&self, suspended: bool) {
        self.0.store(suspended, Ordering::Release);
    }
}

pub struct FractureScheduler {
    decomposer: Box<dyn Decomposer>,
    running: Vec<FractureOperation>,
    suspended: SuspendSwitch,
}

impl Default for FractureScheduler {
    fn default() -> Self {
        Self::new(Box::new(WedgeDecomposer))
    }
}

impl FractureScheduler {
    pub fn new(decomposer: Box<dyn Decomposer>) -> Self {
        Self::with_switch(decomposer, SuspendSwitch::default())
    }

    pub fn with_switch(decomposer: Box<dyn Decomposer>, suspended: SuspendSwitch) -> Self {
        Self {
            decomposer,
            running: vec![],
            suspended,
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.is_suspended()
    }
    pub fn set_suspended(&self, suspended: bool) {
        self.suspended.set_suspended(suspended);
    }
    pub fn suspend_switch(&self) -> SuspendSwitch {
        self.suspended.clone()
    }

    pub fn has_operations_in_progress(&self) -> bool {
        !self.running.is_empty()
    }
    pub fn operation_count(&self) -> usize {
        self.running.len()
    }

    /// Registers a fracture of `requester`.
    ///
    /// # Remarks
    ///
    /// While suspended this returns an already complete, empty result without looking at the
    /// request. Rejected requests register nothing.
    pub fn submit(
        &mut self,
        ctx: &mut FractureCtx<'_>,
        spec: FractureSpec,
        requester: NodeId,
        pieces_parent: Option<NodeId>,
        transfer_mass: bool,
        hide_after: bool,
    ) -> Result<AsyncFractureResult, ShatterError> {
        if self.is_suspended() {
            trace!("Fracturing is suspended, {:?} resolves empty.", requester);
            return Ok(AsyncFractureResult::completed(None, Aabb::zero()));
        }
        spec.validate()?;

        let node = ctx
            .scene
            .get(requester)
            .ok_or(ConfigurationError::UnknownRequester(requester))?;
        let geometry = ctx
            .geometries
            .get(requester)
            .ok_or(ConfigurationError::NotFracturable(requester))?;
        let template = geometry
            .piece_template
            .ok_or(ConfigurationError::MissingTemplate(requester))?;
        if !ctx.scene.get(template).map(|t| t.mesh_filter.is_some()).unwrap_or(false) {
            return Err(ConfigurationError::TemplateWithoutMeshFilter(template).into());
        }
        let mesh = spec
            .mesh()
            .cloned()
            .or_else(|| node.mesh())
            .ok_or(ConfigurationError::MissingMesh(requester))?;
        let scale = if spec.scale() == Vector3::zeros() {
            node.local.scaling
        } else {
            spec.scale()
        };
        let asynchronous = spec.is_asynchronous();
        let spec = spec.with_mesh(mesh.clone()).with_scale(scale);

        let mut op = FractureOperation::new(spec, mesh, requester, pieces_parent, transfer_mass, hide_after);
        let output = op.output().clone();
        if asynchronous {
            debug!("Queued asynchronous fracture of {:?}.", requester);
            self.running.push(op);
            return Ok(output);
        }

        loop {
            match op.advance(&*self.decomposer)? {
                Step::Yield => {
                    warn!(
                        "Synchronous fracture of {:?} needed extra step {}.",
                        requester,
                        op.steps()
                    );
                    thread::yield_now();
                }
                Step::Done(result) => {
                    Self::complete(ctx, &op, result);
                    break;
                }
                Step::Cancelled => {
                    Self::release(ctx, &op);
                    break;
                }
            }
        }
        Ok(output)
    }

    /// Advances every operation once, dropping the ones that finished or were stopped.
    pub fn tick(&mut self, ctx: &mut FractureCtx<'_>) {
        let decomposer = &*self.decomposer;
        self.running.retain_mut(|op| match op.advance(decomposer) {
            Ok(Step::Yield) => true,
            Ok(Step::Done(result)) => {
                Self::complete(ctx, op, result);
                false
            }
            Ok(Step::Cancelled) => {
                Self::release(ctx, op);
                false
            }
            Err(e) => {
                error!("Fracture of {:?} failed to start: {}", op.requester(), e);
                op.cancel();
                Self::release(ctx, op);
                false
            }
        });
    }

    fn complete(ctx: &mut FractureCtx<'_>, op: &FractureOperation, result: Option<DecompositionResult>) {
        let result = match result {
            Some(r) => r,
            None => {
                error!("Fracture of {:?} completed without a result.", op.requester());
                op.output().set_result(None, Aabb::zero());
                Self::release(ctx, op);
                return;
            }
        };
        match materialize::materialize(ctx, op, result) {
            Ok((root, bounds)) => {
                op.output().set_result(Some(root), bounds);
            }
            Err(e) => {
                error!("Failed to build pieces for {:?}: {}", op.requester(), e);
                op.output().set_result(None, Aabb::zero());
            }
        }
        Self::release(ctx, op);
    }

    /// Clears the requester's in-progress flag if `op` is the fracture holding it.
    fn release(ctx: &mut FractureCtx<'_>, op: &FractureOperation) {
        if let Some(g) = ctx.geometries.get_mut(op.requester()) {
            if !g.release(op.output()) && g.is_processing_fracture() {
                trace!("{:?} is guarded by a newer fracture, leaving it set.", op.requester());
            }
        }
    }
}

impl Drop for FractureScheduler {
    fn drop(&mut self) {
        if !self.running.is_empty() {
            debug!("Cancelling {} fractures on scheduler teardown.", self.running.len());
        }
        for op in self.running.iter_mut() {
            op.cancel();
        }
    }
}
