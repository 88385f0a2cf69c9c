#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use shatter::{
    decompose::wedge, Decomposer, DecompositionResult, FractureGeometry, FractureSpec, FractureWorld,
    OperationHandle, ShatterError,
};
use model::{unit_cube, Material, Node, NodeId, RigidBody, TriMesh};

/// Counts what a `StepDecomposer` was asked to do.
#[derive(Debug, Clone, Default)]
pub struct Calls {
    decomposed: Arc<AtomicUsize>,
    cancelled: Arc<AtomicUsize>,
}
impl Calls {
    pub fn decomposed(&self) -> usize {
        self.decomposed.load(Ordering::SeqCst)
    }
    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Wedge decomposition that only reports completion on its `polls`-th poll.
pub struct StepDecomposer {
    pub polls: u32,
    pub calls: Calls,
}

struct StepHandle {
    polled: u32,
    needed: u32,
    result: Option<DecompositionResult>,
    cancelled: Arc<AtomicUsize>,
}
impl OperationHandle for StepHandle {
    fn is_complete(&mut self) -> bool {
        self.polled += 1;
        self.polled >= self.needed
    }
    fn take_result(&mut self) -> Option<DecompositionResult> {
        self.result.take()
    }
    fn cancel(&mut self) {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
    }
}

impl Decomposer for StepDecomposer {
    fn decompose(&self, spec: &FractureSpec, mesh: Arc<TriMesh>) -> Result<Box<dyn OperationHandle>, ShatterError> {
        self.calls.decomposed.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StepHandle {
            polled: 0,
            needed: self.polls,
            result: wedge::decompose(spec, &mesh, None),
            cancelled: self.calls.cancelled.clone(),
        }))
    }
}

pub fn stepped_world(polls: u32) -> (FractureWorld, Calls) {
    let calls = Calls::default();
    let world = FractureWorld::with_decomposer(Box::new(StepDecomposer {
        polls,
        calls: calls.clone(),
    }));
    (world, calls)
}

pub struct Rig {
    pub template: NodeId,
    pub stone: Arc<Material>,
    pub inside: Arc<Material>,
}

/// An inactive piece template with a mesh filter, renderer, collider and body.
pub fn rig(world: &mut FractureWorld) -> Rig {
    let template = world.scene.insert(
        Node::new("Piece Template")
            .with_mesh_filter()
            .with_materials(vec![])
            .with_collider()
            .with_body(RigidBody::default()),
    );
    world.scene.set_active(template, false);
    Rig {
        template,
        stone: Arc::new(Material::new("Stone")),
        inside: Arc::new(Material::new("Inside")),
    }
}

/// A unit cube with a renderer, collider and a body of mass 2, fracturable through `geometry`.
pub fn cube(world: &mut FractureWorld, rig: &Rig, name: &str, geometry: FractureGeometry) -> NodeId {
    let node = world.scene.insert(
        Node::new(name)
            .with_mesh(Arc::new(unit_cube()))
            .with_materials(vec![rig.stone.clone()])
            .with_collider()
            .with_body(RigidBody::with_mass(2.)),
    );
    world.add_geometry(
        node,
        geometry
            .with_template(rig.template)
            .with_inside_material(rig.inside.clone()),
    );
    node
}

pub fn piece_count(world: &FractureWorld, root: NodeId) -> usize {
    world.scene.children(root).len()
}
