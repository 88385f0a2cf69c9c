extern crate nalgebra as na;
extern crate splinter_model as model;
extern crate splinter_shatter as shatter;

mod common;

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use common::{cube, piece_count, rig, stepped_world};
use na::{Point3, Vector3};
use shatter::{FractureEvent, FractureGeometry, FractureListener, Notice};

fn baked() -> FractureGeometry {
    FractureGeometry::pre_fractured().with_counts(3, 1)
}

#[test]
fn generation_caches_inactive_pieces() {
    let (mut world, calls) = stepped_world(1);
    let rig = rig(&mut world);
    let node = cube(&mut world, &rig, "Statue", baked());

    let res = world.generate_fracture_meshes(node, Point3::origin(), false).unwrap();
    assert!(res.is_complete());
    let root = world.geometry(node).unwrap().generated_pieces().unwrap();
    assert_eq!(res.pieces_root(), Some(root));
    assert_eq!(piece_count(&world, root), 3);
    assert!(!world.scene.active_self(root));
    assert!(world.scene.active_self(node));
    assert!(!world.geometry(node).unwrap().entire_mesh_bounds().is_zero_volume());
    assert_eq!(calls.decomposed(), 1);
}

#[test]
fn regeneration_replaces_cache() {
    let (mut world, _) = stepped_world(1);
    let rig = rig(&mut world);
    let node = cube(&mut world, &rig, "Statue", baked());

    world.generate_fracture_meshes(node, Point3::origin(), false).unwrap();
    let first = world.geometry(node).unwrap().generated_pieces().unwrap();
    world.generate_fracture_meshes(node, Point3::origin(), false).unwrap();
    let second = world.geometry(node).unwrap().generated_pieces().unwrap();
    assert_ne!(first, second);
    assert!(!world.scene.contains(first));
}

#[derive(Clone)]
struct Tally(Arc<AtomicUsize>);
impl FractureListener for Tally {
    fn on_fracture(&mut self, _: &mut Notice<'_>, _: &FractureEvent) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
    fn duplicate(&self) -> Option<Box<dyn FractureListener>> {
        Some(Box::new(self.clone()))
    }
}

#[test]
fn fracture_reuses_cache() {
    let (mut world, calls) = stepped_world(1);
    let rig = rig(&mut world);
    let node = cube(&mut world, &rig, "Statue", baked());
    world.generate_fracture_meshes(node, Point3::origin(), false).unwrap();
    let cached = world.geometry(node).unwrap().generated_pieces().unwrap();

    let tally = Arc::new(AtomicUsize::new(0));
    world.listeners.register(node, Tally(tally.clone()));
    for piece in world.scene.children(cached).to_vec() {
        world.listeners.register(piece, Tally(tally.clone()));
    }
    world.scene.node_mut(node).unwrap().local.pos = Vector3::new(0., 4., 0.);

    let res = world.fracture(node).unwrap();
    assert!(res.is_complete());
    assert_eq!(res.pieces_root(), Some(cached));
    assert_eq!(calls.decomposed(), 1);
    assert!(world.scene.active_self(cached));
    assert!(!world.scene.active_self(node));
    assert_eq!(tally.load(Ordering::SeqCst), 4);
    let placed = world.scene.world_position(cached).unwrap();
    assert!((placed - Point3::new(0., 4., 0.)).norm() < 1e-5);
    // The cache survives its own reuse.
    assert_eq!(world.geometry(node).unwrap().generated_pieces(), Some(cached));
}

#[test]
fn fracture_without_cache_generates_first() {
    let (mut world, calls) = stepped_world(1);
    let rig = rig(&mut world);
    let node = cube(&mut world, &rig, "Statue", baked());

    let res = world.fracture(node).unwrap();
    assert!(res.is_complete());
    let root = res.pieces_root().unwrap();
    assert_eq!(world.geometry(node).unwrap().generated_pieces(), Some(root));
    assert!(world.scene.active_self(root));
    assert!(!world.scene.active_self(node));
    assert_eq!(calls.decomposed(), 1);
}

#[test]
fn inactive_node_fractures_empty() {
    let (mut world, calls) = stepped_world(1);
    let rig = rig(&mut world);
    let node = cube(&mut world, &rig, "Statue", baked());
    world.scene.set_active(node, false);

    let res = world.fracture(node).unwrap();
    assert!(res.is_complete());
    assert_eq!(res.pieces_root(), None);
    assert_eq!(calls.decomposed(), 0);
}

#[test]
fn prime_restores_activity() {
    let (mut world, _) = stepped_world(1);
    let rig = rig(&mut world);
    let node = cube(&mut world, &rig, "Statue", baked());
    world.generate_fracture_meshes(node, Point3::origin(), false).unwrap();
    let root = world.geometry(node).unwrap().generated_pieces().unwrap();

    world.prime(node);
    assert!(world.scene.active_self(node));
    assert!(!world.scene.active_self(root));
}

#[test]
fn stopping_async_generation() {
    let (mut world, calls) = stepped_world(5);
    let rig = rig(&mut world);
    let node = cube(&mut world, &rig, "Statue", baked());

    let res = world.generate_fracture_meshes(node, Point3::origin(), true).unwrap();
    assert!(!res.is_complete());
    assert!(world.geometry(node).unwrap().is_processing_fracture());
    world.tick();

    world.stop_running_fracture(node);
    assert!(!world.geometry(node).unwrap().is_processing_fracture());
    world.tick();
    assert!(res.is_complete());
    assert_eq!(res.pieces_root(), None);
    assert_eq!(world.geometry(node).unwrap().generated_pieces(), None);
    assert_eq!(calls.cancelled(), 1);
}

#[test]
fn async_generation_finishes_on_tick() {
    let (mut world, _) = stepped_world(2);
    let rig = rig(&mut world);
    let node = cube(&mut world, &rig, "Statue", baked());

    let res = world.generate_fracture_meshes(node, Point3::origin(), true).unwrap();
    world.tick();
    world.tick();
    assert!(res.is_complete());
    let root = world.geometry(node).unwrap().generated_pieces().unwrap();
    assert_eq!(res.pieces_root(), Some(root));
    assert!(!world.scene.active_self(root));
    assert!(!world.geometry(node).unwrap().is_processing_fracture());
}

#[test]
fn restarted_generation_keeps_its_guard() {
    let (mut world, _) = stepped_world(3);
    let rig = rig(&mut world);
    let node = cube(&mut world, &rig, "Statue", baked());

    let first = world.generate_fracture_meshes(node, Point3::origin(), true).unwrap();
    world.tick();
    world.stop_running_fracture(node);
    let second = world.generate_fracture_meshes(node, Point3::origin(), true).unwrap();
    world.tick();

    assert!(first.is_complete());
    assert_eq!(first.pieces_root(), None);
    assert!(!second.is_complete());
    assert!(world.geometry(node).unwrap().is_processing_fracture());
    assert!(world.generate_fracture_meshes(node, Point3::origin(), true).is_none());
    assert!(world.fracture(node).is_none());
    assert_eq!(world.scheduler().operation_count(), 1);

    world.tick();
    world.tick();
    assert!(second.is_complete());
    let root = world.geometry(node).unwrap().generated_pieces().unwrap();
    assert_eq!(second.pieces_root(), Some(root));
    assert!(!world.geometry(node).unwrap().is_processing_fracture());
    let roots = world
        .scene
        .iter()
        .filter(|(_, n)| n.name.ends_with("Fracture Root"))
        .count();
    assert_eq!(roots, 1);
}

#[test]
fn cached_fracture_reaches_notify_list() {
    let (mut world, _) = stepped_world(1);
    let rig = rig(&mut world);
    let node = cube(&mut world, &rig, "Statue", baked());
    let watcher = world.scene.spawn("Watcher");
    let tally = Arc::new(AtomicUsize::new(0));
    world.listeners.register(watcher, Tally(tally.clone()));
    world.geometry_mut(node).unwrap().notify.push(watcher);

    world.generate_fracture_meshes(node, Point3::origin(), false).unwrap();
    assert_eq!(tally.load(Ordering::SeqCst), 1);
    world.fracture(node).unwrap();
    assert_eq!(tally.load(Ordering::SeqCst), 2);
}
