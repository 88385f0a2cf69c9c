extern crate nalgebra as na;
extern crate simple_logger;
extern crate splinter_model as model;
extern crate splinter_shatter as shatter;

mod config;

use std::{
    error::Error,
    sync::Arc,
    time::{Duration, Instant},
};

use clap::Parser;
use config::{Args, Config, DEFAULT_CONFIGURATION_PATHS};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use model::{unit_cube, Material, Node, NodeId, RigidBody};
use na::{Point3, Vector3};
use shatter::{
    listeners::{explode, ImpulseOnFracture},
    AsyncFractureResult, FractureGeometry, FractureWorld,
};

const EXPLOSION_FORCE: f32 = 4.;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Action {
    Continue,
    Exit,
}

struct State {
    world: FractureWorld,
    cube: NodeId,
    pending: Option<AsyncFractureResult>,
    refractured: bool,
    frame: u32,
    c: Config,
}
impl State {
    fn new(c: Config) -> State {
        let mut world = FractureWorld::new();
        let stone = Arc::new(Material::new("Stone").with_diffuse([0.6, 0.6, 0.6, 1.]));
        let inside = Arc::new(Material::new("Inside").with_diffuse([0.8, 0.3, 0.2, 1.]));

        let template = world.scene.insert(
            Node::new("Piece Template")
                .with_mesh_filter()
                .with_materials(vec![])
                .with_collider()
                .with_body(RigidBody::default()),
        );
        world.scene.set_active(template, false);
        world.add_geometry(
            template,
            FractureGeometry::runtime()
                .with_counts(c.pieces, c.iterations)
                .asynchronous(c.asynchronous),
        );

        let cube = world.scene.insert(
            Node::new("Cube")
                .at(Vector3::new(0., 1., 0.))
                .with_mesh(Arc::new(unit_cube()))
                .with_materials(vec![stone])
                .with_collider()
                .with_body(RigidBody::with_mass(10.)),
        );
        world.add_geometry(
            cube,
            FractureGeometry::runtime()
                .with_template(template)
                .with_inside_material(inside)
                .with_counts(c.pieces, c.iterations)
                .with_generations(c.generations)
                .with_radius(c.radius)
                .asynchronous(c.asynchronous),
        );
        world.listeners.register(cube, ImpulseOnFracture::new(5.));
        info!("Finished initial setup.");
        State {
            world,
            cube,
            pending: None,
            refractured: false,
            frame: 0,
            c,
        }
    }

    /// Throws something at the cube. Fractures it where it hit if the hit was hard enough.
    fn strike(&mut self) {
        let contact = Point3::new(0., 1.5, 0.);
        let hit = self
            .world
            .listeners
            .get_mut::<ImpulseOnFracture>(self.cube)
            .and_then(|l| l.record_impact(&[contact], Vector3::new(0., -8., 0.), Some(2.), None, None));
        let local = match (hit, self.world.scene.world_transform(self.cube)) {
            (Some(p), Some(t)) => t.inverse_transform_point(&p),
            _ => {
                info!("The cube shrugged off the hit.");
                return;
            }
        };
        debug!("Striking the cube at {:?}.", local);
        self.pending = self.world.fracture_at(self.cube, local);
    }

    fn on_complete(&mut self, res: AsyncFractureResult) {
        let root = match res.pieces_root() {
            Some(r) => r,
            None => {
                info!("Fracture resolved without pieces.");
                return;
            }
        };
        let pieces = self.world.scene.children(root).to_vec();
        info!(
            "{} fractured into {} pieces.",
            self.world.scene.node(root).map(|n| n.name.as_str()).unwrap_or("?"),
            pieces.len()
        );
        let pushed = explode(&mut self.world.scene, root, &res.entire_mesh_bounds(), EXPLOSION_FORCE, 0.);
        debug!("Pushed {} pieces apart.", pushed);

        if self.refractured {
            return;
        }
        self.refractured = true;
        match pieces.first() {
            Some(piece) => {
                info!("Fracturing a piece of the cube again.");
                self.pending = self.world.fracture(*piece);
                if self.pending.is_none() {
                    info!("The piece cannot fracture any further.");
                }
            }
            None => warn!("No piece to fracture again."),
        }
    }

    /// Moves every active body along its velocity.
    fn integrate(&mut self, delta: Duration) {
        let dt = delta.as_secs_f32();
        let ids: Vec<NodeId> = self.world.scene.iter().map(|(id, _)| id).collect();
        for id in ids {
            if !self.world.scene.active_in_hierarchy(id) {
                continue;
            }
            if let Some(n) = self.world.scene.get_mut(id) {
                if let Some(v) = n.body.as_ref().filter(|b| !b.kinematic && !b.frozen).map(|b| b.velocity) {
                    n.local.pos += v * dt;
                }
            }
        }
    }

    fn step(&mut self, delta: Duration) -> Action {
        if self.frame == 0 {
            self.strike();
        }
        self.frame += 1;
        self.world.tick();
        self.integrate(delta);

        if let Some(res) = self.pending.take() {
            if res.is_complete() {
                self.on_complete(res);
            } else {
                self.pending = Some(res);
            }
        }
        if self.pending.is_none() && !self.world.has_fractures_in_progress() {
            return Action::Exit;
        }
        if self.frame >= self.c.max_frames {
            warn!("Giving up after {} frames.", self.frame);
            return Action::Exit;
        }
        Action::Continue
    }

    fn cleanup(self) {
        info!(
            "{} nodes in the scene after {} frames, {} fractures still running.",
            self.world.scene.len(),
            self.frame,
            self.world.scheduler().operation_count()
        );
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let c = Config::load(DEFAULT_CONFIGURATION_PATHS, &args)?;
    simple_logger::init_with_level(c.level()?).map_err(|e| e.to_string())?;
    match &c.source {
        Some(path) => info!("Configuration loaded from {:?}.", path),
        None => info!("No configuration file, using defaults."),
    }
    debug!("Running with {:?}.", c);

    let target_frame_time = Duration::from_secs(1) / c.frame_rate.max(1);
    let mut s = State::new(c);
    info!("Beginning Loop!");
    let mut last_frame = Instant::now();
    loop {
        let curr_frame = Instant::now();
        let time_step = curr_frame - last_frame;
        trace!("Frame begin. {:?} since last frame.", time_step);
        if s.step(time_step) == Action::Exit {
            break;
        }
        last_frame = curr_frame;
        let sim_duration = Instant::now() - curr_frame;
        trace!("Frame took {:?} to simulate.", sim_duration);
        if target_frame_time > sim_duration {
            std::thread::sleep(target_frame_time - sim_duration);
        }
    }
    info!("Beginning Cleanup!");
    s.cleanup();
    info!("And that's all for today, folks!");
    Ok(())
}
