use crate::notify::{FractureEvent, FractureListener, Notice};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use model::{NodeId, Scene};
use na::{Point3, Vector3};

#[derive(Debug, Copy, Clone, PartialEq)]
struct Saved {
    velocity: Vector3<f32>,
    angular_velocity: Vector3<f32>,
    frozen: bool,
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum Phase {
    Idle,
    /// Fractured, waiting for the first `update` to learn the frame.
    Fractured(Saved),
    Settling { since: u64, saved: Saved },
}

/// Glues a fresh piece in place if it touches something tagged `collision_tag`.
///
/// On fracture the piece body is frozen. Contacts fed to `record_contact` over the next two
/// frames decide its fate: a tagged contact removes the body, leaving the piece static.
/// Otherwise the body gets gravity, its old velocity, and the impulse of every untagged hit.
/// Call `update` once per frame.
#[derive(Debug, Clone)]
pub struct GlueEdgeOnFracture {
    /// Tag of the contacts that glue. Empty glues on any contact.
    pub collision_tag: String,
    glue_contacts: u32,
    impact_mass: f32,
    impact_velocity: Vector3<f32>,
    impact_point_sum: Vector3<f32>,
    impacts: u32,
    phase: Phase,
}

impl GlueEdgeOnFracture {
    pub fn new(collision_tag: impl Into<String>) -> Self {
        Self {
            collision_tag: collision_tag.into(),
            glue_contacts: 0,
            impact_mass: 0.,
            impact_velocity: Vector3::zeros(),
            impact_point_sum: Vector3::zeros(),
            impacts: 0,
            phase: Phase::Idle,
        }
    }

    fn glues(&self, tag: &str) -> bool {
        self.collision_tag.is_empty() || self.collision_tag == tag
    }

    /// Records a collision with something tagged `tag`.
    ///
    /// # Arguments
    ///
    /// * `contacts` World space contact points.
    /// * `relative_velocity` Velocity of the other body relative to this piece.
    /// * `impact_mass` Mass of the other body, 1 if it has none.
    pub fn record_contact(
        &mut self,
        tag: &str,
        contacts: &[Point3<f32>],
        relative_velocity: Vector3<f32>,
        impact_mass: Option<f32>,
    ) {
        if self.glues(tag) {
            self.glue_contacts += 1;
            return;
        }
        self.impact_mass += impact_mass.unwrap_or(1.);
        self.impact_velocity += relative_velocity;
        if !contacts.is_empty() {
            let sum = contacts.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords);
            self.impact_point_sum += sum / contacts.len() as f32;
            self.impacts += 1;
        }
    }

    /// Records an overlap with a trigger volume tagged `tag`.
    pub fn record_trigger(&mut self, tag: &str) {
        if self.glues(tag) {
            self.glue_contacts += 1;
        }
    }

    /// True between a fracture and the frame the body is released.
    pub fn is_settling(&self) -> bool {
        !matches!(self.phase, Phase::Idle)
    }

    /// Advances the glue decision for the piece `this`.
    pub fn update(&mut self, scene: &mut Scene, this: NodeId, frame: u64) {
        let (since, saved) = match self.phase {
            Phase::Idle => return,
            Phase::Fractured(saved) => (frame, saved),
            Phase::Settling { since, saved } => (since, saved),
        };
        if frame >= since + 2 {
            self.release(scene, this, saved);
            return;
        }
        self.phase = Phase::Settling { since, saved };
        let glued = self.glue_contacts > 0;
        let body = match scene.get_mut(this) {
            Some(n) => &mut n.body,
            None => return,
        };
        if glued {
            if body.take().is_some() {
                debug!("Glued {:?} in place.", this);
            }
        } else if let Some(b) = body.as_mut() {
            b.kinematic = false;
            b.use_gravity = true;
        }
    }

    fn release(&mut self, scene: &mut Scene, this: NodeId, saved: Saved) {
        self.phase = Phase::Idle;
        self.glue_contacts = 0;
        let mass = match scene.get_mut(this).and_then(|n| n.body.as_mut()) {
            Some(b) => {
                b.frozen = saved.frozen;
                b.velocity = saved.velocity;
                b.angular_velocity = saved.angular_velocity;
                b.mass
            }
            None => return,
        };
        if self.impacts > 0 && mass + self.impact_mass > 0. {
            let point = Point3::from(self.impact_point_sum / self.impacts as f32);
            let velocity = self.impact_velocity * (self.impact_mass / (mass + self.impact_mass));
            scene.add_impulse_at(this, &(velocity * mass), &point);
        }
    }
}

impl FractureListener for GlueEdgeOnFracture {
    fn on_fracture(&mut self, notice: &mut Notice<'_>, event: &FractureEvent) {
        // Only pieces glue. The broken node itself is on its way out.
        if event.original == notice.this() {
            return;
        }
        let this = notice.this();
        let body = match notice.scene_mut().get_mut(this).and_then(|n| n.body.as_mut()) {
            Some(b) => b,
            None => return,
        };
        body.kinematic = false;
        let saved = Saved {
            velocity: body.velocity,
            angular_velocity: body.angular_velocity,
            frozen: body.frozen,
        };
        body.frozen = true;
        self.impact_mass = 0.;
        self.impact_velocity = Vector3::zeros();
        self.impact_point_sum = Vector3::zeros();
        self.impacts = 0;
        self.phase = Phase::Fractured(saved);
    }

    fn duplicate(&self) -> Option<Box<dyn FractureListener>> {
        Some(Box::new(Self::new(self.collision_tag.clone())))
    }
}
