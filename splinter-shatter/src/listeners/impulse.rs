use crate::notify::{FractureEvent, FractureListener, Notice};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use model::NodeId;
use na::{Point3, Vector3};

#[derive(Debug, Copy, Clone, PartialEq)]
struct Impact {
    velocity: Vector3<f32>,
    mass: f32,
    point: Point3<f32>,
    body: Option<NodeId>,
}

/// Carries the momentum of the hit that broke a node over to its pieces.
///
/// Feed collisions to `record_impact`; when it returns a point, fracture the node there.
#[derive(Debug, Clone)]
pub struct ImpulseOnFracture {
    /// Minimum impact force (`0.5 * m * |v| * v`) that breaks the node.
    pub force_threshold: f32,
    /// Pieces this far from the impact get nothing. Non-positive disables falloff.
    pub force_falloff_radius: f32,
    /// Push a kinematic node's impactor back as if the node had given way.
    pub adjust_for_kinematic: bool,
    impact: Option<Impact>,
}

impl ImpulseOnFracture {
    pub fn new(force_threshold: f32) -> Self {
        Self {
            force_threshold,
            force_falloff_radius: 1.,
            adjust_for_kinematic: true,
            impact: None,
        }
    }

    /// Records a collision. Returns the world space impact point if it was hard enough to fracture.
    ///
    /// # Arguments
    ///
    /// * `contacts` World space contact points.
    /// * `relative_velocity` Velocity of the impactor relative to this node.
    /// * `impact_mass` Mass of the impactor, 1 if it has no body.
    /// * `own_velocity` Velocity of this node's body, if any. The impact is flipped to point along it.
    /// * `impact_body` The impactor's node, pushed back when this node is kinematic.
    pub fn record_impact(
        &mut self,
        contacts: &[Point3<f32>],
        relative_velocity: Vector3<f32>,
        impact_mass: Option<f32>,
        own_velocity: Option<Vector3<f32>>,
        impact_body: Option<NodeId>,
    ) -> Option<Point3<f32>> {
        if contacts.is_empty() {
            return None;
        }
        let mass = impact_mass.unwrap_or(1.);
        let mut velocity = relative_velocity;
        if let Some(own) = own_velocity {
            if own.dot(&velocity) < 0. {
                velocity = -velocity;
            }
        }
        let force = velocity * (0.5 * mass * velocity.norm());
        if self.force_threshold * self.force_threshold > force.norm_squared() {
            return None;
        }
        let sum = contacts.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords);
        let point = Point3::from(sum / contacts.len() as f32);
        self.impact = Some(Impact {
            velocity,
            mass,
            point,
            body: impact_body,
        });
        Some(point)
    }
}

impl FractureListener for ImpulseOnFracture {
    fn on_fracture(&mut self, notice: &mut Notice<'_>, event: &FractureEvent) {
        if event.original != notice.this() {
            return;
        }
        let (impact, root) = match (self.impact.take(), event.pieces_root) {
            (Some(i), Some(r)) => (i, r),
            _ => return,
        };
        let scene = notice.scene_mut();
        let radius_sq = self.force_falloff_radius * self.force_falloff_radius;
        for piece in scene.children(root).to_vec() {
            let (mass, pos) = match (scene.get(piece).and_then(|n| n.body.as_ref()), scene.world_position(piece)) {
                (Some(b), Some(p)) => (b.mass, p),
                _ => continue,
            };
            let mut velocity = impact.velocity * (impact.mass / (mass + impact.mass));
            if self.force_falloff_radius > 0. {
                let dist_sq = (pos.coords - impact.point.coords).norm_squared();
                velocity *= (1. - dist_sq / radius_sq).clamp(0., 1.);
            }
            scene.add_impulse_at(piece, &(velocity * mass), &impact.point);
        }

        if self.adjust_for_kinematic {
            let own = scene.get(event.original).and_then(|n| n.body.as_ref());
            if let (Some(own), Some(body)) = (own.filter(|b| b.kinematic), impact.body) {
                let velocity = impact.velocity * (own.mass / (own.mass + impact.mass));
                scene.add_impulse_at(body, &(velocity * impact.mass), &impact.point);
            }
        }
    }

    fn duplicate(&self) -> Option<Box<dyn FractureListener>> {
        Some(Box::new(Self {
            impact: None,
            ..self.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_hits_are_ignored() {
        let mut l = ImpulseOnFracture::new(10.);
        let contacts = [Point3::new(0., 1., 0.)];
        assert_eq!(l.record_impact(&contacts, Vector3::new(0., -1., 0.), Some(1.), None, None), None);
        assert_eq!(l.record_impact(&[], Vector3::new(0., -100., 0.), Some(1.), None, None), None);
    }

    #[test]
    fn hard_hits_report_mean_contact() {
        let mut l = ImpulseOnFracture::new(10.);
        let contacts = [Point3::new(0., 1., 0.), Point3::new(0., 1., 2.)];
        let point = l.record_impact(&contacts, Vector3::new(0., -10., 0.), Some(1.), None, None);
        assert_eq!(point, Some(Point3::new(0., 1., 1.)));
    }
}
