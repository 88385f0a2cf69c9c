use crate::AffineTransform;

use na::{Point3, Vector3};

/// Axis aligned bounding box.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    /// Zero sized box at the origin. What an empty fracture reports.
    pub fn zero() -> Self {
        Self {
            min: Point3::origin(),
            max: Point3::origin(),
        }
    }

    pub fn from_center_size(center: Point3<f32>, size: Vector3<f32>) -> Self {
        let half = size.abs() * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn from_points<I: IntoIterator<Item = Point3<f32>>>(points: I) -> Option<Self> {
        let mut it = points.into_iter();
        let first = it.next()?;
        let mut bounds = Self {
            min: first,
            max: first,
        };
        for p in it {
            bounds.encapsulate(&p);
        }
        Some(bounds)
    }

    pub fn encapsulate(&mut self, p: &Point3<f32>) {
        self.min = Point3::from(self.min.coords.inf(&p.coords));
        self.max = Point3::from(self.max.coords.sup(&p.coords));
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: Point3::from(self.min.coords.inf(&other.min.coords)),
            max: Point3::from(self.max.coords.sup(&other.max.coords)),
        }
    }

    pub fn center(&self) -> Point3<f32> {
        na::center(&self.min, &self.max)
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    pub fn extents(&self) -> Vector3<f32> {
        self.size() * 0.5
    }

    pub fn volume(&self) -> f32 {
        let s = self.size();
        s.x * s.y * s.z
    }

    pub fn is_zero_volume(&self) -> bool {
        self.volume().abs() <= f32::EPSILON
    }

    pub fn contains(&self, p: &Point3<f32>) -> bool {
        (0..3).all(|i| self.min[i] <= p[i] && p[i] <= self.max[i])
    }

    pub fn closest_point(&self, p: &Point3<f32>) -> Point3<f32> {
        Point3::from(p.coords.sup(&self.min.coords).inf(&self.max.coords))
    }

    pub fn corners(&self) -> [Point3<f32>; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Point3::new(lo.x, lo.y, lo.z),
            Point3::new(lo.x, lo.y, hi.z),
            Point3::new(lo.x, hi.y, lo.z),
            Point3::new(lo.x, hi.y, hi.z),
            Point3::new(hi.x, lo.y, lo.z),
            Point3::new(hi.x, lo.y, hi.z),
            Point3::new(hi.x, hi.y, lo.z),
            Point3::new(hi.x, hi.y, hi.z),
        ]
    }

    /// Box enclosing this box after it has been moved by `t`.
    pub fn transformed(&self, t: &AffineTransform) -> Aabb {
        let corners = self.corners();
        let mut out = Aabb {
            min: t.transform_point(&corners[0]),
            max: t.transform_point(&corners[0]),
        };
        for c in corners.iter().skip(1) {
            out.encapsulate(&t.transform_point(c));
        }
        out
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::zero()
    }
}
