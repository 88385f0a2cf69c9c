//! # splinter-shatter
//!
//! Fracture scheduling and materialization. A `FractureSpec` goes to the `FractureScheduler`,
//! a `Decomposer` cuts the mesh (now or over several ticks), and the materializer turns the
//! pieces into nodes under a fresh root before notifying listeners.

extern crate nalgebra as na;
extern crate splinter_model as model;
extern crate splinter_threading as th;

pub mod decompose;
pub mod error;
pub mod geometry;
pub mod listeners;
pub mod materialize;
pub mod notify;
pub mod operation;
pub mod result;
pub mod scheduler;
pub mod spec;
pub mod world;

pub use decompose::{Decomposer, DecompositionResult, OperationHandle, PieceMesh, WedgeDecomposer};
pub use error::{ConfigurationError, ShatterError};
pub use geometry::{FractureGeometry, Geometries, GeometryKind};
pub use notify::{FractureEvent, FractureListener, Listeners, Notice};
pub use operation::{FractureOperation, Status};
pub use result::AsyncFractureResult;
pub use scheduler::{FractureScheduler, SuspendSwitch};
pub use spec::{FractureSpec, UvMode};
pub use world::FractureWorld;

use model::Scene;

/// Everything a fracture may touch while it completes.
pub struct FractureCtx<'a> {
    pub scene: &'a mut Scene,
    pub geometries: &'a mut Geometries,
    pub listeners: &'a mut Listeners,
}
