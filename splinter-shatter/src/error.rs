use model::{NodeId, SceneError};
use thiserror::Error;

/// A fracture request that can never succeed as issued. Rejected at submit, nothing is registered.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("no mesh was supplied and node {0:?} has no mesh filter mesh to fall back on")]
    MissingMesh(NodeId),
    #[error("a fracture template is required to fracture node {0:?}")]
    MissingTemplate(NodeId),
    #[error("fracture template {0:?} needs a mesh filter")]
    TemplateWithoutMeshFilter(NodeId),
    #[error("requester {0:?} does not exist")]
    UnknownRequester(NodeId),
    #[error("node {0:?} has no fracture geometry")]
    NotFracturable(NodeId),
    #[error("piece count must be at least 1, got {0}")]
    InvalidPieceCount(u32),
    #[error("iteration count must be at least 1, got {0}")]
    InvalidIterationCount(u32),
}

#[derive(Debug, Error)]
pub enum ShatterError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error("failed to start decomposition worker: {0}")]
    Worker(#[from] std::io::Error),
}
