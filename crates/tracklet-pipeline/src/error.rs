//! Error types for tracklet-pipeline.

use thiserror::Error;
use tracklet_geometry::GeometryError;

use crate::records::RecordKind;

/// Result type for tracklet-pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or running a sector.
#[derive(Debug, Error)]
pub enum Error {
    /// A memory or processing module type tag is not recognised.
    #[error("unknown {component} type: {tag}")]
    UnknownKind {
        component: &'static str,
        tag: String,
    },

    /// A memory or processor with this name already exists in the sector.
    #[error("duplicate {component} name: {name}")]
    DuplicateName {
        component: &'static str,
        name: String,
    },

    /// A memory or processor was referenced by a name that was never declared.
    #[error("could not find {component}: {name}")]
    NotFound {
        component: &'static str,
        name: String,
    },

    /// The processor has no port of the given direction matching the name.
    #[error("{process} has no {direction} port matching `{port}`")]
    UnknownPort {
        process: String,
        port: String,
        direction: &'static str,
    },

    /// The memory wired to a port holds the wrong kind of records.
    #[error("port {process}.{port} expects {expected} records, memory {memory} holds {actual}")]
    PortMismatch {
        process: String,
        port: String,
        memory: String,
        expected: RecordKind,
        actual: RecordKind,
    },

    /// The sector is in the wrong lifecycle phase for the requested operation.
    #[error("invalid sector state: expected {expected}, got {actual}")]
    InvalidState {
        expected: &'static str,
        actual: String,
    },

    /// A configuration description could not be parsed.
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A stage kernel reported a failure.
    #[error("kernel {process} failed: {message}")]
    Kernel { process: String, message: String },

    /// Settings could not be deserialized.
    #[error("settings error: {0}")]
    Settings(#[from] serde_json::Error),

    /// The sector window could not be constructed.
    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
