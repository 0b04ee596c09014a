//! Tracklet Sector Pipeline
//!
//! A per-sector scheduler for tracklet track finding: typed memories and
//! processing modules, wired into a directed graph and executed stage by
//! stage once per cycle.
//!
//! # Graph
//!
//! Memories are named record buffers of one [`RecordKind`]. Processors read
//! from memories attached to their input ports and append to memories
//! attached to their output ports. A memory may have any number of producers
//! and consumers; wiring the same pair twice delivers twice.
//!
//! # Cycle
//!
//! ```text
//! admit_hit* → Router → engines → calculators → ProjectionRouter
//!            → matching → FitTrack → PurgeDuplicate → queries → clean
//! ```
//!
//! The driver owns the stage order, see [`Stage::PIPELINE`]. Each sector is
//! independent and `Send`, so sectors may be driven from separate threads
//! over a shared hit stream.

mod config;
mod diagnostics;
mod error;
mod kernel;
mod memory;
mod process;
mod records;
mod registry;
mod sector;
mod settings;
mod stage;
mod wiring;

pub use config::{MemoryDecl, PipelineConfig, ProcessDecl, WireDecl, MEMORY_FILE, PROCESS_FILE, WIRE_FILE};
pub use diagnostics::{Diagnostics, INPUT_LINK_STREAM, MATCH_TALLY_STREAM, PROJECTION_OCCUPANCY_STREAM};
pub use error::{Error, Result};
pub use kernel::{default_kernel, StageIo, StageKernel};
pub use memory::{Memory, MemoryKind};
pub use process::{Direction, Port, PortRule, ProcessKind, Processor};
pub use records::{
    seed_index_from_name, CandidateMatch, FullMatch, Hit, Projection, Record, RecordKind, Records,
    Stub, StubId, StubPair, StubTriplet, Track, Tracklet, TrackletId, TrackletParams, SEED_NAMES,
};
pub use registry::{MemoryId, ProcessId, Registry};
pub use sector::{Phase, Sector};
pub use settings::{MonitorSettings, SectorSettings, DEFAULT_OVERLAP};
pub use stage::Stage;
pub use wiring::{PortSpec, WireEdge, Wiring};
