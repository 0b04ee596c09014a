//! Processing modules and their ports.
//!
//! Each [`ProcessKind`] declares a fixed port table. A port is named by a
//! prefix plus a free suffix (`vmstuboutPHIA1`, `proj3in`, ...), and a memory
//! may only be attached to a port whose declared record kind it holds.

use std::fmt;

use crate::error::{Error, Result};
use crate::kernel::{StageIo, StageKernel};
use crate::memory::Memory;
use crate::records::{RecordKind, Track};
use crate::registry::{MemoryId, ProcessId};
use crate::stage::Stage;

/// Direction of a port relative to its processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a port table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRule {
    pub prefix: &'static str,
    pub direction: Direction,
    pub record: RecordKind,
}

const fn input(prefix: &'static str, record: RecordKind) -> PortRule {
    PortRule {
        prefix,
        direction: Direction::Input,
        record,
    }
}

const fn output(prefix: &'static str, record: RecordKind) -> PortRule {
    PortRule {
        prefix,
        direction: Direction::Output,
        record,
    }
}

use RecordKind as R;

const ROUTER_PORTS: &[PortRule] = &[
    input("stubin", R::Stub),
    output("allstubout", R::Stub),
    output("vmstubout", R::Stub),
];

const ENGINE_PORTS: &[PortRule] = &[
    input("innervmstubin", R::Stub),
    input("outervmstubin", R::Stub),
    output("stubpairout", R::StubPair),
];

const TRIPLET_ENGINE_PORTS: &[PortRule] = &[
    input("thirdvmstubin", R::Stub),
    input("stubpair", R::StubPair),
    output("stubtripout", R::StubTriplet),
];

const CALCULATOR_PORTS: &[PortRule] = &[
    input("innerallstubin", R::Stub),
    input("outerallstubin", R::Stub),
    input("stubpair", R::StubPair),
    output("trackpar", R::Tracklet),
    output("projout", R::Projection),
];

const PROCESSOR_PORTS: &[PortRule] = &[
    input("innerallstubin", R::Stub),
    input("outerallstubin", R::Stub),
    input("innervmstubin", R::Stub),
    input("outervmstubin", R::Stub),
    output("trackpar", R::Tracklet),
    output("projout", R::Projection),
];

const DISPLACED_CALCULATOR_PORTS: &[PortRule] = &[
    input("firstallstubin", R::Stub),
    input("secondallstubin", R::Stub),
    input("thirdallstubin", R::Stub),
    input("stubtriplet", R::StubTriplet),
    output("trackpar", R::Tracklet),
    output("projout", R::Projection),
];

const PROJECTION_ROUTER_PORTS: &[PortRule] = &[
    input("proj", R::Projection),
    output("allprojout", R::Projection),
    output("vmprojout", R::Projection),
];

const MATCH_ENGINE_PORTS: &[PortRule] = &[
    input("vmstubin", R::Stub),
    input("vmprojin", R::Projection),
    output("matchout", R::CandidateMatch),
];

const MATCH_CALCULATOR_PORTS: &[PortRule] = &[
    input("allstubin", R::Stub),
    input("allprojin", R::Projection),
    input("match", R::CandidateMatch),
    output("matchout", R::FullMatch),
];

const MATCH_PROCESSOR_PORTS: &[PortRule] = &[
    input("allstubin", R::Stub),
    input("vmstubin", R::Stub),
    input("projin", R::Projection),
    output("matchout", R::FullMatch),
];

const FIT_PORTS: &[PortRule] = &[
    input("tpar", R::Tracklet),
    input("fullmatch", R::FullMatch),
    output("trackout", R::Track),
];

const PURGE_PORTS: &[PortRule] = &[input("trackin", R::Track), output("trackout", R::Track)];

/// The closed set of processing module types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessKind {
    VmRouter,
    /// Combined-module router variant.
    VmRouterCm,
    TrackletEngine,
    TrackletEngineDisplaced,
    TripletEngine,
    TrackletCalculator,
    TrackletProcessor,
    TrackletCalculatorDisplaced,
    ProjectionRouter,
    MatchEngine,
    MatchCalculator,
    MatchProcessor,
    FitTrack,
    PurgeDuplicate,
}

impl ProcessKind {
    pub const ALL: [Self; 14] = [
        Self::VmRouter,
        Self::VmRouterCm,
        Self::TrackletEngine,
        Self::TrackletEngineDisplaced,
        Self::TripletEngine,
        Self::TrackletCalculator,
        Self::TrackletProcessor,
        Self::TrackletCalculatorDisplaced,
        Self::ProjectionRouter,
        Self::MatchEngine,
        Self::MatchCalculator,
        Self::MatchProcessor,
        Self::FitTrack,
        Self::PurgeDuplicate,
    ];

    /// Resolve a module type tag. A trailing `:` is accepted.
    pub fn from_tag(tag: &str) -> Result<Self> {
        let kind = match tag.trim().trim_end_matches(':') {
            "VMRouter" => Self::VmRouter,
            "VMRouterCM" => Self::VmRouterCm,
            "TrackletEngine" => Self::TrackletEngine,
            "TrackletEngineDisplaced" => Self::TrackletEngineDisplaced,
            "TripletEngine" => Self::TripletEngine,
            "TrackletCalculator" => Self::TrackletCalculator,
            "TrackletProcessor" => Self::TrackletProcessor,
            "TrackletCalculatorDisplaced" => Self::TrackletCalculatorDisplaced,
            "ProjectionRouter" => Self::ProjectionRouter,
            "MatchEngine" => Self::MatchEngine,
            // Older configurations still name disk calculators separately.
            "MatchCalculator" | "DiskMatchCalculator" => Self::MatchCalculator,
            "MatchProcessor" => Self::MatchProcessor,
            "FitTrack" => Self::FitTrack,
            "PurgeDuplicate" => Self::PurgeDuplicate,
            _ => {
                return Err(Error::UnknownKind {
                    component: "processing",
                    tag: tag.to_string(),
                })
            }
        };
        Ok(kind)
    }

    pub const fn tag(self) -> &'static str {
        match self {
            Self::VmRouter => "VMRouter",
            Self::VmRouterCm => "VMRouterCM",
            Self::TrackletEngine => "TrackletEngine",
            Self::TrackletEngineDisplaced => "TrackletEngineDisplaced",
            Self::TripletEngine => "TripletEngine",
            Self::TrackletCalculator => "TrackletCalculator",
            Self::TrackletProcessor => "TrackletProcessor",
            Self::TrackletCalculatorDisplaced => "TrackletCalculatorDisplaced",
            Self::ProjectionRouter => "ProjectionRouter",
            Self::MatchEngine => "MatchEngine",
            Self::MatchCalculator => "MatchCalculator",
            Self::MatchProcessor => "MatchProcessor",
            Self::FitTrack => "FitTrack",
            Self::PurgeDuplicate => "PurgeDuplicate",
        }
    }

    /// The stage this processor runs in.
    pub const fn stage(self) -> Stage {
        match self {
            Self::VmRouter | Self::VmRouterCm => Stage::Router,
            Self::TrackletEngine => Stage::TrackletEngine,
            Self::TrackletEngineDisplaced => Stage::TrackletEngineDisplaced,
            Self::TripletEngine => Stage::TripletEngine,
            Self::TrackletCalculator => Stage::TrackletCalculator,
            Self::TrackletProcessor => Stage::TrackletProcessor,
            Self::TrackletCalculatorDisplaced => Stage::TrackletCalculatorDisplaced,
            Self::ProjectionRouter => Stage::ProjectionRouter,
            Self::MatchEngine => Stage::MatchEngine,
            Self::MatchCalculator => Stage::MatchCalculator,
            Self::MatchProcessor => Stage::MatchProcessor,
            Self::FitTrack => Stage::FitTrack,
            Self::PurgeDuplicate => Stage::PurgeDuplicate,
        }
    }

    pub const fn ports(self) -> &'static [PortRule] {
        match self {
            Self::VmRouter | Self::VmRouterCm => ROUTER_PORTS,
            Self::TrackletEngine | Self::TrackletEngineDisplaced => ENGINE_PORTS,
            Self::TripletEngine => TRIPLET_ENGINE_PORTS,
            Self::TrackletCalculator => CALCULATOR_PORTS,
            Self::TrackletProcessor => PROCESSOR_PORTS,
            Self::TrackletCalculatorDisplaced => DISPLACED_CALCULATOR_PORTS,
            Self::ProjectionRouter => PROJECTION_ROUTER_PORTS,
            Self::MatchEngine => MATCH_ENGINE_PORTS,
            Self::MatchCalculator => MATCH_CALCULATOR_PORTS,
            Self::MatchProcessor => MATCH_PROCESSOR_PORTS,
            Self::FitTrack => FIT_PORTS,
            Self::PurgeDuplicate => PURGE_PORTS,
        }
    }

    /// Find the rule governing `port` in the given direction.
    pub fn port_rule(self, direction: Direction, port: &str) -> Option<PortRule> {
        self.ports()
            .iter()
            .copied()
            .filter(|rule| rule.direction == direction && port.starts_with(rule.prefix))
            .max_by_key(|rule| rule.prefix.len())
    }
}

impl fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A port attached to a memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub name: String,
    pub memory: MemoryId,
}

/// A processing module: a kernel plus its wired ports.
pub struct Processor {
    id: ProcessId,
    name: String,
    kind: ProcessKind,
    inputs: Vec<Port>,
    outputs: Vec<Port>,
    kernel: Box<dyn StageKernel>,
}

impl fmt::Debug for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

impl Processor {
    pub(crate) fn new(
        id: ProcessId,
        kind: ProcessKind,
        name: impl Into<String>,
        kernel: Box<dyn StageKernel>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
            kernel,
        }
    }

    pub const fn id(&self) -> ProcessId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn kind(&self) -> ProcessKind {
        self.kind
    }

    pub const fn stage(&self) -> Stage {
        self.kind.stage()
    }

    pub fn inputs(&self) -> &[Port] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Port] {
        &self.outputs
    }

    /// Check that `memory` may be attached to `port`.
    pub fn check_port(&self, direction: Direction, port: &str, memory: &Memory) -> Result<()> {
        let rule = self
            .kind
            .port_rule(direction, port)
            .ok_or_else(|| Error::UnknownPort {
                process: self.name.clone(),
                port: port.to_string(),
                direction: direction.as_str(),
            })?;
        if rule.record != memory.record_kind() {
            return Err(Error::PortMismatch {
                process: self.name.clone(),
                port: port.to_string(),
                memory: memory.name().to_string(),
                expected: rule.record,
                actual: memory.record_kind(),
            });
        }
        Ok(())
    }

    /// Attach `memory` as an input on `port`.
    pub fn add_input(&mut self, port: &str, id: MemoryId, memory: &Memory) -> Result<()> {
        self.check_port(Direction::Input, port, memory)?;
        self.inputs.push(Port {
            name: port.to_string(),
            memory: id,
        });
        Ok(())
    }

    /// Attach `memory` as an output on `port`.
    pub fn add_output(&mut self, port: &str, id: MemoryId, memory: &Memory) -> Result<()> {
        self.check_port(Direction::Output, port, memory)?;
        self.outputs.push(Port {
            name: port.to_string(),
            memory: id,
        });
        Ok(())
    }

    /// Run the kernel over the wired memories.
    pub(crate) fn execute(
        &mut self,
        memories: &mut [Memory],
        tracks: Option<&mut Vec<Track>>,
    ) -> Result<()> {
        let mut io = StageIo::new(self.id, &self.name, &self.inputs, &self.outputs, memories, tracks);
        self.kernel.execute(&mut io)
    }

    pub(crate) fn reset(&mut self) {
        self.kernel.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::default_kernel;
    use crate::memory::MemoryKind;

    fn processor(kind: ProcessKind, name: &str) -> Processor {
        Processor::new(ProcessId::new(0), kind, name, default_kernel(kind, name, 3))
    }

    #[test]
    fn tags_round_trip() {
        for kind in ProcessKind::ALL {
            assert_eq!(ProcessKind::from_tag(kind.tag()).unwrap(), kind);
            assert_eq!(ProcessKind::from_tag(&format!("{}:", kind.tag())).unwrap(), kind);
        }
        assert_eq!(
            ProcessKind::from_tag("DiskMatchCalculator:").unwrap(),
            ProcessKind::MatchCalculator
        );
    }

    #[test]
    fn unknown_tag_is_error() {
        let err = ProcessKind::from_tag("Frobnicator:").unwrap_err();
        assert!(matches!(err, Error::UnknownKind { component: "processing", .. }));
    }

    #[test]
    fn both_routers_share_a_stage() {
        assert_eq!(ProcessKind::VmRouter.stage(), Stage::Router);
        assert_eq!(ProcessKind::VmRouterCm.stage(), Stage::Router);
    }

    #[test]
    fn every_kind_has_inputs_and_outputs() {
        for kind in ProcessKind::ALL {
            let ports = kind.ports();
            assert!(ports.iter().any(|r| r.direction == Direction::Input), "{kind}");
            assert!(ports.iter().any(|r| r.direction == Direction::Output), "{kind}");
        }
    }

    #[test]
    fn port_rule_matches_by_prefix() {
        let rule = ProcessKind::VmRouter
            .port_rule(Direction::Output, "vmstuboutPHIA1")
            .unwrap();
        assert_eq!(rule.prefix, "vmstubout");
        assert!(ProcessKind::VmRouter
            .port_rule(Direction::Input, "vmstuboutPHIA1")
            .is_none());
    }

    #[test]
    fn add_ports_validates() {
        let mut vmr = processor(ProcessKind::VmRouter, "VMR_L1PHIA");
        let il = Memory::new(MemoryKind::InputLink, "IL_L1PHIA_PS10G_1_A");
        let tpar = Memory::new(MemoryKind::TrackletParameters, "TPAR_L1L2A");

        vmr.add_input("stubin", MemoryId::new(0), &il).unwrap();
        assert_eq!(vmr.inputs().len(), 1);

        let err = vmr.add_input("bogus", MemoryId::new(0), &il).unwrap_err();
        assert!(matches!(err, Error::UnknownPort { .. }));

        let err = vmr.add_output("allstubout", MemoryId::new(1), &tpar).unwrap_err();
        assert!(matches!(
            err,
            Error::PortMismatch {
                expected: RecordKind::Stub,
                actual: RecordKind::Tracklet,
                ..
            }
        ));
        assert!(vmr.outputs().is_empty());
    }
}
