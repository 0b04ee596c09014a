//! Memories: named, typed, clearable record buffers.

use std::fmt;

use crate::error::{Error, Result};
use crate::records::{Record, RecordKind, Records, Stub};

/// The closed set of memory module types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryKind {
    /// Stubs as received from one readout link.
    InputLink,
    /// All stubs of a layer and φ region, used for parameter calculation.
    AllStubs,
    /// Virtual-module stubs for the tracklet engines.
    VmStubsTe,
    /// Virtual-module stubs for the match engines.
    VmStubsMe,
    StubPairs,
    StubTriplets,
    TrackletParameters,
    TrackletProjections,
    AllProjections,
    VmProjections,
    CandidateMatch,
    FullMatch,
    TrackFit,
    CleanTrack,
}

impl MemoryKind {
    pub const ALL: [Self; 14] = [
        Self::InputLink,
        Self::AllStubs,
        Self::VmStubsTe,
        Self::VmStubsMe,
        Self::StubPairs,
        Self::StubTriplets,
        Self::TrackletParameters,
        Self::TrackletProjections,
        Self::AllProjections,
        Self::VmProjections,
        Self::CandidateMatch,
        Self::FullMatch,
        Self::TrackFit,
        Self::CleanTrack,
    ];

    /// Resolve a module type tag. A trailing `:` is accepted.
    pub fn from_tag(tag: &str) -> Result<Self> {
        let kind = match tag.trim().trim_end_matches(':') {
            "InputLink" => Self::InputLink,
            "AllStubs" => Self::AllStubs,
            "VMStubsTE" => Self::VmStubsTe,
            "VMStubsME" => Self::VmStubsMe,
            "StubPairs" | "StubPairsDisplaced" => Self::StubPairs,
            "StubTriplets" => Self::StubTriplets,
            "TrackletParameters" => Self::TrackletParameters,
            "TrackletProjections" => Self::TrackletProjections,
            "AllProj" => Self::AllProjections,
            "VMProjections" => Self::VmProjections,
            "CandidateMatch" => Self::CandidateMatch,
            "FullMatch" => Self::FullMatch,
            "TrackFit" => Self::TrackFit,
            "CleanTrack" => Self::CleanTrack,
            _ => {
                return Err(Error::UnknownKind {
                    component: "memory",
                    tag: tag.to_string(),
                })
            }
        };
        Ok(kind)
    }

    /// Canonical module type tag.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::InputLink => "InputLink",
            Self::AllStubs => "AllStubs",
            Self::VmStubsTe => "VMStubsTE",
            Self::VmStubsMe => "VMStubsME",
            Self::StubPairs => "StubPairs",
            Self::StubTriplets => "StubTriplets",
            Self::TrackletParameters => "TrackletParameters",
            Self::TrackletProjections => "TrackletProjections",
            Self::AllProjections => "AllProj",
            Self::VmProjections => "VMProjections",
            Self::CandidateMatch => "CandidateMatch",
            Self::FullMatch => "FullMatch",
            Self::TrackFit => "TrackFit",
            Self::CleanTrack => "CleanTrack",
        }
    }

    /// Record kind stored by memories of this type.
    pub const fn record_kind(self) -> RecordKind {
        match self {
            Self::InputLink | Self::AllStubs | Self::VmStubsTe | Self::VmStubsMe => RecordKind::Stub,
            Self::StubPairs => RecordKind::StubPair,
            Self::StubTriplets => RecordKind::StubTriplet,
            Self::TrackletParameters => RecordKind::Tracklet,
            Self::TrackletProjections | Self::AllProjections | Self::VmProjections => {
                RecordKind::Projection
            }
            Self::CandidateMatch => RecordKind::CandidateMatch,
            Self::FullMatch => RecordKind::FullMatch,
            Self::TrackFit | Self::CleanTrack => RecordKind::Track,
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A named memory holding records of one kind.
#[derive(Debug, Clone)]
pub struct Memory {
    name: String,
    kind: MemoryKind,
    records: Records,
    /// Maximum number of stubs an input link takes per cycle.
    capacity: Option<usize>,
}

impl Memory {
    pub fn new(kind: MemoryKind, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            records: Records::empty(kind.record_kind()),
            capacity: None,
        }
    }

    /// Limit how many records [`offer_stub`](Self::offer_stub) accepts per cycle.
    #[must_use]
    pub fn with_capacity_limit(mut self, capacity: Option<usize>) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn kind(&self) -> MemoryKind {
        self.kind
    }

    pub fn record_kind(&self) -> RecordKind {
        self.records.kind()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &Records {
        &self.records
    }

    /// Typed view of the contents; empty if the memory holds another kind.
    pub fn get<R: Record>(&self) -> &[R] {
        R::view(&self.records).unwrap_or(&[])
    }

    /// Offer a stub to this memory. Returns whether it was taken.
    ///
    /// Only stub memories take stubs, and a memory with a capacity limit
    /// refuses stubs once full.
    pub fn offer_stub(&mut self, stub: Stub) -> bool {
        let capacity = self.capacity;
        match Stub::view_mut(&mut self.records) {
            Some(stubs) if capacity.map_or(true, |cap| stubs.len() < cap) => {
                stubs.push(stub);
                true
            }
            _ => false,
        }
    }

    /// Append records of the memory's own kind.
    pub fn append<R: Record>(&mut self, items: &[R]) -> Result<()> {
        match R::view_mut(&mut self.records) {
            Some(stored) => {
                stored.extend_from_slice(items);
                Ok(())
            }
            None => Err(Error::PortMismatch {
                process: String::new(),
                port: String::new(),
                memory: self.name.clone(),
                expected: R::KIND,
                actual: self.records.kind(),
            }),
        }
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// One line per record, for diagnostic dumps.
    pub fn content_lines(&self) -> Vec<String> {
        self.records.lines()
    }
}
