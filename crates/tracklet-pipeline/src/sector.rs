//! The per-sector coordinator.
//!
//! A [`Sector`] owns one azimuthal window and a private graph of memories and
//! processors. It is configured once, then driven through repeated cycles:
//!
//! ```text
//! Configuring ──finish_configuration──▶ Ready
//!                                         │
//!        ┌────────────── clean ◀──────────┤
//!        ▼                                │
//!   Admitting ──execute──▶ Executing ──purge──▶ Draining
//! ```
//!
//! Configuration is rejected once the sector is ready, and hit admission or
//! stage execution is rejected before it is. Inside a cycle the phase is
//! tracked but the stage order is left to the driver.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::{debug, info, trace};
use tracklet_geometry::SectorWindow;

use crate::config::PipelineConfig;
use crate::diagnostics::{
    Diagnostics, INPUT_LINK_STREAM, MATCH_TALLY_STREAM, PROJECTION_OCCUPANCY_STREAM,
};
use crate::error::{Error, Result};
use crate::kernel::{default_kernel, StageKernel};
use crate::memory::{Memory, MemoryKind};
use crate::process::ProcessKind;
use crate::records::{FullMatch, Hit, Stub, StubId, Track, Tracklet, TrackletId};
use crate::registry::{MemoryId, ProcessId, Registry};
use crate::settings::SectorSettings;
use crate::stage::Stage;
use crate::wiring::{PortSpec, Wiring};

/// Lifecycle phase of a sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Accepting memories, processors and wires.
    Configuring,
    /// Configured and idle between cycles.
    Ready,
    /// Receiving hits.
    Admitting,
    /// Running stages.
    Executing,
    /// Duplicates purged; results may be queried.
    Draining,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuring => write!(f, "Configuring"),
            Self::Ready => write!(f, "Ready"),
            Self::Admitting => write!(f, "Admitting"),
            Self::Executing => write!(f, "Executing"),
            Self::Draining => write!(f, "Draining"),
        }
    }
}

/// One azimuthal sector and its processing graph.
#[derive(Debug)]
pub struct Sector {
    window: SectorWindow,
    settings: SectorSettings,
    registry: Registry,
    wiring: Wiring,
    phase: Phase,
    next_stub: u32,
    /// Input links per readout source, filled on first sight of a source.
    link_cache: HashMap<String, Vec<MemoryId>>,
    diagnostics: Diagnostics,
    cycles: u64,
}

impl Sector {
    /// Create sector `index` with an empty graph.
    pub fn new(index: u32, settings: SectorSettings) -> Result<Self> {
        let window = settings.window(index)?;
        let diagnostics = match &settings.diagnostics_dir {
            Some(dir) => Diagnostics::in_directory(dir, index)?,
            None => Diagnostics::in_memory(),
        };
        debug!(sector = index, %window, "sector created");
        Ok(Self {
            window,
            settings,
            registry: Registry::new(),
            wiring: Wiring::new(),
            phase: Phase::Configuring,
            next_stub: 0,
            link_cache: HashMap::new(),
            diagnostics,
            cycles: 0,
        })
    }

    pub fn index(&self) -> u32 {
        self.window.index()
    }

    pub fn window(&self) -> &SectorWindow {
        &self.window
    }

    pub fn settings(&self) -> &SectorSettings {
        &self.settings
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn wiring(&self) -> &Wiring {
        &self.wiring
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Number of completed cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    fn require_configuring(&self) -> Result<()> {
        if self.phase != Phase::Configuring {
            return Err(Error::InvalidState {
                expected: "Configuring",
                actual: self.phase.to_string(),
            });
        }
        Ok(())
    }

    fn require_configured(&self) -> Result<()> {
        if self.phase == Phase::Configuring {
            return Err(Error::InvalidState {
                expected: "Ready",
                actual: self.phase.to_string(),
            });
        }
        Ok(())
    }

    // ---- configuration ----

    /// Declare a memory by type tag.
    pub fn add_memory(&mut self, tag: &str, name: &str) -> Result<MemoryId> {
        let kind = MemoryKind::from_tag(tag)?;
        self.add_memory_kind(kind, name)
    }

    pub fn add_memory_kind(&mut self, kind: MemoryKind, name: &str) -> Result<MemoryId> {
        self.require_configuring()?;
        let mut memory = Memory::new(kind, name);
        if kind == MemoryKind::InputLink {
            memory = memory.with_capacity_limit(self.settings.max_stubs_per_link);
        }
        self.registry.create_memory(memory)
    }

    /// Declare a processor by type tag, with its default kernel.
    pub fn add_processor(&mut self, tag: &str, name: &str) -> Result<ProcessId> {
        let kind = ProcessKind::from_tag(tag)?;
        let kernel = default_kernel(kind, name, self.settings.min_shared_stubs);
        self.insert_processor(kind, name, kernel)
    }

    /// Declare a processor by type tag, running a caller-supplied kernel.
    pub fn add_processor_with_kernel(
        &mut self,
        tag: &str,
        name: &str,
        kernel: Box<dyn StageKernel>,
    ) -> Result<ProcessId> {
        let kind = ProcessKind::from_tag(tag)?;
        self.insert_processor(kind, name, kernel)
    }

    fn insert_processor(
        &mut self,
        kind: ProcessKind,
        name: &str,
        kernel: Box<dyn StageKernel>,
    ) -> Result<ProcessId> {
        self.require_configuring()?;
        self.registry.create_processor(kind, name, kernel)
    }

    /// Wire `memory` between `producer` and `consumer`, each `proc.port` or
    /// empty.
    pub fn wire(&mut self, memory: &str, producer: &str, consumer: &str) -> Result<()> {
        self.require_configuring()?;
        let producer = PortSpec::parse(producer);
        let consumer = PortSpec::parse(consumer);
        self.wiring
            .wire(&mut self.registry, memory, producer.as_ref(), consumer.as_ref())?;
        Ok(())
    }

    /// Close configuration.
    pub fn finish_configuration(&mut self) -> Result<()> {
        self.require_configuring()?;
        self.phase = Phase::Ready;
        info!(
            sector = self.index(),
            memories = self.registry.memory_count(),
            processors = self.registry.processor_count(),
            wires = self.wiring.edges().len(),
            "sector configured"
        );
        Ok(())
    }

    /// Apply a parsed graph description and close configuration.
    pub fn configure(&mut self, config: &PipelineConfig) -> Result<()> {
        self.require_configuring()?;
        for decl in &config.memories {
            self.add_memory_kind(decl.kind, &decl.name)?;
        }
        for decl in &config.processes {
            let kernel = default_kernel(decl.kind, &decl.name, self.settings.min_shared_stubs);
            self.insert_processor(decl.kind, &decl.name, kernel)?;
        }
        for decl in &config.wires {
            self.wiring.wire(
                &mut self.registry,
                &decl.memory,
                decl.producer.as_ref(),
                decl.consumer.as_ref(),
            )?;
        }
        self.finish_configuration()
    }

    // ---- processing ----

    /// Offer a hit read out on `source` to this sector.
    ///
    /// Returns whether any input link took it. Hits outside the window and
    /// hits from sources with no input link here are not errors.
    pub fn admit_hit(&mut self, hit: &Hit, source: &str) -> Result<bool> {
        self.require_configured()?;
        self.phase = Phase::Admitting;

        if !self.window.admits(hit.phi) {
            trace!(sector = self.index(), phi = hit.phi, "hit outside window");
            return Ok(false);
        }

        let links = self.input_links(source);
        if links.is_empty() {
            debug!(sector = self.index(), source, "no input link for source");
            return Ok(false);
        }

        let stub = Stub {
            id: StubId(self.next_stub),
            hit: hit.clone(),
            local_phi: self.window.localize(hit.phi),
            source: source.to_string(),
        };
        self.next_stub += 1;

        let mut accepted = false;
        for id in links {
            if let Some(memory) = self.registry.memory_mut(id) {
                accepted |= memory.offer_stub(stub.clone());
            }
        }
        if !accepted {
            debug!(sector = self.index(), source, stub = stub.id.0, "input links full");
        }
        Ok(accepted)
    }

    /// Input links serving `source`, resolved once per source.
    fn input_links(&mut self, source: &str) -> Vec<MemoryId> {
        if let Some(links) = self.link_cache.get(source) {
            return links.clone();
        }
        let needle = format!("_{source}");
        let links: Vec<MemoryId> = self
            .registry
            .memories()
            .filter(|(_, m)| m.kind() == MemoryKind::InputLink && m.name().contains(&needle))
            .map(|(id, _)| id)
            .collect();
        trace!(sector = self.index(), source, links = links.len(), "source resolved");
        self.link_cache.insert(source.to_string(), links.clone());
        links
    }

    /// Run every processor of `stage`, in registration order.
    pub fn execute(&mut self, stage: Stage) -> Result<()> {
        self.require_configured()?;
        self.phase = Phase::Executing;

        if stage == Stage::Router && self.settings.monitor.input_link {
            self.write_occupancy(MemoryKind::InputLink, INPUT_LINK_STREAM)?;
        }
        self.run_stage(stage, None)?;
        if stage == Stage::TrackletCalculator && self.settings.monitor.track_projection_occupancy {
            self.write_occupancy(MemoryKind::TrackletProjections, PROJECTION_OCCUPANCY_STREAM)?;
        }
        Ok(())
    }

    /// Run the duplicate purge against the caller's accepted tracks.
    pub fn purge_duplicates(&mut self, tracks: &mut Vec<Track>) -> Result<()> {
        self.require_configured()?;
        self.run_stage(Stage::PurgeDuplicate, Some(tracks))?;
        self.phase = Phase::Draining;
        Ok(())
    }

    /// Run one full cycle of stages in [`Stage::PIPELINE`] order.
    pub fn run_pipeline(&mut self, tracks: &mut Vec<Track>) -> Result<()> {
        for stage in Stage::PIPELINE {
            if stage == Stage::PurgeDuplicate {
                self.purge_duplicates(tracks)?;
            } else {
                self.execute(stage)?;
            }
        }
        Ok(())
    }

    fn run_stage(&mut self, stage: Stage, mut tracks: Option<&mut Vec<Track>>) -> Result<()> {
        let ids = self.registry.processors_of(stage);
        for id in &ids {
            let (processor, memories) =
                self.registry
                    .split_mut(*id)
                    .ok_or_else(|| Error::NotFound {
                        component: "processing module",
                        name: id.to_string(),
                    })?;
            processor.execute(memories, tracks.as_deref_mut())?;
        }
        trace!(sector = self.index(), %stage, processors = ids.len(), "stage executed");
        Ok(())
    }

    /// Drop per-cycle kernel state of one stage.
    pub fn reset_stage(&mut self, stage: Stage) {
        for processor in self.registry.processors_mut() {
            if processor.stage() == stage {
                processor.reset();
            }
        }
    }

    /// End the cycle: record the match tally if enabled, then empty every
    /// memory and reset every kernel.
    pub fn clean(&mut self) -> Result<()> {
        self.require_configured()?;
        if self.settings.monitor.n_matches {
            let [l1, l3, l5] = self.match_tally();
            self.diagnostics
                .write_line(MATCH_TALLY_STREAM, &format!("{l1} {l3} {l5}"))?;
        }
        for memory in self.registry.memories_mut() {
            memory.clear();
        }
        for processor in self.registry.processors_mut() {
            processor.reset();
        }
        self.next_stub = 0;
        self.cycles += 1;
        self.phase = Phase::Ready;
        trace!(sector = self.index(), cycle = self.cycles, "sector cleaned");
        Ok(())
    }

    /// Full matches of tracklets seeded in layers 1, 3 and 5.
    fn match_tally(&self) -> [usize; 3] {
        let seed_layers: HashMap<TrackletId, u8> = self
            .registry
            .memories_of(MemoryKind::TrackletParameters)
            .flat_map(|m| m.get::<Tracklet>())
            .map(|t| (t.id, t.seed_layer))
            .collect();
        let mut tally = [0; 3];
        let matches = self
            .registry
            .memories_of(MemoryKind::FullMatch)
            .flat_map(|m| m.get::<FullMatch>());
        for m in matches {
            match seed_layers.get(&m.tracklet) {
                Some(1) => tally[0] += 1,
                Some(3) => tally[1] += 1,
                Some(5) => tally[2] += 1,
                _ => {}
            }
        }
        tally
    }

    fn write_occupancy(&mut self, kind: MemoryKind, stream: &str) -> Result<()> {
        let lines: Vec<String> = self
            .registry
            .memories_of(kind)
            .map(|m| format!("{} {}", m.name(), m.len()))
            .collect();
        for line in &lines {
            self.diagnostics.write_line(stream, line)?;
        }
        Ok(())
    }

    /// Dump every memory of `kind` to a stream named after it.
    ///
    /// `first` starts each stream over.
    pub fn write_memories(&mut self, kind: MemoryKind, first: bool) -> Result<()> {
        let dumps: Vec<(String, Vec<String>)> = self
            .registry
            .memories_of(kind)
            .map(|m| (m.name().to_string(), m.content_lines()))
            .collect();
        for (name, lines) in dumps {
            if first {
                self.diagnostics.truncate(&name)?;
            }
            self.diagnostics
                .write_line(&name, &format!("cycle {}", self.cycles))?;
            for line in &lines {
                self.diagnostics.write_line(&name, line)?;
            }
        }
        Ok(())
    }

    // ---- queries ----

    pub fn memory(&self, name: &str) -> Result<&Memory> {
        self.registry.find_memory(name)
    }

    /// Every tracklet built this cycle.
    pub fn all_tracklets(&self) -> Vec<Tracklet> {
        self.collect(MemoryKind::TrackletParameters)
    }

    /// Every stub admitted this cycle, per input link.
    pub fn stubs(&self) -> Vec<Stub> {
        self.collect(MemoryKind::InputLink)
    }

    /// Every fitted track this cycle.
    pub fn tracks(&self) -> Vec<Track> {
        self.collect(MemoryKind::TrackFit)
    }

    fn collect<R: crate::records::Record>(&self, kind: MemoryKind) -> Vec<R> {
        self.registry
            .memories_of(kind)
            .flat_map(|m| m.get::<R>().iter().cloned())
            .collect()
    }

    /// Seed indices of the tracklets whose originating seed is `tp_seed`.
    pub fn seed_match(&self, tp_seed: i32) -> HashSet<u32> {
        self.registry
            .memories_of(MemoryKind::TrackletParameters)
            .flat_map(|m| m.get::<Tracklet>())
            .filter(|t| t.tp_seed == Some(tp_seed))
            .map(|t| t.seed_index)
            .collect()
    }

    /// Record count of every memory, in registration order.
    pub fn occupancy(&self) -> Vec<(String, usize)> {
        self.registry
            .memories()
            .map(|(_, m)| (m.name().to_string(), m.len()))
            .collect()
    }
}
