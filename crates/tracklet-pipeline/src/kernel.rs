//! Stage kernels: the per-processor computation.
//!
//! A [`Processor`](crate::process::Processor) owns its wiring; the kernel only
//! sees a [`StageIo`] that reads records from the wired inputs and appends
//! records to the wired outputs. Kernels are replaceable per processor.
//! The defaults here move data structurally, with straight-line seeding and
//! nearest-residual matching, so a configured graph runs end to end.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::error::{Error, Result};
use crate::memory::Memory;
use crate::process::{Port, ProcessKind};
use crate::records::{
    seed_index_from_name, CandidateMatch, FullMatch, Projection, Record, Stub, StubId, StubPair,
    StubTriplet, Track, Tracklet, TrackletId, TrackletParams,
};
use crate::registry::ProcessId;

/// The computation run by one processor.
pub trait StageKernel: Send {
    /// Read the wired inputs and append results to the wired outputs.
    fn execute(&mut self, io: &mut StageIo<'_>) -> Result<()>;

    /// Drop per-cycle state. Called when the sector is cleaned.
    fn reset(&mut self) {}
}

/// A processor's view of its wired memories during one execution.
pub struct StageIo<'a> {
    process: ProcessId,
    name: &'a str,
    inputs: &'a [Port],
    outputs: &'a [Port],
    memories: &'a mut [Memory],
    tracks: Option<&'a mut Vec<Track>>,
}

impl<'a> StageIo<'a> {
    pub(crate) fn new(
        process: ProcessId,
        name: &'a str,
        inputs: &'a [Port],
        outputs: &'a [Port],
        memories: &'a mut [Memory],
        tracks: Option<&'a mut Vec<Track>>,
    ) -> Self {
        Self {
            process,
            name,
            inputs,
            outputs,
            memories,
            tracks,
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn process_id(&self) -> ProcessId {
        self.process
    }

    /// Records of every input port starting with `prefix`, in wiring order.
    pub fn read<R: Record>(&self, prefix: &str) -> Vec<R> {
        self.inputs
            .iter()
            .filter(|port| port.name.starts_with(prefix))
            .filter_map(|port| self.memories.get(port.memory.index()))
            .flat_map(|memory| memory.get::<R>().iter().cloned())
            .collect()
    }

    /// Append `records` to every output port starting with `prefix`.
    ///
    /// Returns how many memories were written.
    pub fn emit<R: Record>(&mut self, prefix: &str, records: &[R]) -> Result<usize> {
        let outputs = self.outputs;
        let mut written = 0;
        for port in outputs.iter().filter(|port| port.name.starts_with(prefix)) {
            let memory =
                self.memories
                    .get_mut(port.memory.index())
                    .ok_or_else(|| Error::Kernel {
                        process: self.name.to_string(),
                        message: format!("port {} refers to missing memory {}", port.name, port.memory),
                    })?;
            memory.append(records).map_err(|err| match err {
                Error::PortMismatch {
                    memory,
                    expected,
                    actual,
                    ..
                } => Error::PortMismatch {
                    process: self.name.to_string(),
                    port: port.name.clone(),
                    memory,
                    expected,
                    actual,
                },
                other => other,
            })?;
            written += 1;
        }
        Ok(written)
    }

    /// The caller-owned track sequence, when the stage was given one.
    pub fn tracks(&mut self) -> Option<&mut Vec<Track>> {
        self.tracks.as_deref_mut()
    }
}

/// Build the default kernel for a processor.
pub fn default_kernel(kind: ProcessKind, name: &str, min_shared_stubs: usize) -> Box<dyn StageKernel> {
    match kind {
        ProcessKind::VmRouter | ProcessKind::VmRouterCm => Box::new(Router),
        ProcessKind::TrackletEngine | ProcessKind::TrackletEngineDisplaced => Box::new(PairEngine),
        ProcessKind::TripletEngine => Box::new(TripletEngine),
        ProcessKind::TrackletCalculator => Box::new(Calculator::new(name, Seeding::Pairs)),
        ProcessKind::TrackletProcessor => Box::new(Calculator::new(name, Seeding::VmStubs)),
        ProcessKind::TrackletCalculatorDisplaced => {
            Box::new(Calculator::new(name, Seeding::Triplets))
        }
        ProcessKind::ProjectionRouter => Box::new(ProjectionRouter),
        ProcessKind::MatchEngine => Box::new(MatchEngine),
        ProcessKind::MatchCalculator => Box::new(MatchCalculator),
        ProcessKind::MatchProcessor => Box::new(MatchProcessor),
        ProcessKind::FitTrack => Box::new(FitTrack),
        ProcessKind::PurgeDuplicate => Box::new(PurgeDuplicate::new(min_shared_stubs)),
    }
}

/// Copies every input stub to every output stub memory.
struct Router;

impl StageKernel for Router {
    fn execute(&mut self, io: &mut StageIo<'_>) -> Result<()> {
        let stubs: Vec<Stub> = io.read("stubin");
        io.emit("allstubout", &stubs)?;
        io.emit("vmstubout", &stubs)?;
        trace!(process = %io.name(), stubs = stubs.len(), "routed");
        Ok(())
    }
}

fn pairs(inner: &[Stub], outer: &[Stub]) -> Vec<StubPair> {
    inner
        .iter()
        .flat_map(|i| {
            outer.iter().map(move |o| StubPair {
                inner: i.clone(),
                outer: o.clone(),
            })
        })
        .collect()
}

struct PairEngine;

impl StageKernel for PairEngine {
    fn execute(&mut self, io: &mut StageIo<'_>) -> Result<()> {
        let inner: Vec<Stub> = io.read("innervmstubin");
        let outer: Vec<Stub> = io.read("outervmstubin");
        let found = pairs(&inner, &outer);
        io.emit("stubpairout", &found)?;
        trace!(process = %io.name(), pairs = found.len(), "paired");
        Ok(())
    }
}

struct TripletEngine;

impl StageKernel for TripletEngine {
    fn execute(&mut self, io: &mut StageIo<'_>) -> Result<()> {
        let seeds: Vec<StubPair> = io.read("stubpair");
        let third: Vec<Stub> = io.read("thirdvmstubin");
        let triplets: Vec<StubTriplet> = seeds
            .iter()
            .flat_map(|pair| {
                third.iter().map(move |s| StubTriplet {
                    inner: pair.inner.clone(),
                    middle: pair.outer.clone(),
                    outer: s.clone(),
                })
            })
            .collect();
        io.emit("stubtripout", &triplets)?;
        trace!(process = %io.name(), triplets = triplets.len(), "tripled");
        Ok(())
    }
}

/// Where a calculator takes its seeds from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Seeding {
    /// Stub pairs found by a tracklet engine.
    Pairs,
    /// Inner and outer virtual-module stubs, paired in place.
    VmStubs,
    Triplets,
}

/// Builds tracklets and their projections.
struct Calculator {
    seeding: Seeding,
    seed_index: u32,
    serial: u32,
}

impl Calculator {
    fn new(name: &str, seeding: Seeding) -> Self {
        let seed_index = seed_index_from_name(name).unwrap_or_else(|| {
            trace!(process = %name, "no seed in name, using seed 0");
            0
        });
        Self {
            seeding,
            seed_index,
            serial: 0,
        }
    }

    fn build(&mut self, process: ProcessId, seed: &[&Stub]) -> Option<Tracklet> {
        let (inner, outer) = (seed.first()?, seed.last()?);
        let truth = inner.hit.truth;
        let tp_seed = truth.filter(|_| seed.iter().all(|s| s.hit.truth == truth));
        let tracklet = Tracklet {
            id: TrackletId {
                process,
                serial: self.serial,
            },
            seed_index: self.seed_index,
            tp_seed,
            seed_layer: inner.layer(),
            stubs: seed.iter().map(|s| s.id).collect(),
            params: TrackletParams::through(inner, outer),
        };
        self.serial += 1;
        Some(tracklet)
    }
}

impl StageKernel for Calculator {
    fn execute(&mut self, io: &mut StageIo<'_>) -> Result<()> {
        let process = io.process_id();
        let tracklets: Vec<Tracklet> = match self.seeding {
            Seeding::Pairs => io
                .read::<StubPair>("stubpair")
                .iter()
                .filter_map(|p| self.build(process, &[&p.inner, &p.outer]))
                .collect(),
            Seeding::VmStubs => {
                let inner: Vec<Stub> = io.read("innervmstubin");
                let outer: Vec<Stub> = io.read("outervmstubin");
                pairs(&inner, &outer)
                    .iter()
                    .filter_map(|p| self.build(process, &[&p.inner, &p.outer]))
                    .collect()
            }
            Seeding::Triplets => io
                .read::<StubTriplet>("stubtriplet")
                .iter()
                .filter_map(|t| self.build(process, &[&t.inner, &t.middle, &t.outer]))
                .collect(),
        };
        let projections: Vec<Projection> = tracklets.iter().map(Projection::of).collect();
        io.emit("trackpar", &tracklets)?;
        io.emit("projout", &projections)?;
        trace!(process = %io.name(), tracklets = tracklets.len(), "tracklets built");
        Ok(())
    }

    fn reset(&mut self) {
        self.serial = 0;
    }
}

struct ProjectionRouter;

impl StageKernel for ProjectionRouter {
    fn execute(&mut self, io: &mut StageIo<'_>) -> Result<()> {
        let projections: Vec<Projection> = io.read("proj");
        io.emit("allprojout", &projections)?;
        io.emit("vmprojout", &projections)?;
        Ok(())
    }
}

struct MatchEngine;

impl StageKernel for MatchEngine {
    fn execute(&mut self, io: &mut StageIo<'_>) -> Result<()> {
        let stubs: Vec<Stub> = io.read("vmstubin");
        let projections: Vec<Projection> = io.read("vmprojin");
        let candidates: Vec<CandidateMatch> = projections
            .iter()
            .flat_map(|proj| {
                stubs
                    .iter()
                    .filter(move |stub| !proj.uses(stub))
                    .map(move |stub| CandidateMatch {
                        projection: proj.clone(),
                        stub: stub.clone(),
                    })
            })
            .collect();
        io.emit("matchout", &candidates)?;
        trace!(process = %io.name(), candidates = candidates.len(), "candidates");
        Ok(())
    }
}

/// Keeps the match with the smallest |Δφ| per tracklet and stub layer,
/// in order of first appearance.
#[derive(Default)]
struct BestMatches {
    matches: Vec<FullMatch>,
    slots: HashMap<(TrackletId, u8), usize>,
}

impl BestMatches {
    fn offer(&mut self, candidate: FullMatch) {
        let key = (candidate.tracklet, candidate.stub.layer());
        match self.slots.get(&key) {
            Some(&slot) => {
                if candidate.residual_phi.abs() < self.matches[slot].residual_phi.abs() {
                    self.matches[slot] = candidate;
                }
            }
            None => {
                self.slots.insert(key, self.matches.len());
                self.matches.push(candidate);
            }
        }
    }
}

struct MatchCalculator;

impl StageKernel for MatchCalculator {
    fn execute(&mut self, io: &mut StageIo<'_>) -> Result<()> {
        let mut best = BestMatches::default();
        for candidate in io.read::<CandidateMatch>("match") {
            best.offer(FullMatch::new(&candidate.projection, candidate.stub));
        }
        io.emit("matchout", &best.matches)?;
        trace!(process = %io.name(), matches = best.matches.len(), "matched");
        Ok(())
    }
}

struct MatchProcessor;

impl StageKernel for MatchProcessor {
    fn execute(&mut self, io: &mut StageIo<'_>) -> Result<()> {
        let mut seen = HashSet::new();
        let stubs: Vec<Stub> = io
            .read::<Stub>("vmstubin")
            .into_iter()
            .chain(io.read::<Stub>("allstubin"))
            .filter(|stub| seen.insert(stub.id))
            .collect();
        let mut best = BestMatches::default();
        for proj in io.read::<Projection>("projin") {
            for stub in stubs.iter().filter(|stub| !proj.uses(stub)) {
                best.offer(FullMatch::new(&proj, stub.clone()));
            }
        }
        io.emit("matchout", &best.matches)?;
        trace!(process = %io.name(), matches = best.matches.len(), "matched");
        Ok(())
    }
}

/// Turns every tracklet with at least one match into a track.
struct FitTrack;

impl StageKernel for FitTrack {
    fn execute(&mut self, io: &mut StageIo<'_>) -> Result<()> {
        let tracklets: Vec<Tracklet> = io.read("tpar");
        let matches: Vec<FullMatch> = io.read("fullmatch");

        let mut by_tracklet: HashMap<TrackletId, Vec<StubId>> = HashMap::new();
        for m in &matches {
            by_tracklet.entry(m.tracklet).or_default().push(m.stub.id);
        }

        let tracks: Vec<Track> = tracklets
            .iter()
            .filter_map(|tracklet| {
                let matched = by_tracklet.get(&tracklet.id)?;
                let mut stubs = tracklet.stubs.clone();
                for id in matched {
                    if !stubs.contains(id) {
                        stubs.push(*id);
                    }
                }
                Some(Track {
                    tracklet: tracklet.id,
                    seed_index: tracklet.seed_index,
                    params: tracklet.params,
                    stubs,
                })
            })
            .collect();
        io.emit("trackout", &tracks)?;
        trace!(process = %io.name(), tracks = tracks.len(), "fitted");
        Ok(())
    }
}

/// Removes tracks sharing too many stubs with an earlier survivor.
///
/// Tracks already in the caller's sequence come first and take precedence.
/// The caller's sequence is replaced by the survivors; survivors read from
/// this processor's inputs are also written to its outputs.
struct PurgeDuplicate {
    min_shared: usize,
}

impl PurgeDuplicate {
    fn new(min_shared: usize) -> Self {
        Self {
            min_shared: min_shared.max(1),
        }
    }
}

impl StageKernel for PurgeDuplicate {
    fn execute(&mut self, io: &mut StageIo<'_>) -> Result<()> {
        let incoming: Vec<Track> = io.read("trackin");
        let prior = io.tracks().map(std::mem::take).unwrap_or_default();
        let prior_len = prior.len();

        let mut survivors: Vec<Track> = Vec::with_capacity(prior_len + incoming.len());
        let mut fresh = Vec::new();
        let mut dropped = 0usize;
        for (i, track) in prior.into_iter().chain(incoming).enumerate() {
            if survivors
                .iter()
                .any(|kept| kept.shared_stubs(&track) >= self.min_shared)
            {
                dropped += 1;
                continue;
            }
            if i >= prior_len {
                fresh.push(track.clone());
            }
            survivors.push(track);
        }

        if let Some(tracks) = io.tracks() {
            *tracks = survivors;
        }
        io.emit("trackout", &fresh)?;
        trace!(process = %io.name(), kept = fresh.len(), dropped, "purged");
        Ok(())
    }
}
