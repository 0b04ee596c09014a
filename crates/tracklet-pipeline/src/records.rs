//! Record kinds flowing between memories.
//!
//! Every memory holds exactly one record kind. Records are plain values;
//! later stages refer back to earlier ones through [`StubId`] and
//! [`TrackletId`] rather than pointers.

use std::fmt;

use tracklet_geometry::{delta_phi, reduce_range};

use crate::registry::ProcessId;

/// Seeding layer combinations, indexed by seed number.
///
/// Tracklet calculators are conventionally named `TC_<seed><letter>`, e.g.
/// `TC_L1L2A` builds seed 0.
pub const SEED_NAMES: [&str; 12] = [
    "L1L2", "L2L3", "L3L4", "L5L6", "D1D2", "D3D4", "L1D1", "L2D1", "L2L3L4", "L4L5L6", "L2L3D1",
    "D1D2L2",
];

/// Seed number encoded in a processor name, if any.
///
/// Longer seed names are tried first so `TCD_L2L3L4A` is not read as `L2L3`.
pub fn seed_index_from_name(name: &str) -> Option<u32> {
    let tail = name.split_once('_').map_or(name, |(_, tail)| tail);
    let mut seeds: Vec<(usize, &str)> = SEED_NAMES.iter().copied().enumerate().collect();
    seeds.sort_by_key(|(_, seed)| std::cmp::Reverse(seed.len()));
    seeds
        .into_iter()
        .find(|(_, seed)| tail.starts_with(seed))
        .map(|(i, _)| i as u32)
}

/// A raw detector hit as delivered by the readout.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    /// Azimuth in radians, any branch.
    pub phi: f64,
    /// Transverse radius.
    pub r: f64,
    /// Longitudinal position.
    pub z: f64,
    /// Barrel layer (1..=6) or disk (11..=15).
    pub layer: u8,
    /// Simulated particle that produced the hit, when known.
    pub truth: Option<i32>,
}

impl Hit {
    pub fn new(phi: f64, r: f64, z: f64, layer: u8) -> Self {
        Self {
            phi,
            r,
            z,
            layer,
            truth: None,
        }
    }

    #[must_use]
    pub fn with_truth(mut self, truth: i32) -> Self {
        self.truth = Some(truth);
        self
    }
}

/// Identifier of a stub, unique within one sector and one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StubId(pub u32);

/// A hit localized to a sector.
#[derive(Debug, Clone, PartialEq)]
pub struct Stub {
    pub id: StubId,
    pub hit: Hit,
    /// Azimuth relative to the sector's `phi_min`, clipped to the window.
    pub local_phi: f64,
    /// Readout link the hit arrived on.
    pub source: String,
}

impl Stub {
    pub fn phi(&self) -> f64 {
        reduce_range(self.hit.phi)
    }

    pub fn layer(&self) -> u8 {
        self.hit.layer
    }
}

/// Two stubs from a seeding layer pair.
#[derive(Debug, Clone, PartialEq)]
pub struct StubPair {
    pub inner: Stub,
    pub outer: Stub,
}

/// Three stubs from a displaced seeding combination.
#[derive(Debug, Clone, PartialEq)]
pub struct StubTriplet {
    pub inner: Stub,
    pub middle: Stub,
    pub outer: Stub,
}

/// Identifier of a tracklet: the calculator that built it plus a serial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackletId {
    pub process: ProcessId,
    pub serial: u32,
}

impl fmt::Display for TrackletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.process.index(), self.serial)
    }
}

/// Straight-line trajectory parameters in (r, φ) and (r, z).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackletParams {
    /// Azimuth extrapolated to r = 0.
    pub phi0: f64,
    /// Azimuthal slope dφ/dr.
    pub dphi_dr: f64,
    /// z extrapolated to r = 0.
    pub z0: f64,
    /// Longitudinal slope dz/dr.
    pub t: f64,
}

impl TrackletParams {
    /// Line through two stubs.
    pub fn through(inner: &Stub, outer: &Stub) -> Self {
        let dr = outer.hit.r - inner.hit.r;
        let (dphi_dr, t) = if dr.abs() > f64::EPSILON {
            (
                delta_phi(outer.hit.phi, inner.hit.phi) / dr,
                (outer.hit.z - inner.hit.z) / dr,
            )
        } else {
            (0.0, 0.0)
        };
        Self {
            phi0: reduce_range(inner.hit.phi - dphi_dr * inner.hit.r),
            dphi_dr,
            z0: inner.hit.z - t * inner.hit.r,
            t,
        }
    }

    pub fn phi_at(&self, r: f64) -> f64 {
        reduce_range(self.phi0 + self.dphi_dr * r)
    }

    pub fn z_at(&self, r: f64) -> f64 {
        self.z0 + self.t * r
    }
}

/// A seed trajectory built from a stub pair or triplet.
#[derive(Debug, Clone, PartialEq)]
pub struct Tracklet {
    pub id: TrackletId,
    /// Seeding combination, see [`SEED_NAMES`].
    pub seed_index: u32,
    /// Originating truth particle, when every seed stub agrees on one.
    pub tp_seed: Option<i32>,
    /// Layer of the innermost seed stub.
    pub seed_layer: u8,
    pub stubs: Vec<StubId>,
    pub params: TrackletParams,
}

/// A tracklet extrapolated for matching against stubs in other layers.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub tracklet: TrackletId,
    pub seed_index: u32,
    pub params: TrackletParams,
    /// Stubs already used by the seed; never matched again.
    pub seed_stubs: Vec<StubId>,
}

impl Projection {
    pub fn of(tracklet: &Tracklet) -> Self {
        Self {
            tracklet: tracklet.id,
            seed_index: tracklet.seed_index,
            params: tracklet.params,
            seed_stubs: tracklet.stubs.clone(),
        }
    }

    pub fn uses(&self, stub: &Stub) -> bool {
        self.seed_stubs.contains(&stub.id)
    }
}

/// A projection paired with a stub it might match.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateMatch {
    pub projection: Projection,
    pub stub: Stub,
}

/// An accepted projection-stub match with residuals.
#[derive(Debug, Clone, PartialEq)]
pub struct FullMatch {
    pub tracklet: TrackletId,
    pub stub: Stub,
    pub residual_phi: f64,
    pub residual_z: f64,
}

impl FullMatch {
    pub fn new(projection: &Projection, stub: Stub) -> Self {
        let residual_phi = delta_phi(stub.hit.phi, projection.params.phi_at(stub.hit.r));
        let residual_z = stub.hit.z - projection.params.z_at(stub.hit.r);
        Self {
            tracklet: projection.tracklet,
            stub,
            residual_phi,
            residual_z,
        }
    }
}

/// A fitted track candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub tracklet: TrackletId,
    pub seed_index: u32,
    pub params: TrackletParams,
    /// Seed stubs followed by matched stubs, without repeats.
    pub stubs: Vec<StubId>,
}

impl Track {
    /// Number of stubs this track shares with another.
    pub fn shared_stubs(&self, other: &Track) -> usize {
        self.stubs.iter().filter(|s| other.stubs.contains(s)).count()
    }
}

/// The record kind a memory stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Stub,
    StubPair,
    StubTriplet,
    Tracklet,
    Projection,
    CandidateMatch,
    FullMatch,
    Track,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stub => "stub",
            Self::StubPair => "stub pair",
            Self::StubTriplet => "stub triplet",
            Self::Tracklet => "tracklet",
            Self::Projection => "projection",
            Self::CandidateMatch => "candidate match",
            Self::FullMatch => "full match",
            Self::Track => "track",
        };
        f.write_str(name)
    }
}

/// Storage of one memory: a list of a single record kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Records {
    Stubs(Vec<Stub>),
    StubPairs(Vec<StubPair>),
    StubTriplets(Vec<StubTriplet>),
    Tracklets(Vec<Tracklet>),
    Projections(Vec<Projection>),
    CandidateMatches(Vec<CandidateMatch>),
    FullMatches(Vec<FullMatch>),
    Tracks(Vec<Track>),
}

impl Records {
    /// Empty storage for a record kind.
    pub fn empty(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Stub => Self::Stubs(Vec::new()),
            RecordKind::StubPair => Self::StubPairs(Vec::new()),
            RecordKind::StubTriplet => Self::StubTriplets(Vec::new()),
            RecordKind::Tracklet => Self::Tracklets(Vec::new()),
            RecordKind::Projection => Self::Projections(Vec::new()),
            RecordKind::CandidateMatch => Self::CandidateMatches(Vec::new()),
            RecordKind::FullMatch => Self::FullMatches(Vec::new()),
            RecordKind::Track => Self::Tracks(Vec::new()),
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Stubs(_) => RecordKind::Stub,
            Self::StubPairs(_) => RecordKind::StubPair,
            Self::StubTriplets(_) => RecordKind::StubTriplet,
            Self::Tracklets(_) => RecordKind::Tracklet,
            Self::Projections(_) => RecordKind::Projection,
            Self::CandidateMatches(_) => RecordKind::CandidateMatch,
            Self::FullMatches(_) => RecordKind::FullMatch,
            Self::Tracks(_) => RecordKind::Track,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Stubs(v) => v.len(),
            Self::StubPairs(v) => v.len(),
            Self::StubTriplets(v) => v.len(),
            Self::Tracklets(v) => v.len(),
            Self::Projections(v) => v.len(),
            Self::CandidateMatches(v) => v.len(),
            Self::FullMatches(v) => v.len(),
            Self::Tracks(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        match self {
            Self::Stubs(v) => v.clear(),
            Self::StubPairs(v) => v.clear(),
            Self::StubTriplets(v) => v.clear(),
            Self::Tracklets(v) => v.clear(),
            Self::Projections(v) => v.clear(),
            Self::CandidateMatches(v) => v.clear(),
            Self::FullMatches(v) => v.clear(),
            Self::Tracks(v) => v.clear(),
        }
    }

    /// One text line per record.
    pub fn lines(&self) -> Vec<String> {
        fn render<T: fmt::Display>(items: &[T]) -> Vec<String> {
            items.iter().map(ToString::to_string).collect()
        }
        match self {
            Self::Stubs(v) => render(v),
            Self::StubPairs(v) => render(v),
            Self::StubTriplets(v) => render(v),
            Self::Tracklets(v) => render(v),
            Self::Projections(v) => render(v),
            Self::CandidateMatches(v) => render(v),
            Self::FullMatches(v) => render(v),
            Self::Tracks(v) => render(v),
        }
    }
}

/// A value that can be stored in [`Records`].
pub trait Record: Clone + fmt::Display + Sized {
    const KIND: RecordKind;

    fn view(records: &Records) -> Option<&[Self]>;

    fn view_mut(records: &mut Records) -> Option<&mut Vec<Self>>;
}

macro_rules! impl_record {
    ($ty:ty, $kind:ident, $variant:ident) => {
        impl Record for $ty {
            const KIND: RecordKind = RecordKind::$kind;

            fn view(records: &Records) -> Option<&[Self]> {
                match records {
                    Records::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn view_mut(records: &mut Records) -> Option<&mut Vec<Self>> {
                match records {
                    Records::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_record!(Stub, Stub, Stubs);
impl_record!(StubPair, StubPair, StubPairs);
impl_record!(StubTriplet, StubTriplet, StubTriplets);
impl_record!(Tracklet, Tracklet, Tracklets);
impl_record!(Projection, Projection, Projections);
impl_record!(CandidateMatch, CandidateMatch, CandidateMatches);
impl_record!(FullMatch, FullMatch, FullMatches);
impl_record!(Track, Track, Tracks);

fn join_ids(ids: &[StubId]) -> String {
    ids.iter()
        .map(|s| s.0.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

impl fmt::Display for Stub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stub={} layer={} phi={:.6} r={:.3} z={:.3} local_phi={:.6} source={}",
            self.id.0,
            self.hit.layer,
            self.phi(),
            self.hit.r,
            self.hit.z,
            self.local_phi,
            self.source
        )
    }
}

impl fmt::Display for StubPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pair={},{}", self.inner.id.0, self.outer.id.0)
    }
}

impl fmt::Display for StubTriplet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "triplet={},{},{}",
            self.inner.id.0, self.middle.id.0, self.outer.id.0
        )
    }
}

impl fmt::Display for TrackletParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "phi0={:.6} dphi_dr={:.6e} z0={:.3} t={:.4}",
            self.phi0, self.dphi_dr, self.z0, self.t
        )
    }
}

impl fmt::Display for Tracklet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tracklet={} seed={} stubs={} {}",
            self.id,
            self.seed_index,
            join_ids(&self.stubs),
            self.params
        )
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "projection={} seed={} {}", self.tracklet, self.seed_index, self.params)
    }
}

impl fmt::Display for CandidateMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "candidate={} stub={}", self.projection.tracklet, self.stub.id.0)
    }
}

impl fmt::Display for FullMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "match={} stub={} dphi={:.6} dz={:.3}",
            self.tracklet, self.stub.id.0, self.residual_phi, self.residual_z
        )
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "track={} seed={} stubs={} {}",
            self.tracklet,
            self.seed_index,
            join_ids(&self.stubs),
            self.params
        )
    }
}
