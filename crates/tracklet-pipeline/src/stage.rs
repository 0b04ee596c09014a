//! The catalogue of pipeline stages.
//!
//! A stage groups every processor of one kind. The driver executes stages in
//! [`Stage::PIPELINE`] order; nothing inside a sector enforces that order, a
//! stage run too early simply sees empty inputs.

use std::fmt;

/// One step of the per-sector pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Input links to all-stub and virtual-module memories.
    Router,
    TrackletEngine,
    TrackletEngineDisplaced,
    TripletEngine,
    TrackletCalculator,
    /// Combined engine and calculator.
    TrackletProcessor,
    TrackletCalculatorDisplaced,
    ProjectionRouter,
    MatchEngine,
    MatchCalculator,
    /// Combined projection router, match engine and match calculator.
    MatchProcessor,
    FitTrack,
    PurgeDuplicate,
}

impl Stage {
    /// Data-dependency order of one processing cycle.
    pub const PIPELINE: [Self; 13] = [
        Self::Router,
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

    /// Short mnemonic used in logs.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Router => "VMR",
            Self::TrackletEngine => "TE",
            Self::TrackletEngineDisplaced => "TED",
            Self::TripletEngine => "TRE",
            Self::TrackletCalculator => "TC",
            Self::TrackletProcessor => "TP",
            Self::TrackletCalculatorDisplaced => "TCD",
            Self::ProjectionRouter => "PR",
            Self::MatchEngine => "ME",
            Self::MatchCalculator => "MC",
            Self::MatchProcessor => "MP",
            Self::FitTrack => "FT",
            Self::PurgeDuplicate => "PD",
        }
    }

    /// Position in [`Stage::PIPELINE`].
    pub fn position(self) -> usize {
        Self::PIPELINE
            .iter()
            .position(|s| *s == self)
            .unwrap_or(Self::PIPELINE.len())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
