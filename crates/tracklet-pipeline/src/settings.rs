//! Per-run sector settings.

use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracklet_geometry::{SectorWindow, DEFAULT_SECTOR_COUNT};

use crate::error::Result;

/// Extra azimuthal coverage added on each side of a sector by default.
pub const DEFAULT_OVERLAP: f64 = 0.05;

/// Which monitoring streams a sector writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Stubs per input link before routing, to `inputlink.txt`.
    pub input_link: bool,
    /// Projections per memory after tracklet calculation, to `trackprojocc.txt`.
    pub track_projection_occupancy: bool,
    /// Matches per seeding layer at the end of each cycle, to `nmatchessector.txt`.
    pub n_matches: bool,
}

/// Settings shared by every sector of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectorSettings {
    /// Number of sectors tiling the full azimuth.
    pub sector_count: u32,
    /// Half of each sector's coverage, including overlap.
    pub half_window: f64,
    /// Most stubs an input link takes per cycle. Unlimited when absent.
    pub max_stubs_per_link: Option<usize>,
    /// Shared stubs at which PurgeDuplicate drops the later track.
    pub min_shared_stubs: usize,
    pub monitor: MonitorSettings,
    /// Directory for diagnostic streams; kept in memory when absent.
    pub diagnostics_dir: Option<PathBuf>,
}

impl Default for SectorSettings {
    fn default() -> Self {
        Self {
            sector_count: DEFAULT_SECTOR_COUNT,
            half_window: PI / DEFAULT_SECTOR_COUNT as f64 + DEFAULT_OVERLAP,
            max_stubs_per_link: None,
            min_shared_stubs: 3,
            monitor: MonitorSettings::default(),
            diagnostics_dir: None,
        }
    }
}

impl SectorSettings {
    /// Read settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// The window of sector `index` under these settings.
    pub fn window(&self, index: u32) -> Result<SectorWindow> {
        Ok(SectorWindow::new(index, self.sector_count, self.half_window)?)
    }

    /// Set the sector count, keeping the same overlap.
    pub fn with_sector_count(mut self, count: u32) -> Self {
        let overlap = self.half_window - PI / self.sector_count.max(1) as f64;
        self.sector_count = count;
        self.half_window = PI / count.max(1) as f64 + overlap;
        self
    }

    pub fn with_half_window(mut self, half_window: f64) -> Self {
        self.half_window = half_window;
        self
    }

    pub fn with_max_stubs_per_link(mut self, max: usize) -> Self {
        self.max_stubs_per_link = Some(max);
        self
    }

    pub fn with_min_shared_stubs(mut self, min: usize) -> Self {
        self.min_shared_stubs = min;
        self
    }

    pub fn with_monitor(mut self, monitor: MonitorSettings) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_diagnostics_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.diagnostics_dir = Some(dir.into());
        self
    }
}
