//! Named text streams for monitoring output and memory dumps.
//!
//! Streams are either kept in memory or written as files under a per-sector
//! directory. Writes append; [`Diagnostics::truncate`] starts a stream over.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

/// Stream receiving per-link stub counts before routing.
pub const INPUT_LINK_STREAM: &str = "inputlink.txt";
/// Stream receiving projection occupancy after tracklet calculation.
pub const PROJECTION_OCCUPANCY_STREAM: &str = "trackprojocc.txt";
/// Stream receiving per-cycle match tallies.
pub const MATCH_TALLY_STREAM: &str = "nmatchessector.txt";

#[derive(Debug)]
enum Sink {
    Memory(BTreeMap<String, String>),
    Directory(PathBuf),
}

#[derive(Debug)]
pub struct Diagnostics {
    sink: Sink,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl Diagnostics {
    pub fn in_memory() -> Self {
        Self {
            sink: Sink::Memory(BTreeMap::new()),
        }
    }

    /// Streams as files in `root/sector<index>`, created if missing.
    pub fn in_directory(root: impl AsRef<Path>, sector: u32) -> Result<Self> {
        let dir = root.as_ref().join(format!("sector{sector}"));
        fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "diagnostics directory ready");
        Ok(Self {
            sink: Sink::Directory(dir),
        })
    }

    pub fn write_line(&mut self, stream: &str, line: &str) -> Result<()> {
        match &mut self.sink {
            Sink::Memory(streams) => {
                let text = streams.entry(stream.to_string()).or_default();
                text.push_str(line);
                text.push('\n');
            }
            Sink::Directory(dir) => {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(dir.join(stream))?;
                writeln!(file, "{line}")?;
            }
        }
        Ok(())
    }

    /// Empty a stream, creating it if needed.
    pub fn truncate(&mut self, stream: &str) -> Result<()> {
        match &mut self.sink {
            Sink::Memory(streams) => {
                streams.insert(stream.to_string(), String::new());
            }
            Sink::Directory(dir) => {
                File::create(dir.join(stream))?;
            }
        }
        Ok(())
    }

    /// Current contents of a stream, if it was ever written.
    pub fn contents(&self, stream: &str) -> Option<String> {
        match &self.sink {
            Sink::Memory(streams) => streams.get(stream).cloned(),
            Sink::Directory(dir) => fs::read_to_string(dir.join(stream)).ok(),
        }
    }

    /// Directory backing the streams, if any.
    pub fn directory(&self) -> Option<&Path> {
        match &self.sink {
            Sink::Memory(_) => None,
            Sink::Directory(dir) => Some(dir),
        }
    }
}
