//! Text descriptions of a sector's memories, processors and wires.
//!
//! Three line-oriented files describe a pipeline graph:
//!
//! ```text
//! # memorymodules.dat
//! InputLink: IL_L1PHIA_PS10G_1_A [36]
//! AllStubs: AS_L1PHIA
//!
//! # processingmodules.dat
//! VMRouter: VMR_L1PHIA
//!
//! # wires.dat
//! IL_L1PHIA_PS10G_1_A input=> output=> VMR_L1PHIA.stubin
//! AS_L1PHIA input=> VMR_L1PHIA.allstubout output=> TC_L1L2A.innerallstubin
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. Tokens after the
//! module name are ignored.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::memory::MemoryKind;
use crate::process::ProcessKind;
use crate::wiring::PortSpec;

pub const MEMORY_FILE: &str = "memorymodules.dat";
pub const PROCESS_FILE: &str = "processingmodules.dat";
pub const WIRE_FILE: &str = "wires.dat";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryDecl {
    pub kind: MemoryKind,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDecl {
    pub kind: ProcessKind,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireDecl {
    pub memory: String,
    pub producer: Option<PortSpec>,
    pub consumer: Option<PortSpec>,
}

/// A parsed pipeline graph, ready to be applied to a sector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    pub memories: Vec<MemoryDecl>,
    pub processes: Vec<ProcessDecl>,
    pub wires: Vec<WireDecl>,
}

impl PipelineConfig {
    pub fn parse(memories: &str, processes: &str, wires: &str) -> Result<Self> {
        let config = Self {
            memories: parse_modules(memories, MemoryKind::from_tag)?
                .into_iter()
                .map(|(kind, name)| MemoryDecl { kind, name })
                .collect(),
            processes: parse_modules(processes, ProcessKind::from_tag)?
                .into_iter()
                .map(|(kind, name)| ProcessDecl { kind, name })
                .collect(),
            wires: parse_wires(wires)?,
        };
        debug!(
            memories = config.memories.len(),
            processes = config.processes.len(),
            wires = config.wires.len(),
            "pipeline configuration parsed"
        );
        Ok(config)
    }

    /// Read the three description files from `dir`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let memories = fs::read_to_string(dir.join(MEMORY_FILE))?;
        let processes = fs::read_to_string(dir.join(PROCESS_FILE))?;
        let wires = fs::read_to_string(dir.join(WIRE_FILE))?;
        Self::parse(&memories, &processes, &wires)
    }
}

/// Non-blank, non-comment lines with their 1-based line numbers.
fn content_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

fn parse_modules<K>(text: &str, resolve: impl Fn(&str) -> Result<K>) -> Result<Vec<(K, String)>> {
    content_lines(text)
        .map(|(line, content)| {
            let mut tokens = content.split_whitespace();
            let (Some(tag), Some(name)) = (tokens.next(), tokens.next()) else {
                return Err(Error::Parse {
                    line,
                    message: format!("expected `Type: name`, got `{content}`"),
                });
            };
            let kind = resolve(tag).map_err(|err| Error::Parse {
                line,
                message: err.to_string(),
            })?;
            Ok((kind, name.to_string()))
        })
        .collect()
}

fn parse_wires(text: &str) -> Result<Vec<WireDecl>> {
    content_lines(text)
        .map(|(line, content)| {
            let malformed = |message: String| Error::Parse { line, message };
            let tokens: Vec<&str> = content.split_whitespace().collect();
            let input = tokens.iter().position(|t| *t == "input=>");
            let output = tokens.iter().position(|t| *t == "output=>");
            let (Some(input), Some(output)) = (input, output) else {
                return Err(malformed(format!(
                    "expected `memory input=> [proc.port] output=> [proc.port]`, got `{content}`"
                )));
            };
            if input != 1 || output <= input {
                return Err(malformed(format!("misplaced wire markers in `{content}`")));
            }
            let producer = &tokens[input + 1..output];
            let consumer = &tokens[output + 1..];
            if producer.len() > 1 || consumer.len() > 1 {
                return Err(malformed(format!("more than one port per side in `{content}`")));
            }
            Ok(WireDecl {
                memory: tokens[0].to_string(),
                producer: producer.first().and_then(|spec| PortSpec::parse(spec)),
                consumer: consumer.first().and_then(|spec| PortSpec::parse(spec)),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMORIES: &str = "\
# input links
InputLink: IL_L1PHIA_PS10G_1_A [36]

AllStubs: AS_L1PHIA
StubPairsDisplaced: SPD_L1L2A
";

    const PROCESSES: &str = "\
VMRouter: VMR_L1PHIA
DiskMatchCalculator: MC_D1PHIA
";

    const WIRES: &str = "\
IL_L1PHIA_PS10G_1_A input=> output=> VMR_L1PHIA.stubin
AS_L1PHIA input=> VMR_L1PHIA.allstubout output=> MC_D1PHIA.allstubin
SPD_L1L2A input=> output=>
";

    #[test]
    fn parses_all_three_files() {
        let config = PipelineConfig::parse(MEMORIES, PROCESSES, WIRES).unwrap();
        assert_eq!(config.memories.len(), 3);
        assert_eq!(config.memories[0].kind, MemoryKind::InputLink);
        assert_eq!(config.memories[0].name, "IL_L1PHIA_PS10G_1_A");
        assert_eq!(config.memories[2].kind, MemoryKind::StubPairs);
        assert_eq!(config.processes[1].kind, ProcessKind::MatchCalculator);

        assert_eq!(config.wires.len(), 3);
        assert_eq!(config.wires[0].producer, None);
        assert_eq!(config.wires[0].consumer.as_ref().unwrap().port, "stubin");
        assert_eq!(
            config.wires[1].producer.as_ref().unwrap().processor,
            "VMR_L1PHIA"
        );
        assert!(config.wires[2].producer.is_none() && config.wires[2].consumer.is_none());
    }

    #[test]
    fn unknown_tag_reports_line() {
        let err = PipelineConfig::parse("AllStubs: AS_A\n\nBogus: X\n", "", "").unwrap_err();
        match err {
            Error::Parse { line, message } => {
                assert_eq!(line, 3);
                assert_eq!(message, "unknown memory type: Bogus:");
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert!(matches!(
            PipelineConfig::parse("AllStubs:\n", "", ""),
            Err(Error::Parse { line: 1, .. })
        ));
        assert!(matches!(
            PipelineConfig::parse("", "", "AS_A VMR.allstubout TC.innerallstubin\n"),
            Err(Error::Parse { line: 1, .. })
        ));
        assert!(matches!(
            PipelineConfig::parse("", "", "AS_A input=> a.x b.y output=>\n"),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn load_reads_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(MEMORY_FILE), MEMORIES).unwrap();
        fs::write(dir.path().join(PROCESS_FILE), PROCESSES).unwrap();
        fs::write(dir.path().join(WIRE_FILE), WIRES).unwrap();
        let config = PipelineConfig::load(dir.path()).unwrap();
        assert_eq!(config.processes.len(), 2);

        fs::remove_file(dir.path().join(WIRE_FILE)).unwrap();
        assert!(matches!(PipelineConfig::load(dir.path()), Err(Error::Io(_))));
    }
}
