//! Wiring of memories to processor ports.

use std::fmt;

use tracing::trace;

use crate::error::{Error, Result};
use crate::memory::Memory;
use crate::process::{Direction, Processor};
use crate::registry::{MemoryId, ProcessId, Registry};

/// A `processor.port` reference as written in wire descriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    pub processor: String,
    pub port: String,
}

impl PortSpec {
    /// Parse `proc.port`. An empty spec means "not connected"; a spec without
    /// a dot names the processor with an empty port.
    pub fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return None;
        }
        let (processor, port) = spec.split_once('.').unwrap_or((spec, ""));
        Some(Self {
            processor: processor.to_string(),
            port: port.to_string(),
        })
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.processor, self.port)
    }
}

/// One recorded wire, with resolved indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireEdge {
    pub memory: MemoryId,
    pub producer: Option<(ProcessId, String)>,
    pub consumer: Option<(ProcessId, String)>,
}

/// Every wire made in a sector, in order.
#[derive(Debug, Clone, Default)]
pub struct Wiring {
    edges: Vec<WireEdge>,
}

impl Wiring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `memory` as the output of `producer` and the input of `consumer`.
    ///
    /// All names are resolved and both ports checked before anything is
    /// attached, so a failing wire leaves the graph untouched. Wiring the same
    /// pair twice attaches twice.
    pub fn wire(
        &mut self,
        registry: &mut Registry,
        memory: &str,
        producer: Option<&PortSpec>,
        consumer: Option<&PortSpec>,
    ) -> Result<&WireEdge> {
        let memory_id = registry.memory_id(memory)?;
        let producer = producer
            .map(|spec| registry.processor_id(&spec.processor).map(|id| (id, spec.port.clone())))
            .transpose()?;
        let consumer = consumer
            .map(|spec| registry.processor_id(&spec.processor).map(|id| (id, spec.port.clone())))
            .transpose()?;

        let mem = registry.memory(memory_id).ok_or_else(|| not_found("memory", memory))?;
        if let Some((id, port)) = &producer {
            let proc = registry
                .processor(*id)
                .ok_or_else(|| not_found("processing module", &id.to_string()))?;
            proc.check_port(Direction::Output, port, mem)?;
        }
        if let Some((id, port)) = &consumer {
            let proc = registry
                .processor(*id)
                .ok_or_else(|| not_found("processing module", &id.to_string()))?;
            proc.check_port(Direction::Input, port, mem)?;
        }

        if let Some((id, port)) = &producer {
            let (proc, mem) = endpoint(registry, *id, memory_id, memory)?;
            proc.add_output(port, memory_id, mem)?;
        }
        if let Some((id, port)) = &consumer {
            let (proc, mem) = endpoint(registry, *id, memory_id, memory)?;
            proc.add_input(port, memory_id, mem)?;
        }

        trace!(
            memory,
            producer = ?producer.as_ref().map(|(id, port)| (id.index(), port.as_str())),
            consumer = ?consumer.as_ref().map(|(id, port)| (id.index(), port.as_str())),
            "wired"
        );
        self.edges.push(WireEdge {
            memory: memory_id,
            producer,
            consumer,
        });
        Ok(&self.edges[self.edges.len() - 1])
    }

    pub fn edges(&self) -> &[WireEdge] {
        &self.edges
    }

    /// Processors writing into `memory`.
    pub fn producers_of(&self, memory: MemoryId) -> impl Iterator<Item = ProcessId> + '_ {
        self.edges
            .iter()
            .filter(move |e| e.memory == memory)
            .filter_map(|e| e.producer.as_ref().map(|(id, _)| *id))
    }

    /// Processors reading from `memory`.
    pub fn consumers_of(&self, memory: MemoryId) -> impl Iterator<Item = ProcessId> + '_ {
        self.edges
            .iter()
            .filter(move |e| e.memory == memory)
            .filter_map(|e| e.consumer.as_ref().map(|(id, _)| *id))
    }
}

/// The processor to attach to, alongside the memory being attached.
fn endpoint<'a>(
    registry: &'a mut Registry,
    process: ProcessId,
    memory: MemoryId,
    name: &str,
) -> Result<(&'a mut Processor, &'a Memory)> {
    let (proc, memories) = registry
        .split_mut(process)
        .ok_or_else(|| not_found("processing module", &process.to_string()))?;
    let memories: &'a [Memory] = memories;
    let mem = memories
        .get(memory.index())
        .ok_or_else(|| not_found("memory", name))?;
    Ok((proc, mem))
}

fn not_found(component: &'static str, name: &str) -> Error {
    Error::NotFound {
        component,
        name: name.to_string(),
    }
}
