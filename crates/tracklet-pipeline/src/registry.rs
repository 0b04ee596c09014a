//! Name-indexed arenas of memories and processors.
//!
//! Components are stored in insertion order and addressed by dense ids.
//! Memories and processors live in separate name namespaces, so a memory and
//! a processor may share a name.

use std::collections::HashMap;
use std::fmt;

use tracing::trace;

use crate::error::{Error, Result};
use crate::kernel::StageKernel;
use crate::memory::{Memory, MemoryKind};
use crate::process::{ProcessKind, Processor};
use crate::stage::Stage;

/// Index of a memory within its sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemoryId(u32);

impl MemoryId {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// Index of a processor within its sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(u32);

impl ProcessId {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// All components of one sector.
#[derive(Debug, Default)]
pub struct Registry {
    memories: Vec<Memory>,
    processors: Vec<Processor>,
    memory_names: HashMap<String, MemoryId>,
    process_names: HashMap<String, ProcessId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a memory. Fails without side effects if the name is taken.
    pub fn create_memory(&mut self, memory: Memory) -> Result<MemoryId> {
        if self.memory_names.contains_key(memory.name()) {
            return Err(Error::DuplicateName {
                component: "memory",
                name: memory.name().to_string(),
            });
        }
        let id = MemoryId::new(self.memories.len() as u32);
        trace!(memory = %memory.name(), kind = %memory.kind(), %id, "memory created");
        self.memory_names.insert(memory.name().to_string(), id);
        self.memories.push(memory);
        Ok(id)
    }

    /// Register a processor built by `kernel`. Fails without side effects if
    /// the name is taken.
    pub fn create_processor(
        &mut self,
        kind: ProcessKind,
        name: &str,
        kernel: Box<dyn StageKernel>,
    ) -> Result<ProcessId> {
        if self.process_names.contains_key(name) {
            return Err(Error::DuplicateName {
                component: "processing module",
                name: name.to_string(),
            });
        }
        let id = ProcessId::new(self.processors.len() as u32);
        trace!(process = %name, %kind, %id, "processor created");
        self.process_names.insert(name.to_string(), id);
        self.processors.push(Processor::new(id, kind, name, kernel));
        Ok(id)
    }

    pub fn memory_id(&self, name: &str) -> Result<MemoryId> {
        self.memory_names
            .get(name)
            .copied()
            .ok_or_else(|| Error::NotFound {
                component: "memory",
                name: name.to_string(),
            })
    }

    pub fn processor_id(&self, name: &str) -> Result<ProcessId> {
        self.process_names
            .get(name)
            .copied()
            .ok_or_else(|| Error::NotFound {
                component: "processing module",
                name: name.to_string(),
            })
    }

    pub fn memory(&self, id: MemoryId) -> Option<&Memory> {
        self.memories.get(id.index())
    }

    pub fn memory_mut(&mut self, id: MemoryId) -> Option<&mut Memory> {
        self.memories.get_mut(id.index())
    }

    pub fn processor(&self, id: ProcessId) -> Option<&Processor> {
        self.processors.get(id.index())
    }

    pub fn processor_mut(&mut self, id: ProcessId) -> Option<&mut Processor> {
        self.processors.get_mut(id.index())
    }

    pub fn find_memory(&self, name: &str) -> Result<&Memory> {
        let id = self.memory_id(name)?;
        Ok(&self.memories[id.index()])
    }

    pub fn find_processor(&self, name: &str) -> Result<&Processor> {
        let id = self.processor_id(name)?;
        Ok(&self.processors[id.index()])
    }

    /// Memories in creation order.
    pub fn memories(&self) -> impl Iterator<Item = (MemoryId, &Memory)> {
        self.memories
            .iter()
            .enumerate()
            .map(|(i, m)| (MemoryId::new(i as u32), m))
    }

    /// Processors in creation order.
    pub fn processors(&self) -> impl Iterator<Item = &Processor> {
        self.processors.iter()
    }

    /// Memories of one kind, in creation order.
    pub fn memories_of(&self, kind: MemoryKind) -> impl Iterator<Item = &Memory> {
        self.memories.iter().filter(move |m| m.kind() == kind)
    }

    /// Ids of the processors belonging to `stage`, in creation order.
    pub fn processors_of(&self, stage: Stage) -> Vec<ProcessId> {
        self.processors
            .iter()
            .filter(|p| p.stage() == stage)
            .map(Processor::id)
            .collect()
    }

    pub fn memory_count(&self) -> usize {
        self.memories.len()
    }

    pub fn processor_count(&self) -> usize {
        self.processors.len()
    }

    /// Borrow one processor mutably alongside every memory.
    pub(crate) fn split_mut(&mut self, id: ProcessId) -> Option<(&mut Processor, &mut [Memory])> {
        let processor = self.processors.get_mut(id.index())?;
        Some((processor, &mut self.memories))
    }

    pub(crate) fn memories_mut(&mut self) -> &mut [Memory] {
        &mut self.memories
    }

    pub(crate) fn processors_mut(&mut self) -> impl Iterator<Item = &mut Processor> {
        self.processors.iter_mut()
    }
}
