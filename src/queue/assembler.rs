//! Chunk reassembly
//!
//! Chunks sharing a `chunk_id` are collected until every index in
//! `[0, total_chunks)` is present, then joined in index order into one
//! message. Assemblies that never complete are force-completed by their
//! owner and marked partial.

use crate::queue::message::{MessageMetadata, Payload, ProcessingMessage};
use std::collections::{BTreeMap, HashMap};
use tokio::time::Instant;

/// A reassembled (or force-completed) message and how many chunks it used
#[derive(Debug, Clone)]
pub struct AssembledMessage {
    pub message: ProcessingMessage,
    pub parts: usize,
    pub expected: u32,
}

impl AssembledMessage {
    pub fn is_partial(&self) -> bool {
        self.message.metadata.is_partial
    }
}

/// What happened to a chunk handed to [`ChunkAssembler::add`]
#[derive(Debug)]
pub enum ChunkOutcome {
    /// First chunk of a new assembly
    Started { chunk_id: String },
    /// Stored; the assembly is still incomplete
    Pending,
    /// Index already present; the first copy is kept
    Duplicate,
    Complete(AssembledMessage),
    /// Not a usable chunk; handed back untouched
    NotAChunk(ProcessingMessage),
}

#[derive(Debug)]
struct ChunkAssembly {
    total_chunks: u32,
    parts: BTreeMap<u32, ProcessingMessage>,
    started_at: Instant,
}

#[derive(Debug, Default)]
pub struct ChunkAssembler {
    assemblies: HashMap<String, ChunkAssembly>,
}

impl ChunkAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, message: ProcessingMessage) -> ChunkOutcome {
        let Some((chunk_id, index, total)) = message
            .metadata
            .chunk_descriptor()
            .map(|(id, index, total)| (id.to_string(), index, total))
        else {
            return ChunkOutcome::NotAChunk(message);
        };

        let is_new = !self.assemblies.contains_key(&chunk_id);
        let assembly = self
            .assemblies
            .entry(chunk_id.clone())
            .or_insert_with(|| ChunkAssembly {
                total_chunks: total,
                parts: BTreeMap::new(),
                started_at: message.received_at,
            });

        if total != assembly.total_chunks {
            log::warn!(
                "Chunk {} of '{}' claims {} chunks, assembly expects {}",
                index,
                chunk_id,
                total,
                assembly.total_chunks
            );
            if index >= assembly.total_chunks {
                return ChunkOutcome::Duplicate;
            }
        }

        if assembly.parts.contains_key(&index) {
            log::debug!("Duplicate chunk {} of '{}' ignored", index, chunk_id);
            return ChunkOutcome::Duplicate;
        }
        assembly.parts.insert(index, message);

        if assembly.parts.len() as u32 == assembly.total_chunks {
            if let Some(assembly) = self.assemblies.remove(&chunk_id) {
                return ChunkOutcome::Complete(combine(&chunk_id, assembly));
            }
        }

        if is_new {
            ChunkOutcome::Started { chunk_id }
        } else {
            ChunkOutcome::Pending
        }
    }

    /// Complete an assembly with whatever chunks arrived
    pub fn force_complete(&mut self, chunk_id: &str) -> Option<AssembledMessage> {
        let assembly = self.assemblies.remove(chunk_id)?;
        if assembly.parts.is_empty() {
            return None;
        }
        Some(combine(chunk_id, assembly))
    }

    /// Force-complete every pending assembly, oldest first
    pub fn force_all(&mut self) -> Vec<AssembledMessage> {
        let mut ids: Vec<(Instant, String)> = self
            .assemblies
            .iter()
            .map(|(id, assembly)| (assembly.started_at, id.clone()))
            .collect();
        ids.sort();
        ids.into_iter()
            .filter_map(|(_, id)| self.force_complete(&id))
            .collect()
    }

    pub fn pending(&self) -> usize {
        self.assemblies.len()
    }

    /// Chunks currently held across all assemblies
    pub fn held_chunks(&self) -> usize {
        self.assemblies.values().map(|a| a.parts.len()).sum()
    }

    pub fn held_bytes(&self) -> usize {
        self.assemblies
            .values()
            .flat_map(|a| a.parts.values())
            .map(|m| m.payload.size_bytes())
            .sum()
    }

    pub fn clear(&mut self) -> usize {
        let held = self.held_chunks();
        self.assemblies.clear();
        held
    }
}

fn combine(chunk_id: &str, assembly: ChunkAssembly) -> AssembledMessage {
    let expected = assembly.total_chunks;
    let parts = assembly.parts.len();
    let mut chunks = assembly.parts.into_values();

    // Callers never combine an empty assembly
    let first = chunks.next();
    let (received_at, mut metadata, first_payload) = match first {
        Some(m) => (m.received_at, m.metadata, Some(m.payload)),
        None => (assembly.started_at, MessageMetadata::default(), None),
    };

    let payload = Payload::concat(first_payload.into_iter().chain(chunks.map(|m| m.payload)));

    metadata.is_chunk = false;
    metadata.chunk_index = None;
    metadata.chunk_id = Some(chunk_id.to_string());
    metadata.total_chunks = Some(expected);
    metadata.is_partial = (parts as u32) < expected;

    AssembledMessage {
        message: ProcessingMessage::new(payload, metadata, received_at.min(assembly.started_at)),
        parts,
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, index: u32, total: u32, text: &str) -> ProcessingMessage {
        ProcessingMessage::new(
            Payload::from(text),
            MessageMetadata::chunk(id, index, total),
            Instant::now(),
        )
    }

    #[test]
    fn test_out_of_order_chunks_reassemble_once() {
        let mut assembler = ChunkAssembler::new();
        assert!(matches!(
            assembler.add(chunk("c", 2, 3, "C")),
            ChunkOutcome::Started { .. }
        ));
        assert!(matches!(
            assembler.add(chunk("c", 0, 3, "A")),
            ChunkOutcome::Pending
        ));
        let ChunkOutcome::Complete(done) = assembler.add(chunk("c", 1, 3, "B")) else {
            panic!("expected completion");
        };

        assert_eq!(done.message.payload, Payload::from("ABC"));
        assert!(!done.is_partial());
        assert_eq!(done.parts, 3);
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn test_duplicate_keeps_first_copy() {
        let mut assembler = ChunkAssembler::new();
        assembler.add(chunk("d", 0, 2, "first"));
        assert!(matches!(
            assembler.add(chunk("d", 0, 2, "second")),
            ChunkOutcome::Duplicate
        ));
        let ChunkOutcome::Complete(done) = assembler.add(chunk("d", 1, 2, "!")) else {
            panic!("expected completion");
        };
        assert_eq!(done.message.payload, Payload::from("first!"));
    }

    #[test]
    fn test_force_complete_marks_partial() {
        let mut assembler = ChunkAssembler::new();
        assembler.add(chunk("p", 0, 4, "a"));
        assembler.add(chunk("p", 3, 4, "d"));

        let forced = assembler.force_complete("p").unwrap();
        assert!(forced.is_partial());
        assert_eq!(forced.parts, 2);
        assert_eq!(forced.message.payload, Payload::from("ad"));
        assert!(assembler.force_complete("p").is_none());
    }

    #[test]
    fn test_malformed_chunk_is_returned() {
        let mut assembler = ChunkAssembler::new();
        let mut message = chunk("m", 0, 2, "x");
        message.metadata.chunk_id = None;
        assert!(matches!(
            assembler.add(message),
            ChunkOutcome::NotAChunk(_)
        ));
        assert_eq!(assembler.pending(), 0);
    }
}
