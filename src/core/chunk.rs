//! Encoded chunk storage shared between track buffers.
//!
//! A chunk list is built once from demux output and never mutated afterwards;
//! copies of a track buffer share the same list through an `Arc`. Position
//! lookups use explicit identity (list id + index) rather than comparing
//! chunk values, so two chunks with equal timestamps never get confused.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::core::time::TimeUs;

/// Whether a chunk can be decoded on its own or needs its group's key chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Key,
    Delta,
}

/// Identity of one shared chunk list.
pub type ChunkListId = u64;

/// Explicit position of a chunk inside its owning list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPos {
    pub list: ChunkListId,
    pub index: usize,
}

/// One encoded sample: timestamp and duration in microseconds, payload bytes
/// shared with every copy of the owning list.
#[derive(Debug, Clone)]
pub struct EncodedChunk {
    pub timestamp: TimeUs,
    pub duration: TimeUs,
    pub kind: ChunkKind,
    pub data: Arc<[u8]>,
    list: ChunkListId,
    index: usize,
}

impl EncodedChunk {
    /// A chunk not yet stamped into a list. `ChunkList::new` assigns identity.
    pub fn new(timestamp: TimeUs, duration: TimeUs, kind: ChunkKind, data: Arc<[u8]>) -> Self {
        Self {
            timestamp,
            duration,
            kind,
            data,
            list: 0,
            index: 0,
        }
    }

    pub fn is_key(&self) -> bool {
        self.kind == ChunkKind::Key
    }

    /// Exclusive end of the chunk's presentation interval.
    pub fn end(&self) -> TimeUs {
        self.timestamp + self.duration
    }

    pub fn position(&self) -> ChunkPos {
        ChunkPos {
            list: self.list,
            index: self.index,
        }
    }

    /// Re-addressed copy sharing the payload. Identity is preserved: the
    /// result still answers to the original list position, so cursors built
    /// from it keep working after export remapping.
    pub fn with_timestamp(&self, timestamp: TimeUs) -> Self {
        Self {
            timestamp,
            ..self.clone()
        }
    }
}

static NEXT_LIST_ID: AtomicU64 = AtomicU64::new(1);

/// Immutable run of chunks in decode order, sharable between track copies.
///
/// Ordering invariant: ascending timestamps, decode order equals storage
/// order. A group is a maximal run starting at a key chunk.
#[derive(Debug, Clone)]
pub struct ChunkList {
    id: ChunkListId,
    chunks: Arc<[EncodedChunk]>,
}

impl ChunkList {
    /// Stamp identity onto `chunks` and freeze them. Callers must supply
    /// chunks already sorted ascending by timestamp.
    pub fn new(mut chunks: Vec<EncodedChunk>) -> Self {
        let id = NEXT_LIST_ID.fetch_add(1, Ordering::Relaxed);
        for (index, chunk) in chunks.iter_mut().enumerate() {
            chunk.list = id;
            chunk.index = index;
        }
        debug_assert!(chunks.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        Self {
            id,
            chunks: chunks.into(),
        }
    }

    pub fn id(&self) -> ChunkListId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EncodedChunk> {
        self.chunks.get(index)
    }

    pub fn as_slice(&self) -> &[EncodedChunk] {
        &self.chunks
    }

    /// Whether `chunk` belongs to this list (identity, not value).
    pub fn owns(&self, chunk: &EncodedChunk) -> bool {
        chunk.list == self.id && chunk.index < self.chunks.len()
    }

    /// Presentation end of the last chunk, or 0 for an empty list.
    pub fn duration_us(&self) -> TimeUs {
        self.chunks.last().map_or(0, |c| c.end())
    }

    /// Index of the chunk presenting at time `t`. A chunk covers from its
    /// timestamp up to the next chunk's timestamp (decoded frames stay on
    /// screen until replaced); the final chunk covers through its duration.
    pub fn index_at_time(&self, t: TimeUs) -> Option<usize> {
        if t < 0 {
            return None;
        }
        let after = self.chunks.partition_point(|c| c.timestamp <= t);
        if after == 0 {
            return None;
        }
        let index = after - 1;
        if index == self.chunks.len() - 1 && t >= self.chunks[index].end() {
            return None;
        }
        Some(index)
    }

    /// Index of the key chunk opening the group that contains `index`.
    pub fn group_start(&self, index: usize) -> usize {
        let mut i = index.min(self.chunks.len().saturating_sub(1));
        while i > 0 && !self.chunks[i].is_key() {
            i -= 1;
        }
        i
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;

    /// Build a list of `n` chunks of `dur` µs each, with a key chunk opening
    /// every `group` chunks.
    pub fn chunk_list(n: usize, dur: TimeUs, group: usize) -> ChunkList {
        let chunks = (0..n)
            .map(|i| {
                let kind = if group == 0 || i % group == 0 {
                    ChunkKind::Key
                } else {
                    ChunkKind::Delta
                };
                EncodedChunk::new(i as TimeUs * dur, dur, kind, Arc::from([0u8; 4]))
            })
            .collect();
        ChunkList::new(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::chunk_list;
    use super::*;

    #[test]
    fn test_identity_stamping() {
        let list = chunk_list(5, 1000, 2);
        for (i, chunk) in list.as_slice().iter().enumerate() {
            assert_eq!(chunk.position().list, list.id());
            assert_eq!(chunk.position().index, i);
            assert!(list.owns(chunk));
        }
    }

    #[test]
    fn test_lists_get_distinct_ids() {
        let a = chunk_list(2, 1000, 1);
        let b = chunk_list(2, 1000, 1);
        assert_ne!(a.id(), b.id());
        assert!(!a.owns(&b.as_slice()[0]));
    }

    #[test]
    fn test_clone_shares_identity() {
        let a = chunk_list(3, 1000, 3);
        let b = a.clone();
        assert_eq!(a.id(), b.id());
        assert!(b.owns(&a.as_slice()[2]));
    }

    #[test]
    fn test_index_at_time() {
        let list = chunk_list(4, 1000, 2); // spans [0, 4000)
        assert_eq!(list.index_at_time(0), Some(0));
        assert_eq!(list.index_at_time(999), Some(0));
        assert_eq!(list.index_at_time(1000), Some(1));
        assert_eq!(list.index_at_time(3999), Some(3));
        assert_eq!(list.index_at_time(4000), None);
        assert_eq!(list.index_at_time(-1), None);
    }

    #[test]
    fn test_group_start() {
        let list = chunk_list(7, 1000, 3); // keys at 0, 3, 6
        assert_eq!(list.group_start(0), 0);
        assert_eq!(list.group_start(2), 0);
        assert_eq!(list.group_start(3), 3);
        assert_eq!(list.group_start(5), 3);
        assert_eq!(list.group_start(6), 6);
    }

    #[test]
    fn test_retimed_copy_keeps_identity() {
        let list = chunk_list(3, 1000, 3);
        let original = &list.as_slice()[1];
        let remapped = original.with_timestamp(500_000);
        assert_eq!(remapped.timestamp, 500_000);
        assert_eq!(remapped.position(), original.position());
        assert!(list.owns(&remapped));
        assert!(Arc::ptr_eq(&remapped.data, &original.data));
    }

    #[test]
    fn test_duration() {
        let list = chunk_list(10, 1000, 5);
        assert_eq!(list.duration_us(), 10_000);
        assert_eq!(ChunkList::new(Vec::new()).duration_us(), 0);
    }
}
