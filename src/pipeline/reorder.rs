//! Order-preserving sink in front of a stream writer.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Mutex;

use crate::descriptor::{StreamWriter, Value};
use crate::{Result, RetrievalError};

/// A record waiting for its turn, ordered by image index.
struct Pending {
    index: usize,
    value: Value,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index.cmp(&other.index)
    }
}

struct SinkState {
    writer: StreamWriter,
    /// Number of records written so far; the next index due out.
    head: usize,
    queue: BinaryHeap<Reverse<Pending>>,
}

/// Accepts `(image index, record)` pairs in any order and writes them to
/// the underlying property file in index order.
///
/// Workers complete images out of order; each completed record is pushed
/// here, buffered in a min-heap keyed by index, and drained to the writer
/// whenever the record at the current head arrives. The lock is held only
/// for the push-and-drain, never across descriptor computation.
pub struct OrderedSink {
    name: String,
    state: Mutex<SinkState>,
}

impl OrderedSink {
    /// Wrap `writer` as an ordered sink for the stream called `name`.
    pub fn new(name: impl Into<String>, writer: StreamWriter) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(SinkState {
                writer,
                head: 0,
                queue: BinaryHeap::new(),
            }),
        }
    }

    /// Stream name this sink writes.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue the record for image `index`, then drain everything that
    /// is now in order.
    ///
    /// Every index at or past the current head is acceptable; an index
    /// below the head would mean the slot was already written and is a
    /// [`RetrievalError::State`].
    pub fn push(&self, index: usize, value: Value) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if index < state.head {
            return Err(RetrievalError::State(format!(
                "stream '{}': record {index} pushed below head {}",
                self.name, state.head
            )));
        }

        state.queue.push(Reverse(Pending { index, value }));

        while state
            .queue
            .peek()
            .is_some_and(|Reverse(p)| p.index == state.head)
        {
            let Some(Reverse(pending)) = state.queue.pop() else {
                break;
            };
            let head = state.head;
            state.writer.insert_at(head, &pending.value)?;
            state.head += 1;
        }
        Ok(())
    }

    /// Number of records flushed to the writer.
    #[must_use]
    pub fn written(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .head
    }

    /// Whether every pushed record has been written.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .queue
            .is_empty()
    }

    /// Close the sink, failing if records are still buffered (a gap in
    /// the index sequence was never filled).
    pub fn finish(self) -> Result<usize> {
        let state = self
            .state
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if !state.queue.is_empty() {
            return Err(RetrievalError::State(format!(
                "stream '{}': {} records still buffered at head {}",
                self.name,
                state.queue.len(),
                state.head
            )));
        }
        state.writer.finish()?;
        Ok(state.head)
    }
}
