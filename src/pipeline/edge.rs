// src/pipeline/edge.rs

//! Thread-safe FIFO connecting an output port to its consumer.
//!
//! An edge is created from a [`Config`]; the only key it understands is
//! `capacity` (number of datums it can hold, `0` or absent = unbounded).
//! Pushing into a full edge blocks until the consumer makes room, or until
//! the consumer is marked complete, after which pushes are discarded.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::config::Config;
use crate::errors::Result;
use crate::pipeline::Datum;

/// Config key for the edge capacity.
pub const CONFIG_CAPACITY: &str = "capacity";

#[derive(Debug, Default)]
struct EdgeState {
    queue: VecDeque<Datum>,
    downstream_complete: bool,
}

#[derive(Debug)]
pub struct Edge {
    capacity: Option<usize>,
    state: Mutex<EdgeState>,
    /// Signalled when a datum is pushed.
    data_ready: Condvar,
    /// Signalled when a datum is removed or the consumer completes.
    space_ready: Condvar,
}

impl Edge {
    pub fn new(config: &Config) -> Result<Self> {
        let capacity = match config.get_value_or::<usize>(CONFIG_CAPACITY, 0)? {
            0 => None,
            n => Some(n),
        };

        Ok(Self {
            capacity,
            state: Mutex::new(EdgeState::default()),
            data_ready: Condvar::new(),
            space_ready: Condvar::new(),
        })
    }

    /// `None` means unbounded.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn has_data(&self) -> bool {
        !self.lock().queue.is_empty()
    }

    pub fn full_of_data(&self) -> bool {
        match self.capacity {
            Some(cap) => self.lock().queue.len() >= cap,
            None => false,
        }
    }

    pub fn datum_count(&self) -> usize {
        self.lock().queue.len()
    }

    /// Append a datum, blocking while the edge is full.
    ///
    /// Once the consumer is complete the datum is dropped instead.
    pub fn push_datum(&self, datum: Datum) {
        let mut state = self.lock();
        if let Some(cap) = self.capacity {
            while state.queue.len() >= cap && !state.downstream_complete {
                state = self
                    .space_ready
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }
        if state.downstream_complete {
            trace!(datum = ?datum.datum_type(), "consumer complete; dropping datum");
            return;
        }
        state.queue.push_back(datum);
        drop(state);
        self.data_ready.notify_one();
    }

    /// Remove the oldest datum, blocking until one is available.
    pub fn get_datum(&self) -> Datum {
        let mut state = self.lock();
        loop {
            if let Some(datum) = state.queue.pop_front() {
                drop(state);
                self.space_ready.notify_one();
                return datum;
            }
            state = self
                .data_ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Remove the oldest datum if there is one. Never blocks.
    pub fn try_get_datum(&self) -> Option<Datum> {
        let datum = self.lock().queue.pop_front();
        if datum.is_some() {
            self.space_ready.notify_one();
        }
        datum
    }

    /// Clone of the oldest datum, left in place.
    pub fn peek_datum(&self) -> Option<Datum> {
        self.lock().queue.front().cloned()
    }

    /// Drop the oldest datum, if any.
    pub fn pop_datum(&self) {
        let _ = self.try_get_datum();
    }

    /// The consumer will not read again: discard what is queued, release
    /// blocked producers and drop everything pushed from now on.
    pub fn mark_downstream_complete(&self) {
        let mut state = self.lock();
        state.downstream_complete = true;
        state.queue.clear();
        drop(state);
        self.space_ready.notify_all();
    }

    pub fn is_downstream_complete(&self) -> bool {
        self.lock().downstream_complete
    }

    fn lock(&self) -> MutexGuard<'_, EdgeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
