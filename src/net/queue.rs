//! The Dispatcher's bounded inbound command FIFO.
//!
//! # Design
//! `spec.md` §4.6: "bounded; overflow drops oldest commands and increments
//! a counter (commands are operator input, not telemetry)." A
//! `std::sync::mpsc` channel blocks the producer on overflow rather than
//! dropping, so this is a small `Mutex`-protected `VecDeque` instead, the
//! same "mutex-protected, short critical sections" shape `spec.md` §5
//! calls for, and the same shape the teacher's `NetworkProcessor` gives its
//! own internal staging buffers.
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::command::CommandRecord;

/// A bounded FIFO of [`CommandRecord`]s shared between the bus callback
/// (producer) and the Dispatcher loop (consumer).
pub struct CommandQueue {
    capacity: usize,
    inner: Mutex<VecDeque<CommandRecord>>,
    not_empty: Condvar,
}

impl CommandQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            not_empty: Condvar::new(),
        }
    }

    /// Push a record, returning `true` if an older record was dropped to
    /// make room.
    pub fn push(&self, record: CommandRecord) -> bool {
        let mut queue = self.inner.lock().unwrap();
        let dropped = if queue.len() >= self.capacity {
            queue.pop_front();
            true
        } else {
            false
        };
        queue.push_back(record);
        self.not_empty.notify_one();
        dropped
    }

    /// Block until a record is available, or `running` returns `false`.
    /// Returns `None` only when told to stop while the queue stayed empty.
    pub fn pop_blocking(&self, mut should_continue: impl FnMut() -> bool) -> Option<CommandRecord> {
        let mut queue = self.inner.lock().unwrap();
        loop {
            if let Some(record) = queue.pop_front() {
                return Some(record);
            }
            if !should_continue() {
                return None;
            }
            let (guard, _timeout) = self
                .not_empty
                .wait_timeout(queue, std::time::Duration::from_millis(100))
                .unwrap();
            queue = guard;
        }
    }
}
