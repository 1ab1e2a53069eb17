//! Timed wake-up device.
//!
//! A single thread owns a deadline heap of processes waiting to become
//! runnable: new arrivals and processes blocked on I/O. Requests come in
//! over a channel; the thread sleeps until either a new request or the
//! earliest deadline, then delivers every due process in deadline order.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Instant;

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use log::trace;

use crate::process::Process;
use crate::sim::clock::SimClock;
use crate::types::Ticks;

pub(crate) enum IoRequest {
    /// Deliver `process` once tick `at` is reached.
    Wake { process: Arc<Process>, at: Ticks },
    Stop,
}

pub(crate) fn channel() -> (Sender<IoRequest>, Receiver<IoRequest>) {
    crossbeam::channel::unbounded()
}

struct Pending {
    deadline: Instant,
    /// Tiebreaker for equal deadlines, in submission order.
    seq: u64,
    process: Arc<Process>,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Run the device until `Stop` or until every sender is gone.
/// Pending deliveries are dropped on exit.
pub(crate) fn run(
    rx: Receiver<IoRequest>,
    clock: &SimClock,
    mut deliver: impl FnMut(Arc<Process>),
) {
    let mut pending: BinaryHeap<Reverse<Pending>> = BinaryHeap::new();
    let mut seq: u64 = 0;

    loop {
        let req = match pending.peek() {
            Some(Reverse(next)) => {
                let timeout = next.deadline.saturating_duration_since(Instant::now());
                rx.recv_timeout(timeout)
            }
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match req {
            Ok(IoRequest::Wake { process, at }) => {
                trace!("io: pid={} due at tick {}", process.pid(), at);
                pending.push(Reverse(Pending {
                    deadline: clock.deadline(at),
                    seq,
                    process,
                }));
                seq += 1;
            }
            Ok(IoRequest::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        let now = Instant::now();
        while pending
            .peek()
            .is_some_and(|Reverse(next)| next.deadline <= now)
        {
            if let Some(Reverse(due)) = pending.pop() {
                deliver(due.process);
            }
        }
    }

    if !pending.is_empty() {
        trace!("io: stopping with {} deliveries pending", pending.len());
    }
}
