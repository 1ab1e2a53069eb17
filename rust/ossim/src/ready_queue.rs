//! The shared ready queue.
//!
//! One queue feeds every CPU. Producers are the CPU threads (preempted
//! processes) and the harness's wake-up path; consumers are the CPU threads
//! dispatching new work. All state sits behind a single mutex paired with a
//! "not empty" condition variable that idle CPUs block on.
//!
//! Ordering is decided at insertion time:
//! - [`QueueOrder::Fifo`] appends at the tail.
//! - [`QueueOrder::Priority`] keeps the queue non-increasing by static
//!   priority, FIFO among equal priorities. A newcomer goes in front of the
//!   first queued process whose priority is strictly lower.
//!
//! Dequeue always pops the head, and checking for emptiness and popping
//! happen under one lock acquisition, so a CPU that was woken but lost the
//! race for the last process simply sees `None`.
//!
//! This lock is never held while the CPU table lock is taken, and vice
//! versa.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use log::trace;

use crate::process::{Process, ProcessState};
use crate::types::Pid;

/// Insertion discipline of the ready queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOrder {
    /// Arrival order.
    Fifo,
    /// Descending static priority, arrival order among equals.
    Priority,
}

#[derive(Debug, Default)]
struct QueueInner {
    procs: VecDeque<Arc<Process>>,
    /// Set once at shutdown. Waiters return instead of blocking.
    closed: bool,
}

/// The ready queue.
#[derive(Debug)]
pub struct ReadyQueue {
    order: QueueOrder,
    inner: Mutex<QueueInner>,
    not_empty: Condvar,
    /// Number of times a waiter actually blocked on `not_empty`.
    nr_blocked_waits: AtomicU64,
}

impl ReadyQueue {
    pub fn new(order: QueueOrder) -> Self {
        ReadyQueue {
            order,
            inner: Mutex::new(QueueInner::default()),
            not_empty: Condvar::new(),
            nr_blocked_waits: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().expect("ready queue lock poisoned")
    }

    /// Add a READY process and wake one idle waiter.
    ///
    /// # Panics
    /// Panics if the process is already queued (it would be dispatched
    /// twice).
    pub fn enqueue(&self, process: Arc<Process>) {
        debug_assert_eq!(process.state(), ProcessState::Ready);

        let mut inner = self.lock();
        assert!(
            !inner.procs.iter().any(|p| Arc::ptr_eq(p, &process)),
            "pid {} enqueued twice",
            process.pid()
        );

        let pos = match self.order {
            QueueOrder::Fifo => inner.procs.len(),
            QueueOrder::Priority => {
                let prio = process.static_priority();
                inner
                    .procs
                    .iter()
                    .position(|p| p.static_priority() < prio)
                    .unwrap_or(inner.procs.len())
            }
        };
        trace!(
            "enqueue pid={} prio={} pos={} len={}",
            process.pid(),
            process.static_priority(),
            pos,
            inner.procs.len() + 1
        );
        inner.procs.insert(pos, process);
        drop(inner);

        self.not_empty.notify_one();
    }

    /// Remove and return the head, or `None` if the queue is empty.
    pub fn dequeue_front(&self) -> Option<Arc<Process>> {
        let mut inner = self.lock();
        let head = inner.procs.pop_front();
        if let Some(p) = &head {
            trace!("dequeue pid={} len={}", p.pid(), inner.procs.len());
        }
        head
    }

    /// Current number of queued processes.
    pub fn size(&self) -> usize {
        self.lock().procs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Block until the queue is non-empty or closed.
    ///
    /// Returns `true` if work was observed, `false` if the queue was
    /// closed. Spurious wakeups and wakeups whose work was taken by another
    /// CPU are absorbed by re-checking under the lock. Observing work here
    /// is only a hint: the caller must still cope with `dequeue_front`
    /// returning `None`.
    pub fn wait_not_empty(&self) -> bool {
        let mut inner = self.lock();
        while inner.procs.is_empty() && !inner.closed {
            self.nr_blocked_waits.fetch_add(1, Ordering::Relaxed);
            inner = self
                .not_empty
                .wait(inner)
                .expect("ready queue lock poisoned");
        }
        !inner.closed
    }

    /// Close the queue and release every blocked waiter.
    pub fn close(&self) {
        self.lock().closed = true;
        self.not_empty.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of times a waiter blocked on the condition variable.
    ///
    /// An idle CPU parked on an empty queue bumps this once per real
    /// wakeup, not once per poll, which makes busy-waiting observable.
    pub fn nr_blocked_waits(&self) -> u64 {
        self.nr_blocked_waits.load(Ordering::Relaxed)
    }

    /// Front-to-back copy of the queue.
    pub fn snapshot(&self) -> Vec<Arc<Process>> {
        self.lock().procs.iter().cloned().collect()
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.lock().procs.iter().any(|p| p.pid() == pid)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::types::Priority;

    fn ready(pid: u32, prio: Priority) -> Arc<Process> {
        let p = Arc::new(Process::new(Pid(pid), format!("p{pid}"), prio));
        p.set_state(ProcessState::Ready);
        p
    }

    fn pids(q: &ReadyQueue) -> Vec<u32> {
        q.snapshot().iter().map(|p| p.pid().0).collect()
    }

    #[test]
    fn test_fifo_preserves_arrival_order() {
        let q = ReadyQueue::new(QueueOrder::Fifo);
        for (pid, prio) in [(1, 1), (2, 9), (3, 5)] {
            q.enqueue(ready(pid, prio));
        }
        assert_eq!(pids(&q), vec![1, 2, 3]);
        assert_eq!(q.dequeue_front().map(|p| p.pid()), Some(Pid(1)));
        assert_eq!(q.dequeue_front().map(|p| p.pid()), Some(Pid(2)));
        assert_eq!(q.dequeue_front().map(|p| p.pid()), Some(Pid(3)));
        assert!(q.dequeue_front().is_none());
    }

    #[test]
    fn test_priority_new_head() {
        let q = ReadyQueue::new(QueueOrder::Priority);
        q.enqueue(ready(1, 3));
        q.enqueue(ready(2, 8));
        assert_eq!(pids(&q), vec![2, 1]);
    }

    #[test]
    fn test_priority_sorted_at_depth() {
        // Depth >= 3 with the newcomer's slot deep in the queue.
        let q = ReadyQueue::new(QueueOrder::Priority);
        for (pid, prio) in [(1, 5), (2, 3), (3, 4), (4, 9), (5, 4), (6, 1), (7, 2)] {
            q.enqueue(ready(pid, prio));
        }
        let prios: Vec<Priority> = q.snapshot().iter().map(|p| p.static_priority()).collect();
        assert_eq!(prios, vec![9, 5, 4, 4, 3, 2, 1]);
        // Equal priorities keep arrival order.
        assert_eq!(pids(&q), vec![4, 1, 3, 5, 2, 7, 6]);
    }

    #[test]
    fn test_priority_equal_to_head_goes_behind_it() {
        let q = ReadyQueue::new(QueueOrder::Priority);
        q.enqueue(ready(1, 6));
        q.enqueue(ready(2, 6));
        q.enqueue(ready(3, 6));
        assert_eq!(pids(&q), vec![1, 2, 3]);
    }

    #[test]
    fn test_size_tracks_contents() {
        let q = ReadyQueue::new(QueueOrder::Fifo);
        assert!(q.is_empty());
        q.enqueue(ready(1, 1));
        q.enqueue(ready(2, 1));
        assert_eq!(q.size(), 2);
        assert!(q.contains(Pid(2)));
        q.dequeue_front();
        assert_eq!(q.size(), 1);
        assert!(!q.contains(Pid(1)));
    }

    #[test]
    #[should_panic(expected = "enqueued twice")]
    fn test_double_enqueue_panics() {
        let q = ReadyQueue::new(QueueOrder::Fifo);
        let p = ready(1, 1);
        q.enqueue(p.clone());
        q.enqueue(p);
    }

    #[test]
    fn test_wait_returns_immediately_when_non_empty() {
        let q = ReadyQueue::new(QueueOrder::Fifo);
        q.enqueue(ready(1, 1));
        assert!(q.wait_not_empty());
        assert_eq!(q.nr_blocked_waits(), 0);
    }

    #[test]
    fn test_wait_wakes_on_enqueue() {
        let q = Arc::new(ReadyQueue::new(QueueOrder::Fifo));
        let waiter = {
            let q = q.clone();
            thread::spawn(move || q.wait_not_empty())
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished());
        q.enqueue(ready(1, 1));
        assert!(waiter.join().unwrap());
        assert!(q.nr_blocked_waits() >= 1);
    }

    #[test]
    fn test_close_releases_waiters() {
        let q = Arc::new(ReadyQueue::new(QueueOrder::Priority));
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let q = q.clone();
                thread::spawn(move || q.wait_not_empty())
            })
            .collect();
        thread::sleep(Duration::from_millis(20));
        q.close();
        for w in waiters {
            assert!(!w.join().unwrap());
        }
        assert!(q.is_closed());
    }
}
