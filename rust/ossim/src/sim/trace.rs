//! Trace event recording for the simulator.
//!
//! Every scheduling action (process scheduled, preempted, yielded, woke,
//! terminated, CPU idle) is recorded as a `TraceEvent` with the tick and
//! CPU it happened on. Events for any one process are recorded in the order
//! the scheduler saw them: harness-side events are recorded right before
//! the matching scheduler call, switches from inside `context_switch`.

use std::collections::HashMap;

use serde::Serialize;

use crate::types::{CpuId, Pid, Ticks};

/// A single trace event produced by the simulator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEvent {
    pub tick: Ticks,
    /// None for events that are not tied to a CPU (wake-ups).
    pub cpu: Option<CpuId>,
    pub kind: TraceKind,
}

/// The type of scheduling event recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TraceKind {
    /// A process was installed on this CPU.
    Scheduled { pid: Pid },
    /// The CPU switched to the idle process.
    Idle,
    /// The process on this CPU was preempted (slice expiry or forced).
    Preempted { pid: Pid },
    /// A wake-up asked this CPU to give up its process.
    ForcedPreempt,
    /// The process on this CPU blocked on I/O.
    Yielded { pid: Pid },
    /// The process on this CPU finished.
    Terminated { pid: Pid },
    /// A process arrived or finished its I/O.
    Woke { pid: Pid },
}

impl TraceKind {
    fn pid(&self) -> Option<Pid> {
        match *self {
            TraceKind::Scheduled { pid }
            | TraceKind::Preempted { pid }
            | TraceKind::Yielded { pid }
            | TraceKind::Terminated { pid }
            | TraceKind::Woke { pid } => Some(pid),
            TraceKind::Idle | TraceKind::ForcedPreempt => None,
        }
    }
}

/// A complete simulation trace in recording order.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    events: Vec<TraceEvent>,
}

impl Trace {
    pub(crate) fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub(crate) fn record(&mut self, tick: Ticks, cpu: Option<CpuId>, kind: TraceKind) {
        self.events.push(TraceEvent { tick, cpu, kind });
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Events concerning one process, in order.
    pub fn events_for(&self, pid: Pid) -> impl Iterator<Item = &TraceEvent> {
        self.events.iter().filter(move |e| e.kind.pid() == Some(pid))
    }

    /// Count the number of times a process was scheduled.
    pub fn schedule_count(&self, pid: Pid) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, TraceKind::Scheduled { pid: p } if p == pid))
            .count()
    }

    /// Number of switches that installed a process on some CPU.
    pub fn context_switches(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, TraceKind::Scheduled { .. }))
            .count()
    }

    pub fn count(&self, kind: TraceKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    /// Count the number of times a CPU went idle.
    pub fn idle_count(&self, cpu: CpuId) -> usize {
        self.events
            .iter()
            .filter(|e| e.cpu == Some(cpu) && matches!(e.kind, TraceKind::Idle))
            .count()
    }

    /// Ticks each process spent READY: from waking or being preempted to
    /// its next dispatch.
    pub fn ready_ticks(&self) -> HashMap<Pid, Ticks> {
        let mut total: HashMap<Pid, Ticks> = HashMap::new();
        let mut ready_since: HashMap<Pid, Ticks> = HashMap::new();

        for event in &self.events {
            match event.kind {
                TraceKind::Woke { pid } | TraceKind::Preempted { pid } => {
                    ready_since.insert(pid, event.tick);
                }
                TraceKind::Scheduled { pid } => {
                    if let Some(since) = ready_since.remove(&pid) {
                        *total.entry(pid).or_default() += event.tick.saturating_sub(since);
                    }
                }
                _ => {}
            }
        }

        total
    }

    /// Pretty-print the trace for debugging.
    pub fn dump(&self) {
        for event in &self.events {
            let desc = match &event.kind {
                TraceKind::Scheduled { pid } => format!("SCHED    pid={}", pid.0),
                TraceKind::Idle => "IDLE".to_string(),
                TraceKind::Preempted { pid } => format!("PREEMPT  pid={}", pid.0),
                TraceKind::ForcedPreempt => "KICK".to_string(),
                TraceKind::Yielded { pid } => format!("YIELD    pid={}", pid.0),
                TraceKind::Terminated { pid } => format!("EXIT     pid={}", pid.0),
                TraceKind::Woke { pid } => format!("WAKE     pid={}", pid.0),
            };
            let cpu = event
                .cpu
                .map_or_else(|| "-".to_string(), |c| c.0.to_string());
            eprintln!("[{:>8} tick] cpu={:<3} {}", event.tick, cpu, desc);
        }
    }
}
