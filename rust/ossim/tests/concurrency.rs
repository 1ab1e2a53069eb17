use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ossim::{CpuId, Discipline, Pid, Process, ProcessState, Scheduler};

mod common;
use common::{process, run_on, scheduler, Recorder};

fn wait_for(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

/// An idle CPU parks on the condition variable instead of polling, and a
/// wake-up from another thread releases it.
#[test]
fn test_idle_blocks_without_busy_waiting() {
    let s = Arc::new(scheduler(1, Discipline::Fifo));

    let idler = {
        let s = s.clone();
        thread::spawn(move || s.idle(CpuId(0)))
    };
    wait_for("idle CPU to block", || s.ready_queue().nr_blocked_waits() >= 1);

    // A polling loop would rack up thousands of waits here.
    thread::sleep(Duration::from_millis(200));
    let nr_waits = s.ready_queue().nr_blocked_waits();
    assert!(nr_waits <= 2, "idle CPU woke {nr_waits} times on an empty queue");
    assert!(!idler.is_finished());

    let p = process(1, 5);
    s.wake_up(p.clone());
    idler.join().unwrap();

    assert_eq!(p.state(), ProcessState::Running);
    assert_eq!(s.cpu_table().current(CpuId(0)).unwrap().pid(), Pid(1));
}

/// One wake-up with several CPUs idle: exactly one of them gets the
/// process, the rest keep waiting.
#[test]
fn test_single_wake_feeds_single_cpu() {
    let s = Arc::new(scheduler(3, Discipline::Fifo));
    let idlers: Vec<_> = (0..3)
        .map(|i| {
            let s = s.clone();
            thread::spawn(move || s.idle(CpuId(i)))
        })
        .collect();
    wait_for("all CPUs to block", || s.ready_queue().nr_blocked_waits() >= 3);

    s.wake_up(process(1, 5));
    wait_for("a CPU to take the process", || s.ready_queue().is_empty());
    wait_for("a dispatch", || s.metrics().nr_dispatches == 1);

    let busy = s
        .cpu_table()
        .snapshot()
        .iter()
        .filter(|slot| slot.is_some())
        .count();
    assert_eq!(busy, 1);

    s.shutdown();
    for h in idlers {
        h.join().unwrap();
    }
    assert_eq!(s.metrics().nr_dispatches, 1);
}

/// Shutdown releases every blocked CPU without dispatching anything.
#[test]
fn test_shutdown_releases_blocked_cpus() {
    let s = Arc::new(scheduler(4, Discipline::StaticPriority));
    let idlers: Vec<_> = (0..4)
        .map(|i| {
            let s = s.clone();
            thread::spawn(move || s.idle(CpuId(i)))
        })
        .collect();
    wait_for("all CPUs to block", || s.ready_queue().nr_blocked_waits() >= 4);

    s.shutdown();
    for h in idlers {
        h.join().unwrap();
    }

    assert!(s.harness().switches().is_empty());
    assert!(s.ready_queue().is_closed());
}

/// Wake-ups race a busy CPU for the work: the busy CPU's `preempt`
/// dispatches straight from the queue, so an idle CPU woken for a process
/// can find the queue empty again and must switch to idle instead of
/// dispatching. Every enqueue is still dispatched exactly once.
#[test]
fn test_woken_idle_cpu_loses_race_to_busy_cpu() {
    const NR_IDLERS: u32 = 4;
    const NR_BATCHES: u32 = 300;

    let s = Arc::new(scheduler(NR_IDLERS + 1, Discipline::Fifo));
    let busy = CpuId(NR_IDLERS);
    let mut procs = vec![process(0, 5)];
    run_on(&s, busy, &procs[0]);

    let idlers: Vec<_> = (0..NR_IDLERS)
        .map(|i| {
            let s = s.clone();
            thread::spawn(move || {
                let cpu = CpuId(i);
                loop {
                    while s.cpu_table().current(cpu).is_some() {
                        s.terminate(cpu);
                    }
                    if s.ready_queue().is_closed() {
                        return;
                    }
                    s.idle(cpu);
                }
            })
        })
        .collect();
    wait_for("idle CPUs to block", || {
        s.ready_queue().nr_blocked_waits() >= NR_IDLERS as u64
    });

    // Fewer new processes than waiters per batch; the busy CPU grabs one
    // of them right after the wake-ups.
    for batch in 0..NR_BATCHES {
        for k in 1..=2 {
            let p = process(batch * 2 + k, 5);
            procs.push(p.clone());
            s.wake_up(p);
        }
        s.preempt(busy);
        if batch % 3 == 0 {
            s.preempt(busy);
        }
    }

    let nr_procs = procs.len() as u64;
    wait_for("idle CPUs to drain the queue", || {
        s.metrics().nr_terminations == nr_procs - 1
    });
    s.terminate(busy);
    s.shutdown();
    for h in idlers {
        h.join().unwrap();
    }

    assert!(procs.iter().all(|p| p.state() == ProcessState::Terminated));
    assert!(s.ready_queue().is_empty());
    assert!(s.cpu_table().snapshot().iter().all(Option::is_none));

    let m = s.metrics();
    assert_eq!(m.nr_terminations, nr_procs);
    // Each wake-up and each preemption enqueued once, each enqueue
    // dispatched once.
    assert_eq!(m.nr_dispatches, nr_procs + m.nr_preemptions);

    let switches = s.harness().switches();
    let nr_installs = switches.iter().filter(|sw| sw.pid.is_some()).count() as u64;
    let nr_idle = switches.iter().filter(|sw| sw.pid.is_none()).count() as u64;
    assert_eq!(nr_installs, m.nr_dispatches);
    assert_eq!(nr_idle, m.nr_idle_dispatches);
    assert!(switches.iter().any(|sw| sw.cpu == busy && sw.pid.is_none()));
}

const NR_PROCS: u32 = 200;
const NR_ROUNDS: u32 = 4;

/// Drive `cpu` until the scheduler shuts down: every process is preempted
/// or yields (and is immediately woken again) a few times, then
/// terminates.
fn cpu_thread(
    s: &Scheduler<Recorder>,
    cpu: CpuId,
    rounds: &[AtomicU32],
    nr_exited: &AtomicUsize,
) {
    loop {
        let Some(p) = s.cpu_table().current(cpu) else {
            if s.ready_queue().is_closed() {
                return;
            }
            s.idle(cpu);
            continue;
        };

        let round = rounds[p.pid().0 as usize].fetch_add(1, Ordering::Relaxed);
        if round >= NR_ROUNDS {
            s.terminate(cpu);
            if nr_exited.fetch_add(1, Ordering::AcqRel) + 1 == NR_PROCS as usize {
                s.shutdown();
            }
        } else if round % 2 == 0 {
            s.preempt(cpu);
        } else {
            s.yield_cpu(cpu);
            s.wake_up(p);
        }
    }
}

fn stress(discipline: Discipline) {
    let nr_cpus = 4;
    let s = Arc::new(scheduler(nr_cpus, discipline));
    let rounds: Arc<Vec<AtomicU32>> = Arc::new((0..NR_PROCS).map(|_| AtomicU32::new(0)).collect());
    let nr_exited = Arc::new(AtomicUsize::new(0));
    let procs: Vec<Arc<Process>> = (0..NR_PROCS)
        .map(|pid| process(pid, pid % 10 + 1))
        .collect();

    let cpus: Vec<_> = (0..nr_cpus)
        .map(|i| {
            let (s, rounds, nr_exited) = (s.clone(), rounds.clone(), nr_exited.clone());
            thread::spawn(move || cpu_thread(&s, CpuId(i), &rounds, &nr_exited))
        })
        .collect();

    let waker = {
        let (s, procs) = (s.clone(), procs.clone());
        thread::spawn(move || {
            for p in procs {
                s.wake_up(p);
            }
        })
    };

    waker.join().unwrap();
    for h in cpus {
        h.join().unwrap();
    }

    assert_eq!(nr_exited.load(Ordering::Acquire), NR_PROCS as usize);
    assert!(procs.iter().all(|p| p.state() == ProcessState::Terminated));
    assert!(s.ready_queue().is_empty());
    assert!(s.cpu_table().snapshot().iter().all(Option::is_none));

    let m = s.metrics();
    assert_eq!(m.nr_terminations, NR_PROCS as u64);
    // One arrival plus one re-wake per yield.
    assert_eq!(m.nr_wakeups, m.nr_yields + NR_PROCS as u64);
    assert_eq!(m.nr_yields + m.nr_preemptions, (NR_PROCS * NR_ROUNDS) as u64);
}

#[test]
fn test_stress_fifo() {
    stress(Discipline::Fifo);
}

#[test]
fn test_stress_round_robin() {
    stress(Discipline::RoundRobin { timeslice: 1 });
}

#[test]
fn test_stress_static_priority() {
    stress(Discipline::StaticPriority);
}
