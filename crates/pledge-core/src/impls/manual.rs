//! ManualScheduler - 仮想時間で動く Executor + Scheduler
//!
//! # 学習ポイント
//! - BinaryHeap を min-heap として使う（Ord を逆順に実装）
//! - ロックを保持したまま作業単位を実行しない（作業単位が再投入してもデッドロックしない）
//! - 要求された遅延値を記録し、テストから検証できるようにする
//!
//! 時間は `advance()` を呼んだときだけ進みます。

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use crate::ports::{Executor, Scheduler, TimerHandle, Work};

/// Scheduled timer entry for the priority queue.
///
/// We use reverse ordering so BinaryHeap acts as a min-heap (earliest first,
/// then submission order).
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduledWork {
    due: Duration,
    seq: u64,
}

impl PartialOrd for ScheduledWork {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledWork {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering: earlier times have higher priority
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_seq: u64,
    /// Heap entries whose `seq` is missing from `timers` were cancelled.
    heap: BinaryHeap<ScheduledWork>,
    timers: HashMap<u64, Work>,
    ready: VecDeque<Work>,
    requested: Vec<Duration>,
}

/// Deterministic executor and timer driven by an explicit virtual clock.
///
/// # 使用例
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use pledge_core::{ManualScheduler, Promise};
///
/// let scheduler = Arc::new(ManualScheduler::new());
/// let p = Promise::<u32, ()>::of_success(1).delay_start(Duration::from_secs(3), scheduler.clone());
/// p.start();
/// assert_eq!(scheduler.requested_delays(), vec![Duration::from_secs(3)]);
/// scheduler.advance(Duration::from_secs(3));
/// assert!(p.peek().is_some());
/// ```
#[derive(Default)]
pub struct ManualScheduler {
    state: Arc<Mutex<ManualState>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        lock(&self.state)
    }

    /// Virtual time elapsed since creation.
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Every delay passed to `schedule`, in submission order.
    pub fn requested_delays(&self) -> Vec<Duration> {
        self.lock().requested.clone()
    }

    /// Timers that are scheduled and neither fired nor cancelled.
    pub fn pending_timers(&self) -> usize {
        self.lock().timers.len()
    }

    /// Run queued executor work until the queue is empty.
    ///
    /// Returns how many units ran, including ones queued by earlier units.
    pub fn run_ready(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.lock().ready.pop_front();
            match next {
                Some(work) => {
                    work();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Move the clock forward, firing every timer that comes due in order,
    /// then drain the executor queue.
    pub fn advance(&self, by: Duration) {
        let target = self.now() + by;
        loop {
            let due = {
                let mut state = self.lock();
                pop_due(&mut state, target)
            };
            match due {
                Some(work) => {
                    work();
                    self.run_ready();
                }
                None => break,
            }
        }
        self.lock().now = target;
        self.run_ready();
    }
}

fn lock(state: &Mutex<ManualState>) -> MutexGuard<'_, ManualState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn pop_due(state: &mut ManualState, target: Duration) -> Option<Work> {
    while let Some(entry) = state.heap.peek() {
        if entry.due > target {
            return None; // Heap is sorted, so we can stop
        }
        let entry = state.heap.pop()?;
        if let Some(work) = state.timers.remove(&entry.seq) {
            state.now = state.now.max(entry.due);
            return Some(work);
        }
    }
    None
}

impl Executor for ManualScheduler {
    fn execute(&self, work: Work) {
        self.lock().ready.push_back(work);
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, work: Work) -> Box<dyn TimerHandle> {
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        let due = state.now + delay;
        state.requested.push(delay);
        state.heap.push(ScheduledWork { due, seq });
        state.timers.insert(seq, work);
        Box::new(ManualTimer {
            state: Arc::downgrade(&self.state),
            seq,
        })
    }
}

struct ManualTimer {
    state: Weak<Mutex<ManualState>>,
    seq: u64,
}

impl TimerHandle for ManualTimer {
    fn cancel(&self) {
        if let Some(state) = self.state.upgrade() {
            lock(&state).timers.remove(&self.seq);
        }
    }
}
