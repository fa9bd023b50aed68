//! Task lifecycle: handles that can be suspended and resumed, the registry that
//! holds them, and the periodic loop every worker runs.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, Thread};
use std::time::Duration;

/// The fixed set of worker tasks created by the supervisor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Worker {
    Acquisition,
    Display,
    Logger,
    Telemetry,
    Command,
}

impl Worker {
    pub const ALL: [Worker; 5] = [
        Worker::Acquisition,
        Worker::Display,
        Worker::Logger,
        Worker::Telemetry,
        Worker::Command,
    ];

    /// Workers that move data; the command task only steers these.
    pub const DATA: [Worker; 4] = [
        Worker::Acquisition,
        Worker::Display,
        Worker::Logger,
        Worker::Telemetry,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Worker::Acquisition => "read-sensor",
            Worker::Display => "display-data",
            Worker::Logger => "sd-card-logger",
            Worker::Telemetry => "remote-upload",
            Worker::Command => "read-serial",
        }
    }

    /// Scheduling priority, higher runs first. The supervisor itself is 5.
    pub fn priority(self) -> u8 {
        match self {
            Worker::Acquisition => 4,
            Worker::Display | Worker::Command => 3,
            Worker::Logger | Worker::Telemetry => 2,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug)]
struct TaskState {
    worker: Worker,
    suspended: AtomicBool,
    thread: OnceLock<Thread>,
}

/// Control handle of one worker task.
///
/// Suspension is cooperative: the task parks at its next checkpoint and keeps
/// all of its local state until it is resumed.
#[derive(Clone, Debug)]
pub struct TaskHandle(Arc<TaskState>);

impl TaskHandle {
    pub fn new(worker: Worker) -> Self {
        Self(Arc::new(TaskState {
            worker,
            suspended: AtomicBool::new(false),
            thread: OnceLock::new(),
        }))
    }

    pub fn worker(&self) -> Worker {
        self.0.worker
    }

    pub fn is_suspended(&self) -> bool {
        self.0.suspended.load(Ordering::Acquire)
    }

    pub fn suspend(&self) {
        self.0.suspended.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.0.suspended.store(false, Ordering::Release);
        if let Some(thread) = self.0.thread.get() {
            thread.unpark();
        }
    }

    /// Binds the handle to the calling thread so `resume` can wake it.
    fn bind_current(&self) {
        let _ = self.0.thread.set(thread::current());
    }

    /// Parks the calling task for as long as the handle is suspended.
    pub fn checkpoint(&self) {
        while self.is_suspended() {
            thread::park();
        }
    }
}

/// Handles of the created workers, one slot per `Worker`.
///
/// A slot is filled at most once; every lifecycle call on an empty slot is a
/// no-op, so callers never need to know whether the tasks exist yet.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    slots: [OnceLock<TaskHandle>; 5],
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `handle` in its worker's slot. Returns `false` if the slot was
    /// already taken; the existing handle is kept.
    pub fn install(&self, handle: TaskHandle) -> bool {
        self.slots[handle.worker().index()].set(handle).is_ok()
    }

    pub fn handle(&self, worker: Worker) -> Option<&TaskHandle> {
        self.slots[worker.index()].get()
    }

    pub fn is_created(&self, worker: Worker) -> bool {
        self.handle(worker).is_some()
    }

    /// `None` while the worker has not been created.
    pub fn is_suspended(&self, worker: Worker) -> Option<bool> {
        self.handle(worker).map(TaskHandle::is_suspended)
    }

    pub fn suspend(&self, worker: Worker) {
        if let Some(handle) = self.handle(worker) {
            handle.suspend();
        }
    }

    pub fn resume(&self, worker: Worker) {
        if let Some(handle) = self.handle(worker) {
            handle.resume();
        }
    }

    pub fn suspend_all(&self, workers: &[Worker]) {
        workers.iter().for_each(|worker| self.suspend(*worker));
    }

    pub fn resume_all(&self, workers: &[Worker]) {
        workers.iter().for_each(|worker| self.resume(*worker));
    }
}

/// One cycle of a periodic worker. The outcome is only logged by the loop.
pub trait PeriodicTask {
    type Outcome: Debug;

    fn run_cycle(&mut self) -> Self::Outcome;
}

/// Starts `task` on its own thread: checkpoint, one cycle, sleep for `period`, forever.
pub fn spawn_periodic<T>(
    handle: TaskHandle,
    mut task: T,
    period: Duration,
) -> std::io::Result<JoinHandle<()>>
where
    T: PeriodicTask + Send + 'static,
{
    let worker = handle.worker();

    thread::Builder::new()
        .name(worker.name().into())
        .spawn(move || {
            handle.bind_current();
            log::info!(
                "{} started (priority {}, period {:?})",
                worker.name(),
                worker.priority(),
                period
            );

            loop {
                handle.checkpoint();
                let outcome = task.run_cycle();
                log::trace!("{}: {:?}", worker.name(), outcome);
                thread::sleep(period);
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    #[test]
    fn test_empty_registry_ignores_lifecycle_calls() {
        let registry = TaskRegistry::new();
        registry.suspend_all(&Worker::ALL);
        registry.resume(Worker::Display);

        assert!(!registry.is_created(Worker::Display));
        assert_eq!(registry.is_suspended(Worker::Display), None);
    }

    #[test]
    fn test_slot_is_filled_once() {
        let registry = TaskRegistry::new();
        let first = TaskHandle::new(Worker::Logger);
        first.suspend();

        assert!(registry.install(first));
        assert!(!registry.install(TaskHandle::new(Worker::Logger)));
        assert_eq!(registry.is_suspended(Worker::Logger), Some(true));
    }

    #[test]
    fn test_group_suspend_and_resume() {
        let registry = TaskRegistry::new();
        for worker in Worker::ALL {
            registry.install(TaskHandle::new(worker));
        }

        registry.suspend_all(&Worker::ALL);
        assert!(Worker::ALL
            .iter()
            .all(|w| registry.is_suspended(*w) == Some(true)));

        registry.resume_all(&Worker::DATA);
        assert!(Worker::DATA
            .iter()
            .all(|w| registry.is_suspended(*w) == Some(false)));
        assert_eq!(registry.is_suspended(Worker::Command), Some(true));
    }

    struct Counter(Arc<AtomicUsize>);

    impl PeriodicTask for Counter {
        type Outcome = usize;

        fn run_cycle(&mut self) -> usize {
            self.0.fetch_add(1, Ordering::SeqCst) + 1
        }
    }

    fn wait_until(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_suspended_task_stops_cycling_until_resumed() {
        let cycles = Arc::new(AtomicUsize::new(0));
        let handle = TaskHandle::new(Worker::Acquisition);
        spawn_periodic(handle.clone(), Counter(cycles.clone()), Duration::from_millis(1)).unwrap();

        assert!(wait_until(|| cycles.load(Ordering::SeqCst) >= 3));

        handle.suspend();
        thread::sleep(Duration::from_millis(20));
        let frozen = cycles.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert!(cycles.load(Ordering::SeqCst) <= frozen + 1);

        handle.resume();
        assert!(wait_until(|| cycles.load(Ordering::SeqCst) >= frozen + 3));
    }
}
