//! The priority work queue and its worker pool.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::priority;

static PREVENT_STARVATION: AtomicBool = AtomicBool::new(false);

/// Process-wide switch disabling the OS-priority downshift for Background
/// tasks. Tests set this so indexing throughput does not depend on how the
/// host schedules idle-class threads.
pub fn set_prevent_starvation(prevent: bool) {
    PREVENT_STARVATION.store(prevent, Ordering::Release);
}

fn prevent_starvation() -> bool {
    PREVENT_STARVATION.load(Ordering::Acquire)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPriority {
    /// Runs before all queued Background tasks. Expected to be rare.
    Normal,
    /// Bulk indexing work; also downshifts the worker's OS priority.
    Background,
}

pub(crate) type Task = Box<dyn FnOnce() + Send>;

/// FIFO-within-priority deque drained by long-lived worker threads.
///
/// Normal tasks are inserted ahead of every queued Background task, so a
/// burst of them drains first regardless of arrival order. Dropping the
/// queue stops and joins all workers; tasks already running finish first.
pub struct TaskQueue {
    shared: Arc<QueueShared>,
    workers: Vec<JoinHandle<()>>,
}

pub(crate) struct QueueShared {
    state: Mutex<QueueState>,
    wake: Condvar,
}

#[derive(Default)]
struct QueueState {
    queue: VecDeque<(Task, TaskPriority)>,
    active_tasks: usize,
    should_stop: bool,
}

/// Cheap cloneable handle for enqueueing from tasks and callbacks.
#[derive(Clone)]
pub(crate) struct QueueHandle {
    shared: Arc<QueueShared>,
}

impl QueueHandle {
    pub(crate) fn enqueue(&self, task: Task, priority: TaskPriority) {
        self.shared.enqueue(task, priority);
    }
}

impl TaskQueue {
    pub fn new(threads: usize) -> Self {
        assert!(threads > 0, "worker pool size must be at least one");
        let shared = Arc::new(QueueShared {
            state: Mutex::new(QueueState::default()),
            wake: Condvar::new(),
        });

        let workers = (0..threads)
            .map(|i| {
                let shared = Arc::clone(&shared);
                std::thread::Builder::new()
                    .name(format!("flint-indexer-{}", i + 1))
                    .spawn(move || worker_loop(&shared))
                    .expect("failed to spawn indexer worker thread")
            })
            .collect();

        Self { shared, workers }
    }

    pub(crate) fn handle(&self) -> QueueHandle {
        QueueHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn enqueue(&self, task: impl FnOnce() + Send + 'static, priority: TaskPriority) {
        self.shared.enqueue(Box::new(task), priority);
    }

    /// Wait until the queue is empty and no task is executing.
    ///
    /// Returns `false` when `timeout` elapses first. Test probe; the wait is
    /// a condition-variable sleep, not a spin.
    pub fn block_until_idle(&self, timeout: Duration) -> bool {
        let state = self.shared.state.lock().expect("task queue lock poisoned");
        let (_state, wait) = self
            .shared
            .wake
            .wait_timeout_while(state, timeout, |state| {
                !(state.queue.is_empty() && state.active_tasks == 0)
            })
            .expect("task queue lock poisoned");
        !wait.timed_out()
    }

    /// Ask all workers to exit. Queued tasks are dropped; running tasks
    /// finish. Enqueues after this point are ignored.
    pub fn stop(&self) {
        {
            let mut state = self.shared.state.lock().expect("task queue lock poisoned");
            state.should_stop = true;
        }
        self.shared.wake.notify_all();
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.stop();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl QueueShared {
    fn enqueue(&self, task: Task, priority: TaskPriority) {
        {
            let mut state = self.state.lock().expect("task queue lock poisoned");
            if state.should_stop {
                return;
            }
            match priority {
                TaskPriority::Normal => {
                    // Normal tasks land just before the first Background
                    // task. They stay in single-digit counts, so the linear
                    // scan for the split point is fine.
                    let split = state
                        .queue
                        .iter()
                        .position(|(_, priority)| *priority == TaskPriority::Background)
                        .unwrap_or(state.queue.len());
                    state.queue.insert(split, (task, priority));
                }
                TaskPriority::Background => state.queue.push_back((task, priority)),
            }
        }
        self.wake.notify_all();
    }
}

fn worker_loop(shared: &QueueShared) {
    loop {
        let (task, task_priority) = {
            let mut state = shared.state.lock().expect("task queue lock poisoned");
            loop {
                if state.should_stop {
                    state.queue.clear();
                    shared.wake.notify_all();
                    return;
                }
                if let Some(entry) = state.queue.pop_front() {
                    state.active_tasks += 1;
                    break entry;
                }
                state = shared.wake.wait(state).expect("task queue lock poisoned");
            }
        };

        if task_priority == TaskPriority::Background && !prevent_starvation() {
            priority::set_background();
        }
        task();
        if task_priority == TaskPriority::Background {
            priority::set_default();
        }

        {
            let mut state = shared.state.lock().expect("task queue lock poisoned");
            state.active_tasks -= 1;
        }
        shared.wake.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Instant;

    #[test]
    fn block_until_idle_observes_queued_and_running_tasks() {
        let queue = TaskQueue::new(1);
        assert!(queue.block_until_idle(Duration::from_secs(1)));

        let (release_tx, release_rx) = mpsc::channel::<()>();
        queue.enqueue(
            move || {
                release_rx.recv().unwrap();
            },
            TaskPriority::Background,
        );

        // The task is either queued or running; the probe must time out.
        assert!(!queue.block_until_idle(Duration::from_millis(50)));

        release_tx.send(()).unwrap();
        assert!(queue.block_until_idle(Duration::from_secs(5)));
    }

    #[test]
    fn normal_tasks_run_before_queued_background_tasks() {
        set_prevent_starvation(true);
        let queue = TaskQueue::new(1);
        let (order_tx, order_rx) = mpsc::channel::<&'static str>();

        // Occupy the single worker so the rest of the tasks stay queued
        // while we set the order up.
        let (release_tx, release_rx) = mpsc::channel::<()>();
        queue.enqueue(
            move || {
                release_rx.recv().unwrap();
            },
            TaskPriority::Background,
        );

        for name in ["background-1", "background-2"] {
            let tx = order_tx.clone();
            queue.enqueue(
                move || {
                    std::thread::sleep(Duration::from_millis(20));
                    tx.send(name).unwrap();
                },
                TaskPriority::Background,
            );
        }
        let tx = order_tx.clone();
        queue.enqueue(move || tx.send("normal").unwrap(), TaskPriority::Normal);

        release_tx.send(()).unwrap();
        assert!(queue.block_until_idle(Duration::from_secs(5)));

        let order: Vec<_> = order_rx.try_iter().collect();
        assert_eq!(order, vec!["normal", "background-1", "background-2"]);
    }

    #[test]
    fn normal_tasks_keep_fifo_order_among_themselves() {
        let queue = TaskQueue::new(1);
        let (order_tx, order_rx) = mpsc::channel::<u32>();

        let (release_tx, release_rx) = mpsc::channel::<()>();
        queue.enqueue(
            move || {
                release_rx.recv().unwrap();
            },
            TaskPriority::Background,
        );

        let tx = order_tx.clone();
        queue.enqueue(move || tx.send(3).unwrap(), TaskPriority::Background);
        let tx = order_tx.clone();
        queue.enqueue(move || tx.send(1).unwrap(), TaskPriority::Normal);
        let tx = order_tx.clone();
        queue.enqueue(move || tx.send(2).unwrap(), TaskPriority::Normal);

        release_tx.send(()).unwrap();
        assert!(queue.block_until_idle(Duration::from_secs(5)));
        assert_eq!(order_rx.try_iter().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn stop_drops_queued_tasks_and_ignores_later_enqueues() {
        let queue = TaskQueue::new(1);
        let (ran_tx, ran_rx) = mpsc::channel::<()>();

        let (release_tx, release_rx) = mpsc::channel::<()>();
        queue.enqueue(
            move || {
                release_rx.recv().unwrap();
            },
            TaskPriority::Background,
        );
        let tx = ran_tx.clone();
        queue.enqueue(move || tx.send(()).unwrap(), TaskPriority::Background);

        queue.stop();
        // The blocker may have been dropped unexecuted; ignore a dead channel.
        let _ = release_tx.send(());

        let tx = ran_tx.clone();
        queue.enqueue(move || tx.send(()).unwrap(), TaskPriority::Background);
        drop(queue);

        assert!(ran_rx.try_recv().is_err(), "queued task ran after stop");
    }

    #[test]
    fn workers_drain_in_parallel() {
        set_prevent_starvation(true);
        let queue = TaskQueue::new(4);
        let start = Instant::now();
        for _ in 0..4 {
            queue.enqueue(
                || std::thread::sleep(Duration::from_millis(100)),
                TaskPriority::Background,
            );
        }
        assert!(queue.block_until_idle(Duration::from_secs(5)));
        // Four 100ms tasks across four workers should take nowhere near 400ms.
        assert!(start.elapsed() < Duration::from_millis(350));
    }
}
