use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Handle to a scheduled task. Not `Clone`: whoever holds it owns the task
/// and must hand it back to [`Scheduler::cancel`].
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        TaskId(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

#[derive(Debug)]
struct Task {
    due: Instant,
    every: Option<Duration>,
}

/// Cooperative timer registry driven by explicit `poll(now)` calls.
///
/// Nothing runs on its own: the owner polls with the current instant and
/// dispatches the returned ids. Tests drive it with synthetic instants.
#[derive(Debug, Default)]
pub struct Scheduler {
    next_id: u64,
    tasks: BTreeMap<u64, Task>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn once(&mut self, now: Instant, delay: Duration) -> TaskHandle {
        self.insert(Task {
            due: now + delay,
            every: None,
        })
    }

    pub fn repeating(&mut self, now: Instant, every: Duration) -> TaskHandle {
        let every = every.max(Duration::from_millis(1));
        self.insert(Task {
            due: now + every,
            every: Some(every),
        })
    }

    pub fn cancel(&mut self, handle: TaskHandle) {
        self.tasks.remove(&handle.0);
    }

    pub fn cancel_all(&mut self) {
        self.tasks.clear();
    }

    pub fn is_active(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id.0)
    }

    pub fn active_count(&self) -> usize {
        self.tasks.len()
    }

    /// Ids of every task due at `now`, in creation order. One-shot tasks are
    /// removed; repeating tasks are re-armed once (missed periods collapse).
    pub fn poll(&mut self, now: Instant) -> Vec<TaskId> {
        let mut fired = Vec::new();
        let mut finished = Vec::new();

        for (id, task) in self.tasks.iter_mut() {
            if task.due > now {
                continue;
            }
            fired.push(TaskId(*id));
            match task.every {
                Some(every) => {
                    task.due += every;
                    if task.due <= now {
                        task.due = now + every;
                    }
                }
                None => finished.push(*id),
            }
        }

        for id in finished {
            self.tasks.remove(&id);
        }
        fired
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.tasks.values().map(|task| task.due).min()
    }

    fn insert(&mut self, task: Task) -> TaskHandle {
        self.next_id += 1;
        self.tasks.insert(self.next_id, task);
        TaskHandle(self.next_id)
    }
}
