use std::sync::{Arc, Condvar, Mutex};

use kurbo::{Affine, Rect};

use crate::cache::lock;
use crate::cache::tile::Tile;
use crate::foundation::error::{CelError, CelResult};
use crate::surface::Surface;

#[derive(Debug, Default)]
struct EventState {
    done: bool,
    success: bool,
    cancelled: bool,
}

/// Completion event of one in-flight tile render.
///
/// Signalled exactly once by the worker that ran (or skipped) the task;
/// `cancel` is best-effort and only prevents work that has not started.
#[derive(Debug, Default)]
pub struct TaskEvent {
    state: Mutex<EventState>,
    cond: Condvar,
}

impl TaskEvent {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark the task finished. The first signal wins.
    pub fn signal(&self, success: bool) {
        let mut st = lock(&self.state);
        if !st.done {
            st.done = true;
            st.success = success;
            self.cond.notify_all();
        }
    }

    /// Request cancellation; wakes waiters with failure if not yet done.
    pub fn cancel(&self) {
        let mut st = lock(&self.state);
        st.cancelled = true;
        if !st.done {
            st.done = true;
            st.success = false;
            self.cond.notify_all();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        lock(&self.state).cancelled
    }

    pub fn is_done(&self) -> bool {
        lock(&self.state).done
    }

    /// Block until the task finishes; returns its success.
    pub fn wait(&self) -> bool {
        let mut st = lock(&self.state);
        while !st.done {
            st = self
                .cond
                .wait(st)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
        st.success
    }
}

/// A cloneable scene render-task tree, produced by the scene evaluator.
///
/// `run` renders the user-space region `source_rect` (after `transform`)
/// into the whole of `target`, and reports success.
pub trait SceneTask: Send + Sync {
    /// Deep-copy the tree so a tile render owns an independent task.
    fn clone_task(&self) -> Box<dyn SceneTask>;

    /// Execute on a worker.
    fn run(&self, target: &mut Surface, transform: Affine, source_rect: Rect) -> bool;
}

/// Callback a runner invokes after signalling the tile's event.
pub type CompletionFn = Box<dyn FnOnce(bool) + Send + 'static>;

/// One unit of work for the task runner: render a tile's source region
/// into the tile's raw surface, then report completion.
pub struct TileJob {
    pub task: Box<dyn SceneTask>,
    pub transform: Affine,
    pub source_rect: Rect,
    pub tile: Arc<Tile>,
    pub event: Arc<TaskEvent>,
    pub on_finished: CompletionFn,
}

/// Executes tile jobs on a worker pool and cancels queued events.
pub trait TaskRunner: Send + Sync {
    fn enqueue(&self, job: TileJob);

    fn cancel(&self, events: &[Arc<TaskEvent>]);
}

/// Built-in [`TaskRunner`] over a rayon thread pool.
pub struct ThreadPoolRunner {
    pool: rayon::ThreadPool,
}

impl ThreadPoolRunner {
    /// Build a runner; `threads = None` uses rayon defaults.
    pub fn new(threads: Option<usize>) -> CelResult<Self> {
        if threads == Some(0) {
            return Err(CelError::geometry("runner 'threads' must be >= 1 when set"));
        }
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(n) = threads {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build rayon thread pool: {e}"))?;
        Ok(Self { pool })
    }
}

impl TaskRunner for ThreadPoolRunner {
    fn enqueue(&self, job: TileJob) {
        self.pool.spawn(move || {
            let TileJob {
                task,
                transform,
                source_rect,
                tile,
                event,
                on_finished,
            } = job;

            if event.is_cancelled() {
                on_finished(false);
                event.signal(false);
                return;
            }

            let success = {
                let mut surface = lock(&tile.surface);
                match surface.as_mut() {
                    Some(s) => task.run(s, transform, source_rect),
                    None => false,
                }
            };
            // completion handler first, so a woken waiter observes the
            // converted tile
            on_finished(success);
            event.signal(success);
        });
    }

    fn cancel(&self, events: &[Arc<TaskEvent>]) {
        for event in events {
            event.cancel();
        }
    }
}
