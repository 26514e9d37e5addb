//! Persistence context passed into every save and recover call.

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicI32, Ordering},
    },
};

use tracing::error;

use crate::{
    config::MAX_SAVE_TRIES,
    store::Store,
    utils::time::{Clock, SystemClock},
};

/// Latch recording a process-wide stop requested by the storage layer.
///
/// Setting it does not exit the process; the owner of the context polls
/// [`Halt::is_halted`] and shuts down.
#[derive(Debug, Default)]
pub struct Halt {
    halted: AtomicBool,
    reason: Mutex<Option<String>>,
}

impl Halt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(
        &self,
        reason: &str,
    ) {
        error!(reason = reason, "storage failure, halting");
        if let Ok(mut slot) = self.reason.lock() {
            slot.get_or_insert_with(|| reason.to_string());
        }
        self.halted.store(true, Ordering::SeqCst);
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Reason given by the first `stop`.
    pub fn reason(&self) -> Option<String> {
        self.reason.lock().ok().and_then(|slot| slot.clone())
    }
}

pub struct PersistContext {
    jobs_dir: PathBuf,
    resvs_dir: PathBuf,
    clock: Arc<dyn Clock>,
    max_save_tries: usize,
    fsync: bool,
    store: Arc<Store>,
    halt: Arc<Halt>,
    total_nodes: AtomicI32,
}

impl PersistContext {
    pub fn new(
        jobs_dir: impl Into<PathBuf>,
        resvs_dir: impl Into<PathBuf>,
        store: Arc<Store>,
    ) -> Self {
        Self {
            jobs_dir: jobs_dir.into(),
            resvs_dir: resvs_dir.into(),
            clock: Arc::new(SystemClock),
            max_save_tries: MAX_SAVE_TRIES,
            fsync: true,
            store,
            halt: Arc::new(Halt::new()),
            total_nodes: AtomicI32::new(0),
        }
    }

    pub fn with_clock(
        mut self,
        clock: Arc<dyn Clock>,
    ) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_max_save_tries(
        mut self,
        tries: usize,
    ) -> Self {
        self.max_save_tries = tries.max(1);
        self
    }

    pub fn with_fsync(
        mut self,
        fsync: bool,
    ) -> Self {
        self.fsync = fsync;
        self
    }

    pub fn jobs_dir(&self) -> &Path {
        &self.jobs_dir
    }

    pub fn resvs_dir(&self) -> &Path {
        &self.resvs_dir
    }

    /// `time_now` of the save path.
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub fn max_save_tries(&self) -> usize {
        self.max_save_tries
    }

    pub fn fsync(&self) -> bool {
        self.fsync
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn halt(&self) -> Arc<Halt> {
        self.halt.clone()
    }

    pub fn is_halted(&self) -> bool {
        self.halt.is_halted()
    }

    /// Node count used to order vnodes in the database.
    pub fn total_nodes(&self) -> i32 {
        self.total_nodes.load(Ordering::Relaxed)
    }

    pub fn set_total_nodes(
        &self,
        n: i32,
    ) {
        self.total_nodes.store(n, Ordering::Relaxed);
    }
}

/// Context over scratch `jobs` and `resvs` directories under `root`, backed
/// by an in-memory store.
#[cfg(test)]
pub(crate) fn mem_context(root: &Path) -> (PersistContext, crate::store::MemStore) {
    use crate::store::DbStore;

    let jobs = root.join("jobs");
    let resvs = root.join("resvs");
    std::fs::create_dir_all(&jobs).unwrap();
    std::fs::create_dir_all(&resvs).unwrap();
    let mem = crate::store::MemStore::new();
    let store = Arc::new(Store::new());
    mem.init(&store).unwrap();
    (PersistContext::new(jobs, resvs, store).with_fsync(false), mem)
}
