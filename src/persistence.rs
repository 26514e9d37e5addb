//! Entry point owning the persistence context and the database runtime.

use std::sync::Arc;

use tokio::runtime::Runtime;

use crate::{
    context::{Halt, PersistContext},
    fs::FileStore,
    mapper::DbMapper,
    recovery::Recovery,
};

/// Flat-file and database persistence bound to one [`PersistContext`].
///
/// ```rust,ignore
/// let persistence = PersistenceBuilder::new().jobs_dir("/var/spool/pbs/server_priv/jobs").build()?;
/// let report = persistence.recovery().jobs_from_files()?;
/// for mut job in report.recovered {
///     persistence.files().save(&mut job, UpdateType::Quick)?;
/// }
/// ```
pub struct Persistence {
    ctx: Arc<PersistContext>,
    /// Runtime behind the postgres store; absent for the memory store.
    runtime: Option<Arc<Runtime>>,
}

impl Persistence {
    pub(crate) fn new(
        ctx: PersistContext,
        runtime: Option<Arc<Runtime>>,
    ) -> Self {
        Self {
            ctx: Arc::new(ctx),
            runtime,
        }
    }

    pub fn context(&self) -> &PersistContext {
        &self.ctx
    }

    pub fn files(&self) -> FileStore<'_> {
        FileStore::new(&self.ctx)
    }

    pub fn db(&self) -> DbMapper<'_> {
        DbMapper::new(&self.ctx)
    }

    pub fn recovery(&self) -> Recovery<'_> {
        Recovery::new(&self.ctx)
    }

    pub fn halt(&self) -> Arc<Halt> {
        self.ctx.halt()
    }

    /// True once a fatal store failure has been latched; the owner should stop.
    pub fn is_halted(&self) -> bool {
        self.ctx.is_halted()
    }

    pub fn runtime(&self) -> Option<Arc<Runtime>> {
        self.runtime.clone()
    }
}
