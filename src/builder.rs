use std::{path::PathBuf, sync::Arc};

use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info};

use crate::{
    Config, PersistError, Persistence, Result, StoreType,
    config::PostgresConfig,
    context::PersistContext,
    store::{DbStore, MemStore, PostgresStore, Store},
    utils::time::Clock,
};

pub struct PersistenceBuilder {
    config: Config,
    clock: Option<Arc<dyn Clock>>,
    async_worker_thread_number: u16,
    rt: Option<Arc<Runtime>>,
}

impl Default for PersistenceBuilder {
    fn default() -> Self {
        Self {
            config: Config::default(),
            clock: None,
            async_worker_thread_number: 2,
            rt: None,
        }
    }
}

impl PersistenceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn jobs_dir(
        mut self,
        dir: impl Into<PathBuf>,
    ) -> Self {
        self.config.paths.jobs = dir.into();
        self
    }

    pub fn resvs_dir(
        mut self,
        dir: impl Into<PathBuf>,
    ) -> Self {
        self.config.paths.resvs = dir.into();
        self
    }

    pub fn max_save_tries(
        mut self,
        tries: usize,
    ) -> Self {
        self.config.save.max_tries = tries;
        self
    }

    pub fn fsync(
        mut self,
        fsync: bool,
    ) -> Self {
        self.config.save.fsync = fsync;
        self
    }

    pub fn postgres(
        mut self,
        postgres: PostgresConfig,
    ) -> Self {
        self.config.store.store_type = StoreType::Postgres;
        self.config.store.postgres = Some(postgres);
        self
    }

    pub fn clock(
        mut self,
        clock: Arc<dyn Clock>,
    ) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn async_worker_thread_number(
        mut self,
        n: u16,
    ) -> Self {
        self.async_worker_thread_number = n;
        self
    }

    /// Runtime for database calls. Without one the builder creates its own
    /// when the postgres store is selected.
    pub fn runtime(
        mut self,
        runtime: Arc<Runtime>,
    ) -> Self {
        self.rt = Some(runtime);
        self
    }

    pub fn build(&self) -> Result<Persistence> {
        self.config.validate()?;
        let store = Arc::new(Store::new());

        let runtime = match self.config.store.store_type {
            StoreType::Mem => {
                MemStore::new().init(&store)?;
                None
            }
            StoreType::Postgres => {
                let postgres = self.config.store.postgres.as_ref().ok_or_else(|| PersistError::Config("postgres configuration is required when store type is postgres".to_string()))?;
                let runtime = match &self.rt {
                    Some(rt) => rt.clone(),
                    None => Arc::new(
                        Builder::new_multi_thread()
                            .worker_threads(self.async_worker_thread_number.max(1).into())
                            .enable_all()
                            .build()
                            .map_err(|e| PersistError::Config(format!("failed to start database runtime: {}", e)))?,
                    ),
                };
                PostgresStore::new(postgres, runtime.clone())?.init(&store)?;
                Some(runtime)
            }
        };
        debug!(store_type = ?self.config.store.store_type, "store initialised");

        let mut ctx = PersistContext::new(&self.config.paths.jobs, &self.config.paths.resvs, store)
            .with_max_save_tries(self.config.save.max_tries)
            .with_fsync(self.config.save.fsync);
        if let Some(clock) = &self.clock {
            ctx = ctx.with_clock(clock.clone());
        }
        info!(jobs = %self.config.paths.jobs.display(), resvs = %self.config.paths.resvs.display(), "persistence ready");

        Ok(Persistence::new(ctx, runtime))
    }
}
