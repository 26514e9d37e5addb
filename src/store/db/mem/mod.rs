mod collect;

use std::sync::Arc;

use crate::{
    Result,
    store::{DbCollection, DbStore, DbTransaction, Store, TxnEnd, data::*},
};
use collect::Collect;

/// In-memory store. Transactions snapshot every collection on `begin`.
#[derive(Debug, Clone)]
pub struct MemStore {
    jobs: Arc<Collect<DbJob>>,
    resvs: Arc<Collect<DbResv>>,
    nodes: Arc<Collect<DbNode>>,
}

impl DbStore for MemStore {
    fn init(
        &self,
        s: &Store,
    ) -> Result<()> {
        s.register(self.jobs());
        s.register(self.resvs());
        s.register(self.nodes());
        s.register_txn(Arc::new(self.clone()));
        Ok(())
    }
}

impl DbTransaction for MemStore {
    /// Opens a snapshot on every collection, or on none of them.
    fn begin(&self) -> Result<()> {
        self.jobs.begin()?;
        if let Err(e) = self.resvs.begin() {
            self.jobs.rollback()?;
            return Err(e);
        }
        if let Err(e) = self.nodes.begin() {
            self.jobs.rollback()?;
            self.resvs.rollback()?;
            return Err(e);
        }
        Ok(())
    }

    fn end(
        &self,
        end: TxnEnd,
    ) -> Result<()> {
        match end {
            TxnEnd::Commit => {
                self.jobs.commit()?;
                self.resvs.commit()?;
                self.nodes.commit()
            }
            TxnEnd::Rollback => {
                self.jobs.rollback()?;
                self.resvs.rollback()?;
                self.nodes.rollback()
            }
        }
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(Collect::new("jobs")),
            resvs: Arc::new(Collect::new("resvs")),
            nodes: Arc::new(Collect::new("nodes")),
        }
    }

    pub fn jobs(&self) -> Arc<dyn DbCollection<Item = DbJob> + Send + Sync> {
        self.jobs.clone()
    }

    pub fn resvs(&self) -> Arc<dyn DbCollection<Item = DbResv> + Send + Sync> {
        self.resvs.clone()
    }

    pub fn nodes(&self) -> Arc<dyn DbCollection<Item = DbNode> + Send + Sync> {
        self.nodes.clone()
    }

    /// Makes every write to any collection fail, or stop failing.
    pub fn set_failing(
        &self,
        failing: bool,
    ) {
        self.jobs.set_failing(failing);
        self.resvs.set_failing(failing);
        self.nodes.set_failing(failing);
    }
}

#[cfg(test)]
mod test {
    use crate::store::{DbTransaction, SaveMode, TxnEnd, data::DbJob};

    use super::MemStore;

    #[test]
    fn test_failed_begin_closes_started_snapshots() {
        let mem = MemStore::new();
        mem.nodes.begin().unwrap();
        assert!(mem.begin().is_err());

        // jobs and resvs were rolled back, so their snapshots are closed
        mem.jobs.begin().unwrap();
        mem.resvs.begin().unwrap();
        mem.jobs.commit().unwrap();
        mem.resvs.commit().unwrap();
        mem.nodes.commit().unwrap();

        mem.begin().unwrap();
        let row = DbJob {
            jobid: "1.headnode".into(),
            ..Default::default()
        };
        mem.jobs().save(&row, SaveMode::InsertNew).unwrap();
        mem.end(TxnEnd::Rollback).unwrap();
        assert!(mem.jobs().ids().unwrap().is_empty());
    }
}
