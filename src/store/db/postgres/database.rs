use std::sync::Arc;

use tokio::runtime::Runtime;
use tracing::info;

use crate::{
    Result,
    config::PostgresConfig,
    store::{DbCollection, DbStore, DbTransaction, Store, TxnEnd, data::*, map_db_err},
};

use super::{DbInit, collection::*, synclient::SynClient};

#[derive(Clone)]
pub struct PostgresStore {
    conn: DbConnection,
    jobs: Arc<JobCollection>,
    resvs: Arc<ResvCollection>,
    nodes: Arc<NodeCollection>,
}

impl DbStore for PostgresStore {
    fn init(
        &self,
        s: &Store,
    ) -> Result<()> {
        self.jobs.init()?;
        self.resvs.init()?;
        self.nodes.init()?;

        s.register(self.jobs());
        s.register(self.resvs());
        s.register(self.nodes());
        s.register_txn(Arc::new(self.clone()));
        info!("postgres store initialised");
        Ok(())
    }
}

impl DbTransaction for PostgresStore {
    fn begin(&self) -> Result<()> {
        self.conn.begin().map_err(map_db_err)
    }

    fn end(
        &self,
        end: TxnEnd,
    ) -> Result<()> {
        match end {
            TxnEnd::Commit => self.conn.commit(),
            TxnEnd::Rollback => self.conn.rollback(),
        }
        .map_err(map_db_err)
    }
}

impl PostgresStore {
    pub fn new(
        config: &PostgresConfig,
        runtime: Arc<Runtime>,
    ) -> Result<Self> {
        let conn = Arc::new(SynClient::connect(config, runtime)?);
        let jobs = JobCollection::new(&conn);
        let resvs = ResvCollection::new(&conn);
        let nodes = NodeCollection::new(&conn);

        Ok(Self {
            conn,
            jobs: Arc::new(jobs),
            resvs: Arc::new(resvs),
            nodes: Arc::new(nodes),
        })
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
}
