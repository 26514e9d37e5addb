use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use sqlx::{
    Database, Error, IntoArguments, PgPool, Postgres, Transaction,
    postgres::{PgPoolOptions, PgRow},
};
use tokio::{
    runtime::{Handle, Runtime},
    task::block_in_place,
};

use crate::{PersistError, Result, config::PostgresConfig};

/// Blocking facade over a sqlx pool. While a transaction is open every
/// statement runs on its connection.
pub struct SynClient {
    pool: PgPool,
    txn: Mutex<Option<Transaction<'static, Postgres>>>,

    runtime: Arc<Runtime>,
}

impl SynClient {
    pub fn connect(
        config: &PostgresConfig,
        runtime: Arc<Runtime>,
    ) -> Result<Self> {
        let options = PgPoolOptions::new().acquire_timeout(Duration::from_secs(config.acquire_timeout_secs)).max_connections(config.max_connections);
        let pool = block_on(&runtime, options.connect(&config.database_url))
            .map_err(|e| PersistError::Store(format!("failed to connect to DB {}: {}", config.database_url, e)))?;

        Ok(Self {
            pool,
            txn: Mutex::new(None),
            runtime,
        })
    }

    fn block_on<F: Future>(
        &self,
        fut: F,
    ) -> F::Output {
        block_on(&self.runtime, fut)
    }

    fn txn_lock(&self) -> std::result::Result<MutexGuard<'_, Option<Transaction<'static, Postgres>>>, Error> {
        self.txn.lock().map_err(|_| Error::Protocol("transaction lock poisoned".to_string()))
    }

    pub fn query_one<'q, A>(
        &self,
        sql: &'q str,
        params: A,
    ) -> std::result::Result<Option<PgRow>, Error>
    where
        A: IntoArguments<'q, Postgres> + 'q,
    {
        let mut txn = self.txn_lock()?;
        self.block_on(async move {
            match txn.as_mut() {
                Some(tx) => sqlx::query_with(sql, params).fetch_optional(&mut **tx).await,
                None => {
                    let mut conn = self.pool.acquire().await?;
                    sqlx::query_with(sql, params).fetch_optional(&mut *conn).await
                }
            }
        })
    }

    pub fn query<'q, A>(
        &self,
        sql: &'q str,
        params: A,
    ) -> std::result::Result<Vec<PgRow>, Error>
    where
        A: IntoArguments<'q, Postgres> + 'q,
    {
        let mut txn = self.txn_lock()?;
        self.block_on(async move {
            match txn.as_mut() {
                Some(tx) => sqlx::query_with(sql, params).fetch_all(&mut **tx).await,
                None => {
                    let mut conn = self.pool.acquire().await?;
                    sqlx::query_with(sql, params).fetch_all(&mut *conn).await
                }
            }
        })
    }

    pub fn execute<'q, A>(
        &self,
        sql: &'q str,
        params: A,
    ) -> std::result::Result<<Postgres as Database>::QueryResult, Error>
    where
        A: IntoArguments<'q, Postgres> + 'q,
    {
        let mut txn = self.txn_lock()?;
        self.block_on(async move {
            match txn.as_mut() {
                Some(tx) => sqlx::query_with(sql, params).execute(&mut **tx).await,
                None => {
                    let mut conn = self.pool.acquire().await?;
                    sqlx::query_with(sql, params).execute(&mut *conn).await
                }
            }
        })
    }

    pub fn batch_execute(
        &self,
        sqls: &[String],
    ) -> std::result::Result<(), Error> {
        self.block_on(async move {
            let mut tx = self.pool.begin().await?;

            for sql in sqls {
                sqlx::query(sql).execute(&mut *tx).await?;
            }
            tx.commit().await
        })
    }

    pub fn begin(&self) -> std::result::Result<(), Error> {
        let mut txn = self.txn_lock()?;
        if txn.is_some() {
            return Err(Error::Protocol("transaction already open".to_string()));
        }
        *txn = Some(self.block_on(self.pool.begin())?);
        Ok(())
    }

    pub fn commit(&self) -> std::result::Result<(), Error> {
        let tx = self.txn_lock()?.take();
        match tx {
            Some(tx) => self.block_on(tx.commit()),
            None => Ok(()),
        }
    }

    pub fn rollback(&self) -> std::result::Result<(), Error> {
        let tx = self.txn_lock()?.take();
        match tx {
            Some(tx) => self.block_on(tx.rollback()),
            None => Ok(()),
        }
    }
}

fn block_on<F: Future>(
    runtime: &Runtime,
    fut: F,
) -> F::Output {
    if Handle::try_current().is_ok() { block_in_place(|| runtime.block_on(fut)) } else { runtime.block_on(fut) }
}
