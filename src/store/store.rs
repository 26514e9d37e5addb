use std::{
    any::Any,
    collections::HashMap,
    convert::AsRef,
    sync::{Arc, RwLock},
};

use tracing::trace;

use crate::{PersistError, Result, ShareLock};

use super::{DbCollection, DbCollectionIden, DbTransaction, StoreIden, TxnEnd, data::*};

#[derive(Clone)]
pub struct DynDbSetRef<T>(Arc<dyn DbCollection<Item = T>>);

pub struct Store {
    collections: ShareLock<HashMap<StoreIden, Arc<dyn Any + Send + Sync + 'static>>>,
    txn: ShareLock<Option<Arc<dyn DbTransaction>>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
            txn: Arc::new(RwLock::new(None)),
        }
    }

    pub fn collection<DATA>(&self) -> Result<Arc<dyn DbCollection<Item = DATA>>>
    where
        DATA: DbCollectionIden + Send + Sync + 'static,
    {
        let missing = || PersistError::Store(format!("fail to get collection: {}", DATA::iden().as_ref()));
        let collections = self.collections.read().map_err(|_| missing())?;
        let collection = collections.get(&DATA::iden()).ok_or_else(missing)?;

        collection.downcast_ref::<DynDbSetRef<DATA>>().map(|v| v.0.clone()).ok_or_else(missing)
    }

    pub fn register<DATA>(
        &self,
        collection: Arc<dyn DbCollection<Item = DATA> + Send + Sync + 'static>,
    ) where
        DATA: DbCollectionIden + 'static,
    {
        trace!("store::register({})", DATA::iden().as_ref());
        if let Ok(mut collections) = self.collections.write() {
            collections.insert(DATA::iden(), Arc::new(DynDbSetRef::<DATA>(collection)));
        }
    }

    pub fn register_txn(
        &self,
        txn: Arc<dyn DbTransaction>,
    ) {
        if let Ok(mut slot) = self.txn.write() {
            *slot = Some(txn);
        }
    }

    pub fn jobs(&self) -> Result<Arc<dyn DbCollection<Item = DbJob>>> {
        self.collection()
    }

    pub fn resvs(&self) -> Result<Arc<dyn DbCollection<Item = DbResv>>> {
        self.collection()
    }

    pub fn nodes(&self) -> Result<Arc<dyn DbCollection<Item = DbNode>>> {
        self.collection()
    }

    fn txn(&self) -> Result<Arc<dyn DbTransaction>> {
        let slot = self.txn.read().map_err(|_| PersistError::Store("transaction handle poisoned".to_string()))?;
        slot.clone().ok_or_else(|| PersistError::Store("no transaction support registered".to_string()))
    }

    pub fn begin(&self) -> Result<()> {
        trace!("store::begin");
        self.txn()?.begin()
    }

    pub fn end(
        &self,
        end: TxnEnd,
    ) -> Result<()> {
        trace!("store::end({})", end.as_ref());
        self.txn()?.end(end)
    }
}
