use std::{
    collections::BTreeMap,
    sync::{
        Mutex, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};

use tracing::trace;

use crate::{
    PersistError, Result,
    store::{DbCollection, DbRecord, SaveMode},
};

#[derive(Debug)]
pub struct Collect<T> {
    name: String,
    rows: RwLock<BTreeMap<String, T>>,
    snapshot: Mutex<Option<BTreeMap<String, T>>>,
    failing: AtomicBool,
}

impl<T> Collect<T>
where
    T: DbRecord + Send + Sync,
{
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rows: RwLock::new(BTreeMap::new()),
            snapshot: Mutex::new(None),
            failing: AtomicBool::new(false),
        }
    }

    /// Makes every later write fail until switched off again.
    pub fn set_failing(
        &self,
        failing: bool,
    ) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn poisoned(&self) -> PersistError {
        PersistError::Store(format!("collection {} lock poisoned", self.name))
    }

    fn check_writable(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistError::Store(format!("collection {}: write rejected", self.name)));
        }
        Ok(())
    }

    pub(super) fn begin(&self) -> Result<()> {
        let rows = self.rows.read().map_err(|_| self.poisoned())?;
        let mut snapshot = self.snapshot.lock().map_err(|_| self.poisoned())?;
        if snapshot.is_some() {
            return Err(PersistError::Store(format!("collection {}: transaction already open", self.name)));
        }
        *snapshot = Some(rows.clone());
        Ok(())
    }

    pub(super) fn commit(&self) -> Result<()> {
        self.snapshot.lock().map_err(|_| self.poisoned())?.take();
        Ok(())
    }

    pub(super) fn rollback(&self) -> Result<()> {
        let saved = self.snapshot.lock().map_err(|_| self.poisoned())?.take();
        if let Some(saved) = saved {
            *self.rows.write().map_err(|_| self.poisoned())? = saved;
        }
        Ok(())
    }
}

impl<T> DbCollection for Collect<T>
where
    T: DbRecord + Send + Sync,
{
    type Item = T;

    fn find(
        &self,
        id: &str,
    ) -> Result<Option<Self::Item>> {
        trace!("{}::find({})", self.name, id);
        Ok(self.rows.read().map_err(|_| self.poisoned())?.get(id).cloned())
    }

    fn ids(&self) -> Result<Vec<String>> {
        let rows = self.rows.read().map_err(|_| self.poisoned())?;
        let mut keyed: Vec<_> = rows.values().map(|row| (row.sort_key(), row.id().to_string())).collect();
        keyed.sort();
        Ok(keyed.into_iter().map(|(_, id)| id).collect())
    }

    fn save(
        &self,
        data: &Self::Item,
        mode: SaveMode,
    ) -> Result<bool> {
        trace!("{}::save({}, {})", self.name, data.id(), mode.as_ref());
        self.check_writable()?;
        let mut rows = self.rows.write().map_err(|_| self.poisoned())?;
        match mode {
            SaveMode::InsertNew => {
                if rows.contains_key(data.id()) {
                    return Err(PersistError::Store(format!("collection {}: duplicate key {}", self.name, data.id())));
                }
                rows.insert(data.id().to_string(), data.clone());
                Ok(true)
            }
            SaveMode::UpdateFull => match rows.get_mut(data.id()) {
                Some(row) => {
                    *row = data.clone();
                    Ok(true)
                }
                None => Ok(false),
            },
            SaveMode::UpdateQuick => match rows.get_mut(data.id()) {
                Some(row) => {
                    row.apply_quick(data);
                    Ok(true)
                }
                None => Ok(false),
            },
        }
    }

    fn delete(
        &self,
        id: &str,
    ) -> Result<bool> {
        trace!("{}::delete({})", self.name, id);
        self.check_writable()?;
        Ok(self.rows.write().map_err(|_| self.poisoned())?.remove(id).is_some())
    }
}
