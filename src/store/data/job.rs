use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, DbRecord, StoreIden};

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DbJob {
    pub jobid: String,
    pub jsversion: i32,
    pub state: i32,
    pub substate: i32,
    pub svrflags: i32,
    pub priority: i32,
    pub rank: i32,
    pub stime: i64,
    pub endtime: i64,
    pub queue: String,
    pub destin: String,
    pub fileprefix: String,
    pub resv_id: Option<String>,

    /// Extended area in its current on-disk layout.
    pub extend: Vec<u8>,
    /// Array tracking block, size field included.
    pub tracking: Option<Vec<u8>>,
    /// Alternating `name.resource` / `flags.value` strings.
    pub attributes: Vec<String>,
}

impl DbCollectionIden for DbJob {
    fn iden() -> StoreIden {
        StoreIden::Jobs
    }
}

impl DbRecord for DbJob {
    fn id(&self) -> &str {
        &self.jobid
    }

    fn apply_quick(
        &mut self,
        other: &Self,
    ) {
        let attributes = std::mem::take(&mut self.attributes);
        let tracking = self.tracking.take();
        *self = Self {
            attributes,
            tracking,
            ..other.clone()
        };
    }
}
