use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, DbRecord, StoreIden};

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DbResv {
    pub resv_id: String,
    pub rsversion: i32,
    pub state: i32,
    pub substate: i32,
    pub svrflags: i32,
    pub start: i64,
    pub end: i64,
    pub duration: i64,
    pub tactive: i64,
    pub queue: String,
    pub fileprefix: String,

    pub attributes: Vec<String>,
}

impl DbCollectionIden for DbResv {
    fn iden() -> StoreIden {
        StoreIden::Resvs
    }
}

impl DbRecord for DbResv {
    fn id(&self) -> &str {
        &self.resv_id
    }

    fn apply_quick(
        &mut self,
        other: &Self,
    ) {
        let attributes = std::mem::take(&mut self.attributes);
        *self = Self {
            attributes,
            ..other.clone()
        };
    }
}
