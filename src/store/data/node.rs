use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, DbRecord, StoreIden};

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DbNode {
    pub name: String,
    /// `nummoms * total_nodes + index`, the recovery order.
    pub index: i32,
    pub mom_modtime: i64,
    pub hostname: String,
    pub ntype: i32,
    pub state: i32,
    pub pque: String,

    pub attributes: Vec<String>,
}

impl DbCollectionIden for DbNode {
    fn iden() -> StoreIden {
        StoreIden::Nodes
    }
}

impl DbRecord for DbNode {
    fn id(&self) -> &str {
        &self.name
    }

    fn sort_key(&self) -> i64 {
        self.index as i64
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
