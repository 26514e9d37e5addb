mod attr;
mod job;
mod node;
mod resv;

pub use attr::{DbAttr, DbAttrList};
pub use job::DbJob;
pub use node::DbNode;
pub use resv::DbResv;
