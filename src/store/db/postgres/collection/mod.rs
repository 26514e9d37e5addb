mod job;
mod node;
mod resv;

use std::sync::Arc;

pub use job::JobCollection;
pub use node::NodeCollection;
pub use resv::ResvCollection;

use crate::store::map_db_err;

use super::synclient::SynClient;

pub type DbConnection = Arc<SynClient>;
