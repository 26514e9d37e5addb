//! # pbsstore
//!
//! Crash-safe persistence and startup recovery of batch scheduler jobs,
//! reservations and nodes.
//!
//! ## Core Features
//!
//! - **Flat files**: fixed record, extended record, array tracking and an attribute stream per object,
//!   written through a copy file and an atomic rename
//! - **Quick updates**: fixed and extended records rewritten in place
//! - **Database rows**: update-then-insert saves and transactional loads over PostgreSQL or an in-memory store
//! - **Recovery**: rename-before-read passes that discard ghost, corrupt and unrecoverable records one by one
//! - **Old layouts**: records written by older servers are converted on read
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pbsstore::{PersistenceBuilder, fs::UpdateType};
//!
//! let persistence = PersistenceBuilder::new().jobs_dir("/var/spool/pbs/server_priv/jobs").build()?;
//! let report = persistence.recovery().jobs_from_files()?;
//! for mut job in report.recovered {
//!     job.mark_modified();
//!     persistence.files().save(&mut job, UpdateType::Full)?;
//! }
//! ```

pub mod attr;
mod builder;
pub mod config;
pub mod context;
mod error;
pub mod fs;
pub mod mapper;
pub mod model;
mod persistence;
pub mod recovery;
pub mod store;
pub mod utils;

use std::sync::{Arc, RwLock};

pub use builder::PersistenceBuilder;
pub use config::{Config, StoreType};
pub use context::{Halt, PersistContext};
pub use error::PersistError;
pub use persistence::Persistence;

/// Result type alias for pbsstore operations.
pub type Result<T> = std::result::Result<T, PersistError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub(crate) type ShareLock<T> = Arc<RwLock<T>>;
