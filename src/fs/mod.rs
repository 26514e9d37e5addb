//! Flat-file persistence of jobs and reservations.
//!
//! A save file holds, in order, the fixed record, the extended area, the
//! array tracking block (array jobs only) and the attribute stream. Full
//! saves go through a copy file that is renamed over the live file, so a
//! crash at any point leaves the previous live file intact. Recovery renames
//! the live file to the processing suffix before reading it and renames it
//! back only once the whole object has been decoded.

mod compat;
mod object;
mod reader;
mod writer;

use std::{
    fs,
    io::{ErrorKind, Read},
    path::{Path, PathBuf},
};

use strum::AsRefStr;
use tracing::debug;

use crate::{
    PersistError, Result,
    attr::{AttrValue, AttributeSet, UnknownPolicy},
    context::PersistContext,
    model::ObjectKind,
};

pub use compat::{ExtendLayout, ExtendedRecord};
pub use reader::RecoveryFailure;

pub const JOB_FILE_SUFFIX: &str = ".JB";
pub const JOB_FILE_COPY: &str = ".JC";
pub const JOB_BAD_SUFFIX: &str = ".BD";
pub const RESV_FILE_SUFFIX: &str = ".RB";
pub const RESV_FILE_COPY: &str = ".RC";
pub const RESV_BAD_SUFFIX: &str = ".BD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
pub enum UpdateType {
    /// Rewrite the fixed record and extended area in place.
    #[strum(serialize = "quick")]
    Quick,
    /// Rewrite everything through the copy file.
    #[strum(serialize = "full")]
    Full,
    /// A full save forced by a schema version change.
    #[strum(serialize = "full_force")]
    FullForce,
    /// Write a brand new object straight to the live file.
    #[strum(serialize = "new")]
    New,
}

/// An object with a flat-file representation.
pub trait FlatObject: Sized {
    const KIND: ObjectKind;
    const FILE_SUFFIX: &'static str;
    const COPY_SUFFIX: &'static str;
    const BAD_SUFFIX: &'static str;
    const FIXED_SIZE: usize;
    /// Oldest schema version that can be recovered.
    const MIN_VERSION: u32;
    const CURRENT_VERSION: u32;
    const UNKNOWN_POLICY: UnknownPolicy = UnknownPolicy::Bucket;
    const MTIME_ATTR: &'static str;

    /// Zeroed object with default attributes.
    fn alloc() -> Self;

    fn dir(ctx: &PersistContext) -> &Path;

    fn id(&self) -> &str;

    fn file_prefix(&self) -> &str;

    fn schema_version(&self) -> u32;

    fn set_schema_version(
        &mut self,
        version: u32,
    );

    fn encode_fixed(&self) -> Result<Vec<u8>>;

    fn decode_fixed(
        &mut self,
        buf: &[u8],
    ) -> Result<()>;

    fn encode_extended(&self) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    /// Reads the extended area written under `version`.
    fn read_extended<R: Read>(
        &mut self,
        _version: u32,
        _r: &mut R,
    ) -> Result<()> {
        Ok(())
    }

    fn encode_tracking(&self) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn read_tracking<R: Read>(
        &mut self,
        _r: &mut R,
    ) -> Result<()> {
        Ok(())
    }

    /// Compares the identity in the fixed record with the file name stem.
    fn identity_matches(
        &self,
        stem: &str,
    ) -> bool;

    fn attrs(&self) -> &AttributeSet;

    fn attrs_mut(&mut self) -> &mut AttributeSet;

    fn is_modified(&self) -> bool;

    fn clear_modified(&mut self);

    fn check_version(version: u32) -> Result<()> {
        if version < Self::MIN_VERSION {
            return Err(PersistError::VersionTooOld {
                found: version,
                minimum: Self::MIN_VERSION,
            });
        }
        Ok(())
    }

    fn stamp_mtime(
        &mut self,
        now: i64,
    ) -> Result<()> {
        self.attrs_mut().set(Self::MTIME_ATTR, AttrValue::Long(now))
    }
}

/// Save and recover entry points bound to one persistence context.
pub struct FileStore<'a> {
    ctx: &'a PersistContext,
}

impl<'a> FileStore<'a> {
    pub fn new(ctx: &'a PersistContext) -> Self {
        Self {
            ctx,
        }
    }

    pub fn context(&self) -> &PersistContext {
        self.ctx
    }

    pub fn live_path<T: FlatObject>(
        &self,
        obj: &T,
    ) -> PathBuf {
        T::dir(self.ctx).join(format!("{}{}", obj.file_prefix(), T::FILE_SUFFIX))
    }

    pub fn copy_path<T: FlatObject>(
        &self,
        obj: &T,
    ) -> PathBuf {
        T::dir(self.ctx).join(format!("{}{}", obj.file_prefix(), T::COPY_SUFFIX))
    }

    pub fn bad_path<T: FlatObject>(
        &self,
        obj: &T,
    ) -> PathBuf {
        T::dir(self.ctx).join(format!("{}{}", obj.file_prefix(), T::BAD_SUFFIX))
    }

    /// Removes the live, copy and processing files of `obj`. Missing files
    /// are not an error.
    pub fn purge<T: FlatObject>(
        &self,
        obj: &T,
    ) -> Result<()> {
        for path in [self.live_path(obj), self.copy_path(obj), self.bad_path(obj)] {
            match fs::remove_file(&path) {
                Ok(()) => debug!(kind = %T::KIND, id = obj.id(), path = %path.display(), "removed"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(PersistError::io("unlink", &path, e)),
            }
        }
        Ok(())
    }
}

/// Strips `suffix` from a file name, returning the prefix.
pub(crate) fn file_stem<'n>(
    name: &'n str,
    suffix: &str,
) -> Option<&'n str> {
    name.strip_suffix(suffix).filter(|stem| !stem.is_empty())
}
