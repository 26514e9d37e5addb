use std::{io::Read, path::Path};

use crate::{
    PersistError, Result,
    attr::{AttributeSet, job, resv},
    context::PersistContext,
    model::{ArrayTracking, JOB_FIX_SIZE, JSVERSION, JSVERSION_514, Job, JobFix, ObjectKind, RESV_FIX_SIZE, RSVERSION, Resv, ResvFix},
};

use super::{ExtendLayout, ExtendedRecord, FlatObject, JOB_BAD_SUFFIX, JOB_FILE_COPY, JOB_FILE_SUFFIX, RESV_BAD_SUFFIX, RESV_FILE_COPY, RESV_FILE_SUFFIX};

impl FlatObject for Job {
    const KIND: ObjectKind = ObjectKind::Job;
    const FILE_SUFFIX: &'static str = JOB_FILE_SUFFIX;
    const COPY_SUFFIX: &'static str = JOB_FILE_COPY;
    const BAD_SUFFIX: &'static str = JOB_BAD_SUFFIX;
    const FIXED_SIZE: usize = JOB_FIX_SIZE;
    const MIN_VERSION: u32 = JSVERSION_514;
    const CURRENT_VERSION: u32 = JSVERSION;
    const MTIME_ATTR: &'static str = job::MTIME;

    fn alloc() -> Self {
        Job::alloc()
    }

    fn dir(ctx: &PersistContext) -> &Path {
        ctx.jobs_dir()
    }

    fn id(&self) -> &str {
        Job::id(self)
    }

    fn file_prefix(&self) -> &str {
        Job::file_prefix(self)
    }

    fn schema_version(&self) -> u32 {
        self.fix.jsversion
    }

    fn set_schema_version(
        &mut self,
        version: u32,
    ) {
        self.fix.jsversion = version;
    }

    fn encode_fixed(&self) -> Result<Vec<u8>> {
        self.fix.encode()
    }

    fn decode_fixed(
        &mut self,
        buf: &[u8],
    ) -> Result<()> {
        self.fix = JobFix::decode(buf)?;
        Ok(())
    }

    fn encode_extended(&self) -> Result<Vec<u8>> {
        self.extend.encode()
    }

    fn read_extended<R: Read>(
        &mut self,
        version: u32,
        r: &mut R,
    ) -> Result<()> {
        let layout = ExtendLayout::for_version(version)?;
        ExtendedRecord::read(layout, r)?.apply(&mut self.extend);
        Ok(())
    }

    fn encode_tracking(&self) -> Result<Option<Vec<u8>>> {
        if !self.is_array_job() {
            return Ok(None);
        }
        match &self.tracking {
            Some(tracking) => tracking.encode().map(Some),
            None => Err(PersistError::Encode(format!("array job {} has no tracking table", self.id()))),
        }
    }

    fn read_tracking<R: Read>(
        &mut self,
        r: &mut R,
    ) -> Result<()> {
        if self.is_array_job() {
            self.tracking = Some(ArrayTracking::read_from(r)?);
        }
        Ok(())
    }

    /// The stem may be a truncated job id.
    fn identity_matches(
        &self,
        stem: &str,
    ) -> bool {
        self.fix.jobid.starts_with(stem)
    }

    fn attrs(&self) -> &AttributeSet {
        &self.attrs
    }

    fn attrs_mut(&mut self) -> &mut AttributeSet {
        &mut self.attrs
    }

    fn is_modified(&self) -> bool {
        Job::is_modified(self)
    }

    fn clear_modified(&mut self) {
        Job::clear_modified(self)
    }
}

impl FlatObject for Resv {
    const KIND: ObjectKind = ObjectKind::Resv;
    const FILE_SUFFIX: &'static str = RESV_FILE_SUFFIX;
    const COPY_SUFFIX: &'static str = RESV_FILE_COPY;
    const BAD_SUFFIX: &'static str = RESV_BAD_SUFFIX;
    const FIXED_SIZE: usize = RESV_FIX_SIZE;
    const MIN_VERSION: u32 = 0;
    const CURRENT_VERSION: u32 = RSVERSION;
    const MTIME_ATTR: &'static str = resv::MTIME;

    fn alloc() -> Self {
        Resv::alloc()
    }

    fn dir(ctx: &PersistContext) -> &Path {
        ctx.resvs_dir()
    }

    fn id(&self) -> &str {
        Resv::id(self)
    }

    fn file_prefix(&self) -> &str {
        Resv::file_prefix(self)
    }

    fn schema_version(&self) -> u32 {
        self.fix.rsversion
    }

    fn set_schema_version(
        &mut self,
        version: u32,
    ) {
        self.fix.rsversion = version;
    }

    fn encode_fixed(&self) -> Result<Vec<u8>> {
        self.fix.encode()
    }

    fn decode_fixed(
        &mut self,
        buf: &[u8],
    ) -> Result<()> {
        self.fix = ResvFix::decode(buf)?;
        Ok(())
    }

    /// Compared over the length of the stored prefix.
    fn identity_matches(
        &self,
        stem: &str,
    ) -> bool {
        stem.starts_with(self.file_prefix())
    }

    fn attrs(&self) -> &AttributeSet {
        &self.attrs
    }

    fn attrs_mut(&mut self) -> &mut AttributeSet {
        &mut self.attrs
    }

    fn is_modified(&self) -> bool {
        Resv::is_modified(self)
    }

    fn clear_modified(&mut self) {
        Resv::clear_modified(self)
    }
}
