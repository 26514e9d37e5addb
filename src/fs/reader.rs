use std::{
    fmt,
    fs::{self, File},
    io::{BufReader, Read},
};

use tracing::{debug, error, trace, warn};

use crate::{
    PersistError, Result,
    attr::{decode_list, read_stream},
    recovery::RecoveryStage,
};

use super::{FileStore, FlatObject, file_stem};

/// A failed recovery and the last stage it reached.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryFailure {
    pub stage: RecoveryStage,
    pub error: PersistError,
}

impl fmt::Display for RecoveryFailure {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{} (after {})", self.error, self.stage.as_ref())
    }
}

impl FileStore<'_> {
    /// Recovers one object from `filename`, a live file in the object's
    /// directory.
    pub fn recover<T: FlatObject>(
        &self,
        filename: &str,
    ) -> Result<T> {
        self.recover_staged(filename).map_err(|failure| failure.error)
    }

    /// As [`FileStore::recover`], reporting how far a failed recovery got.
    ///
    /// The file is renamed to the processing suffix before it is opened and
    /// stays there unless the whole object decodes.
    pub fn recover_staged<T: FlatObject>(
        &self,
        filename: &str,
    ) -> std::result::Result<T, RecoveryFailure> {
        trace!("fs::recover({}, {})", T::KIND, filename);
        let mut stage = RecoveryStage::Candidate;
        let fail = |stage: RecoveryStage, error: PersistError| {
            warn!(kind = %T::KIND, file = filename, stage = stage.as_ref(), "recovery failed: {}", error);
            RecoveryFailure {
                stage,
                error,
            }
        };

        let Some(stem) = file_stem(filename, T::FILE_SUFFIX) else {
            return Err(fail(stage, PersistError::NotFound(format!("{} is not a {} save file", filename, T::KIND))));
        };
        let dir = T::dir(self.ctx);
        let live = dir.join(filename);
        let bad = dir.join(format!("{}{}", stem, T::BAD_SUFFIX));

        if let Err(e) = fs::rename(&live, &bad) {
            error!(kind = %T::KIND, file = filename, "error renaming to {}: {}", bad.display(), e);
            return Err(fail(stage, PersistError::io("rename", &live, e)));
        }
        stage = RecoveryStage::Processing;

        let obj = File::open(&bad).map_err(|e| PersistError::io("open", &bad, e)).and_then(|file| {
            let mut r = BufReader::new(file);
            read_object::<T, _>(&mut r, stem, &mut stage)
        });
        let mut obj = obj.map_err(|e| fail(stage, e))?;

        if let Err(e) = fs::rename(&bad, &live) {
            error!(kind = %T::KIND, file = filename, "error renaming back from {}: {}", bad.display(), e);
        }
        obj.clear_modified();
        debug!(kind = %T::KIND, id = obj.id(), "recovered");
        Ok(obj)
    }
}

/// Decodes an object from `r`, advancing `stage` as each block loads.
fn read_object<T: FlatObject, R: Read>(
    r: &mut R,
    stem: &str,
    stage: &mut RecoveryStage,
) -> Result<T> {
    let mut obj = T::alloc();

    let mut fixed = vec![0u8; T::FIXED_SIZE];
    r.read_exact(&mut fixed).map_err(|e| PersistError::Corrupt(format!("problem reading fixed record: {}", e)))?;
    obj.decode_fixed(&fixed)?;
    if !obj.identity_matches(stem) {
        return Err(PersistError::Ghost(format!("{} id {} does not match file name {}", T::KIND, obj.id(), stem)));
    }
    *stage = RecoveryStage::FixedLoaded;

    let version = obj.schema_version();
    T::check_version(version)?;
    obj.read_extended(version, r)?;
    obj.read_tracking(r)?;
    *stage = RecoveryStage::ExtendedLoaded;

    let list = read_stream(r)?;
    decode_list(obj.attrs_mut(), list, T::UNKNOWN_POLICY)?;
    *stage = RecoveryStage::AttributesLoaded;

    Ok(obj)
}

#[cfg(test)]
mod test {
    use std::{fs, sync::Arc};

    use tempfile::TempDir;

    use crate::{
        PersistError,
        attr::{AttrFlags, AttrValue, ExternalAttr, encode_all, job, resv, write_stream},
        context::PersistContext,
        fs::{FileStore, FlatObject, UpdateType},
        model::{ArrayTracking, JSVERSION_514, Job, JobExtend, Resv, svrflags},
        recovery::RecoveryStage,
        store::Store,
    };

    fn context(dir: &TempDir) -> PersistContext {
        let jobs = dir.path().join("jobs");
        let resvs = dir.path().join("resvs");
        fs::create_dir_all(&jobs).unwrap();
        fs::create_dir_all(&resvs).unwrap();
        PersistContext::new(jobs, resvs, Arc::new(Store::new())).with_fsync(false)
    }

    fn sample_job(id: &str) -> Job {
        let mut j = Job::new(id);
        j.fix.queue = "workq".into();
        j.fix.stime = 1_700_000_100;
        j.extend.jid = "jid1".into();
        j.extend.nodeidx = 4;
        j.attrs.set(job::NAME, AttrValue::Str("sim.sh".into())).unwrap();
        j.attrs.set(job::RUN_COUNT, AttrValue::Long(3)).unwrap();
        j.attrs.set(job::X11_COOKIE, AttrValue::Str("secret".into())).unwrap();
        j.attrs.set_resource(job::RESOURCE_LIST, "ncpus", "16").unwrap();
        j
    }

    #[test]
    fn test_job_roundtrip() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let store = FileStore::new(&ctx);

        let mut saved = sample_job("10.headnode");
        store.save(&mut saved, UpdateType::New).unwrap();

        let loaded: Job = store.recover("10.headnode.JB").unwrap();
        assert_eq!(loaded.fix, saved.fix);
        assert_eq!(loaded.extend, saved.extend);
        assert_eq!(loaded.attrs.get_str(job::NAME), Some("sim.sh"));
        assert_eq!(loaded.attrs.get_long(job::RUN_COUNT), Some(3));
        assert_eq!(loaded.attrs.get_long(job::PRIORITY), Some(0));
        assert!(!loaded.attrs.is_set(job::X11_COOKIE));
        assert_eq!(encode_all(&loaded.attrs), encode_all(&saved.attrs));
        assert!(!loaded.is_modified());
        assert!(store.live_path(&loaded).exists());
        assert!(!store.bad_path(&loaded).exists());
    }

    #[test]
    fn test_array_job_roundtrip() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let store = FileStore::new(&ctx);

        let mut saved = sample_job("11[].headnode");
        saved.fix.svrflags |= svrflags::ARRAY_JOB;
        let mut tracking = ArrayTracking::with_subjobs(4);
        tracking.subjobs[2].state = 4;
        tracking.subjobs[3].exit_status = 271;
        saved.tracking = Some(tracking);
        store.save(&mut saved, UpdateType::Full).unwrap();

        let loaded: Job = store.recover("11[].headnode.JB").unwrap();
        assert_eq!(loaded.tracking, saved.tracking);
        assert_eq!(loaded.attrs.get_long(job::RUN_COUNT), Some(3));
    }

    #[test]
    fn test_resv_roundtrip_keeps_unknown() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let store = FileStore::new(&ctx);

        let mut saved = Resv::new("R5.headnode");
        saved.fix.start = 1_700_003_600;
        saved.attrs.set(resv::NAME, AttrValue::Str("maint".into())).unwrap();
        let site = ExternalAttr::new("site_policy", None, "strict", AttrFlags::SET);
        saved.attrs.push_unknown(site.clone());
        store.save(&mut saved, UpdateType::New).unwrap();

        let loaded: Resv = store.recover("R5.headnode.RB").unwrap();
        assert_eq!(loaded.fix, saved.fix);
        assert_eq!(loaded.attrs.get_str(resv::NAME), Some("maint"));
        assert_eq!(loaded.attrs.unknown(), &[site]);
    }

    #[test]
    fn test_ghost_file_is_discarded() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let store = FileStore::new(&ctx);

        let mut saved = sample_job("12.headnode");
        store.save(&mut saved, UpdateType::New).unwrap();
        fs::rename(store.live_path(&saved), ctx.jobs_dir().join("99.headnode.JB")).unwrap();

        let failure = store.recover_staged::<Job>("99.headnode.JB").unwrap_err();
        assert!(matches!(failure.error, PersistError::Ghost(_)));
        assert_eq!(failure.stage, RecoveryStage::Processing);
        assert!(ctx.jobs_dir().join("99.headnode.BD").exists());
        assert!(!ctx.jobs_dir().join("99.headnode.JB").exists());
    }

    /// Builds a save file by hand with the pre-800 extended layout.
    fn write_514_file(
        ctx: &PersistContext,
        id: &str,
        version: u32,
    ) {
        let mut j = Job::new(id);
        j.fix.jsversion = version;
        let old = JobExtend {
            jid: "oldjid".into(),
            ash: "oldash".into(),
            credtype: 6,
            nodeidx: 99,
            taskid: 99,
        };
        let mut buf = j.fix.encode().unwrap();
        buf.extend(old.encode_514().unwrap());
        write_stream(&mut buf, &[ExternalAttr::new(job::NAME, None, "legacy", AttrFlags::SET)]).unwrap();
        fs::write(ctx.jobs_dir().join(format!("{}.JB", id)), buf).unwrap();
    }

    #[test]
    fn test_old_extended_layout_is_converted() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let store = FileStore::new(&ctx);
        write_514_file(&ctx, "13.headnode", JSVERSION_514);

        let loaded: Job = store.recover("13.headnode.JB").unwrap();
        assert_eq!(loaded.fix.jsversion, JSVERSION_514);
        assert_eq!(loaded.extend.jid, "oldjid");
        assert_eq!(loaded.extend.ash, "oldash");
        assert_eq!(loaded.extend.credtype, 6);
        assert_eq!(loaded.extend.nodeidx, 0);
        assert_eq!(loaded.extend.taskid, 0);
        assert_eq!(loaded.attrs.get_str(job::NAME), Some("legacy"));
    }

    #[test]
    fn test_too_old_version_is_discarded() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let store = FileStore::new(&ctx);
        write_514_file(&ctx, "14.headnode", 413);

        let failure = store.recover_staged::<Job>("14.headnode.JB").unwrap_err();
        assert_eq!(
            failure.error,
            PersistError::VersionTooOld {
                found: 413,
                minimum: 514
            }
        );
        assert_eq!(failure.stage, RecoveryStage::FixedLoaded);
        assert!(ctx.jobs_dir().join("14.headnode.BD").exists());
    }

    #[test]
    fn test_truncated_attributes_are_discarded() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let store = FileStore::new(&ctx);

        let mut saved = sample_job("15.headnode");
        store.save(&mut saved, UpdateType::New).unwrap();
        let path = store.live_path(&saved);
        let mut bytes = fs::read(&path).unwrap();
        bytes.truncate(bytes.len() - 4);
        fs::write(&path, bytes).unwrap();

        let failure = store.recover_staged::<Job>("15.headnode.JB").unwrap_err();
        assert!(matches!(failure.error, PersistError::Corrupt(_)));
        assert_eq!(failure.stage, RecoveryStage::ExtendedLoaded);
    }

    #[test]
    fn test_recovery_is_repeatable() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let store = FileStore::new(&ctx);

        let mut saved = sample_job("16.headnode");
        store.save(&mut saved, UpdateType::New).unwrap();

        let first: Job = store.recover("16.headnode.JB").unwrap();
        let second: Job = store.recover("16.headnode.JB").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_wrong_suffix_is_rejected() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let store = FileStore::new(&ctx);
        let failure = store.recover_staged::<Resv>("16.headnode.JB").unwrap_err();
        assert_eq!(failure.stage, RecoveryStage::Candidate);
        assert!(Resv::check_version(0).is_ok());
    }
}
