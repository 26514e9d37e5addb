use std::{
    fs::{self, File, OpenOptions},
    io::{Seek, SeekFrom, Write},
    path::Path,
};

use tracing::{debug, error, trace, warn};

use crate::{
    PersistError, Result,
    attr::{encode_all, write_stream},
    model::{Job, Resv},
};

use super::{FileStore, FlatObject, UpdateType};

impl FileStore<'_> {
    /// Saves `obj` to its flat file.
    ///
    /// A version mismatch turns any update into [`UpdateType::FullForce`].
    /// Only full and new saves clear the modified flag.
    pub fn save<T: FlatObject>(
        &self,
        obj: &mut T,
        update: UpdateType,
    ) -> Result<()> {
        trace!("fs::save({}, {}, {})", T::KIND, obj.id(), update.as_ref());
        let mut update = update;
        if obj.is_modified() {
            obj.stamp_mtime(self.ctx.now())?;
        }
        if obj.schema_version() != T::CURRENT_VERSION {
            debug!(kind = %T::KIND, id = obj.id(), from = obj.schema_version(), to = T::CURRENT_VERSION, "structure version changed, forcing full save");
            obj.set_schema_version(T::CURRENT_VERSION);
            update = UpdateType::FullForce;
        }

        let live = self.live_path(obj);
        if update == UpdateType::Quick {
            return self.quick_write(obj, &live);
        }

        let mut parts = vec![obj.encode_fixed()?, obj.encode_extended()?];
        if let Some(tracking) = obj.encode_tracking()? {
            parts.push(tracking);
        }
        let mut stream = Vec::new();
        write_stream(&mut stream, &encode_all(obj.attrs()))?;
        parts.push(stream);

        let copy = self.copy_path(obj);
        let target = if update == UpdateType::New { &live } else { &copy };
        // a new save never replaces an existing live file
        let mut options = OpenOptions::new();
        if update == UpdateType::New {
            options.write(true).create_new(true);
        } else {
            options.write(true).create(true).truncate(true);
        }
        let mut file = options.open(target).map_err(|e| {
            error!(kind = %T::KIND, id = obj.id(), path = %target.display(), "error opening for full save: {}", e);
            PersistError::io("open", target, e)
        })?;

        if let Err(err) = write_parts(&mut file, &parts, self.ctx.max_save_tries()) {
            error!(kind = %T::KIND, id = obj.id(), path = %target.display(), "full save failed: {}", err);
            drop(file);
            let _ = fs::remove_file(target);
            return Err(PersistError::io("write", target, err));
        }
        if self.ctx.fsync() {
            file.sync_all().map_err(|e| PersistError::io("fsync", target, e))?;
        }
        drop(file);

        if update != UpdateType::New {
            fs::rename(&copy, &live).map_err(|e| {
                error!(kind = %T::KIND, id = obj.id(), "rename in save failed: {}", e);
                PersistError::io("rename", &copy, e)
            })?;
        }
        if self.ctx.fsync() {
            sync_dir(&live);
        }

        obj.clear_modified();
        debug!(kind = %T::KIND, id = obj.id(), update = update.as_ref(), "saved");
        Ok(())
    }

    fn quick_write<T: FlatObject>(
        &self,
        obj: &T,
        live: &Path,
    ) -> Result<()> {
        let fixed = obj.encode_fixed()?;
        let extended = obj.encode_extended()?;
        let mut file = OpenOptions::new().write(true).open(live).map_err(|e| {
            error!(kind = %T::KIND, id = obj.id(), path = %live.display(), "error on open: {}", e);
            PersistError::io("open", live, e)
        })?;

        let written = file.write_all(&fixed).and_then(|_| file.write_all(&extended)).and_then(|_| file.flush());
        if let Err(e) = written {
            error!(kind = %T::KIND, id = obj.id(), path = %live.display(), "error quickwrite: {}", e);
            return Err(PersistError::io("write", live, e));
        }
        Ok(())
    }

    /// Saves the reservation a job runs in, then the job.
    pub fn save_job_in_resv(
        &self,
        job: &mut Job,
        resv: &mut Resv,
        update: UpdateType,
    ) -> Result<()> {
        if job.resv_id.as_deref() != Some(resv.id()) {
            return Err(PersistError::NotFound(format!("job {} does not run in reservation {}", job.id(), resv.id())));
        }
        let resv_update = if update == UpdateType::Quick { UpdateType::Quick } else { UpdateType::Full };
        self.save(resv, resv_update)?;
        self.save(job, update)
    }
}

/// Writes every part from offset zero, starting over after a failed write.
pub(crate) fn write_parts<W: Write + Seek>(
    w: &mut W,
    parts: &[Vec<u8>],
    tries: usize,
) -> std::io::Result<()> {
    let mut last = None;
    for attempt in 1..=tries.max(1) {
        let written = parts.iter().try_for_each(|part| w.write_all(part)).and_then(|_| w.flush());
        match written {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(attempt = attempt, "save attempt failed: {}", e);
                last = Some(e);
                if let Err(e) = w.seek(SeekFrom::Start(0)) {
                    error!("error lseek: {}", e);
                }
            }
        }
    }
    Err(last.unwrap_or_else(|| std::io::Error::other("no save attempt made")))
}

fn sync_dir(path: &Path) {
    if let Some(dir) = path.parent().and_then(|parent| File::open(parent).ok()) {
        let _ = dir.sync_all();
    }
}

#[cfg(test)]
mod test {
    use std::{
        fs,
        io::{self, Cursor, Seek, SeekFrom, Write},
        sync::Arc,
    };

    use tempfile::TempDir;

    use crate::{
        PersistError,
        attr::{AttrValue, job},
        context::PersistContext,
        fs::{FileStore, UpdateType},
        model::{JOB_FIX_SIZE, JSVERSION, JSVERSION_514, Job, Resv},
        store::Store,
        utils::time::ManualClock,
    };

    use super::write_parts;

    /// Fails the first `failures` writes after writing half of the buffer.
    struct FlakyWriter {
        inner: Cursor<Vec<u8>>,
        failures: usize,
    }

    impl Write for FlakyWriter {
        fn write(
            &mut self,
            buf: &[u8],
        ) -> io::Result<usize> {
            if self.failures > 0 {
                self.failures -= 1;
                self.inner.write_all(&buf[..buf.len() / 2])?;
                return Err(io::Error::other("disk hiccup"));
            }
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for FlakyWriter {
        fn seek(
            &mut self,
            pos: SeekFrom,
        ) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    fn context(dir: &TempDir) -> PersistContext {
        let jobs = dir.path().join("jobs");
        let resvs = dir.path().join("resvs");
        fs::create_dir_all(&jobs).unwrap();
        fs::create_dir_all(&resvs).unwrap();
        PersistContext::new(jobs, resvs, Arc::new(Store::new())).with_clock(Arc::new(ManualClock::new(1_700_000_000))).with_fsync(false)
    }

    #[test]
    fn test_write_parts_retries_from_start() {
        let parts = vec![b"fixed".to_vec(), b"attrs".to_vec()];
        let mut w = FlakyWriter {
            inner: Cursor::new(Vec::new()),
            failures: 2,
        };
        write_parts(&mut w, &parts, 3).unwrap();
        assert_eq!(w.inner.into_inner(), b"fixedattrs".to_vec());
    }

    #[test]
    fn test_write_parts_gives_up() {
        let parts = vec![b"fixed".to_vec()];
        let mut w = FlakyWriter {
            inner: Cursor::new(Vec::new()),
            failures: 3,
        };
        assert!(write_parts(&mut w, &parts, 3).is_err());
    }

    #[test]
    fn test_new_then_full_save() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let store = FileStore::new(&ctx);

        let mut job = Job::new("1.headnode");
        job.attrs.set(job::NAME, AttrValue::Str("sim".into())).unwrap();
        store.save(&mut job, UpdateType::New).unwrap();
        assert!(store.live_path(&job).exists());
        assert!(!store.copy_path(&job).exists());
        assert!(!job.is_modified());
        assert_eq!(job.attrs.get_long(job::MTIME), Some(1_700_000_000));

        job.attrs.set(job::COMMENT, AttrValue::Str("running".into())).unwrap();
        store.save(&mut job, UpdateType::Full).unwrap();
        assert!(!store.copy_path(&job).exists());
        assert!(!job.is_modified());
    }

    #[test]
    fn test_new_save_keeps_existing_file() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let store = FileStore::new(&ctx);

        let mut job = Job::new("8.headnode");
        job.attrs.set(job::NAME, AttrValue::Str("first".into())).unwrap();
        store.save(&mut job, UpdateType::New).unwrap();
        let live = fs::read(store.live_path(&job)).unwrap();

        let mut again = Job::new("8.headnode");
        assert!(matches!(store.save(&mut again, UpdateType::New), Err(PersistError::IoError(_))));
        assert_eq!(fs::read(store.live_path(&job)).unwrap(), live);
    }

    #[test]
    fn test_quick_save_keeps_length() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let store = FileStore::new(&ctx);

        let mut job = Job::new("2.headnode");
        job.attrs.set(job::NAME, AttrValue::Str("quick".into())).unwrap();
        store.save(&mut job, UpdateType::New).unwrap();
        let path = store.live_path(&job);
        let before = fs::read(&path).unwrap();

        job.fix.substate = 42;
        job.fix.priority = 7;
        store.save(&mut job, UpdateType::Quick).unwrap();
        let after = fs::read(&path).unwrap();

        assert_eq!(before.len(), after.len());
        assert_ne!(before, after);
        let fixed = job.fix.encode().unwrap();
        assert_eq!(&after[..fixed.len()], fixed.as_slice());
        assert_eq!(&after[fixed.len() + 64..], &before[fixed.len() + 64..]);
    }

    #[test]
    fn test_quick_save_needs_existing_file() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let store = FileStore::new(&ctx);

        let mut job = Job::new("3.headnode");
        let err = store.save(&mut job, UpdateType::Quick).unwrap_err();
        assert!(matches!(err, PersistError::NotFound(_)));
        assert!(!store.live_path(&job).exists());
    }

    #[test]
    fn test_old_version_forces_full_save() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let store = FileStore::new(&ctx);

        let mut job = Job::new("4.headnode");
        job.fix.jsversion = JSVERSION_514;
        store.save(&mut job, UpdateType::Quick).unwrap();
        assert_eq!(job.fix.jsversion, JSVERSION);
        assert!(store.live_path(&job).exists());
    }

    #[test]
    fn test_failed_rename_keeps_live_entry() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let store = FileStore::new(&ctx);

        let mut job = Job::new("5.headnode");
        let live = store.live_path(&job);
        fs::create_dir(&live).unwrap();
        fs::write(live.join("keep"), b"occupied").unwrap();

        job.attrs.set(job::NAME, AttrValue::Str("v2".into())).unwrap();
        assert!(matches!(store.save(&mut job, UpdateType::Full), Err(PersistError::IoError(_))));
        assert!(job.is_modified());
        assert_eq!(fs::read(live.join("keep")).unwrap(), b"occupied");
        // the fully written copy is left for recovery to report
        let copy = fs::read(store.copy_path(&job)).unwrap();
        assert_eq!(&copy[..JOB_FIX_SIZE], job.fix.encode().unwrap().as_slice());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_write_keeps_live_file() {
        if !std::path::Path::new("/dev/full").exists() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let store = FileStore::new(&ctx);

        let mut job = Job::new("9.headnode");
        job.attrs.set(job::NAME, AttrValue::Str("v1".into())).unwrap();
        store.save(&mut job, UpdateType::New).unwrap();
        let live = fs::read(store.live_path(&job)).unwrap();

        // every write to the copy file fails with ENOSPC
        std::os::unix::fs::symlink("/dev/full", store.copy_path(&job)).unwrap();
        job.attrs.set(job::NAME, AttrValue::Str("v2".into())).unwrap();
        assert!(matches!(store.save(&mut job, UpdateType::Full), Err(PersistError::IoError(_))));
        assert!(fs::symlink_metadata(store.copy_path(&job)).is_err());
        assert_eq!(fs::read(store.live_path(&job)).unwrap(), live);

        let loaded: Job = store.recover("9.headnode.JB").unwrap();
        assert_eq!(loaded.attrs.get_str(job::NAME), Some("v1"));
    }

    #[test]
    fn test_job_in_resv_saves_resv_first() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let store = FileStore::new(&ctx);

        let mut resv = Resv::new("R1.headnode");
        let mut job = Job::new("6.headnode");
        assert!(store.save_job_in_resv(&mut job, &mut resv, UpdateType::New).is_err());

        job.resv_id = Some("R1.headnode".into());
        store.save_job_in_resv(&mut job, &mut resv, UpdateType::New).unwrap();
        assert!(store.live_path(&resv).exists());
        assert!(store.live_path(&job).exists());
    }

    #[test]
    fn test_purge_removes_all_files() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let store = FileStore::new(&ctx);

        let mut job = Job::new("7.headnode");
        store.save(&mut job, UpdateType::New).unwrap();
        fs::write(store.copy_path(&job), b"x").unwrap();
        store.purge(&job).unwrap();
        assert!(!store.live_path(&job).exists());
        assert!(!store.copy_path(&job).exists());
        store.purge(&job).unwrap();
    }
}
