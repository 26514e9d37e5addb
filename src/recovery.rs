//! Startup recovery passes over the save directories and the database.
//!
//! Every candidate ends either recovered or discarded. A pass never stops at
//! a bad candidate; the failure is recorded in the [`RecoveryReport`] and the
//! next candidate is tried.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Serialize;
use strum::{AsRefStr, Display};
use tracing::{debug, info, trace, warn};

use crate::{
    PersistError, Result,
    context::PersistContext,
    fs::{FileStore, FlatObject},
    mapper::{DbMapper, RecordMapper},
    model::{Job, Node, ObjectKind, Resv},
};

/// Position of one candidate in its recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStage {
    /// Enumerated, not yet touched.
    Candidate,
    /// Renamed to the processing suffix, or read inside a transaction.
    Processing,
    FixedLoaded,
    ExtendedLoaded,
    AttributesLoaded,
    Recovered,
    Discarded,
}

/// A candidate that did not recover.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Discarded {
    /// File name or database key.
    pub candidate: String,
    /// Last stage reached before the failure.
    pub stage: RecoveryStage,
    pub reason: String,
}

#[derive(Debug)]
pub struct RecoveryReport<T> {
    pub kind: ObjectKind,
    pub recovered: Vec<T>,
    pub discarded: Vec<Discarded>,
    /// Files left under the processing suffix by an interrupted recovery.
    pub stuck: Vec<PathBuf>,
    /// Copy files left by an interrupted full save.
    pub stale_copies: Vec<PathBuf>,
}

impl<T> RecoveryReport<T> {
    fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            recovered: Vec::new(),
            discarded: Vec::new(),
            stuck: Vec::new(),
            stale_copies: Vec::new(),
        }
    }

    fn discard(
        &mut self,
        candidate: &str,
        stage: RecoveryStage,
        error: &PersistError,
    ) {
        warn!(kind = %self.kind, candidate = candidate, stage = stage.as_ref(), "{} {}: {}", self.kind, RecoveryStage::Discarded, error);
        self.discarded.push(Discarded {
            candidate: candidate.to_string(),
            stage,
            reason: error.to_string(),
        });
    }

    pub fn summary(&self) -> RecoverySummary {
        let names = |paths: &[PathBuf]| paths.iter().map(|p| p.display().to_string()).collect();
        RecoverySummary {
            kind: self.kind,
            recovered: self.recovered.len(),
            discarded: self.discarded.clone(),
            stuck: names(&self.stuck),
            stale_copies: names(&self.stale_copies),
        }
    }
}

/// Serializable outline of a [`RecoveryReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoverySummary {
    pub kind: ObjectKind,
    pub recovered: usize,
    pub discarded: Vec<Discarded>,
    pub stuck: Vec<String>,
    pub stale_copies: Vec<String>,
}

pub struct Recovery<'a> {
    ctx: &'a PersistContext,
}

impl<'a> Recovery<'a> {
    pub fn new(ctx: &'a PersistContext) -> Self {
        Self {
            ctx,
        }
    }

    pub fn jobs_from_files(&self) -> Result<RecoveryReport<Job>> {
        self.scan_dir::<Job>()
    }

    pub fn resvs_from_files(&self) -> Result<RecoveryReport<Resv>> {
        self.scan_dir::<Resv>()
    }

    pub fn jobs_from_db(&self) -> Result<RecoveryReport<Job>> {
        self.scan_db::<Job>()
    }

    pub fn resvs_from_db(&self) -> Result<RecoveryReport<Resv>> {
        self.scan_db::<Resv>()
    }

    /// Nodes in stored index order.
    pub fn nodes(&self) -> Result<RecoveryReport<Node>> {
        self.scan_db::<Node>()
    }

    /// Recovers every live save file in the directory of `T`.
    ///
    /// Only listing the directory can fail the pass.
    pub fn scan_dir<T: FlatObject>(&self) -> Result<RecoveryReport<T>> {
        let dir = T::dir(self.ctx);
        trace!("recovery::scan_dir({}, {})", T::KIND, dir.display());
        let files = list_files(dir)?;
        let store = FileStore::new(self.ctx);
        let mut report = RecoveryReport::new(T::KIND);

        for name in files {
            if name.ends_with(T::BAD_SUFFIX) {
                warn!(kind = %T::KIND, file = %name, "file left from an interrupted recovery, not retried");
                report.stuck.push(dir.join(&name));
            } else if name.ends_with(T::COPY_SUFFIX) {
                warn!(kind = %T::KIND, file = %name, "copy file left from an interrupted save");
                report.stale_copies.push(dir.join(&name));
            } else if name.ends_with(T::FILE_SUFFIX) {
                match store.recover_staged::<T>(&name) {
                    Ok(obj) => {
                        debug!(kind = %T::KIND, id = obj.id(), stage = RecoveryStage::Recovered.as_ref(), "recovered from {}", name);
                        report.recovered.push(obj);
                    }
                    Err(failure) => report.discard(&name, failure.stage, &failure.error),
                }
            } else {
                debug!(kind = %T::KIND, file = %name, "skipping unrelated file");
            }
        }
        info!(kind = %T::KIND, recovered = report.recovered.len(), discarded = report.discarded.len(), stuck = report.stuck.len(), "file recovery pass done");
        Ok(report)
    }

    /// Recovers every stored row of `T`, each inside its own transaction.
    pub fn scan_db<T: RecordMapper>(&self) -> Result<RecoveryReport<T>> {
        trace!("recovery::scan_db({})", T::KIND);
        let mapper = DbMapper::new(self.ctx);
        let mut report = RecoveryReport::new(T::KIND);
        for id in mapper.ids::<T>()? {
            match mapper.recover::<T>(&id) {
                Ok(obj) => {
                    debug!(kind = %T::KIND, id = %id, stage = RecoveryStage::Recovered.as_ref(), "recovered from database");
                    report.recovered.push(obj);
                }
                Err(e) => report.discard(&id, RecoveryStage::Processing, &e),
            }
        }
        info!(kind = %T::KIND, recovered = report.recovered.len(), discarded = report.discarded.len(), "database recovery pass done");
        Ok(report)
    }
}

/// Regular file names in `dir`, sorted.
fn list_files(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| PersistError::io("read_dir", dir, e))? {
        let entry = entry.map_err(|e| PersistError::io("read_dir", dir, e))?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => warn!(dir = %dir.display(), "skipping non-utf8 file name {:?}", raw),
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod test {
    use std::fs;

    use tempfile::TempDir;

    use crate::{
        attr::{AttrValue, job, node},
        context::mem_context,
        fs::{FileStore, UpdateType},
        mapper::DbMapper,
        model::{Job, Node, Resv},
        store::SaveMode,
    };

    use super::{Recovery, RecoveryStage};

    fn sample_job(id: &str) -> Job {
        let mut j = Job::new(id);
        j.fix.queue = "workq".into();
        j.attrs.set(job::NAME, AttrValue::Str(format!("job-{}", id))).unwrap();
        j
    }

    #[test]
    fn test_scan_recovers_and_discards() {
        let dir = TempDir::new().unwrap();
        let (ctx, _mem) = mem_context(dir.path());
        let store = FileStore::new(&ctx);
        for id in ["1.headnode", "2.headnode"] {
            store.save(&mut sample_job(id), UpdateType::New).unwrap();
        }
        // a ghost: a save file whose record belongs to another job
        fs::copy(ctx.jobs_dir().join("1.headnode.JB"), ctx.jobs_dir().join("9.headnode.JB")).unwrap();
        fs::write(ctx.jobs_dir().join("README"), "not a job").unwrap();

        let report = Recovery::new(&ctx).jobs_from_files().unwrap();
        let mut ids: Vec<_> = report.recovered.iter().map(|j| j.id().to_string()).collect();
        ids.sort();
        assert_eq!(ids, vec!["1.headnode", "2.headnode"]);
        assert_eq!(report.discarded.len(), 1);
        assert_eq!(report.discarded[0].candidate, "9.headnode.JB");
        assert_eq!(report.discarded[0].stage, RecoveryStage::Processing);
        assert!(ctx.jobs_dir().join("9.headnode.BD").exists());
        assert!(ctx.jobs_dir().join("1.headnode.JB").exists());
    }

    #[test]
    fn test_second_pass_is_stable() {
        let dir = TempDir::new().unwrap();
        let (ctx, _mem) = mem_context(dir.path());
        let store = FileStore::new(&ctx);
        store.save(&mut sample_job("3.headnode"), UpdateType::New).unwrap();
        fs::write(ctx.jobs_dir().join("4.headnode.JB"), b"short").unwrap();

        let recovery = Recovery::new(&ctx);
        let first = recovery.jobs_from_files().unwrap();
        assert_eq!(first.recovered.len(), 1);
        assert_eq!(first.discarded.len(), 1);
        assert!(first.stuck.is_empty());

        let second = recovery.jobs_from_files().unwrap();
        assert_eq!(second.recovered, first.recovered);
        assert!(second.discarded.is_empty());
        assert_eq!(second.stuck, vec![ctx.jobs_dir().join("4.headnode.BD")]);
    }

    #[test]
    fn test_stale_copy_reported() {
        let dir = TempDir::new().unwrap();
        let (ctx, _mem) = mem_context(dir.path());
        let store = FileStore::new(&ctx);
        let mut r = Resv::new("R7.headnode");
        store.save(&mut r, UpdateType::New).unwrap();
        fs::write(ctx.resvs_dir().join("R8.headnode.RC"), b"partial").unwrap();

        let report = Recovery::new(&ctx).resvs_from_files().unwrap();
        assert_eq!(report.recovered.len(), 1);
        assert_eq!(report.stale_copies, vec![ctx.resvs_dir().join("R8.headnode.RC")]);
        let summary = report.summary();
        assert_eq!(summary.recovered, 1);
        assert_eq!(summary.stale_copies.len(), 1);
    }

    #[test]
    fn test_missing_dir_fails_pass() {
        let dir = TempDir::new().unwrap();
        let (ctx, _mem) = mem_context(dir.path());
        fs::remove_dir(ctx.jobs_dir()).unwrap();
        assert!(Recovery::new(&ctx).jobs_from_files().is_err());
    }

    #[test]
    fn test_db_pass() {
        let dir = TempDir::new().unwrap();
        let (ctx, mem) = mem_context(dir.path());
        let mapper = DbMapper::new(&ctx);
        for (name, index) in [("cn002", 2), ("cn001", 1)] {
            let mut n = Node::new(name);
            n.index = index;
            n.attrs.set(node::COMMENT, AttrValue::Str(name.into())).unwrap();
            mapper.save(&mut n, false).unwrap();
        }
        let mut bad = mem.nodes().find("cn002").unwrap().unwrap();
        bad.name = "cn003".into();
        bad.index = 3;
        bad.ntype = 42;
        mem.nodes().save(&bad, SaveMode::InsertNew).unwrap();
        mapper.save(&mut sample_job("5.headnode"), false).unwrap();

        let recovery = Recovery::new(&ctx);
        let nodes = recovery.nodes().unwrap();
        let names: Vec<_> = nodes.recovered.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["cn001", "cn002"]);
        assert_eq!(nodes.discarded.len(), 1);
        assert_eq!(nodes.discarded[0].candidate, "cn003");

        let jobs = recovery.jobs_from_db().unwrap();
        assert_eq!(jobs.recovered.len(), 1);
        assert!(recovery.resvs_from_db().unwrap().recovered.is_empty());
    }
}
