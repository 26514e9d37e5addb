//! Mapping between in-memory objects and database rows.
//!
//! Attributes cross the boundary as a [`DbAttrList`] and are flattened to
//! `name.resource` / `flags.value` pairs only when the row is built.

mod job;
mod node;
mod resv;

use std::sync::Arc;

use tracing::{debug, error, trace, warn};

use crate::{
    PersistError, Result,
    attr::{AttributeSet, ExternalAttr, UnknownPolicy, decode_list},
    context::PersistContext,
    model::ObjectKind,
    store::{DbCollection, DbCollectionIden, DbRecord, SaveMode, Store, TxnEnd, data::DbAttrList},
};

/// An object with a database row representation.
pub trait RecordMapper: Sized {
    type Record: DbRecord + DbCollectionIden + Send + Sync + 'static;

    const KIND: ObjectKind;
    const UNKNOWN_POLICY: UnknownPolicy = UnknownPolicy::Bucket;
    /// A save that fails both update and insert halts the store.
    const FATAL_SAVE: bool = false;

    fn id(&self) -> &str;

    fn to_record(
        &self,
        ctx: &PersistContext,
    ) -> Result<Self::Record>;

    fn from_record(record: Self::Record) -> Result<Self>;

    fn clear_modified(&mut self);

    /// Rewrites a stale structure version to the current one. Returns the
    /// version it replaced.
    fn upgrade_version(&mut self) -> Option<u32> {
        None
    }
}

/// Decodes flattened pairs into `attrs`.
pub(crate) fn decode_pairs(
    attrs: &mut AttributeSet,
    pairs: &[String],
    policy: UnknownPolicy,
) -> Result<()> {
    let list = DbAttrList::from_pairs(pairs)?;
    decode_list(attrs, list.into_external(), policy)
}

pub(crate) fn encode_pairs(list: Vec<ExternalAttr>) -> Vec<String> {
    list.into_iter().collect::<DbAttrList>().to_pairs()
}

/// Database save and recover entry points bound to one persistence context.
pub struct DbMapper<'a> {
    ctx: &'a PersistContext,
}

impl<'a> DbMapper<'a> {
    pub fn new(ctx: &'a PersistContext) -> Self {
        Self {
            ctx,
        }
    }

    fn store(&self) -> &Store {
        self.ctx.store()
    }

    fn collection<T: RecordMapper>(&self) -> Result<Arc<dyn DbCollection<Item = T::Record>>> {
        self.store().collection::<T::Record>()
    }

    /// Updates the row of `obj`, inserting it when no row matches.
    ///
    /// `quick` updates leave the stored attributes alone. A stale structure
    /// version is rewritten first and turns the save into a full one. For
    /// node rows a failed insert sets the halt latch and returns
    /// [`PersistError::Fatal`].
    pub fn save<T: RecordMapper>(
        &self,
        obj: &mut T,
        quick: bool,
    ) -> Result<()> {
        let kind = T::KIND.as_ref();
        trace!("mapper::save({}, {})", kind, obj.id());
        let mut quick = quick;
        if let Some(from) = obj.upgrade_version() {
            debug!(kind = kind, id = obj.id(), from = from, "structure version changed, forcing full save");
            quick = false;
        }
        let record = obj.to_record(self.ctx)?;
        let collection = self.collection::<T>()?;
        let update = if quick { SaveMode::UpdateQuick } else { SaveMode::UpdateFull };

        let updated = match collection.save(&record, update) {
            Ok(updated) => updated,
            Err(e) => {
                debug!(kind = kind, id = obj.id(), "update failed, trying insert: {}", e);
                false
            }
        };
        if !updated {
            if let Err(e) = collection.save(&record, SaveMode::InsertNew) {
                let msg = format!("{}_save failed {}", kind, e);
                error!(kind = kind, id = obj.id(), "{}", msg);
                if T::FATAL_SAVE {
                    self.ctx.halt().stop(&msg);
                    return Err(PersistError::Fatal(msg));
                }
                return Err(e);
            }
        }

        if !quick {
            obj.clear_modified();
        }
        debug!(kind = kind, id = obj.id(), update = update.as_ref(), inserted = !updated, "saved to database");
        Ok(())
    }

    /// Loads the row keyed by `id` inside a transaction.
    pub fn recover<T: RecordMapper>(
        &self,
        id: &str,
    ) -> Result<T> {
        let kind = T::KIND.as_ref();
        trace!("mapper::recover({}, {})", kind, id);
        self.store().begin()?;
        match self.load::<T>(id) {
            Ok(obj) => {
                self.store().end(TxnEnd::Commit)?;
                Ok(obj)
            }
            Err(e) => {
                warn!(kind = kind, id = id, "error on recovering {}: {}", kind, e);
                if let Err(rollback) = self.store().end(TxnEnd::Rollback) {
                    error!(kind = kind, id = id, "rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }

    fn load<T: RecordMapper>(
        &self,
        id: &str,
    ) -> Result<T> {
        let record = self.collection::<T>()?.find(id)?.ok_or_else(|| PersistError::NotFound(format!("{} {} not in database", T::KIND, id)))?;
        let mut obj = T::from_record(record)?;
        if obj.id() != id {
            return Err(PersistError::Ghost(format!("{} row {} holds id {}", T::KIND, id, obj.id())));
        }
        obj.clear_modified();
        Ok(obj)
    }

    /// Removes the row keyed by `id`. A missing row is not an error.
    pub fn delete<T: RecordMapper>(
        &self,
        id: &str,
    ) -> Result<()> {
        trace!("mapper::delete({}, {})", T::KIND, id);
        let deleted = self.collection::<T>()?.delete(id)?;
        debug!(kind = T::KIND.as_ref(), id = id, deleted = deleted, "deleted from database");
        Ok(())
    }

    /// Stored ids of `T` in recovery order.
    pub fn ids<T: RecordMapper>(&self) -> Result<Vec<String>> {
        self.collection::<T>()?.ids()
    }
}

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use crate::{
        PersistError,
        attr::{AttrValue, job, resv},
        context::mem_context,
        model::{ArrayTracking, JSVERSION, JSVERSION_514, Job, JobState, Resv, svrflags},
        store::SaveMode,
    };

    use super::DbMapper;

    fn sample_job(id: &str) -> Job {
        let mut j = Job::new(id);
        j.fix.queue = "workq".into();
        j.fix.state = JobState::Running;
        j.fix.stime = 1_700_000_100;
        j.extend.jid = "4711".into();
        j.attrs.set(job::NAME, AttrValue::Str("sim.sh".into())).unwrap();
        j.attrs.set_resource(job::RESOURCE_LIST, "ncpus", "16").unwrap();
        j.attrs.set_resource(job::RESOURCE_LIST, "mem", "4gb").unwrap();
        j
    }

    #[test]
    fn test_job_roundtrip() {
        let dir = TempDir::new().unwrap();
        let (ctx, _mem) = mem_context(dir.path());
        let mapper = DbMapper::new(&ctx);

        let mut saved = sample_job("12.headnode");
        saved.fix.svrflags |= svrflags::ARRAY_JOB;
        let mut tracking = ArrayTracking::with_subjobs(3);
        tracking.subjobs[1].exit_status = 2;
        saved.tracking = Some(tracking);
        saved.resv_id = Some("R5.headnode".into());
        mapper.save(&mut saved, false).unwrap();

        let loaded: Job = mapper.recover("12.headnode").unwrap();
        assert_eq!(loaded.fix, saved.fix);
        assert_eq!(loaded.extend, saved.extend);
        assert_eq!(loaded.tracking, saved.tracking);
        assert_eq!(loaded.resv_id.as_deref(), Some("R5.headnode"));
        assert_eq!(loaded.attrs.get_str(job::NAME), Some("sim.sh"));
        assert_eq!(loaded.attrs.get(job::RESOURCE_LIST), saved.attrs.get(job::RESOURCE_LIST));
    }

    #[test]
    fn test_quick_keeps_attributes() {
        let dir = TempDir::new().unwrap();
        let (ctx, mem) = mem_context(dir.path());
        let mapper = DbMapper::new(&ctx);

        let mut j = sample_job("13.headnode");
        mapper.save(&mut j, false).unwrap();
        j.fix.state = JobState::Exiting;
        j.attrs.set(job::NAME, AttrValue::Str("renamed".into())).unwrap();
        mapper.save(&mut j, true).unwrap();
        assert!(j.is_modified());

        let row = mem.jobs().find("13.headnode").unwrap().unwrap();
        assert_eq!(row.state, JobState::Exiting as i32);
        let loaded: Job = mapper.recover("13.headnode").unwrap();
        assert_eq!(loaded.attrs.get_str(job::NAME), Some("sim.sh"));
    }

    #[test]
    fn test_quick_save_inserts_missing_row() {
        let dir = TempDir::new().unwrap();
        let (ctx, mem) = mem_context(dir.path());
        let mapper = DbMapper::new(&ctx);

        let mut j = sample_job("14.headnode");
        mapper.save(&mut j, true).unwrap();
        assert_eq!(mem.jobs().ids().unwrap(), vec!["14.headnode"]);
    }

    #[test]
    fn test_job_save_failure_not_fatal() {
        let dir = TempDir::new().unwrap();
        let (ctx, mem) = mem_context(dir.path());
        let mapper = DbMapper::new(&ctx);
        mem.set_failing(true);

        let mut j = sample_job("15.headnode");
        assert!(matches!(mapper.save(&mut j, false), Err(PersistError::Store(_))));
        assert!(!ctx.is_halted());
        assert!(j.is_modified());
    }

    #[test]
    fn test_bad_row_rolls_back() {
        let dir = TempDir::new().unwrap();
        let (ctx, mem) = mem_context(dir.path());
        let mapper = DbMapper::new(&ctx);

        let mut j = sample_job("16.headnode");
        mapper.save(&mut j, false).unwrap();
        let mut row = mem.jobs().find("16.headnode").unwrap().unwrap();
        row.attributes.push("comment.".into());
        mem.jobs().save(&row, SaveMode::UpdateFull).unwrap();

        assert!(matches!(mapper.recover::<Job>("16.headnode"), Err(PersistError::Corrupt(_))));
        // the transaction was closed, so the next load can open its own
        row.attributes.pop();
        mem.jobs().save(&row, SaveMode::UpdateFull).unwrap();
        assert!(mapper.recover::<Job>("16.headnode").is_ok());
    }

    #[test]
    fn test_old_job_version_rejected() {
        let dir = TempDir::new().unwrap();
        let (ctx, mem) = mem_context(dir.path());
        let mapper = DbMapper::new(&ctx);

        let mut j = sample_job("17.headnode");
        mapper.save(&mut j, false).unwrap();
        let mut row = mem.jobs().find("17.headnode").unwrap().unwrap();
        row.jsversion = 400;
        mem.jobs().save(&row, SaveMode::UpdateFull).unwrap();
        assert!(matches!(mapper.recover::<Job>("17.headnode"), Err(PersistError::VersionTooOld { found: 400, .. })));
    }

    #[test]
    fn test_old_version_saved_in_current_layout() {
        let dir = TempDir::new().unwrap();
        let (ctx, mem) = mem_context(dir.path());
        let mapper = DbMapper::new(&ctx);

        let mut j = sample_job("18.headnode");
        j.fix.jsversion = JSVERSION_514;
        j.extend.nodeidx = 5;
        j.extend.taskid = 9;
        mapper.save(&mut j, true).unwrap();
        assert_eq!(j.fix.jsversion, JSVERSION);
        assert!(!j.is_modified());

        let row = mem.jobs().find("18.headnode").unwrap().unwrap();
        assert_eq!(row.jsversion, JSVERSION as i32);
        let loaded: Job = mapper.recover("18.headnode").unwrap();
        assert_eq!(loaded.extend, j.extend);
        assert_eq!(loaded.extend.nodeidx, 5);
        assert_eq!(loaded.extend.taskid, 9);
        assert_eq!(loaded.attrs.get_str(job::NAME), Some("sim.sh"));
    }

    #[test]
    fn test_resv_roundtrip_and_delete() {
        let dir = TempDir::new().unwrap();
        let (ctx, mem) = mem_context(dir.path());
        let mapper = DbMapper::new(&ctx);

        let mut r = Resv::new("R5.headnode");
        r.fix.start = 1_700_003_600;
        r.fix.end = 1_700_007_200;
        r.fix.duration = 3600;
        r.attrs.set(resv::NAME, AttrValue::Str("maint".into())).unwrap();
        mapper.save(&mut r, false).unwrap();

        let loaded: Resv = mapper.recover("R5.headnode").unwrap();
        assert_eq!(loaded.fix, r.fix);
        assert_eq!(loaded.attrs.get_str(resv::NAME), Some("maint"));

        mapper.delete::<Resv>("R5.headnode").unwrap();
        assert!(mem.resvs().ids().unwrap().is_empty());
        assert!(mapper.delete::<Resv>("R5.headnode").is_ok());
    }
}
