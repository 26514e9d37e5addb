use crate::{
    PersistError, Result,
    attr::encode_all,
    context::PersistContext,
    fs::FlatObject,
    model::{ArrayTracking, Job, JobFix, JobState, ObjectKind},
    store::data::DbJob,
};

use super::{RecordMapper, decode_pairs, encode_pairs};

impl RecordMapper for Job {
    type Record = DbJob;

    const KIND: ObjectKind = ObjectKind::Job;

    fn id(&self) -> &str {
        Job::id(self)
    }

    fn to_record(
        &self,
        _ctx: &PersistContext,
    ) -> Result<DbJob> {
        Ok(DbJob {
            jobid: self.fix.jobid.clone(),
            jsversion: self.fix.jsversion as i32,
            state: self.fix.state as i32,
            substate: self.fix.substate,
            svrflags: self.fix.svrflags as i32,
            priority: self.fix.priority,
            rank: self.fix.rank,
            stime: self.fix.stime,
            endtime: self.fix.endtime,
            queue: self.fix.queue.clone(),
            destin: self.fix.destin.clone(),
            fileprefix: self.fix.fileprefix.clone(),
            resv_id: self.resv_id.clone(),
            extend: self.encode_extended()?,
            tracking: self.encode_tracking()?,
            attributes: encode_pairs(encode_all(&self.attrs)),
        })
    }

    fn from_record(record: DbJob) -> Result<Self> {
        let mut job = Job::alloc();
        let state = JobState::from_repr(record.state).ok_or_else(|| PersistError::Corrupt(format!("job {}: bad state {}", record.jobid, record.state)))?;
        job.fix = JobFix {
            jsversion: record.jsversion as u32,
            state,
            substate: record.substate,
            svrflags: record.svrflags as u32,
            priority: record.priority,
            rank: record.rank,
            stime: record.stime,
            endtime: record.endtime,
            jobid: record.jobid,
            fileprefix: record.fileprefix,
            queue: record.queue,
            destin: record.destin,
        };
        job.resv_id = record.resv_id;

        let version = job.fix.jsversion;
        <Job as FlatObject>::check_version(version)?;
        job.read_extended(version, &mut record.extend.as_slice())?;
        if job.is_array_job() {
            let block = record.tracking.ok_or_else(|| PersistError::Corrupt(format!("array job {} has no tracking block", job.id())))?;
            job.tracking = Some(ArrayTracking::decode(&block)?);
        }
        decode_pairs(&mut job.attrs, &record.attributes, <Job as RecordMapper>::UNKNOWN_POLICY)?;
        Ok(job)
    }

    fn clear_modified(&mut self) {
        Job::clear_modified(self)
    }

    fn upgrade_version(&mut self) -> Option<u32> {
        let version = self.schema_version();
        if version == <Job as FlatObject>::CURRENT_VERSION {
            return None;
        }
        self.set_schema_version(<Job as FlatObject>::CURRENT_VERSION);
        Some(version)
    }
}
