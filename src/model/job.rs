use strum::{AsRefStr, FromRepr};

use crate::{
    PersistError, Result,
    attr::{AttributeSet, JOB_ATTR_DEFS},
};

use super::{ArrayTracking, DESTINATION_LEN, FILE_PREFIX_LEN, FixedReader, FixedWriter, JOB_ID_LEN, QUEUE_NAME_LEN};

/// Oldest job structure version that can still be recovered.
pub const JSVERSION_514: u32 = 514;
/// Version that introduced the current extended area.
pub const JSVERSION_80: u32 = 800;
/// Version written by this build.
pub const JSVERSION: u32 = JSVERSION_80;

/// Six 32-bit words, two timestamps, four strings and a reserved word.
pub const JOB_FIX_SIZE: usize = 6 * 4 + 2 * 8 + JOB_ID_LEN + FILE_PREFIX_LEN + QUEUE_NAME_LEN + DESTINATION_LEN + 4;
/// Size of the current extended area, reserved bytes included.
pub const JOB_EXTEND_SIZE: usize = 64;
/// Size of the extended area written by versions before [`JSVERSION_80`].
pub const JOB_EXTEND_514_SIZE: usize = 20;

pub(crate) const JID_LEN: usize = 8;
pub(crate) const ASH_LEN: usize = 8;

/// Server flag bits kept in the fixed record.
pub mod svrflags {
    pub const HERE: u32 = 0x01;
    pub const HASRUN: u32 = 0x04;
    pub const ARRAY_JOB: u32 = 0x800;
    pub const SUBJOB: u32 = 0x1000;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, AsRefStr, FromRepr)]
#[repr(i32)]
pub enum JobState {
    Transit = 0,
    #[default]
    Queued = 1,
    Held = 2,
    Waiting = 3,
    Running = 4,
    Exiting = 5,
    Expired = 6,
    Begun = 7,
    Moved = 8,
    Finished = 9,
}

/// Fixed part of a job record; rewritten in place by quick saves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFix {
    pub jsversion: u32,
    pub state: JobState,
    pub substate: i32,
    pub svrflags: u32,
    pub priority: i32,
    pub rank: i32,
    pub stime: i64,
    pub endtime: i64,
    pub jobid: String,
    /// Base of the file names; the job id is used when empty.
    pub fileprefix: String,
    pub queue: String,
    pub destin: String,
}

impl JobFix {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut w = FixedWriter::with_capacity(JOB_FIX_SIZE);
        w.u32(self.jsversion).i32(self.state as i32).i32(self.substate).u32(self.svrflags).i32(self.priority).i32(self.rank);
        w.i64(self.stime).i64(self.endtime);
        w.str("job id", &self.jobid, JOB_ID_LEN)?;
        w.str("file prefix", &self.fileprefix, FILE_PREFIX_LEN)?;
        w.str("queue", &self.queue, QUEUE_NAME_LEN)?;
        w.str("destination", &self.destin, DESTINATION_LEN)?;
        w.zeros(4);
        Ok(w.finish())
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = FixedReader::new(buf);
        let jsversion = r.u32()?;
        let state = r.i32()?;
        let state = JobState::from_repr(state).ok_or_else(|| PersistError::Corrupt(format!("bad job state {}", state)))?;
        Ok(Self {
            jsversion,
            state,
            substate: r.i32()?,
            svrflags: r.u32()?,
            priority: r.i32()?,
            rank: r.i32()?,
            stime: r.i64()?,
            endtime: r.i64()?,
            jobid: r.str(JOB_ID_LEN)?,
            fileprefix: r.str(FILE_PREFIX_LEN)?,
            queue: r.str(QUEUE_NAME_LEN)?,
            destin: r.str(DESTINATION_LEN)?,
        })
    }
}

/// Extended area of a job record, always held in the current layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobExtend {
    pub jid: String,
    pub ash: String,
    pub credtype: i32,
    /// Added in [`JSVERSION_80`].
    pub nodeidx: i32,
    /// Added in [`JSVERSION_80`].
    pub taskid: i32,
}

impl JobExtend {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut w = FixedWriter::with_capacity(JOB_EXTEND_SIZE);
        w.str("jid", &self.jid, JID_LEN)?;
        w.str("ash", &self.ash, ASH_LEN)?;
        w.i32(self.credtype).i32(self.nodeidx).i32(self.taskid);
        w.zeros(JOB_EXTEND_SIZE - JID_LEN - ASH_LEN - 12);
        Ok(w.finish())
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = FixedReader::new(buf);
        Ok(Self {
            jid: r.str(JID_LEN)?,
            ash: r.str(ASH_LEN)?,
            credtype: r.i32()?,
            nodeidx: r.i32()?,
            taskid: r.i32()?,
        })
    }

    /// Encodes the pre-[`JSVERSION_80`] layout: `jid ash credtype`.
    pub fn encode_514(&self) -> Result<Vec<u8>> {
        let mut w = FixedWriter::with_capacity(JOB_EXTEND_514_SIZE);
        w.str("jid", &self.jid, JID_LEN)?;
        w.str("ash", &self.ash, ASH_LEN)?;
        w.i32(self.credtype);
        Ok(w.finish())
    }
}

/// A batch job as persisted by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub fix: JobFix,
    pub extend: JobExtend,
    /// Present only for array jobs.
    pub tracking: Option<ArrayTracking>,
    pub attrs: AttributeSet,
    /// Reservation the job runs in, saved before the job itself.
    pub resv_id: Option<String>,
    modified: bool,
}

impl Job {
    /// A zeroed job with default attributes, as the allocator hands it out.
    pub fn alloc() -> Self {
        Self {
            fix: JobFix {
                jsversion: JSVERSION,
                ..JobFix::default()
            },
            extend: JobExtend::default(),
            tracking: None,
            attrs: AttributeSet::new(JOB_ATTR_DEFS),
            resv_id: None,
            modified: false,
        }
    }

    pub fn new(jobid: impl Into<String>) -> Self {
        let mut job = Self::alloc();
        job.fix.jobid = jobid.into();
        job
    }

    pub fn id(&self) -> &str {
        &self.fix.jobid
    }

    pub fn file_prefix(&self) -> &str {
        if self.fix.fileprefix.is_empty() { &self.fix.jobid } else { &self.fix.fileprefix }
    }

    pub fn is_array_job(&self) -> bool {
        self.fix.svrflags & svrflags::ARRAY_JOB != 0
    }

    pub fn mark_modified(&mut self) {
        self.modified = true;
    }

    pub fn is_modified(&self) -> bool {
        self.modified || self.attrs.is_modified()
    }

    pub fn clear_modified(&mut self) {
        self.modified = false;
        self.attrs.clear_modified();
    }
}
