//! In-memory persisted objects: jobs, reservations and nodes.
//!
//! Fixed records are encoded little-endian with NUL padded string fields so
//! that their size never depends on their content.

mod job;
mod node;
mod resv;
mod track;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::{PersistError, Result};

pub use job::{JOB_EXTEND_514_SIZE, JOB_EXTEND_SIZE, JOB_FIX_SIZE, JSVERSION, JSVERSION_80, JSVERSION_514, Job, JobExtend, JobFix, JobState, svrflags};
pub use node::{Node, NodeType, VnodeSharing};
pub use resv::{RESV_FIX_SIZE, RSVERSION, Resv, ResvFix};
pub use track::{ArrayTracking, SubjobTrack};

pub(crate) use job::{ASH_LEN, JID_LEN};

pub const JOB_ID_LEN: usize = 80;
pub const RESV_ID_LEN: usize = 80;
pub const FILE_PREFIX_LEN: usize = 12;
pub const QUEUE_NAME_LEN: usize = 16;
pub const DESTINATION_LEN: usize = 80;

/// Kind of a persisted object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, Deserialize, Serialize)]
pub enum ObjectKind {
    #[strum(serialize = "job")]
    Job,
    #[strum(serialize = "reservation")]
    Resv,
    #[strum(serialize = "node")]
    Node,
}

/// Builds a fixed-size record.
pub(crate) struct FixedWriter {
    buf: Vec<u8>,
}

impl FixedWriter {
    pub fn with_capacity(size: usize) -> Self {
        Self {
            buf: Vec::with_capacity(size),
        }
    }

    pub fn u32(
        &mut self,
        v: u32,
    ) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i32(
        &mut self,
        v: i32,
    ) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i64(
        &mut self,
        v: i64,
    ) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u64(
        &mut self,
        v: u64,
    ) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    /// Writes `s` into a `len` byte field; one byte is kept for the NUL.
    pub fn str(
        &mut self,
        field: &str,
        s: &str,
        len: usize,
    ) -> Result<&mut Self> {
        if s.len() >= len || s.as_bytes().contains(&0) {
            return Err(PersistError::Encode(format!("{} {:?} does not fit in {} bytes", field, s, len)));
        }
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.resize(self.buf.len() + len - s.len(), 0);
        Ok(self)
    }

    pub fn zeros(
        &mut self,
        len: usize,
    ) -> &mut Self {
        self.buf.resize(self.buf.len() + len, 0);
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Reads a fixed-size record produced by [`FixedWriter`].
pub(crate) struct FixedReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FixedReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
        }
    }

    fn take(
        &mut self,
        len: usize,
    ) -> Result<&'a [u8]> {
        let end = self.pos + len;
        if end > self.buf.len() {
            return Err(PersistError::Corrupt(format!("record too short: need {} bytes, have {}", end, self.buf.len())));
        }
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn i64(&mut self) -> Result<i64> {
        let b = self.take(8)?;
        let mut word = [0u8; 8];
        word.copy_from_slice(b);
        Ok(i64::from_le_bytes(word))
    }

    pub fn str(
        &mut self,
        len: usize,
    ) -> Result<String> {
        let b = self.take(len)?;
        let end = b.iter().position(|c| *c == 0).unwrap_or(b.len());
        Ok(String::from_utf8(b[..end].to_vec())?)
    }
}
