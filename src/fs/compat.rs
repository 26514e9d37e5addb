//! Decoding of job extended areas written by older server versions.

use std::io::Read;

use crate::{
    PersistError, Result,
    model::{ASH_LEN, FixedReader, JID_LEN, JOB_EXTEND_514_SIZE, JOB_EXTEND_SIZE, JSVERSION_80, JSVERSION_514, JobExtend},
};

/// On-disk shape of the extended area, selected by the fixed record version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendLayout {
    /// `jid ash credtype`, written by versions 514 up to 800.
    V514,
    /// Current layout.
    V800,
}

impl ExtendLayout {
    pub fn for_version(version: u32) -> Result<Self> {
        if version < JSVERSION_514 {
            Err(PersistError::VersionTooOld {
                found: version,
                minimum: JSVERSION_514,
            })
        } else if version < JSVERSION_80 {
            Ok(ExtendLayout::V514)
        } else {
            Ok(ExtendLayout::V800)
        }
    }

    pub fn size(self) -> usize {
        match self {
            ExtendLayout::V514 => JOB_EXTEND_514_SIZE,
            ExtendLayout::V800 => JOB_EXTEND_SIZE,
        }
    }
}

/// An extended area as read from disk, before it is folded into the
/// current in-memory shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtendedRecord {
    V514 {
        jid: String,
        ash: String,
        credtype: i32,
    },
    V800(JobExtend),
}

impl ExtendedRecord {
    /// Reads exactly `layout.size()` bytes. Only a short read fails.
    pub fn read<R: Read>(
        layout: ExtendLayout,
        r: &mut R,
    ) -> Result<Self> {
        let mut buf = vec![0u8; layout.size()];
        r.read_exact(&mut buf).map_err(|e| PersistError::Corrupt(format!("error reading extended area: {}", e)))?;

        match layout {
            ExtendLayout::V514 => {
                let mut r = FixedReader::new(&buf);
                Ok(ExtendedRecord::V514 {
                    jid: r.str(JID_LEN)?,
                    ash: r.str(ASH_LEN)?,
                    credtype: r.i32()?,
                })
            }
            ExtendLayout::V800 => JobExtend::decode(&buf).map(ExtendedRecord::V800),
        }
    }

    /// Copies the recognised fields into `target`. Fields the old layout
    /// lacks keep whatever the allocator put there.
    pub fn apply(
        self,
        target: &mut JobExtend,
    ) {
        match self {
            ExtendedRecord::V514 {
                jid,
                ash,
                credtype,
            } => {
                target.jid = jid;
                target.ash = ash;
                target.credtype = credtype;
            }
            ExtendedRecord::V800(extend) => *target = extend,
        }
    }
}
