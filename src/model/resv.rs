use crate::{
    Result,
    attr::{AttributeSet, RESV_ATTR_DEFS},
};

use super::{FILE_PREFIX_LEN, FixedReader, FixedWriter, QUEUE_NAME_LEN, RESV_ID_LEN};

/// Reservation structure version written by this build.
pub const RSVERSION: u32 = 800;

pub const RESV_FIX_SIZE: usize = 4 * 4 + 4 * 8 + RESV_ID_LEN + FILE_PREFIX_LEN + QUEUE_NAME_LEN;

/// Fixed part of a reservation record. Reservations have no extended area.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResvFix {
    pub rsversion: u32,
    pub state: i32,
    pub substate: i32,
    pub svrflags: u32,
    pub start: i64,
    pub end: i64,
    pub duration: i64,
    pub tactive: i64,
    pub resv_id: String,
    pub fileprefix: String,
    pub queue: String,
}

impl ResvFix {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut w = FixedWriter::with_capacity(RESV_FIX_SIZE);
        w.u32(self.rsversion).i32(self.state).i32(self.substate).u32(self.svrflags);
        w.i64(self.start).i64(self.end).i64(self.duration).i64(self.tactive);
        w.str("reservation id", &self.resv_id, RESV_ID_LEN)?;
        w.str("file prefix", &self.fileprefix, FILE_PREFIX_LEN)?;
        w.str("queue", &self.queue, QUEUE_NAME_LEN)?;
        Ok(w.finish())
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = FixedReader::new(buf);
        Ok(Self {
            rsversion: r.u32()?,
            state: r.i32()?,
            substate: r.i32()?,
            svrflags: r.u32()?,
            start: r.i64()?,
            end: r.i64()?,
            duration: r.i64()?,
            tactive: r.i64()?,
            resv_id: r.str(RESV_ID_LEN)?,
            fileprefix: r.str(FILE_PREFIX_LEN)?,
            queue: r.str(QUEUE_NAME_LEN)?,
        })
    }
}

/// An advance reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resv {
    pub fix: ResvFix,
    pub attrs: AttributeSet,
    modified: bool,
}

impl Resv {
    pub fn alloc() -> Self {
        Self {
            fix: ResvFix {
                rsversion: RSVERSION,
                ..ResvFix::default()
            },
            attrs: AttributeSet::new(RESV_ATTR_DEFS),
            modified: false,
        }
    }

    pub fn new(resv_id: impl Into<String>) -> Self {
        let mut resv = Self::alloc();
        resv.fix.resv_id = resv_id.into();
        resv
    }

    pub fn id(&self) -> &str {
        &self.fix.resv_id
    }

    pub fn file_prefix(&self) -> &str {
        if self.fix.fileprefix.is_empty() { &self.fix.resv_id } else { &self.fix.fileprefix }
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

#[cfg(test)]
mod test {
    use super::{RESV_FIX_SIZE, Resv, ResvFix};

    #[test]
    fn test_fix_roundtrip() {
        let mut resv = Resv::new("R42.headnode");
        resv.fix.start = 1_700_000_000;
        resv.fix.duration = 3600;
        resv.fix.queue = "R42".into();

        let buf = resv.fix.encode().unwrap();
        assert_eq!(buf.len(), RESV_FIX_SIZE);
        assert_eq!(ResvFix::decode(&buf).unwrap(), resv.fix);
        assert!(ResvFix::decode(&buf[..RESV_FIX_SIZE - 1]).is_err());
    }
}
