use std::io::Read;

use crate::{PersistError, Result};

use super::{FixedReader, FixedWriter};

/// Leading byte-count field of the tracking block.
const SIZE_FIELD: usize = 8;
/// `count flags`
const TABLE_HEADER: usize = 8;
const ENTRY_SIZE: usize = 16;
const MAX_TRACKING: u64 = 64 << 20;

/// Per-subjob state of an array job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubjobTrack {
    pub state: i32,
    pub substate: i32,
    pub exit_status: i32,
    pub stgout: i32,
}

/// Array-job tracking table.
///
/// On disk the block is self-describing: a `u64` total byte count (the count
/// field included), then `count:u32 flags:u32` and one entry per subjob.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArrayTracking {
    pub flags: u32,
    pub subjobs: Vec<SubjobTrack>,
}

impl ArrayTracking {
    pub fn with_subjobs(count: usize) -> Self {
        Self {
            flags: 0,
            subjobs: vec![SubjobTrack::default(); count],
        }
    }

    /// Total size of the encoded block.
    pub fn block_size(&self) -> usize {
        SIZE_FIELD + TABLE_HEADER + self.subjobs.len() * ENTRY_SIZE
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let count = u32::try_from(self.subjobs.len()).map_err(|_| PersistError::Encode("too many subjobs".to_string()))?;
        let mut w = FixedWriter::with_capacity(self.block_size());
        w.u64(self.block_size() as u64);
        w.u32(count).u32(self.flags);
        for sj in &self.subjobs {
            w.i32(sj.state).i32(sj.substate).i32(sj.exit_status).i32(sj.stgout);
        }
        Ok(w.finish())
    }

    /// Reads the size field, then exactly the rest of the block.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let mut size = [0u8; SIZE_FIELD];
        r.read_exact(&mut size).map_err(|e| PersistError::Corrupt(format!("error reading array section size: {}", e)))?;
        let size = u64::from_le_bytes(size);
        if size < (SIZE_FIELD + TABLE_HEADER) as u64 || size > MAX_TRACKING {
            return Err(PersistError::Corrupt(format!("bad array section size {}", size)));
        }

        let mut body = vec![0u8; size as usize - SIZE_FIELD];
        r.read_exact(&mut body).map_err(|e| PersistError::Corrupt(format!("error reading array section: {}", e)))?;
        Self::decode_body(&body)
    }

    /// Decodes a complete block, size field included.
    pub fn decode(block: &[u8]) -> Result<Self> {
        let mut r = block;
        let table = Self::read_from(&mut r)?;
        if !r.is_empty() {
            return Err(PersistError::Corrupt(format!("{} bytes after array section", r.len())));
        }
        Ok(table)
    }

    fn decode_body(body: &[u8]) -> Result<Self> {
        let mut r = FixedReader::new(body);
        let count = r.u32()? as usize;
        let flags = r.u32()?;
        if body.len() != TABLE_HEADER + count * ENTRY_SIZE {
            return Err(PersistError::Corrupt(format!("array section of {} bytes cannot hold {} subjobs", body.len(), count)));
        }
        let mut subjobs = Vec::with_capacity(count);
        for _ in 0..count {
            subjobs.push(SubjobTrack {
                state: r.i32()?,
                substate: r.i32()?,
                exit_status: r.i32()?,
                stgout: r.i32()?,
            });
        }
        Ok(Self {
            flags,
            subjobs,
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::ArrayTracking;

    #[test]
    fn test_block_is_self_describing() {
        let mut table = ArrayTracking::with_subjobs(3);
        table.subjobs[1].state = 4;
        table.subjobs[2].exit_status = -1;

        let mut buf = table.encode().unwrap();
        assert_eq!(buf.len(), table.block_size());
        assert_eq!(u64::from_le_bytes(buf[..8].try_into().unwrap()), buf.len() as u64);

        buf.extend_from_slice(b"trailing attribute data");
        let mut cursor = Cursor::new(buf);
        assert_eq!(ArrayTracking::read_from(&mut cursor).unwrap(), table);
        assert_eq!(cursor.position() as usize, table.block_size());
    }

    #[test]
    fn test_bad_sizes() {
        let table = ArrayTracking::with_subjobs(2);
        let buf = table.encode().unwrap();

        assert!(ArrayTracking::decode(&buf[..buf.len() - 1]).is_err());

        let mut lying = buf.clone();
        lying[8..12].copy_from_slice(&5u32.to_le_bytes());
        assert!(ArrayTracking::decode(&lying).is_err());

        let mut tiny = buf;
        tiny[..8].copy_from_slice(&4u64.to_le_bytes());
        assert!(ArrayTracking::decode(&tiny).is_err());
    }
}
