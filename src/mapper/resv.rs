use crate::{
    Result,
    attr::encode_all,
    context::PersistContext,
    fs::FlatObject,
    model::{ObjectKind, Resv, ResvFix},
    store::data::DbResv,
};

use super::{RecordMapper, decode_pairs, encode_pairs};

impl RecordMapper for Resv {
    type Record = DbResv;

    const KIND: ObjectKind = ObjectKind::Resv;

    fn id(&self) -> &str {
        Resv::id(self)
    }

    fn to_record(
        &self,
        _ctx: &PersistContext,
    ) -> Result<DbResv> {
        Ok(DbResv {
            resv_id: self.fix.resv_id.clone(),
            rsversion: self.fix.rsversion as i32,
            state: self.fix.state,
            substate: self.fix.substate,
            svrflags: self.fix.svrflags as i32,
            start: self.fix.start,
            end: self.fix.end,
            duration: self.fix.duration,
            tactive: self.fix.tactive,
            queue: self.fix.queue.clone(),
            fileprefix: self.fix.fileprefix.clone(),
            attributes: encode_pairs(encode_all(&self.attrs)),
        })
    }

    fn from_record(record: DbResv) -> Result<Self> {
        let mut resv = Resv::alloc();
        resv.fix = ResvFix {
            rsversion: record.rsversion as u32,
            state: record.state,
            substate: record.substate,
            svrflags: record.svrflags as u32,
            start: record.start,
            end: record.end,
            duration: record.duration,
            tactive: record.tactive,
            resv_id: record.resv_id,
            fileprefix: record.fileprefix,
            queue: record.queue,
        };
        decode_pairs(&mut resv.attrs, &record.attributes, <Resv as RecordMapper>::UNKNOWN_POLICY)?;
        Ok(resv)
    }

    fn clear_modified(&mut self) {
        Resv::clear_modified(self)
    }

    fn upgrade_version(&mut self) -> Option<u32> {
        let version = self.schema_version();
        if version == <Resv as FlatObject>::CURRENT_VERSION {
            return None;
        }
        self.set_schema_version(<Resv as FlatObject>::CURRENT_VERSION);
        Some(version)
    }
}
