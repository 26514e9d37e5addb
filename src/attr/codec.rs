//! External form of attributes and the flat-file attribute stream.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{PersistError, Result};

use super::{AttrFlags, AttributeSet};

/// `tsize` value that terminates an attribute stream.
pub const ENDATTRIBUTES: i32 = -711;

/// `tsize name_len resc_len value_len flags`
const RECORD_HEADER: usize = 20;

/// Upper bound of a single stream record.
const MAX_RECORD: usize = 1 << 22;

/// One attribute value in external form: `name[.resource] = value` plus flags.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExternalAttr {
    pub name: String,
    pub resource: Option<String>,
    pub value: String,
    pub flags: AttrFlags,
}

impl ExternalAttr {
    pub fn new(
        name: impl Into<String>,
        resource: Option<String>,
        value: impl Into<String>,
        flags: AttrFlags,
    ) -> Self {
        Self {
            name: name.into(),
            resource,
            value: value.into(),
            flags,
        }
    }
}

/// What decoding does with a name that no definition matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownPolicy {
    /// Keep it in the set's unknown bucket.
    Bucket,
    /// Log and drop it.
    Discard,
    /// Fail the whole decode.
    Reject,
}

/// Appends the external form of slot `index` to `out`.
///
/// Nothing is appended for no-save definitions, unset slots, slots flagged
/// `DEFAULT`, or values equal to the compile-time default.
pub fn encode_attr(
    set: &AttributeSet,
    index: usize,
    out: &mut Vec<ExternalAttr>,
) {
    let def = &set.defs()[index];
    let slot = set.slot(index);
    if def.no_save || !slot.is_set() || slot.flags.contains(AttrFlags::DEFAULT) {
        return;
    }
    let Some(value) = slot.value.as_ref() else {
        return;
    };
    if def.default_value().as_ref() == Some(value) {
        return;
    }
    let flags = slot.flags.without(AttrFlags::MODIFY);
    for (resource, encoded) in def.kind.encode(value) {
        out.push(ExternalAttr::new(def.name, resource, encoded, flags));
    }
}

/// External form of every persisted attribute, unknown bucket last.
pub fn encode_all(set: &AttributeSet) -> Vec<ExternalAttr> {
    let mut out = Vec::new();
    for index in 0..set.len() {
        encode_attr(set, index, &mut out);
    }
    out.extend(set.unknown().iter().cloned());
    out
}

/// Sets every listed attribute on `set`.
///
/// Entries for the same resource attribute merge; the first entry replaces
/// the compile-time default. Decoded slots are flagged `SET` and not
/// `MODIFY`, keeping any other stored flag bits.
pub fn decode_list(
    set: &mut AttributeSet,
    list: Vec<ExternalAttr>,
    policy: UnknownPolicy,
) -> Result<()> {
    let mut seen = vec![false; set.len()];
    for attr in list {
        let Some(index) = set.index_of(&attr.name) else {
            match policy {
                UnknownPolicy::Bucket => set.push_unknown(attr),
                UnknownPolicy::Discard => {
                    warn!(attribute = %attr.name, "unknown attribute, discarded");
                }
                UnknownPolicy::Reject => {
                    return Err(PersistError::Decode(format!("unknown attribute {}", attr.name)));
                }
            }
            continue;
        };
        let def = set.defs()[index];
        let slot = set.slot_mut(index);
        let current = if seen[index] { slot.value.take() } else { None };
        slot.value = Some(def.kind.decode(def.name, attr.resource.as_deref(), &attr.value, current)?);
        slot.flags = attr.flags.without(AttrFlags::MODIFY) | AttrFlags::SET;
        seen[index] = true;
    }
    debug!(decoded = seen.iter().filter(|s| **s).count(), "decoded attribute list");
    Ok(())
}

/// Writes `attrs` as stream records followed by the end marker.
pub fn write_stream<W: Write>(
    w: &mut W,
    attrs: &[ExternalAttr],
) -> std::io::Result<()> {
    for attr in attrs {
        let resource = attr.resource.as_deref().unwrap_or("");
        let tsize = RECORD_HEADER + attr.name.len() + resource.len() + attr.value.len() + 3;
        let tsize = i32::try_from(tsize).map_err(|_| std::io::Error::other(format!("attribute {} too large", attr.name)))?;

        let mut buf = Vec::with_capacity(tsize as usize);
        buf.extend_from_slice(&tsize.to_le_bytes());
        buf.extend_from_slice(&(attr.name.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(resource.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(attr.value.len() as u32).to_le_bytes());
        buf.extend_from_slice(&attr.flags.bits().to_le_bytes());
        for part in [attr.name.as_str(), resource, attr.value.as_str()] {
            buf.extend_from_slice(part.as_bytes());
            buf.push(0);
        }
        w.write_all(&buf)?;
    }
    w.write_all(&ENDATTRIBUTES.to_le_bytes())
}

/// Reads stream records up to and including the end marker.
pub fn read_stream<R: Read>(r: &mut R) -> Result<Vec<ExternalAttr>> {
    let mut attrs = Vec::new();
    loop {
        let mut word = [0u8; 4];
        r.read_exact(&mut word).map_err(|e| PersistError::Corrupt(format!("attribute stream truncated: {}", e)))?;
        let tsize = i32::from_le_bytes(word);
        if tsize == ENDATTRIBUTES {
            return Ok(attrs);
        }
        let tsize = usize::try_from(tsize).map_err(|_| PersistError::Corrupt(format!("bad attribute record size {}", tsize)))?;
        if !(RECORD_HEADER + 3..=MAX_RECORD).contains(&tsize) {
            return Err(PersistError::Corrupt(format!("bad attribute record size {}", tsize)));
        }

        let mut rest = vec![0u8; tsize - 4];
        r.read_exact(&mut rest).map_err(|e| PersistError::Corrupt(format!("attribute record truncated: {}", e)))?;
        let field = |i: usize| u32::from_le_bytes([rest[i * 4], rest[i * 4 + 1], rest[i * 4 + 2], rest[i * 4 + 3]]) as usize;
        let (name_len, resc_len, value_len) = (field(0), field(1), field(2));
        let flags = AttrFlags::from_bits(field(3) as u32);
        if RECORD_HEADER + name_len + resc_len + value_len + 3 != tsize {
            return Err(PersistError::Corrupt(format!("attribute record lengths do not add up to {}", tsize)));
        }

        let mut offset = RECORD_HEADER - 4;
        let mut take = |len: usize| -> Result<String> {
            let bytes = &rest[offset..offset + len];
            if rest[offset + len] != 0 {
                return Err(PersistError::Corrupt("attribute string not terminated".to_string()));
            }
            offset += len + 1;
            Ok(String::from_utf8(bytes.to_vec())?)
        };
        let name = take(name_len)?;
        let resource = take(resc_len)?;
        let value = take(value_len)?;
        if name.is_empty() {
            return Err(PersistError::Corrupt("attribute record without a name".to_string()));
        }
        attrs.push(ExternalAttr {
            name,
            resource: if resource.is_empty() { None } else { Some(resource) },
            value,
            flags,
        });
    }
}
