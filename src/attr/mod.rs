//! Attribute model shared by jobs, reservations and nodes.
//!
//! An object's attributes live in an [`AttributeSet`] whose slots are laid
//! out by a static definition table. The codec turns a set into a list of
//! [`ExternalAttr`] entries (one per value, or one per resource for resource
//! attributes) and back.

mod codec;
mod defs;
mod set;

use std::{
    collections::BTreeMap,
    fmt,
    ops::{BitOr, BitOrAssign},
};

use serde::{Deserialize, Serialize};

use crate::{PersistError, Result};

pub use codec::{ENDATTRIBUTES, ExternalAttr, UnknownPolicy, decode_list, encode_all, encode_attr, read_stream, write_stream};
pub use defs::{JOB_ATTR_DEFS, NODE_ATTR_DEFS, RESV_ATTR_DEFS, job, node, resv};
pub use set::AttributeSet;

/// Per-value flag bits, stored verbatim next to every persisted value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct AttrFlags(u32);

impl AttrFlags {
    /// The value has been set.
    pub const SET: AttrFlags = AttrFlags(0x01);
    /// The value changed since the last save.
    pub const MODIFY: AttrFlags = AttrFlags(0x02);
    /// The value is a default rather than an explicit setting.
    pub const DEFAULT: AttrFlags = AttrFlags(0x04);

    pub const fn empty() -> Self {
        AttrFlags(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        AttrFlags(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(
        self,
        other: AttrFlags,
    ) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(
        &mut self,
        other: AttrFlags,
    ) {
        self.0 |= other.0;
    }

    pub fn remove(
        &mut self,
        other: AttrFlags,
    ) {
        self.0 &= !other.0;
    }

    pub const fn without(
        self,
        other: AttrFlags,
    ) -> Self {
        AttrFlags(self.0 & !other.0)
    }
}

impl BitOr for AttrFlags {
    type Output = AttrFlags;

    fn bitor(
        self,
        rhs: AttrFlags,
    ) -> AttrFlags {
        AttrFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for AttrFlags {
    fn bitor_assign(
        &mut self,
        rhs: AttrFlags,
    ) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for AttrFlags {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Value type of an attribute; selects its decode and encode functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Long,
    Str,
    Bool,
    /// Comma separated list of strings. `\,` and `\\` escape a comma and a
    /// backslash inside an element, and `\e` stands for a lone empty element.
    StrArray,
    /// Map of resource name to resource value.
    Resource,
}

/// In-memory attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Long(i64),
    Str(String),
    Bool(bool),
    StrArray(Vec<String>),
    Resources(BTreeMap<String, String>),
}

impl AttrKind {
    /// Decodes one external value. Resource values merge into `current`.
    pub fn decode(
        self,
        name: &str,
        resource: Option<&str>,
        value: &str,
        current: Option<AttrValue>,
    ) -> Result<AttrValue> {
        match self {
            AttrKind::Long => value
                .trim()
                .parse::<i64>()
                .map(AttrValue::Long)
                .map_err(|e| PersistError::Decode(format!("attribute {}: bad long value {:?}: {}", name, value, e))),
            AttrKind::Str => Ok(AttrValue::Str(value.to_string())),
            AttrKind::Bool => match value.to_ascii_lowercase().as_str() {
                "true" | "t" | "y" | "1" => Ok(AttrValue::Bool(true)),
                "false" | "f" | "n" | "0" => Ok(AttrValue::Bool(false)),
                _ => Err(PersistError::Decode(format!("attribute {}: bad boolean value {:?}", name, value))),
            },
            AttrKind::StrArray => Ok(AttrValue::StrArray(split_array(value))),
            AttrKind::Resource => {
                let Some(resource) = resource.filter(|r| !r.is_empty()) else {
                    return Err(PersistError::Decode(format!("attribute {}: resource name missing", name)));
                };
                let mut map = match current {
                    Some(AttrValue::Resources(map)) => map,
                    _ => BTreeMap::new(),
                };
                map.insert(resource.to_string(), value.to_string());
                Ok(AttrValue::Resources(map))
            }
        }
    }

    /// Encodes a value as `(resource, value)` pairs.
    pub fn encode(
        self,
        value: &AttrValue,
    ) -> Vec<(Option<String>, String)> {
        match value {
            AttrValue::Long(v) => vec![(None, v.to_string())],
            AttrValue::Str(v) => vec![(None, v.clone())],
            AttrValue::Bool(v) => vec![(None, if *v { "True" } else { "False" }.to_string())],
            AttrValue::StrArray(v) => vec![(None, join_array(v))],
            AttrValue::Resources(map) => map.iter().map(|(k, v)| (Some(k.clone()), v.clone())).collect(),
        }
    }

    pub fn accepts(
        self,
        value: &AttrValue,
    ) -> bool {
        matches!(
            (self, value),
            (AttrKind::Long, AttrValue::Long(_))
                | (AttrKind::Str, AttrValue::Str(_))
                | (AttrKind::Bool, AttrValue::Bool(_))
                | (AttrKind::StrArray, AttrValue::StrArray(_))
                | (AttrKind::Resource, AttrValue::Resources(_))
        )
    }
}

fn join_array(items: &[String]) -> String {
    if let [only] = items {
        if only.is_empty() {
            return "\\e".to_string();
        }
    }
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        for c in item.chars() {
            if c == ',' || c == '\\' {
                out.push('\\');
            }
            out.push(c);
        }
    }
    out
}

/// Inverse of [`join_array`]. Unknown escapes are kept verbatim so values
/// written before escaping existed still decode.
fn split_array(value: &str) -> Vec<String> {
    if value.is_empty() {
        return Vec::new();
    }
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped @ (',' | '\\')) => current.push(escaped),
                Some('e') => {}
                Some(other) => {
                    current.push('\\');
                    current.push(other);
                }
                None => current.push('\\'),
            },
            ',' => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    items.push(current);
    items
}

/// Static definition of one attribute slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeDef {
    pub name: &'static str,
    pub kind: AttrKind,
    /// Never written to durable storage.
    pub no_save: bool,
    /// Compile-time default in external form.
    pub default: Option<&'static str>,
}

impl AttributeDef {
    pub const fn new(
        name: &'static str,
        kind: AttrKind,
    ) -> Self {
        Self {
            name,
            kind,
            no_save: false,
            default: None,
        }
    }

    pub const fn no_save(mut self) -> Self {
        self.no_save = true;
        self
    }

    pub const fn with_default(
        mut self,
        default: &'static str,
    ) -> Self {
        self.default = Some(default);
        self
    }

    /// Decoded compile-time default; `None` if the definition has none or it
    /// does not decode.
    pub fn default_value(&self) -> Option<AttrValue> {
        self.default.and_then(|raw| self.kind.decode(self.name, None, raw, None).ok())
    }
}

/// One attribute slot of an object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attribute {
    pub value: Option<AttrValue>,
    pub flags: AttrFlags,
}

impl Attribute {
    pub fn is_set(&self) -> bool {
        self.flags.contains(AttrFlags::SET)
    }
}
