use serde::{Deserialize, Serialize};

use crate::{
    PersistError, Result,
    attr::{AttrFlags, ExternalAttr},
};

/// One attribute at the database boundary. Flags stay a separate field until
/// the list is flattened for the wire.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DbAttr {
    pub name: String,
    pub resource: Option<String>,
    pub flags: AttrFlags,
    pub value: String,
}

impl From<ExternalAttr> for DbAttr {
    fn from(attr: ExternalAttr) -> Self {
        Self {
            name: attr.name,
            resource: attr.resource,
            flags: attr.flags,
            value: attr.value,
        }
    }
}

impl From<DbAttr> for ExternalAttr {
    fn from(attr: DbAttr) -> Self {
        ExternalAttr::new(attr.name, attr.resource, attr.value, attr.flags)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DbAttrList(pub Vec<DbAttr>);

impl DbAttrList {
    /// Flattens to alternating `name.resource` and `flags.value` strings. An
    /// attribute without a resource keeps the trailing dot.
    pub fn to_pairs(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.0.len() * 2);
        for attr in &self.0 {
            out.push(format!("{}.{}", attr.name, attr.resource.as_deref().unwrap_or("")));
            out.push(format!("{}.{}", attr.flags.bits(), attr.value));
        }
        out
    }

    /// Parses what [`DbAttrList::to_pairs`] produced. Both halves split at
    /// their first dot, so values may contain dots.
    pub fn from_pairs(pairs: &[String]) -> Result<Self> {
        if pairs.len() % 2 != 0 {
            return Err(PersistError::Corrupt(format!("attribute array has odd length {}", pairs.len())));
        }
        let mut attrs = Vec::with_capacity(pairs.len() / 2);
        for pair in pairs.chunks_exact(2) {
            let (key, packed) = (&pair[0], &pair[1]);
            let (name, resource) = key.split_once('.').ok_or_else(|| PersistError::Corrupt(format!("attribute key {:?} has no separator", key)))?;
            if name.is_empty() {
                return Err(PersistError::Corrupt(format!("attribute key {:?} has no name", key)));
            }
            let (flags, value) = packed.split_once('.').ok_or_else(|| PersistError::Corrupt(format!("attribute {} value has no flags", name)))?;
            let flags = flags.parse::<u32>().map_err(|e| PersistError::Corrupt(format!("attribute {} has bad flags {:?}: {}", name, flags, e)))?;
            attrs.push(DbAttr {
                name: name.to_string(),
                resource: if resource.is_empty() { None } else { Some(resource.to_string()) },
                flags: AttrFlags::from_bits(flags),
                value: value.to_string(),
            });
        }
        Ok(Self(attrs))
    }

    pub fn into_external(self) -> Vec<ExternalAttr> {
        self.0.into_iter().map(ExternalAttr::from).collect()
    }
}

impl FromIterator<ExternalAttr> for DbAttrList {
    fn from_iter<I: IntoIterator<Item = ExternalAttr>>(iter: I) -> Self {
        Self(iter.into_iter().map(DbAttr::from).collect())
    }
}
