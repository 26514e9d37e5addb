use strum::{AsRefStr, EnumString, FromRepr};

use crate::attr::{AttributeSet, NODE_ATTR_DEFS};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, AsRefStr, FromRepr)]
#[repr(i32)]
pub enum NodeType {
    #[default]
    #[strum(serialize = "PBS")]
    Pbs = 0,
    #[strum(serialize = "cluster")]
    Cluster = 1,
}

/// Value of the `sharing` node attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum VnodeSharing {
    Unset,
    #[default]
    DefaultShared,
    DefaultExcl,
    DefaultExclhost,
    IgnoreExcl,
    ForceExcl,
    ForceExclhost,
}

/// A vnode. Node state is kept in the database only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub hostname: Option<String>,
    pub ntype: NodeType,
    pub state: u32,
    /// Queue the node is associated with.
    pub pque: Option<String>,
    pub index: i32,
    pub nummoms: i32,
    /// Modification time reported by the node's first mom.
    pub mom_modtime: Option<i64>,
    /// Live hardware cpu count reported by the mom.
    pub nsn: i64,
    pub attrs: AttributeSet,
    modified: bool,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hostname: None,
            ntype: NodeType::Pbs,
            state: 0,
            pque: None,
            index: 0,
            nummoms: 0,
            mom_modtime: None,
            nsn: 0,
            attrs: AttributeSet::new(NODE_ATTR_DEFS),
            modified: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.name
    }

    /// Position used to order vnodes on recovery; vnodes managed by several
    /// moms sort after the natural ones.
    pub fn sort_index(
        &self,
        total_nodes: i32,
    ) -> i32 {
        self.nummoms.saturating_mul(total_nodes).saturating_add(self.index)
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
