use super::{AttrKind, AttributeDef};

/// Job attribute names.
pub mod job {
    pub const NAME: &str = "Job_Name";
    pub const OWNER: &str = "Job_Owner";
    pub const STATE: &str = "job_state";
    pub const QUEUE: &str = "queue";
    pub const SERVER: &str = "server";
    pub const RESOURCE_LIST: &str = "Resource_List";
    pub const RESOURCES_USED: &str = "resources_used";
    pub const CTIME: &str = "ctime";
    pub const MTIME: &str = "mtime";
    pub const QTIME: &str = "qtime";
    pub const ETIME: &str = "etime";
    pub const PRIORITY: &str = "Priority";
    pub const RERUNABLE: &str = "Rerunable";
    pub const HOLD_TYPES: &str = "Hold_Types";
    pub const VARIABLE_LIST: &str = "Variable_List";
    pub const ARRAY_INDICES: &str = "array_indices_submitted";
    pub const EXEC_HOST: &str = "exec_host";
    pub const EXEC_VNODE: &str = "exec_vnode";
    pub const RUN_COUNT: &str = "run_count";
    pub const COMMENT: &str = "comment";
    pub const X11_COOKIE: &str = "forward_x11_cookie";
}

/// Reservation attribute names.
pub mod resv {
    pub const NAME: &str = "Reserve_Name";
    pub const OWNER: &str = "Reserve_Owner";
    pub const STATE: &str = "reserve_state";
    pub const START: &str = "reserve_start";
    pub const END: &str = "reserve_end";
    pub const DURATION: &str = "reserve_duration";
    pub const QUEUE: &str = "queue";
    pub const RESOURCE_LIST: &str = "Resource_List";
    pub const NODES: &str = "resv_nodes";
    pub const AUTH_USERS: &str = "Authorized_Users";
    pub const CTIME: &str = "ctime";
    pub const MTIME: &str = "mtime";
    pub const RETRY: &str = "reserve_retry";
    pub const COMMENT: &str = "comment";
}

/// Node attribute names.
pub mod node {
    pub const MOM: &str = "Mom";
    pub const PORT: &str = "Port";
    pub const STATE: &str = "state";
    pub const NTYPE: &str = "ntype";
    pub const JOBS: &str = "jobs";
    pub const RESOURCES_AVAILABLE: &str = "resources_available";
    pub const RESOURCES_ASSIGNED: &str = "resources_assigned";
    pub const PCPUS: &str = "pcpus";
    pub const RESV_ENABLE: &str = "resv_enable";
    pub const SHARING: &str = "sharing";
    pub const QUEUE: &str = "queue";
    pub const COMMENT: &str = "comment";
    pub const PARTITION: &str = "partition";
}

pub static JOB_ATTR_DEFS: &[AttributeDef] = &[
    AttributeDef::new(job::NAME, AttrKind::Str),
    AttributeDef::new(job::OWNER, AttrKind::Str),
    AttributeDef::new(job::STATE, AttrKind::Str),
    AttributeDef::new(job::QUEUE, AttrKind::Str),
    AttributeDef::new(job::SERVER, AttrKind::Str),
    AttributeDef::new(job::RESOURCE_LIST, AttrKind::Resource),
    AttributeDef::new(job::RESOURCES_USED, AttrKind::Resource),
    AttributeDef::new(job::CTIME, AttrKind::Long),
    AttributeDef::new(job::MTIME, AttrKind::Long),
    AttributeDef::new(job::QTIME, AttrKind::Long),
    AttributeDef::new(job::ETIME, AttrKind::Long),
    AttributeDef::new(job::PRIORITY, AttrKind::Long).with_default("0"),
    AttributeDef::new(job::RERUNABLE, AttrKind::Bool).with_default("True"),
    AttributeDef::new(job::HOLD_TYPES, AttrKind::Str).with_default("n"),
    AttributeDef::new(job::VARIABLE_LIST, AttrKind::StrArray),
    AttributeDef::new(job::ARRAY_INDICES, AttrKind::Str),
    AttributeDef::new(job::EXEC_HOST, AttrKind::Str),
    AttributeDef::new(job::EXEC_VNODE, AttrKind::Str),
    AttributeDef::new(job::RUN_COUNT, AttrKind::Long).with_default("0"),
    AttributeDef::new(job::COMMENT, AttrKind::Str),
    AttributeDef::new(job::X11_COOKIE, AttrKind::Str).no_save(),
];

pub static RESV_ATTR_DEFS: &[AttributeDef] = &[
    AttributeDef::new(resv::NAME, AttrKind::Str),
    AttributeDef::new(resv::OWNER, AttrKind::Str),
    AttributeDef::new(resv::STATE, AttrKind::Long),
    AttributeDef::new(resv::START, AttrKind::Long),
    AttributeDef::new(resv::END, AttrKind::Long),
    AttributeDef::new(resv::DURATION, AttrKind::Long),
    AttributeDef::new(resv::QUEUE, AttrKind::Str),
    AttributeDef::new(resv::RESOURCE_LIST, AttrKind::Resource),
    AttributeDef::new(resv::NODES, AttrKind::Str),
    AttributeDef::new(resv::AUTH_USERS, AttrKind::StrArray),
    AttributeDef::new(resv::CTIME, AttrKind::Long),
    AttributeDef::new(resv::MTIME, AttrKind::Long),
    AttributeDef::new(resv::RETRY, AttrKind::Long).no_save(),
    AttributeDef::new(resv::COMMENT, AttrKind::Str),
];

pub static NODE_ATTR_DEFS: &[AttributeDef] = &[
    AttributeDef::new(node::MOM, AttrKind::StrArray),
    AttributeDef::new(node::PORT, AttrKind::Long).with_default("15002"),
    AttributeDef::new(node::STATE, AttrKind::Str).with_default("free"),
    AttributeDef::new(node::NTYPE, AttrKind::Str).with_default("PBS"),
    AttributeDef::new(node::JOBS, AttrKind::StrArray).no_save(),
    AttributeDef::new(node::RESOURCES_AVAILABLE, AttrKind::Resource),
    AttributeDef::new(node::RESOURCES_ASSIGNED, AttrKind::Resource).no_save(),
    AttributeDef::new(node::PCPUS, AttrKind::Long),
    AttributeDef::new(node::RESV_ENABLE, AttrKind::Bool).with_default("True"),
    AttributeDef::new(node::SHARING, AttrKind::Str).with_default("default_shared"),
    AttributeDef::new(node::QUEUE, AttrKind::Str),
    AttributeDef::new(node::COMMENT, AttrKind::Str),
    AttributeDef::new(node::PARTITION, AttrKind::Str),
];
