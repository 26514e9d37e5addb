use tracing::trace;

use crate::{
    PersistError, Result,
    attr::{AttrFlags, ExternalAttr, UnknownPolicy, encode_attr, node},
    context::PersistContext,
    model::{Node, NodeType, ObjectKind, VnodeSharing},
    store::data::{DbAttrList, DbNode},
};

use super::{DbMapper, RecordMapper, decode_pairs, encode_pairs};

/// Attribute list of `node` as stored: `pcpus` always comes from the live
/// hardware count and a peer-reported `sharing` survives the default filter.
fn node_attrs(vnode: &Node) -> Vec<ExternalAttr> {
    let set = &vnode.attrs;
    let mut list = Vec::new();
    for index in 0..set.len() {
        encode_attr(set, index, &mut list);
    }
    list.retain(|attr| attr.name != node::PCPUS && !(attr.name == node::RESV_ENABLE && attr.flags.contains(AttrFlags::DEFAULT)));
    list.push(ExternalAttr::new(node::PCPUS, None, vnode.nsn.to_string(), AttrFlags::empty()));

    if set.flags(node::SHARING).contains(AttrFlags::SET | AttrFlags::DEFAULT) {
        match set.get_str(node::SHARING) {
            Some(sharing) if sharing != VnodeSharing::Unset.as_ref() && sharing != VnodeSharing::DefaultShared.as_ref() => {
                list.push(ExternalAttr::new(node::SHARING, None, sharing, AttrFlags::empty()));
            }
            _ => {}
        }
    }
    list
}

impl RecordMapper for Node {
    type Record = DbNode;

    const KIND: ObjectKind = ObjectKind::Node;
    const UNKNOWN_POLICY: UnknownPolicy = UnknownPolicy::Reject;
    const FATAL_SAVE: bool = true;

    fn id(&self) -> &str {
        Node::id(self)
    }

    fn to_record(
        &self,
        ctx: &PersistContext,
    ) -> Result<DbNode> {
        Ok(DbNode {
            name: self.name.clone(),
            index: self.sort_index(ctx.total_nodes()),
            mom_modtime: self.mom_modtime.unwrap_or(0),
            hostname: self.hostname.clone().unwrap_or_default(),
            ntype: self.ntype as i32,
            state: self.state as i32,
            pque: self.pque.clone().unwrap_or_default(),
            attributes: encode_pairs(node_attrs(self)),
        })
    }

    fn from_record(record: DbNode) -> Result<Self> {
        let mut vnode = Node::new(record.name);
        vnode.ntype = NodeType::from_repr(record.ntype).ok_or_else(|| PersistError::Corrupt(format!("node {}: bad type {}", vnode.name, record.ntype)))?;
        vnode.hostname = Some(record.hostname).filter(|h| !h.is_empty());
        vnode.pque = Some(record.pque).filter(|q| !q.is_empty());
        vnode.state = record.state as u32;
        vnode.index = record.index;
        vnode.mom_modtime = Some(record.mom_modtime).filter(|t| *t != 0);
        decode_pairs(&mut vnode.attrs, &record.attributes, Self::UNKNOWN_POLICY)?;
        vnode.nsn = vnode.attrs.get_long(node::PCPUS).unwrap_or(0);
        Ok(vnode)
    }

    fn clear_modified(&mut self) {
        Node::clear_modified(self)
    }
}

impl DbMapper<'_> {
    /// Stored attribute list of node `name`, not decoded against the node
    /// definitions.
    pub fn recover_node_raw(
        &self,
        name: &str,
    ) -> Result<Vec<ExternalAttr>> {
        trace!("mapper::recover_node_raw({})", name);
        let record = self.ctx.store().nodes()?.find(name)?.ok_or_else(|| PersistError::NotFound(format!("node {} not in database", name)))?;
        DbAttrList::from_pairs(&record.attributes).map(|list| list.into_external())
    }
}

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use crate::{
        PersistError,
        attr::{AttrFlags, AttrValue, node},
        context::mem_context,
        mapper::DbMapper,
        model::Node,
        store::SaveMode,
    };

    fn sample() -> Node {
        let mut n = Node::new("cn001");
        n.hostname = Some("cn001.cluster".into());
        n.index = 4;
        n.nsn = 16;
        n.mom_modtime = Some(1_700_000_000);
        n.attrs.set(node::MOM, AttrValue::StrArray(vec!["cn001".into()])).unwrap();
        n.attrs.set_resource(node::RESOURCES_AVAILABLE, "ncpus", "16").unwrap();
        n.attrs.set_resource(node::RESOURCES_AVAILABLE, "mem", "64gb").unwrap();
        n
    }

    fn pcpus_entries(attrs: &[String]) -> Vec<&str> {
        attrs.chunks_exact(2).filter(|pair| pair[0] == "pcpus.").map(|pair| pair[1].as_str()).collect()
    }

    #[test]
    fn test_pcpus_written_once_from_hardware_count() {
        let dir = TempDir::new().unwrap();
        let (ctx, mem) = mem_context(dir.path());
        let mapper = DbMapper::new(&ctx);

        let mut n = sample();
        n.attrs.set(node::PCPUS, AttrValue::Long(8)).unwrap();
        mapper.save(&mut n, false).unwrap();

        let row = mem.nodes().find("cn001").unwrap().unwrap();
        assert_eq!(pcpus_entries(&row.attributes), vec!["0.16"]);

        let mut bare = Node::new("cn002");
        bare.nsn = 4;
        mapper.save(&mut bare, false).unwrap();
        let row = mem.nodes().find("cn002").unwrap().unwrap();
        assert_eq!(pcpus_entries(&row.attributes), vec!["0.4"]);
    }

    #[test]
    fn test_peer_sharing_forced_in() {
        let dir = TempDir::new().unwrap();
        let (ctx, mem) = mem_context(dir.path());
        let mapper = DbMapper::new(&ctx);

        let mut n = sample();
        n.attrs.set_default(node::SHARING, AttrValue::Str("force_excl".into())).unwrap();
        n.attrs.set_default(node::RESV_ENABLE, AttrValue::Bool(false)).unwrap();
        mapper.save(&mut n, false).unwrap();

        let row = mem.nodes().find("cn001").unwrap().unwrap();
        assert!(row.attributes.chunks_exact(2).any(|p| p[0] == "sharing." && p[1] == "0.force_excl"));
        assert!(!row.attributes.iter().any(|a| a.starts_with("resv_enable.")));

        let mut shared = sample();
        shared.attrs.set_default(node::SHARING, AttrValue::Str("default_shared".into())).unwrap();
        mapper.save(&mut shared, false).unwrap();
        let row = mem.nodes().find("cn001").unwrap().unwrap();
        assert!(!row.attributes.iter().any(|a| a.starts_with("sharing.")));
    }

    #[test]
    fn test_node_roundtrip() {
        let dir = TempDir::new().unwrap();
        let (ctx, _mem) = mem_context(dir.path());
        ctx.set_total_nodes(10);
        let mapper = DbMapper::new(&ctx);

        let mut n = sample();
        n.nummoms = 1;
        n.attrs.set(node::COMMENT, AttrValue::Str("rack 3".into())).unwrap();
        mapper.save(&mut n, false).unwrap();
        assert!(!n.is_modified());

        let back: Node = mapper.recover("cn001").unwrap();
        assert_eq!(back.hostname.as_deref(), Some("cn001.cluster"));
        assert_eq!(back.pque, None);
        assert_eq!(back.index, 14);
        assert_eq!(back.mom_modtime, Some(1_700_000_000));
        assert_eq!(back.nsn, 16);
        assert_eq!(back.attrs.get_str(node::COMMENT), Some("rack 3"));
        assert_eq!(back.attrs.get(node::RESOURCES_AVAILABLE), n.attrs.get(node::RESOURCES_AVAILABLE));
        assert!(!back.is_modified());
    }

    #[test]
    fn test_update_then_insert() {
        let dir = TempDir::new().unwrap();
        let (ctx, mem) = mem_context(dir.path());
        let mapper = DbMapper::new(&ctx);

        let mut n = sample();
        mapper.save(&mut n, false).unwrap();
        n.state = 2;
        mapper.save(&mut n, false).unwrap();
        assert_eq!(mem.nodes().ids().unwrap(), vec!["cn001"]);
        assert_eq!(mem.nodes().find("cn001").unwrap().unwrap().state, 2);
    }

    #[test]
    fn test_failed_save_halts() {
        let dir = TempDir::new().unwrap();
        let (ctx, mem) = mem_context(dir.path());
        let mapper = DbMapper::new(&ctx);
        mem.set_failing(true);

        let mut n = sample();
        let err = mapper.save(&mut n, false).unwrap_err();
        assert!(matches!(err, PersistError::Fatal(_)));
        assert!(ctx.is_halted());
        assert!(ctx.halt().reason().unwrap().starts_with("node_save failed"));
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        let dir = TempDir::new().unwrap();
        let (ctx, mem) = mem_context(dir.path());
        let mut row = crate::store::data::DbNode {
            name: "cn009".into(),
            attributes: vec!["bogus.".into(), "1.x".into()],
            ..Default::default()
        };
        mem.nodes().save(&row, SaveMode::InsertNew).unwrap();

        let mapper = DbMapper::new(&ctx);
        assert!(matches!(mapper.recover::<Node>("cn009"), Err(PersistError::Decode(_))));

        row.attributes = vec!["pcpus.".into(), "0.2".into()];
        mem.nodes().save(&row, SaveMode::UpdateFull).unwrap();
        assert_eq!(mapper.recover::<Node>("cn009").unwrap().nsn, 2);
    }

    #[test]
    fn test_raw_and_delete() {
        let dir = TempDir::new().unwrap();
        let (ctx, _mem) = mem_context(dir.path());
        let mapper = DbMapper::new(&ctx);

        let mut n = sample();
        mapper.save(&mut n, false).unwrap();
        let raw = mapper.recover_node_raw("cn001").unwrap();
        let mom = raw.iter().find(|a| a.name == node::MOM).unwrap();
        assert_eq!(mom.value, "cn001");
        assert_eq!(mom.flags, AttrFlags::SET);
        assert!(raw.iter().any(|a| a.name == node::RESOURCES_AVAILABLE && a.resource.as_deref() == Some("mem")));

        mapper.delete::<Node>("cn001").unwrap();
        mapper.delete::<Node>("cn001").unwrap();
        assert!(matches!(mapper.recover_node_raw("cn001"), Err(PersistError::NotFound(_))));
        assert!(matches!(mapper.recover::<Node>("cn001"), Err(PersistError::NotFound(_))));
    }
}
