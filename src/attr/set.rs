use crate::{PersistError, Result};

use super::{AttrFlags, AttrValue, Attribute, AttributeDef, ExternalAttr};

/// Attribute slots of one object, laid out by a static definition table.
///
/// Slots start at their compile-time default (flagged `DEFAULT`, not `SET`).
/// Unknown attributes recovered from storage are kept verbatim in a separate
/// bucket so that a later full save writes them back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSet {
    defs: &'static [AttributeDef],
    slots: Vec<Attribute>,
    unknown: Vec<ExternalAttr>,
}

impl AttributeSet {
    pub fn new(defs: &'static [AttributeDef]) -> Self {
        let slots = defs.iter().map(Self::initial_slot).collect();
        Self {
            defs,
            slots,
            unknown: Vec::new(),
        }
    }

    fn initial_slot(def: &AttributeDef) -> Attribute {
        match def.default_value() {
            Some(value) => Attribute {
                value: Some(value),
                flags: AttrFlags::DEFAULT,
            },
            None => Attribute::default(),
        }
    }

    pub fn defs(&self) -> &'static [AttributeDef] {
        self.defs
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn index_of(
        &self,
        name: &str,
    ) -> Option<usize> {
        self.defs.iter().position(|def| def.name == name)
    }

    fn require(
        &self,
        name: &str,
    ) -> Result<usize> {
        self.index_of(name).ok_or_else(|| PersistError::Decode(format!("unknown attribute {}", name)))
    }

    pub fn slot(
        &self,
        index: usize,
    ) -> &Attribute {
        &self.slots[index]
    }

    pub(crate) fn slot_mut(
        &mut self,
        index: usize,
    ) -> &mut Attribute {
        &mut self.slots[index]
    }

    /// Current value of `name`, default included.
    pub fn get(
        &self,
        name: &str,
    ) -> Option<&AttrValue> {
        self.index_of(name).and_then(|i| self.slots[i].value.as_ref())
    }

    pub fn get_long(
        &self,
        name: &str,
    ) -> Option<i64> {
        match self.get(name) {
            Some(AttrValue::Long(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_str(
        &self,
        name: &str,
    ) -> Option<&str> {
        match self.get(name) {
            Some(AttrValue::Str(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn flags(
        &self,
        name: &str,
    ) -> AttrFlags {
        self.index_of(name).map(|i| self.slots[i].flags).unwrap_or_default()
    }

    pub fn is_set(
        &self,
        name: &str,
    ) -> bool {
        self.flags(name).contains(AttrFlags::SET)
    }

    /// Explicitly sets an attribute, marking it modified.
    pub fn set(
        &mut self,
        name: &str,
        value: AttrValue,
    ) -> Result<()> {
        self.put(name, value, AttrFlags::SET | AttrFlags::MODIFY)
    }

    /// Sets an attribute to a value that is still considered a default, as
    /// when it is reported by a peer rather than configured.
    pub fn set_default(
        &mut self,
        name: &str,
        value: AttrValue,
    ) -> Result<()> {
        self.put(name, value, AttrFlags::SET | AttrFlags::DEFAULT | AttrFlags::MODIFY)
    }

    fn put(
        &mut self,
        name: &str,
        value: AttrValue,
        flags: AttrFlags,
    ) -> Result<()> {
        let index = self.require(name)?;
        let def = &self.defs[index];
        if !def.kind.accepts(&value) {
            return Err(PersistError::Decode(format!("attribute {}: value {:?} does not match {:?}", name, value, def.kind)));
        }
        let slot = &mut self.slots[index];
        slot.value = Some(value);
        slot.flags = flags;
        Ok(())
    }

    /// Sets one resource of a resource attribute.
    pub fn set_resource(
        &mut self,
        name: &str,
        resource: &str,
        value: &str,
    ) -> Result<()> {
        let index = self.require(name)?;
        let def = self.defs[index];
        let slot = &mut self.slots[index];
        let current = if slot.is_set() { slot.value.take() } else { None };
        slot.value = Some(def.kind.decode(def.name, Some(resource), value, current)?);
        slot.flags = AttrFlags::SET | AttrFlags::MODIFY;
        Ok(())
    }

    /// Returns an attribute to its compile-time default.
    pub fn unset(
        &mut self,
        name: &str,
    ) -> Result<()> {
        let index = self.require(name)?;
        self.slots[index] = Self::initial_slot(&self.defs[index]);
        self.slots[index].flags.insert(AttrFlags::MODIFY);
        Ok(())
    }

    pub fn is_modified(&self) -> bool {
        self.slots.iter().any(|slot| slot.flags.contains(AttrFlags::MODIFY))
    }

    pub fn clear_modified(&mut self) {
        self.slots.iter_mut().for_each(|slot| slot.flags.remove(AttrFlags::MODIFY));
    }

    pub fn unknown(&self) -> &[ExternalAttr] {
        &self.unknown
    }

    pub(crate) fn push_unknown(
        &mut self,
        attr: ExternalAttr,
    ) {
        self.unknown.push(attr);
    }
}

#[cfg(test)]
mod test {
    use crate::attr::{AttrFlags, AttrValue, AttributeSet, JOB_ATTR_DEFS, RESV_ATTR_DEFS, job};

    #[test]
    fn test_defaults_and_set() {
        let mut set = AttributeSet::new(JOB_ATTR_DEFS);
        assert_eq!(set.get_long(job::PRIORITY), Some(0));
        assert!(!set.is_set(job::PRIORITY));
        assert!(set.flags(job::PRIORITY).contains(AttrFlags::DEFAULT));
        assert!(!set.is_modified());

        set.set(job::PRIORITY, AttrValue::Long(10)).unwrap();
        assert!(set.is_set(job::PRIORITY));
        assert!(set.is_modified());
        set.clear_modified();
        assert!(!set.is_modified());
        assert_eq!(set.flags(job::PRIORITY), AttrFlags::SET);

        set.unset(job::PRIORITY).unwrap();
        assert_eq!(set.get_long(job::PRIORITY), Some(0));
        assert!(!set.is_set(job::PRIORITY));
    }

    #[test]
    fn test_sets_compare_by_table_and_slots() {
        let mut a = AttributeSet::new(JOB_ATTR_DEFS);
        let mut b = AttributeSet::new(JOB_ATTR_DEFS);
        assert_eq!(a, b);
        assert_ne!(a, AttributeSet::new(RESV_ATTR_DEFS));

        a.set(job::NAME, AttrValue::Str("sim.sh".into())).unwrap();
        assert_ne!(a, b);
        b.set(job::NAME, AttrValue::Str("sim.sh".into())).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let mut set = AttributeSet::new(JOB_ATTR_DEFS);
        assert!(set.set(job::PRIORITY, AttrValue::Str("high".into())).is_err());
        assert!(set.set("no_such_attribute", AttrValue::Long(1)).is_err());
    }

    #[test]
    fn test_set_resource() {
        let mut set = AttributeSet::new(JOB_ATTR_DEFS);
        set.set_resource(job::RESOURCE_LIST, "ncpus", "2").unwrap();
        set.set_resource(job::RESOURCE_LIST, "mem", "2gb").unwrap();
        match set.get(job::RESOURCE_LIST) {
            Some(AttrValue::Resources(map)) => {
                assert_eq!(map.len(), 2);
                assert_eq!(map["ncpus"], "2");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
