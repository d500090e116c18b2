//! Class layouts: where each property and classvar lives.
//!
//! A layout includes every slot inherited from the superclass chain. Slot 0
//! of the property table is the object itself (`self`); declared properties
//! start at 1. Classvar slots start at 0.
//!
//! ## Overrides
//!
//! A subclass may declare a property with the name of an inherited
//! classvar. The name then refers to a new property slot in that class and
//! in every class derived from it, and the classvar slot is kept so that
//! ancestors still see their classvar.
//!
//! ```text
//! Foo: classvar V = 1      V -> classvar 0
//! Bar (Foo): property V=2  V -> property 1 (overrides classvar 0)
//! Baz (Bar)                V -> property 1
//! ```

use blakod_core::limits::SELF_PROPERTY;
use rustc_hash::FxHashMap;
use unicase::UniCase;
use xxhash_rust::xxh64::xxh64;

/// Name given to property slot 0.
pub const SELF_NAME: &str = "self";

/// What a name in a class refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Member {
    Property(u32),
    ClassVar(u32),
    /// A property that shadows an inherited classvar.
    Override { classvar: u32, property: u32 },
}

impl Member {
    /// The property slot a read or write of this name uses, if any.
    pub fn property_slot(&self) -> Option<u32> {
        match self {
            Member::Property(slot) | Member::Override { property: slot, .. } => Some(*slot),
            Member::ClassVar(_) => None,
        }
    }
}

/// A property/classvar name pair recorded for an override.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OverridePair {
    pub name: String,
    pub classvar: u32,
    pub property: u32,
}

/// Result of declaring a property in a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertySlot {
    /// A slot was added.
    New(u32),
    /// The name was already a property; only its default changes.
    Redeclared(u32),
    /// The name was an inherited classvar, now shadowed by a new slot.
    Override { classvar: u32, property: u32 },
}

impl PropertySlot {
    pub fn slot(&self) -> u32 {
        match *self {
            PropertySlot::New(slot)
            | PropertySlot::Redeclared(slot)
            | PropertySlot::Override { property: slot, .. } => slot,
        }
    }
}

/// Full property and classvar layout of one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLayout {
    pub class_id: u32,
    pub superclass_id: u32,
    /// Properties in this class and all superclasses, not counting `self`.
    pub num_properties: u32,
    /// Classvars in this class and all superclasses.
    pub num_classvars: u32,
    /// Property slots added by this class.
    pub own_new_properties: u32,
    /// Classvar slots added by this class.
    pub own_new_classvars: u32,
    properties: Vec<(String, u32)>,
    classvars: Vec<(String, u32)>,
    overrides: Vec<OverridePair>,
    members: FxHashMap<UniCase<String>, Member>,
}

impl ClassLayout {
    /// Layout of a class with no superclass.
    pub fn root(class_id: u32) -> Self {
        let mut members = FxHashMap::default();
        members.insert(
            UniCase::new(SELF_NAME.to_string()),
            Member::Property(SELF_PROPERTY),
        );
        Self {
            class_id,
            superclass_id: blakod_core::limits::NO_SUPERCLASS,
            num_properties: 0,
            num_classvars: 0,
            own_new_properties: 0,
            own_new_classvars: 0,
            properties: Vec::new(),
            classvars: Vec::new(),
            overrides: Vec::new(),
            members,
        }
    }

    /// Start the layout of a subclass from its superclass's layout.
    pub fn derive(superclass: &ClassLayout, class_id: u32) -> Self {
        let mut layout = superclass.clone();
        layout.class_id = class_id;
        layout.superclass_id = superclass.class_id;
        layout.own_new_properties = 0;
        layout.own_new_classvars = 0;
        layout
    }

    /// Rebuild a layout from stored slots. A name present in both lists is
    /// an override.
    pub fn from_slots(
        class_id: u32,
        superclass_id: u32,
        properties: &[(String, u32)],
        classvars: &[(String, u32)],
    ) -> Self {
        let mut layout = Self::root(class_id);
        layout.superclass_id = superclass_id;
        for (name, slot) in classvars {
            layout.classvars.push((name.clone(), *slot));
            layout
                .members
                .insert(UniCase::new(name.clone()), Member::ClassVar(*slot));
        }
        for (name, slot) in properties {
            layout.properties.push((name.clone(), *slot));
            let key = UniCase::new(name.clone());
            let member = match layout.members.get(&key) {
                Some(Member::ClassVar(classvar)) => {
                    layout.overrides.push(OverridePair {
                        name: name.clone(),
                        classvar: *classvar,
                        property: *slot,
                    });
                    Member::Override {
                        classvar: *classvar,
                        property: *slot,
                    }
                }
                _ => Member::Property(*slot),
            };
            layout.members.insert(key, member);
        }
        layout.properties.sort_by_key(|(_, slot)| *slot);
        layout.classvars.sort_by_key(|(_, slot)| *slot);
        layout.num_properties = layout.properties.iter().map(|(_, s)| *s).max().unwrap_or(0);
        layout.num_classvars = layout
            .classvars
            .iter()
            .map(|(_, s)| s.saturating_add(1))
            .max()
            .unwrap_or(0);
        layout
    }

    pub fn member(&self, name: &str) -> Option<Member> {
        self.members.get(&UniCase::new(name.to_string())).copied()
    }

    /// Declare a classvar.
    ///
    /// Returns the slot and whether it is new. Fails with a description if
    /// the name is an inherited property.
    pub fn declare_classvar(&mut self, name: &str) -> Result<(u32, bool), String> {
        let key = UniCase::new(name.to_string());
        match self.members.get(&key) {
            Some(Member::ClassVar(slot)) => Ok((*slot, false)),
            Some(Member::Property(_)) | Some(Member::Override { .. }) => Err(format!(
                "classvar '{name}' has the name of an inherited property"
            )),
            None => {
                let slot = self.num_classvars;
                self.num_classvars = slot.saturating_add(1);
                self.own_new_classvars += 1;
                self.classvars.push((name.to_string(), slot));
                self.members.insert(key, Member::ClassVar(slot));
                Ok((slot, true))
            }
        }
    }

    /// Declare a property.
    pub fn declare_property(&mut self, name: &str) -> PropertySlot {
        let key = UniCase::new(name.to_string());
        match self.members.get(&key).copied() {
            Some(Member::Property(slot)) | Some(Member::Override { property: slot, .. }) => {
                PropertySlot::Redeclared(slot)
            }
            Some(Member::ClassVar(classvar)) => {
                let property = self.add_property_slot(name);
                self.members
                    .insert(key, Member::Override { classvar, property });
                self.overrides.push(OverridePair {
                    name: name.to_string(),
                    classvar,
                    property,
                });
                PropertySlot::Override { classvar, property }
            }
            None => {
                let slot = self.add_property_slot(name);
                self.members.insert(key, Member::Property(slot));
                PropertySlot::New(slot)
            }
        }
    }

    fn add_property_slot(&mut self, name: &str) -> u32 {
        self.num_properties = self.num_properties.saturating_add(1);
        self.own_new_properties += 1;
        let slot = self.num_properties;
        self.properties.push((name.to_string(), slot));
        slot
    }

    /// Property names and slots, in slot order.
    pub fn properties(&self) -> &[(String, u32)] {
        &self.properties
    }

    /// Classvar names and slots, in slot order.
    pub fn classvars(&self) -> &[(String, u32)] {
        &self.classvars
    }

    /// Overrides in effect for this class, inherited ones included.
    pub fn overrides(&self) -> &[OverridePair] {
        &self.overrides
    }

    pub fn is_override(&self, name: &str) -> bool {
        matches!(self.member(name), Some(Member::Override { .. }))
    }

    /// Hash of the slot assignment, used to detect layout changes.
    pub fn fingerprint(&self) -> u64 {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.superclass_id.to_le_bytes());
        for (tag, entries) in [(b'P', &self.properties), (b'V', &self.classvars)] {
            for (name, slot) in entries {
                bytes.push(tag);
                bytes.extend_from_slice(name.to_ascii_lowercase().as_bytes());
                bytes.push(0);
                bytes.extend_from_slice(&slot.to_le_bytes());
            }
        }
        xxh64(&bytes, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_has_self_only() {
        let layout = ClassLayout::root(10000);
        assert_eq!(layout.member("self"), Some(Member::Property(0)));
        assert_eq!(layout.member("SELF"), Some(Member::Property(0)));
        assert_eq!(layout.num_properties, 0);
        assert_eq!(layout.num_classvars, 0);
    }

    #[test]
    fn derived_counts_accumulate() {
        let mut foo = ClassLayout::root(10000);
        assert_eq!(foo.declare_property("piHits"), PropertySlot::New(1));
        assert_eq!(foo.declare_property("piMana"), PropertySlot::New(2));
        assert_eq!(foo.declare_classvar("vrName"), Ok((0, true)));

        let mut bar = ClassLayout::derive(&foo, 10001);
        assert_eq!(bar.declare_property("piHits"), PropertySlot::Redeclared(1));
        assert_eq!(bar.declare_property("piGold"), PropertySlot::New(3));
        assert_eq!(bar.num_properties, foo.num_properties + bar.own_new_properties);
        assert_eq!(bar.own_new_properties, 1);
        assert_eq!(bar.superclass_id, 10000);
    }

    #[test]
    fn property_over_classvar_is_override() {
        let mut foo = ClassLayout::root(10000);
        foo.declare_classvar("V").unwrap();
        let mut bar = ClassLayout::derive(&foo, 10001);
        assert_eq!(
            bar.declare_property("v"),
            PropertySlot::Override {
                classvar: 0,
                property: 1
            }
        );
        assert_eq!(foo.member("V"), Some(Member::ClassVar(0)));
        assert_eq!(bar.member("V").and_then(|m| m.property_slot()), Some(1));

        let baz = ClassLayout::derive(&bar, 10002);
        assert!(baz.is_override("V"));
        assert_eq!(baz.overrides().len(), 1);
    }

    #[test]
    fn classvar_over_property_is_rejected() {
        let mut foo = ClassLayout::root(10000);
        foo.declare_property("piHits");
        let mut bar = ClassLayout::derive(&foo, 10001);
        assert!(bar.declare_classvar("piHits").is_err());
        assert!(bar.declare_classvar("self").is_err());
    }

    #[test]
    fn slots_round_trip_with_overrides() {
        let mut foo = ClassLayout::root(10000);
        foo.declare_classvar("V").unwrap();
        foo.declare_classvar("W").unwrap();
        let mut bar = ClassLayout::derive(&foo, 10001);
        bar.declare_property("V");
        bar.declare_property("piX");

        let rebuilt =
            ClassLayout::from_slots(10001, 10000, bar.properties(), bar.classvars());
        assert_eq!(rebuilt.member("V"), bar.member("V"));
        assert_eq!(rebuilt.num_properties, 2);
        assert_eq!(rebuilt.num_classvars, 2);
        assert_eq!(rebuilt.fingerprint(), bar.fingerprint());
    }

    #[test]
    fn declaring_past_the_largest_stored_slot_saturates() {
        let props = [("piTop".to_string(), u32::MAX - 1)];
        let vars = [("viTop".to_string(), u32::MAX - 1)];
        let mut layout = ClassLayout::from_slots(10001, 10000, &props, &vars);
        layout.declare_property("piA");
        assert_eq!(layout.declare_property("piB"), PropertySlot::New(u32::MAX));
        assert_eq!(layout.declare_classvar("viA"), Ok((u32::MAX, true)));
    }

    #[test]
    fn fingerprint_tracks_slot_changes() {
        let mut a = ClassLayout::root(10000);
        a.declare_property("piA");
        let mut b = ClassLayout::root(10000);
        b.declare_property("piA");
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.declare_property("piB");
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
