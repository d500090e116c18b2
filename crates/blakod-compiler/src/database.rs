//! Kodbase snapshots.
//!
//! The kodbase records what earlier compilations defined: global
//! identifiers with their ids, and the full property/classvar layout of
//! every class. Loading it lets a session keep ids stable and detect when a
//! recompiled class changes a layout that existing subclasses depend on.
//!
//! ## Format
//!
//! One record per line, fields separated by whitespace, `#` starts a
//! comment:
//!
//! ```text
//! C <name> <id> <superclass id> [dirty]   class
//! P <name> <slot>                         property of the preceding class
//! V <name> <slot>                         classvar of the preceding class
//! M <name> <id>                           message
//! A <name> <id>                           parameter
//! R <name> <id>                           resource
//! ```
//!
//! A class marked `dirty` inherits from a class whose layout changed after
//! it was compiled; it keeps the mark until it is compiled again.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use blakod_core::KodbaseError;
use blakod_core::limits::{IDBASE, NO_SUPERCLASS, RESOURCEBASE};

use crate::layout::ClassLayout;

/// A class as recorded in the kodbase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KodbaseClass {
    pub name: String,
    pub id: u32,
    pub superclass: u32,
    /// Every property slot, inherited ones included.
    pub properties: Vec<(String, u32)>,
    /// Every classvar slot, inherited ones included.
    pub classvars: Vec<(String, u32)>,
    /// Code must be regenerated before the layout above can be trusted.
    pub dirty: bool,
}

impl KodbaseClass {
    pub fn layout(&self) -> ClassLayout {
        ClassLayout::from_slots(self.id, self.superclass, &self.properties, &self.classvars)
    }

    pub fn from_layout(name: &str, layout: &ClassLayout) -> Self {
        Self {
            name: name.to_string(),
            id: layout.class_id,
            superclass: layout.superclass_id,
            properties: layout.properties().to_vec(),
            classvars: layout.classvars().to_vec(),
            dirty: false,
        }
    }
}

/// A kodbase snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Kodbase {
    pub classes: Vec<KodbaseClass>,
    pub messages: Vec<(String, u32)>,
    pub parameters: Vec<(String, u32)>,
    pub resources: Vec<(String, u32)>,
}

impl Kodbase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Result<Self, KodbaseError> {
        let mut kodbase = Kodbase::new();
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let content = raw.split('#').next().unwrap_or("").trim();
            if content.is_empty() {
                continue;
            }
            let fields: Vec<&str> = content.split_whitespace().collect();
            match fields[0] {
                "C" => {
                    let (name, id, superclass, dirty) = match fields[..] {
                        [_, name, id, superclass] => (name, id, superclass, false),
                        [_, name, id, superclass, "dirty"] => (name, id, superclass, true),
                        _ => {
                            return Err(KodbaseError::Malformed {
                                expected: "C <name> <id> <superclass id> [dirty]",
                                line,
                            });
                        }
                    };
                    kodbase.classes.push(KodbaseClass {
                        name: name.to_string(),
                        id: ranged(id, IDS, "a class id of at least 10000", line)?,
                        superclass: superclass_id(superclass, line)?,
                        properties: Vec::new(),
                        classvars: Vec::new(),
                        dirty,
                    });
                }
                record @ ("P" | "V") => {
                    let (name, slot) = pair(&fields, SLOTS, "<name> <slot>", line)?;
                    let Some(class) = kodbase.classes.last_mut() else {
                        return Err(KodbaseError::OrphanMember {
                            record: if record == "P" { 'P' } else { 'V' },
                            line,
                        });
                    };
                    if record == "P" {
                        class.properties.push((name, slot));
                    } else {
                        class.classvars.push((name, slot));
                    }
                }
                "M" => kodbase.messages.push(pair(&fields, IDS, "M <name> <id>", line)?),
                "A" => kodbase.parameters.push(pair(&fields, IDS, "A <name> <id>", line)?),
                "R" => kodbase
                    .resources
                    .push(pair(&fields, RESOURCE_IDS, "R <name> <id>", line)?),
                other => {
                    return Err(KodbaseError::UnknownRecord {
                        record: other.to_string(),
                        line,
                    });
                }
            }
        }
        Ok(kodbase)
    }

    pub fn class(&self, id: u32) -> Option<&KodbaseClass> {
        self.classes.iter().find(|c| c.id == id)
    }

    pub fn class_by_name(&self, name: &str) -> Option<&KodbaseClass> {
        self.classes
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
            && self.messages.is_empty()
            && self.parameters.is_empty()
            && self.resources.is_empty()
    }
}

impl FromStr for Kodbase {
    type Err = KodbaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kodbase::parse(s)
    }
}

impl fmt::Display for Kodbase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for class in &self.classes {
            write!(f, "C {} {} {}", class.name, class.id, class.superclass)?;
            if class.dirty {
                f.write_str(" dirty")?;
            }
            writeln!(f)?;
            for (name, slot) in &class.properties {
                writeln!(f, "P {name} {slot}")?;
            }
            for (name, slot) in &class.classvars {
                writeln!(f, "V {name} {slot}")?;
            }
        }
        for (name, id) in &self.messages {
            writeln!(f, "M {name} {id}")?;
        }
        for (name, id) in &self.parameters {
            writeln!(f, "A {name} {id}")?;
        }
        for (name, id) in &self.resources {
            writeln!(f, "R {name} {id}")?;
        }
        Ok(())
    }
}

// The top value is excluded so the next id or slot after any loaded one
// still fits in a u32.
const IDS: RangeInclusive<u32> = IDBASE..=u32::MAX - 1;
const RESOURCE_IDS: RangeInclusive<u32> = RESOURCEBASE..=u32::MAX - 1;
const SLOTS: RangeInclusive<u32> = 0..=u32::MAX - 1;

fn ranged(
    field: &str,
    range: RangeInclusive<u32>,
    expected: &'static str,
    line: usize,
) -> Result<u32, KodbaseError> {
    field
        .parse()
        .ok()
        .filter(|value| range.contains(value))
        .ok_or(KodbaseError::Malformed { expected, line })
}

fn superclass_id(field: &str, line: usize) -> Result<u32, KodbaseError> {
    const EXPECTED: &str = "a superclass id of 0 or at least 10000";
    match field.parse::<u32>() {
        Ok(NO_SUPERCLASS) => Ok(NO_SUPERCLASS),
        _ => ranged(field, IDS, EXPECTED, line),
    }
}

fn pair(
    fields: &[&str],
    range: RangeInclusive<u32>,
    expected: &'static str,
    line: usize,
) -> Result<(String, u32), KodbaseError> {
    match fields {
        [_, name, value] => Ok((name.to_string(), ranged(value, range, expected, line)?)),
        _ => Err(KodbaseError::Malformed { expected, line }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Member;

    const SAMPLE: &str = "\
# kodbase written by blakod
C Object 10000 0
P piFlags 1
V vrName 0
C Monster 10001 10000
P piFlags 1
P piHits 2
V vrName 0
M Constructor 10002
A level 10003
R monster_name_rsc 20000
";

    #[test]
    fn parse_sample() {
        let kodbase = Kodbase::parse(SAMPLE).unwrap();
        assert_eq!(kodbase.classes.len(), 2);
        let monster = kodbase.class_by_name("monster").unwrap();
        assert_eq!(monster.superclass, 10000);
        assert_eq!(monster.properties.len(), 2);
        assert_eq!(kodbase.messages, vec![("Constructor".to_string(), 10002)]);
        assert_eq!(kodbase.parameters[0].1, 10003);
        assert_eq!(kodbase.resources[0].1, 20000);

        let layout = monster.layout();
        assert_eq!(layout.member("piHits"), Some(Member::Property(2)));
        assert_eq!(layout.num_properties, 2);
        assert_eq!(layout.num_classvars, 1);
    }

    #[test]
    fn display_round_trips() {
        let mut kodbase = Kodbase::parse(SAMPLE).unwrap();
        kodbase.classes[1].dirty = true;
        let text = kodbase.to_string();
        assert!(text.contains("C Monster 10001 10000 dirty\n"));
        let again: Kodbase = text.parse().unwrap();
        assert_eq!(kodbase, again);
        assert!(!again.classes[0].dirty);
    }

    #[test]
    fn errors_carry_line_numbers() {
        assert_eq!(
            Kodbase::parse("C Foo 10000\n"),
            Err(KodbaseError::Malformed {
                expected: "C <name> <id> <superclass id> [dirty]",
                line: 1
            })
        );
        assert_eq!(
            Kodbase::parse("\nP piX 1\n"),
            Err(KodbaseError::OrphanMember { record: 'P', line: 2 })
        );
        assert!(matches!(
            Kodbase::parse("X foo 1"),
            Err(KodbaseError::UnknownRecord { line: 1, .. })
        ));
        assert!(Kodbase::parse("M Foo abc").is_err());
    }

    #[test]
    fn out_of_range_values_are_malformed() {
        for text in [
            "M Foo 4294967295\n",
            "A level 4294967295\n",
            "R foo_rsc 4294967295\n",
            "C Foo 4294967295 0\n",
            "C Foo 10000 4294967295\n",
            "C Foo 10000 0\nV viX 4294967295\n",
            "C Foo 10000 0\nP piX 4294967295\n",
            "M Foo 42\n",
            "R foo_rsc 10000\n",
            "C Foo 10000 17\n",
        ] {
            assert!(
                matches!(Kodbase::parse(text), Err(KodbaseError::Malformed { .. })),
                "{text:?} parsed"
            );
        }
    }

    #[test]
    fn largest_accepted_slot_builds_a_layout() {
        let kodbase = Kodbase::parse("C Foo 10000 0\nV viX 4294967294\n").unwrap();
        let layout = kodbase.classes[0].layout();
        assert_eq!(layout.num_classvars, u32::MAX);
    }
}
