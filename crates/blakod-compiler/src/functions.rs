//! Builtin function table.
//!
//! Every call in Blakod invokes one of the runtime's builtin functions. The
//! table gives each function its call opcode, whether its return value must
//! be stored, and the shape of its argument list.
//!
//! `First`, `Rest`, `GetClass` and `IsClass` are operators with their own
//! opcodes and do not appear here.

use std::fmt;

/// Whether a call's result must be stored somewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreRequirement {
    /// Called for its side effects; the result may be dropped.
    Optional,
    /// Only useful for its result; calling it as a statement is an error.
    Required,
}

/// One element of a function's parameter pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Exactly one positional expression.
    Expression,
    /// Any number of positional expressions.
    Expressions,
    /// Exactly one named argument.
    Setting,
    /// Any number of named arguments.
    Settings,
}

/// Shape of a single call argument, as seen by the pattern check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    Expression,
    Setting,
}

/// A function provided by the runtime.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct BuiltinFunction {
    pub name: &'static str,
    /// Function number written into call instructions.
    pub opcode: u8,
    pub store: StoreRequirement,
    pub params: &'static [ParamKind],
}

impl fmt::Display for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl BuiltinFunction {
    pub fn store_required(&self) -> bool {
        self.store == StoreRequirement::Required
    }

    /// Match an argument list against the parameter pattern.
    ///
    /// On mismatch returns a description of the problem.
    pub fn check_arguments(&self, args: &[ArgShape]) -> Result<(), String> {
        let mut next = 0;
        for (position, param) in self.params.iter().enumerate() {
            match param {
                ParamKind::Expression | ParamKind::Setting => {
                    let wanted = if *param == ParamKind::Expression {
                        ArgShape::Expression
                    } else {
                        ArgShape::Setting
                    };
                    match args.get(next) {
                        Some(shape) if *shape == wanted => next += 1,
                        Some(_) => {
                            return Err(format!(
                                "argument {} must be {}",
                                next + 1,
                                describe(wanted)
                            ));
                        }
                        None => {
                            let needed = self.params[position..]
                                .iter()
                                .filter(|p| matches!(p, ParamKind::Expression | ParamKind::Setting))
                                .count();
                            return Err(format!(
                                "expected at least {} more argument(s)",
                                needed
                            ));
                        }
                    }
                }
                ParamKind::Expressions => {
                    while args.get(next) == Some(&ArgShape::Expression) {
                        next += 1;
                    }
                }
                ParamKind::Settings => {
                    while args.get(next) == Some(&ArgShape::Setting) {
                        next += 1;
                    }
                }
            }
        }
        if next < args.len() {
            return Err(format!(
                "unexpected {} at argument {}",
                describe(args[next]),
                next + 1
            ));
        }
        Ok(())
    }
}

fn describe(shape: ArgShape) -> &'static str {
    match shape {
        ArgShape::Expression => "an expression",
        ArgShape::Setting => "a named argument",
    }
}

/// Find a builtin by name (case-insensitive).
pub fn lookup(name: &str) -> Option<&'static BuiltinFunction> {
    BUILTIN_FUNCTIONS
        .iter()
        .find(|f| f.name.eq_ignore_ascii_case(name))
}

/// Find a builtin by its call opcode.
pub fn by_opcode(opcode: u8) -> Option<&'static BuiltinFunction> {
    BUILTIN_FUNCTIONS.iter().find(|f| f.opcode == opcode)
}

use ParamKind::{Expression as E, Expressions as ES, Settings as SS};
use StoreRequirement::{Optional, Required};

macro_rules! builtin {
    ($name:literal, $opcode:literal, $store:ident, [$($param:ident),*]) => {
        BuiltinFunction {
            name: $name,
            opcode: $opcode,
            store: $store,
            params: &[$($param),*],
        }
    };
}

/// All builtin functions, grouped as the runtime groups them.
pub static BUILTIN_FUNCTIONS: &[BuiltinFunction] = &[
    // Objects and messages
    builtin!("Create", 1, Required, [E, SS]),
    builtin!("IsObject", 2, Required, [E]),
    builtin!("Send", 11, Optional, [E, E, SS]),
    builtin!("Post", 12, Optional, [E, E, SS]),
    builtin!("SendList", 13, Optional, [E, E, E, SS]),
    builtin!("SendListBreak", 14, Optional, [E, E, E, SS]),
    builtin!("SendListByClass", 15, Optional, [E, E, E, E, SS]),
    builtin!("SendListByClassBreak", 16, Optional, [E, E, E, E, SS]),
    builtin!("SetClassVar", 17, Optional, [E, E, E]),
    // Logging and persistence
    builtin!("GodLog", 21, Optional, [ES]),
    builtin!("Debug", 22, Optional, [ES]),
    builtin!("SaveGame", 23, Optional, []),
    builtin!("LoadGame", 24, Optional, [E]),
    builtin!("RecordStat", 25, Optional, [ES]),
    // Client packets and sessions
    builtin!("AddPacket", 31, Optional, [ES]),
    builtin!("SendPacket", 32, Optional, [E]),
    builtin!("SendCopyPacket", 33, Optional, [E]),
    builtin!("ClearPacket", 34, Optional, []),
    builtin!("GetInactiveTime", 35, Required, [E]),
    builtin!("GetSessionIP", 36, Required, [E]),
    builtin!("RecycleUser", 37, Optional, [E]),
    // Strings and resources
    builtin!("StringEqual", 41, Required, [E, E]),
    builtin!("StringContain", 42, Required, [E, E]),
    builtin!("SetResource", 43, Optional, [E, E]),
    builtin!("ParseString", 44, Optional, [E, E, E]),
    builtin!("SetString", 45, Optional, [E, E]),
    builtin!("CreateString", 46, Required, []),
    builtin!("IsString", 47, Required, [E]),
    builtin!("StringSubstitute", 48, Optional, [E, E, E]),
    builtin!("AppendTempString", 49, Optional, [E]),
    builtin!("ClearTempString", 50, Optional, []),
    builtin!("GetTempString", 51, Required, []),
    builtin!("StringLength", 52, Required, [E]),
    builtin!("StringConsistsOf", 53, Required, [E, E]),
    builtin!("StringToNumber", 54, Required, [E]),
    // Timers
    builtin!("CreateTimer", 61, Required, [E, E, E]),
    builtin!("DeleteTimer", 62, Optional, [E]),
    builtin!("GetTimeRemaining", 63, Required, [E]),
    builtin!("IsTimer", 64, Required, [E]),
    // Rooms
    builtin!("CreateRoomData", 71, Required, [E]),
    builtin!("FreeRoom", 72, Optional, [E]),
    builtin!("RoomData", 73, Required, [E]),
    builtin!("CanMoveInRoomBSP", 74, Required, [E, E, E, E, E, E]),
    builtin!("LineOfSightBSP", 75, Required, [E, E, E, E, E, E, E]),
    // Lists
    builtin!("AppendListElem", 81, Required, [E, E]),
    builtin!("Cons", 82, Required, [E, E]),
    builtin!("Length", 83, Required, [E]),
    builtin!("Last", 84, Required, [E]),
    builtin!("Nth", 85, Required, [E, E]),
    builtin!("IsListMatch", 86, Required, [E, E]),
    builtin!("List", 87, Required, [ES]),
    builtin!("IsList", 88, Required, [E]),
    builtin!("SetFirst", 89, Optional, [E, E]),
    builtin!("SetNth", 90, Optional, [E, E, E]),
    builtin!("SwapListElem", 91, Optional, [E, E, E]),
    builtin!("InsertListElem", 92, Required, [E, E, E]),
    builtin!("DelListElem", 93, Required, [E, E]),
    builtin!("DelLastListElem", 94, Required, [E]),
    builtin!("FindListElem", 95, Required, [E, E]),
    builtin!("GetListElemByClass", 96, Required, [E, E]),
    builtin!("GetListNode", 97, Required, [E, E, E]),
    builtin!("GetAllListNodesByClass", 98, Required, [E, E, E]),
    builtin!("ListCopy", 99, Required, [E]),
    // Time
    builtin!("GetTime", 111, Required, []),
    builtin!("GetUnixTimeString", 112, Required, []),
    builtin!("GetTickCount", 113, Required, []),
    builtin!("GetDateAndTime", 114, Optional, [E, E, E, E, E, E]),
    // Numbers
    builtin!("Abs", 121, Required, [E]),
    builtin!("Bound", 122, Required, [E, E, E]),
    builtin!("Sqrt", 123, Required, [E]),
    builtin!("Random", 124, Required, [E, E]),
    // Tables
    builtin!("CreateTable", 131, Required, [ES]),
    builtin!("AddTableEntry", 132, Optional, [E, E, E]),
    builtin!("GetTableEntry", 133, Required, [E, E]),
    builtin!("DeleteTableEntry", 134, Optional, [E, E]),
    builtin!("DeleteTable", 135, Optional, [E]),
    builtin!("IsTable", 136, Required, [E]),
];

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    use ArgShape::{Expression as X, Setting as S};

    #[test]
    fn lookup_is_case_insensitive() {
        let send = lookup("send").unwrap();
        assert_eq!(send.name, "Send");
        assert_eq!(lookup("SEND").map(|f| f.opcode), Some(send.opcode));
        assert!(lookup("Teleport").is_none());
    }

    #[test]
    fn names_and_opcodes_are_unique() {
        let mut names = FxHashSet::default();
        let mut opcodes = FxHashSet::default();
        for f in BUILTIN_FUNCTIONS {
            assert!(names.insert(f.name.to_ascii_lowercase()), "{} repeated", f.name);
            assert!(opcodes.insert(f.opcode), "opcode {} repeated", f.opcode);
            assert!(f.name.len() <= blakod_core::limits::MAXFNAME);
        }
        assert_eq!(by_opcode(83).map(|f| f.name), Some("Length"));
    }

    #[test]
    fn send_accepts_settings() {
        let send = lookup("Send").unwrap();
        assert!(send.check_arguments(&[X, X]).is_ok());
        assert!(send.check_arguments(&[X, X, S, S]).is_ok());
        assert!(send.check_arguments(&[X]).is_err());
        assert!(send.check_arguments(&[X, S]).is_err());
    }

    #[test]
    fn fixed_arity() {
        let length = lookup("Length").unwrap();
        assert!(length.check_arguments(&[X]).is_ok());
        let err = length.check_arguments(&[X, X]).unwrap_err();
        assert!(err.contains("argument 2"));
        assert!(length.check_arguments(&[]).is_err());
        assert!(length.check_arguments(&[S]).is_err());
    }

    #[test]
    fn variadic_expressions() {
        let list = lookup("List").unwrap();
        assert!(list.check_arguments(&[]).is_ok());
        assert!(list.check_arguments(&[X, X, X, X]).is_ok());
        assert!(list.check_arguments(&[X, S]).is_err());
    }

    #[test]
    fn store_requirements() {
        assert!(lookup("Length").unwrap().store_required());
        assert!(!lookup("Send").unwrap().store_required());
    }
}
