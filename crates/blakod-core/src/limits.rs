//! Compiler limits and well-known id values.
//!
//! These mirror the numbers the runtime was built against; changing any of
//! them changes the image format and requires bumping [`BOF_VERSION`].

/// Version tag written into every bytecode image header.
///
/// Version history:
/// - 7: binary/unary/call opcodes split by destination (local or property),
///   goto opcodes split by operand kind.
/// - 8: calls check whether their result must be stored; `IsClass` opcodes.
/// - 9: null-test goto opcodes for fused `x = $` / `x <> $` conditions and
///   the `foreach` emptiness test.
/// - 10: call opcodes split on whether named arguments are present.
/// - 11: `First`, `Rest` and `GetClass` as unary opcodes.
pub const BOF_VERSION: u32 = 11;

/// Magic bytes at the start of a bytecode image.
pub const BOF_MAGIC: [u8; 4] = *b"BOF\xFF";

/// Lowest id handed out to user-defined classes, messages and parameters.
/// Builtin ids are lower.
pub const IDBASE: u32 = 10000;

/// Lowest id handed out to user-defined resources.
pub const RESOURCEBASE: u32 = 20000;

/// Superclass id of a class at the root of the hierarchy.
pub const NO_SUPERCLASS: u32 = 0;

/// Maximum number of errors before compilation gives up.
pub const MAXERRORS: usize = 25;

/// Maximum length of a builtin function name.
pub const MAXFNAME: usize = 32;

/// Maximum number of arguments (expressions and settings) to one call.
pub const MAXARGS: usize = 30;

/// Maximum number of identifiers held by one scope.
pub const TABLESIZE: usize = 3037;

/// Number of resource language ids; valid ids are `0..MAX_LANGUAGE_ID`.
pub const MAX_LANGUAGE_ID: usize = 184;

/// Smallest integer representable in a 28-bit tagged value.
pub const KOD_INT_MIN: i32 = -(1 << 27);

/// Largest integer representable in a 28-bit tagged value.
pub const KOD_INT_MAX: i32 = (1 << 27) - 1;

/// Property slot holding the object itself.
pub const SELF_PROPERTY: u32 = 0;

/// Ids of classes the server treats specially.
pub mod builtin_class {
    pub const USER: u32 = 1;
    pub const SYSTEM: u32 = 4;
    pub const ADMIN: u32 = 22;
    pub const DM: u32 = 25;
    pub const CREATOR: u32 = 26;
    pub const SETTINGS: u32 = 27;
    pub const REALTIME: u32 = 28;
    pub const EVENTENGINE: u32 = 29;
    pub const ESCAPED_CONVICT: u32 = 30;
    pub const TEST: u32 = 31;
    pub const MAX: u32 = 31;
}

/// Wrap an integer into the signed 28-bit range the runtime stores.
pub fn wrap_kod_int(value: i64) -> i32 {
    (((value as u64) << 36) as i64 >> 36) as i32
}

/// Whether a value fits in a tagged integer without wrapping.
pub fn fits_kod_int(value: i64) -> bool {
    (KOD_INT_MIN as i64..=KOD_INT_MAX as i64).contains(&value)
}
