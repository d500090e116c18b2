//! The BOF image handed to the runtime.
//!
//! ```text
//! "BOF\xFF" u32 version  str source_name  u32 num_classes
//!   per class: u32 class_id u32 superclass_id
//!     u32 num_resources { u32 id u32 n { u32 lang str value } }
//!     u32 num_classvars u32 n { u32 slot u32 value }
//!     u32 num_properties u32 n { u32 slot u32 value }
//!     u32 num_handlers { u32 message_id i32 comment u8 nparams { u32 param_id u32 default }
//!                        u32 num_locals u32 code_len bytes u32 nlines { u32 offset u32 line } }
//! u32 num_debug_strings { str }
//! ```
//!
//! `str` is a `u32` byte length followed by UTF-8. Every integer is
//! little-endian. Only values a class declares itself are listed; the
//! runtime takes the rest from the superclass.

use blakod_core::limits::{BOF_MAGIC, BOF_VERSION};

use super::chunk::BytecodeChunk;

/// A compiled image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BofImage {
    pub version: u32,
    pub source_name: String,
    pub classes: Vec<ClassImage>,
    pub debug_strings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassImage {
    pub class_id: u32,
    pub superclass_id: u32,
    pub resources: Vec<ResourceImage>,
    /// Classvar count, inherited ones included.
    pub num_classvars: u32,
    /// `(slot, encoded value)` for classvars this class sets.
    pub classvars: Vec<(u32, u32)>,
    /// Property count, inherited ones included.
    pub num_properties: u32,
    /// `(slot, encoded value)` for properties this class sets.
    pub properties: Vec<(u32, u32)>,
    pub handlers: Vec<HandlerImage>,
}

impl ClassImage {
    pub fn handler(&self, message_id: u32) -> Option<&HandlerImage> {
        self.handlers.iter().find(|h| h.message_id == message_id)
    }

    pub fn classvar(&self, slot: u32) -> Option<u32> {
        lookup(&self.classvars, slot)
    }

    pub fn property(&self, slot: u32) -> Option<u32> {
        lookup(&self.properties, slot)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceImage {
    pub id: u32,
    /// `(language id, text)`.
    pub variants: Vec<(u32, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerImage {
    pub message_id: u32,
    /// Debug string index of the handler comment, or -1.
    pub comment: i32,
    /// `(parameter id, encoded default)`.
    pub params: Vec<(u32, u32)>,
    /// Local slots, parameters and temporaries included.
    pub num_locals: u32,
    pub chunk: BytecodeChunk,
}

impl BofImage {
    pub fn new(source_name: &str) -> Self {
        Self {
            version: BOF_VERSION,
            source_name: source_name.to_string(),
            classes: Vec::new(),
            debug_strings: Vec::new(),
        }
    }

    pub fn class(&self, class_id: u32) -> Option<&ClassImage> {
        self.classes.iter().find(|c| c.class_id == class_id)
    }

    /// Serialize the image.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ImageWriter::default();
        w.bytes(&BOF_MAGIC);
        w.u32(self.version);
        w.str(&self.source_name);
        w.len(self.classes.len());
        for class in &self.classes {
            w.u32(class.class_id);
            w.u32(class.superclass_id);

            w.len(class.resources.len());
            for resource in &class.resources {
                w.u32(resource.id);
                w.len(resource.variants.len());
                for (language, text) in &resource.variants {
                    w.u32(*language);
                    w.str(text);
                }
            }

            for (count, values) in [
                (class.num_classvars, &class.classvars),
                (class.num_properties, &class.properties),
            ] {
                w.u32(count);
                w.len(values.len());
                for &(slot, value) in values {
                    w.u32(slot);
                    w.u32(value);
                }
            }

            w.len(class.handlers.len());
            for handler in &class.handlers {
                w.u32(handler.message_id);
                w.u32(handler.comment as u32);
                w.bytes(&[handler.params.len() as u8]);
                for &(param, default) in &handler.params {
                    w.u32(param);
                    w.u32(default);
                }
                w.u32(handler.num_locals);
                w.len(handler.chunk.len());
                w.bytes(handler.chunk.code());
                w.len(handler.chunk.lines().len());
                for &(offset, line) in handler.chunk.lines() {
                    w.u32(offset);
                    w.u32(line);
                }
            }
        }
        w.len(self.debug_strings.len());
        for s in &self.debug_strings {
            w.str(s);
        }
        w.out
    }
}

fn lookup(values: &[(u32, u32)], slot: u32) -> Option<u32> {
    values.iter().find(|(s, _)| *s == slot).map(|(_, v)| *v)
}

#[derive(Default)]
struct ImageWriter {
    out: Vec<u8>,
}

impl ImageWriter {
    fn bytes(&mut self, bytes: &[u8]) {
        self.out.extend_from_slice(bytes);
    }

    fn u32(&mut self, value: u32) {
        self.out.extend_from_slice(&value.to_le_bytes());
    }

    fn len(&mut self, len: usize) {
        self.u32(len as u32);
    }

    fn str(&mut self, s: &str) {
        self.len(s.len());
        self.bytes(s.as_bytes());
    }
}
