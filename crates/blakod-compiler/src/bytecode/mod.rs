//! Bytecode types for the Blakod compiler.
//!
//! - [`OpCode`]: the instruction set
//! - [`BytecodeChunk`]: compiled bytecode for one message handler
//! - [`BofImage`]: the image written for the runtime

mod chunk;
mod image;
mod opcode;

pub use chunk::{BytecodeChunk, Instruction, Source};
pub use image::{BofImage, ClassImage, HandlerImage, ResourceImage};
pub use opcode::{BranchTest, CallShape, DestKind, Layout, OpCode, SourceKind, StoreOp};
