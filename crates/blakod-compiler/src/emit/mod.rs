//! Bytecode emitter.
//!
//! The [`BytecodeEmitter`] writes the instructions of one message handler.
//! Branches name symbolic [`Label`]s; their offsets are filled in by
//! [`BytecodeEmitter::finish`] once every label has been bound.
//!
//! # Example
//!
//! ```
//! use blakod_compiler::bytecode::{BranchTest, OpCode};
//! use blakod_compiler::emit::{BytecodeEmitter, Dest, Operand};
//!
//! let mut emitter = BytecodeEmitter::new();
//! emitter.set_line(1);
//! let done = emitter.new_label();
//! emitter.emit_goto_if(BranchTest::False, Operand::local(0), done);
//! emitter.emit_move(Dest::Local(1), Operand::number(5));
//! emitter.bind_label(done);
//! emitter.emit_return_null();
//!
//! let chunk = emitter.finish().unwrap();
//! chunk.assert_opcodes(&[OpCode::GotoIfFalseL, OpCode::MoveL, OpCode::ReturnNull]);
//! ```

mod jumps;

use blakod_core::Literal;
use log::trace;
use thiserror::Error;

use crate::bytecode::{BranchTest, BytecodeChunk, DestKind, OpCode, SourceKind};
use jumps::JumpManager;

/// A jump target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub(crate) u32);

/// Where an instruction stores its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dest {
    Local(u32),
    Property(u32),
}

impl Dest {
    pub fn kind(&self) -> DestKind {
        match self {
            Dest::Local(_) => DestKind::Local,
            Dest::Property(_) => DestKind::Property,
        }
    }

    pub fn slot(&self) -> u32 {
        match *self {
            Dest::Local(slot) | Dest::Property(slot) => slot,
        }
    }

    /// The same slot read as a source.
    pub fn as_operand(&self) -> Operand {
        match *self {
            Dest::Local(slot) => Operand::local(slot),
            Dest::Property(slot) => Operand::property(slot),
        }
    }
}

/// A source operand: a tagged constant or a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operand {
    pub kind: SourceKind,
    pub value: u32,
}

impl Operand {
    pub fn constant(literal: Literal) -> Self {
        Self {
            kind: SourceKind::Constant,
            value: literal.encode(),
        }
    }

    pub fn number(n: i32) -> Self {
        Self::constant(Literal::Number(n))
    }

    pub fn local(slot: u32) -> Self {
        Self {
            kind: SourceKind::Local,
            value: slot,
        }
    }

    pub fn property(slot: u32) -> Self {
        Self {
            kind: SourceKind::Property,
            value: slot,
        }
    }

    pub fn classvar(slot: u32) -> Self {
        Self {
            kind: SourceKind::ClassVar,
            value: slot,
        }
    }

    pub fn is_constant(&self) -> bool {
        self.kind == SourceKind::Constant
    }
}

/// Errors finishing a handler's code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EmitError {
    #[error("continue statement not inside a loop")]
    NotInLoop,
    #[error("break statement not inside a loop or switch")]
    NotInBreakable,
    #[error("jump to label {0} that was never placed")]
    UnboundLabel(u32),
}

#[derive(Debug, Clone, Copy)]
struct Fixup {
    /// Offset of the branch opcode.
    branch: usize,
    /// Offset of its `i32` operand.
    operand: usize,
    label: Label,
}

/// Emits the instructions of one handler.
#[derive(Debug, Default)]
pub struct BytecodeEmitter {
    chunk: BytecodeChunk,
    /// Bound offset of each label.
    labels: Vec<Option<usize>>,
    fixups: Vec<Fixup>,
    jumps: JumpManager,
    current_line: u32,
}

impl BytecodeEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set current source line for debug info.
    ///
    /// All subsequent instructions will be associated with this line number.
    pub fn set_line(&mut self, line: u32) {
        self.current_line = line;
    }

    pub fn current_line(&self) -> u32 {
        self.current_line
    }

    pub fn current_offset(&self) -> usize {
        self.chunk.current_offset()
    }

    // ==========================================================================
    // Data movement and operators
    // ==========================================================================

    fn op(&mut self, op: OpCode) {
        trace!("{:5} {:?}", self.chunk.len(), op);
        self.chunk.write_op(op, self.current_line);
    }

    fn source(&mut self, operand: Operand) {
        self.chunk.write_source(operand.kind, operand.value);
    }

    pub fn emit_move(&mut self, dest: Dest, src: Operand) {
        self.op(OpCode::mov(dest.kind()));
        self.chunk.write_u32(dest.slot());
        self.source(src);
    }

    /// Emit an instruction of the form `op dest src...`.
    pub fn emit_store(&mut self, op: OpCode, dest: Dest, sources: &[Operand]) {
        self.op(op);
        self.chunk.write_u32(dest.slot());
        for &src in sources {
            self.source(src);
        }
    }

    pub fn emit_is_class_const(&mut self, dest: Dest, object: Operand, class_id: u32) {
        self.op(OpCode::is_class_const(dest.kind()));
        self.chunk.write_u32(dest.slot());
        self.source(object);
        self.chunk.write_u32(class_id);
    }

    /// Emit a builtin call. `dest` is `None` when the result is discarded.
    pub fn emit_call(
        &mut self,
        function: u8,
        dest: Option<Dest>,
        args: &[Operand],
        settings: &[(u32, Operand)],
    ) {
        let op = OpCode::call(dest.map(|d| d.kind()), !settings.is_empty());
        self.op(op);
        self.chunk.write_byte(function);
        if let Some(dest) = dest {
            self.chunk.write_u32(dest.slot());
        }
        self.chunk.write_byte(args.len() as u8);
        for &arg in args {
            self.source(arg);
        }
        if !settings.is_empty() {
            self.chunk.write_byte(settings.len() as u8);
            for &(param, value) in settings {
                self.chunk.write_u32(param);
                self.source(value);
            }
        }
    }

    pub fn emit_return(&mut self, value: Operand) {
        self.op(OpCode::Return);
        self.source(value);
    }

    pub fn emit_return_null(&mut self) {
        self.op(OpCode::ReturnNull);
    }

    pub fn emit_propagate(&mut self) {
        self.op(OpCode::Propagate);
    }

    // ==========================================================================
    // Labels and branches
    // ==========================================================================

    pub fn new_label(&mut self) -> Label {
        let label = Label(self.labels.len() as u32);
        self.labels.push(None);
        label
    }

    /// Place a label at the current offset.
    pub fn bind_label(&mut self, label: Label) {
        self.labels[label.0 as usize] = Some(self.chunk.current_offset());
    }

    fn branch_to(&mut self, label: Label) {
        let branch = self.chunk.current_offset() - 1;
        let operand = self.chunk.current_offset();
        self.chunk.write_i32(0);
        self.fixups.push(Fixup {
            branch,
            operand,
            label,
        });
    }

    pub fn emit_goto(&mut self, label: Label) {
        self.op(OpCode::Goto);
        self.branch_to(label);
    }

    pub fn emit_goto_if(&mut self, test: BranchTest, value: Operand, label: Label) {
        self.op(OpCode::goto_if(test, value.kind));
        self.branch_to(label);
        self.chunk.write_u32(value.value);
    }

    // ==========================================================================
    // Loop Control (Break/Continue)
    // ==========================================================================

    /// Enter a loop whose `break` goes to `break_to` and `continue` to
    /// `continue_to`.
    pub fn enter_loop(&mut self, break_to: Label, continue_to: Label) {
        self.jumps.enter_loop(break_to, continue_to);
    }

    /// Enter a switch whose `break` goes to `break_to`.
    pub fn enter_switch(&mut self, break_to: Label) {
        self.jumps.enter_switch(break_to);
    }

    /// Leave the innermost loop or switch.
    pub fn exit_breakable(&mut self) {
        self.jumps.exit();
    }

    pub fn emit_break(&mut self) -> Result<(), EmitError> {
        let target = self.jumps.break_target().ok_or(EmitError::NotInBreakable)?;
        self.emit_goto(target);
        Ok(())
    }

    pub fn emit_continue(&mut self) -> Result<(), EmitError> {
        let target = self.jumps.continue_target().ok_or(EmitError::NotInLoop)?;
        self.emit_goto(target);
        Ok(())
    }

    pub fn in_loop(&self) -> bool {
        self.jumps.in_loop()
    }

    // ==========================================================================
    // Finalization
    // ==========================================================================

    /// Resolve every branch and return the chunk.
    pub fn finish(mut self) -> Result<BytecodeChunk, EmitError> {
        for fixup in &self.fixups {
            let target = self.labels[fixup.label.0 as usize]
                .ok_or(EmitError::UnboundLabel(fixup.label.0))?;
            let relative = target as i64 - fixup.branch as i64;
            self.chunk.patch_i32(fixup.operand, relative as i32);
        }
        Ok(self.chunk)
    }

    pub fn code_size(&self) -> usize {
        self.chunk.len()
    }
}
