//! Bytecode chunk for one message handler.
//!
//! A `BytecodeChunk` holds the instruction bytes of a handler along with a
//! line table mapping code offsets to source lines.

use super::opcode::{CallShape, Layout, OpCode, SourceKind};

/// Compiled bytecode for a single message handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BytecodeChunk {
    code: Vec<u8>,
    /// `(offset, line)`, one entry each time the line changes.
    lines: Vec<(u32, u32)>,
}

/// A decoded source operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Source {
    pub kind: SourceKind,
    pub value: u32,
}

/// An instruction located in a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub offset: usize,
    pub op: OpCode,
    /// Size in bytes, opcode included.
    pub size: usize,
}

impl BytecodeChunk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write an opcode, recording its line.
    pub fn write_op(&mut self, op: OpCode, line: u32) {
        if self.lines.last().is_none_or(|&(_, last)| last != line) {
            self.lines.push((self.code.len() as u32, line));
        }
        self.code.push(op.into());
    }

    pub fn write_byte(&mut self, byte: u8) {
        self.code.push(byte);
    }

    /// Write a 32-bit operand (little-endian).
    pub fn write_u32(&mut self, value: u32) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_source(&mut self, kind: SourceKind, value: u32) {
        self.write_byte(kind.into());
        self.write_u32(value);
    }

    /// Overwrite a 32-bit operand written earlier.
    pub fn patch_i32(&mut self, offset: usize, value: i32) {
        self.code[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// The line table.
    pub fn lines(&self) -> &[(u32, u32)] {
        &self.lines
    }

    /// Source line of the instruction covering `offset`.
    pub fn line_at(&self, offset: usize) -> Option<u32> {
        self.lines
            .iter()
            .take_while(|&&(start, _)| start as usize <= offset)
            .last()
            .map(|&(_, line)| line)
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn read_byte(&self, offset: usize) -> Option<u8> {
        self.code.get(offset).copied()
    }

    pub fn read_u32(&self, offset: usize) -> Option<u32> {
        let bytes = self.code.get(offset..offset + 4)?;
        Some(u32::from_le_bytes(bytes.try_into().ok()?))
    }

    pub fn read_i32(&self, offset: usize) -> Option<i32> {
        self.read_u32(offset).map(|v| v as i32)
    }

    pub fn read_source(&self, offset: usize) -> Option<Source> {
        let kind = SourceKind::try_from(self.read_byte(offset)?).ok()?;
        Some(Source {
            kind,
            value: self.read_u32(offset + 1)?,
        })
    }

    pub fn read_op(&self, offset: usize) -> Option<OpCode> {
        self.code.get(offset).and_then(|&b| OpCode::from_u8(b))
    }

    /// Size of the instruction at `offset`, or `None` if the bytes there do
    /// not decode.
    pub fn instruction_size(&self, offset: usize) -> Option<usize> {
        const SRC: usize = 5;
        let op = self.read_op(offset)?;
        let size = match op.layout() {
            Layout::Move | Layout::Unary => 1 + 4 + SRC,
            Layout::Binary => 1 + 4 + SRC + SRC,
            Layout::IsClassConst => 1 + 4 + SRC + 4,
            Layout::Goto => 1 + 4,
            Layout::GotoIf => 1 + 4 + SRC,
            Layout::Return => 1 + SRC,
            Layout::Bare => 1,
            Layout::Call(shape) => {
                let mut at = offset + 2;
                if shape.contains(CallShape::STORE) {
                    at += 4;
                }
                let nargs = self.read_byte(at)? as usize;
                at += 1 + nargs * SRC;
                if shape.contains(CallShape::SETTINGS) {
                    let nsettings = self.read_byte(at)? as usize;
                    at += 1 + nsettings * (4 + SRC);
                }
                at - offset
            }
        };
        (offset + size <= self.code.len()).then_some(size)
    }

    /// Decode the instruction stream.
    pub fn instructions(&self) -> Vec<Instruction> {
        let mut instructions = Vec::new();
        let mut offset = 0;
        while let (Some(op), Some(size)) = (self.read_op(offset), self.instruction_size(offset)) {
            instructions.push(Instruction { offset, op, size });
            offset += size;
        }
        instructions
    }

    /// Opcodes in order, operands dropped.
    pub fn opcodes(&self) -> Vec<OpCode> {
        self.instructions().into_iter().map(|i| i.op).collect()
    }

    /// Absolute target of the branch at `offset`.
    pub fn jump_target(&self, offset: usize) -> Option<usize> {
        let op = self.read_op(offset)?;
        if !op.is_branch() {
            return None;
        }
        let relative = self.read_i32(offset + 1)?;
        usize::try_from(offset as i64 + relative as i64).ok()
    }

    /// Panic unless the opcodes are exactly `expected`. Operands are ignored.
    #[track_caller]
    pub fn assert_opcodes(&self, expected: &[OpCode]) {
        let actual = self.opcodes();
        assert_eq!(
            actual,
            expected,
            "opcode sequence differs\n  wanted: {:?}\n  got:    {:?}",
            expected.iter().map(|op| op.name()).collect::<Vec<_>>(),
            actual.iter().map(|op| op.name()).collect::<Vec<_>>(),
        );
    }

    /// Panic unless `expected` appears as a subsequence of the opcodes.
    #[track_caller]
    pub fn assert_contains_opcodes(&self, expected: &[OpCode]) {
        let actual = self.opcodes();
        let mut wanted = expected.iter().peekable();
        for op in &actual {
            if wanted.next_if(|w| *w == op).is_some() && wanted.peek().is_none() {
                return;
            }
        }
        if wanted.peek().is_some() {
            let missing: Vec<_> = wanted.map(|op| op.name()).collect();
            panic!(
                "opcodes not found in order: {:?}\n  in: {:?}",
                missing,
                actual.iter().map(|op| op.name()).collect::<Vec<_>>(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_chunk_is_empty() {
        let chunk = BytecodeChunk::new();
        assert!(chunk.is_empty());
        assert_eq!(chunk.len(), 0);
        assert!(chunk.lines().is_empty());
    }

    #[test]
    fn operands_are_little_endian() {
        let mut chunk = BytecodeChunk::new();
        chunk.write_op(OpCode::MoveL, 1);
        chunk.write_u32(0x0403_0201);
        chunk.write_source(SourceKind::Constant, 0x1000_0005);

        assert_eq!(&chunk.code()[1..5], &[1, 2, 3, 4]);
        assert_eq!(chunk.read_u32(1), Some(0x0403_0201));
        assert_eq!(
            chunk.read_source(5),
            Some(Source {
                kind: SourceKind::Constant,
                value: 0x1000_0005
            })
        );
    }

    #[test]
    fn line_table_records_changes_only() {
        let mut chunk = BytecodeChunk::new();
        chunk.write_op(OpCode::ReturnNull, 3);
        chunk.write_op(OpCode::ReturnNull, 3);
        chunk.write_op(OpCode::ReturnNull, 4);
        assert_eq!(chunk.lines(), &[(0, 3), (2, 4)]);
        assert_eq!(chunk.line_at(1), Some(3));
        assert_eq!(chunk.line_at(2), Some(4));
    }

    #[test]
    fn patch_and_follow_jump() {
        let mut chunk = BytecodeChunk::new();
        chunk.write_op(OpCode::Goto, 1);
        chunk.write_i32(0);
        chunk.write_op(OpCode::ReturnNull, 1);
        chunk.patch_i32(1, 5);
        assert_eq!(chunk.jump_target(0), Some(5));
        assert_eq!(chunk.jump_target(5), None);
    }

    #[test]
    fn opcodes_with_variable_length_calls() {
        let mut chunk = BytecodeChunk::new();
        chunk.write_op(OpCode::CallStoreLSettings, 1);
        chunk.write_byte(11);
        chunk.write_u32(0);
        chunk.write_byte(2);
        chunk.write_source(SourceKind::Local, 1);
        chunk.write_source(SourceKind::Constant, 0);
        chunk.write_byte(1);
        chunk.write_u32(10005);
        chunk.write_source(SourceKind::Property, 3);
        chunk.write_op(OpCode::Return, 1);
        chunk.write_source(SourceKind::Local, 0);

        assert_eq!(chunk.instruction_size(0), Some(1 + 1 + 4 + 1 + 10 + 1 + 9));
        chunk.assert_opcodes(&[OpCode::CallStoreLSettings, OpCode::Return]);
    }

    #[test]
    fn truncated_instruction_stops_decoding() {
        let mut chunk = BytecodeChunk::new();
        chunk.write_op(OpCode::ReturnNull, 1);
        chunk.write_op(OpCode::Goto, 1);
        assert_eq!(chunk.opcodes(), vec![OpCode::ReturnNull]);
    }

    #[test]
    #[should_panic(expected = "opcode sequence differs")]
    fn assert_opcodes_failure() {
        let mut chunk = BytecodeChunk::new();
        chunk.write_op(OpCode::ReturnNull, 1);
        chunk.assert_opcodes(&[OpCode::Propagate]);
    }

    #[test]
    fn assert_contains_opcodes_success() {
        let mut chunk = BytecodeChunk::new();
        chunk.write_op(OpCode::Propagate, 1);
        chunk.write_op(OpCode::ReturnNull, 1);
        chunk.assert_contains_opcodes(&[OpCode::ReturnNull]);
    }
}
