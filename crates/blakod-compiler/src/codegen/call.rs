//! Builtin calls.
//!
//! ```text
//! Send(self, @Go, #speed=3)     CallStoreLSettings  fn t0  1 self @Go  1 speed 3
//! Post(self, @Go)               CallNoStore         fn     2 self @Go
//! ```
//!
//! The opcode encodes whether a result is stored and whether named
//! arguments follow, so a call without settings carries no settings count.

use blakod_core::CompilationError;

use super::{HandlerCompiler, Result};
use crate::ast::CallExpr;
use crate::emit::Dest;

impl<'a> HandlerCompiler<'a> {
    /// Emit a call, storing the result in `dest` if given.
    pub(super) fn gen_call(&mut self, call: &CallExpr, dest: Option<Dest>, line: u32) -> Result<()> {
        let mut args = Vec::new();
        for expr in call.expressions() {
            args.push(self.operand(expr)?);
        }
        let mut settings = Vec::new();
        for (param, value) in call.settings() {
            let value = self.operand(value)?;
            settings.push((self.session.id_of(param), value));
        }
        if args.len() > u8::MAX as usize || settings.len() > u8::MAX as usize {
            return self.session.fail(CompilationError::EncodingOverflow {
                detail: format!(
                    "call to {} has {} arguments and {} settings, at most {} of each",
                    call.function,
                    args.len(),
                    settings.len(),
                    u8::MAX
                ),
                line,
            });
        }
        self.emitter.set_line(line);
        self.emitter
            .emit_call(call.function.opcode, dest, &args, &settings);
        Ok(())
    }

    /// A call whose result is discarded.
    pub(super) fn gen_call_stmt(&mut self, call: &CallExpr, line: u32) -> Result<()> {
        if call.function.store_required() {
            return self.session.fail(CompilationError::DiscardedResult {
                function: call.function.name.to_string(),
                line,
            });
        }
        self.gen_call(call, None, line)
    }
}
