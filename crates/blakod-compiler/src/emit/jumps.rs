//! Break and continue targets for nested loops and switches.
//!
//! Targets are symbolic labels; the emitter binds them as code is laid out
//! and resolves offsets when the handler is finished.

use super::Label;

/// Manages jump targets for control flow.
///
/// Tracks a stack of breakable contexts to support nested loops and
/// switches with proper break/continue handling.
#[derive(Debug, Default)]
pub struct JumpManager {
    /// Innermost last.
    breakables: Vec<Breakable>,
}

#[derive(Debug, Clone, Copy)]
enum Breakable {
    Loop { break_to: Label, continue_to: Label },
    Switch { break_to: Label },
}

impl JumpManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_loop(&mut self, break_to: Label, continue_to: Label) {
        self.breakables.push(Breakable::Loop {
            break_to,
            continue_to,
        });
    }

    /// Switches support break but not continue.
    pub fn enter_switch(&mut self, break_to: Label) {
        self.breakables.push(Breakable::Switch { break_to });
    }

    pub fn exit(&mut self) {
        self.breakables.pop();
    }

    /// Target of a `break` in the current context.
    pub fn break_target(&self) -> Option<Label> {
        self.breakables.last().map(|b| match *b {
            Breakable::Loop { break_to, .. } | Breakable::Switch { break_to } => break_to,
        })
    }

    /// Target of a `continue`: the innermost enclosing loop, looking
    /// through switches.
    pub fn continue_target(&self) -> Option<Label> {
        self.breakables.iter().rev().find_map(|b| match *b {
            Breakable::Loop { continue_to, .. } => Some(continue_to),
            Breakable::Switch { .. } => None,
        })
    }

    pub fn in_loop(&self) -> bool {
        self.continue_target().is_some()
    }

    pub fn depth(&self) -> usize {
        self.breakables.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_manager_not_in_loop() {
        let manager = JumpManager::new();
        assert!(!manager.in_loop());
        assert_eq!(manager.depth(), 0);
        assert_eq!(manager.break_target(), None);
    }

    #[test]
    fn nested_loops() {
        let mut manager = JumpManager::new();
        manager.enter_loop(Label(0), Label(1));
        manager.enter_loop(Label(2), Label(3));
        assert_eq!(manager.break_target(), Some(Label(2)));
        assert_eq!(manager.continue_target(), Some(Label(3)));

        manager.exit();
        assert_eq!(manager.continue_target(), Some(Label(1)));
    }

    #[test]
    fn continue_looks_through_switch() {
        let mut manager = JumpManager::new();
        manager.enter_loop(Label(0), Label(1));
        manager.enter_switch(Label(2));
        assert_eq!(manager.break_target(), Some(Label(2)));
        assert_eq!(manager.continue_target(), Some(Label(1)));
    }

    #[test]
    fn switch_alone_has_no_continue() {
        let mut manager = JumpManager::new();
        manager.enter_switch(Label(0));
        assert!(!manager.in_loop());
        assert_eq!(manager.continue_target(), None);
    }
}
