//! Append-only instruction buffer with forward-jump patching.
//!
//! Mirrors the `push_code` / `peek_code` / `last_code_position` /
//! `current_code_size` contract below: codegen appends
//! instructions as it walks the AST, remembers the position of a
//! branch it just emitted, keeps emitting the branch's body, and once the
//! body's end is known, reaches back into the buffer and patches the
//! branch's `JumpTarget` in place. There is no reinterpret-as-bytes step;
//! positions index directly into the `Vec<Instr>`.

use crate::opcode::{Instr, JumpTarget};

/// A position returned by [`InstrBuffer::push`], opaque outside this crate
/// except for arithmetic codegen needs to do to compute relative targets.
pub type CodePosition = u32;

#[derive(Debug, Default, Clone)]
pub struct InstrBuffer {
    code: Vec<Instr>,
}

impl InstrBuffer {
    pub fn new() -> Self {
        Self { code: Vec::new() }
    }

    /// Appends `instr` and returns the position it was written to, for
    /// later patching via [`InstrBuffer::patch_jump`].
    pub fn push(&mut self, instr: Instr) -> CodePosition {
        let pos = self.code.len() as CodePosition;
        self.code.push(instr);
        pos
    }

    /// The position the *next* `push` will land on — used to compute a
    /// branch target before the branch's destination instruction exists.
    pub fn current_code_size(&self) -> CodePosition {
        self.code.len() as CodePosition
    }

    /// The position of the most recently pushed instruction, or `None` if
    /// the buffer is empty.
    pub fn last_code_position(&self) -> Option<CodePosition> {
        if self.code.is_empty() {
            None
        } else {
            Some(self.code.len() as CodePosition - 1)
        }
    }

    /// Mutable access to the instruction at `pos`, for patching.
    pub fn peek_mut(&mut self, pos: CodePosition) -> &mut Instr {
        &mut self.code[pos as usize]
    }

    /// Patches every [`JumpTarget`] on the instruction at `at` to `target`.
    /// Used when a branch instruction carries exactly one jump target
    /// (the common case); instructions with several independent targets
    /// (e.g. `TryOperation`) are patched field-by-field via `peek_mut`.
    pub fn patch_jump(&mut self, at: CodePosition, target: CodePosition) {
        self.peek_mut(at)
            .for_each_jump_target_mut(|t| *t = JumpTarget::Offset(target));
    }

    /// Patches the jump at `at` to the buffer's current end — the common
    /// "jump to just past here" pattern used for `if`/`while` exits.
    pub fn patch_jump_to_here(&mut self, at: CodePosition) {
        let here = self.current_code_size();
        self.patch_jump(at, here);
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn as_slice(&self) -> &[Instr] {
        &self.code
    }

    pub fn into_vec(self) -> Vec<Instr> {
        self.code
    }

    /// True if every jump-carrying instruction in the buffer has a
    /// resolved target.
    pub fn all_jumps_resolved(&self) -> bool {
        self.code.iter().all(|instr| {
            let mut resolved = true;
            let mut saw_target = false;
            instr.for_each_jump_target_mut_const(|t| {
                saw_target = true;
                if !t.is_resolved() {
                    resolved = false;
                }
            });
            !saw_target || resolved
        })
    }
}

impl Instr {
    /// Read-only variant of `for_each_jump_target_mut`, used by verification
    /// code that only needs to inspect targets, not patch them.
    fn for_each_jump_target_mut_const(&self, mut f: impl FnMut(JumpTarget)) {
        let mut clone = self.clone();
        clone.for_each_jump_target_mut(|t| f(*t));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::Scalar;
    use crate::register::NO_REGISTER;

    #[test]
    fn push_returns_sequential_positions() {
        let mut buf = InstrBuffer::new();
        let a = buf.push(Instr::Nop);
        let b = buf.push(Instr::Nop);
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn patch_jump_to_here_resolves_forward_branch() {
        let mut buf = InstrBuffer::new();
        let branch = buf.push(Instr::JumpIfFalse { cond: 0, target: JumpTarget::Unresolved });
        buf.push(Instr::LoadLiteral { dst: 0, value: Scalar::Undefined });
        buf.patch_jump_to_here(branch);

        match buf.peek_mut(branch) {
            Instr::JumpIfFalse { target, .. } => assert_eq!(*target, JumpTarget::Offset(2)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn all_jumps_resolved_detects_unpatched_branch() {
        let mut buf = InstrBuffer::new();
        buf.push(Instr::JumpIfFalse { cond: 0, target: JumpTarget::Unresolved });
        assert!(!buf.all_jumps_resolved());

        buf.patch_jump(0, 5);
        assert!(buf.all_jumps_resolved());
    }

    #[test]
    fn all_jumps_resolved_ignores_non_jump_instructions() {
        let mut buf = InstrBuffer::new();
        buf.push(Instr::LoadLiteral { dst: NO_REGISTER, value: Scalar::Null });
        buf.push(Instr::End { src: NO_REGISTER });
        assert!(buf.all_jumps_resolved());
    }

    #[test]
    fn last_code_position_tracks_most_recent_push() {
        let mut buf = InstrBuffer::new();
        assert_eq!(buf.last_code_position(), None);
        buf.push(Instr::Nop);
        assert_eq!(buf.last_code_position(), Some(0));
        buf.push(Instr::Nop);
        assert_eq!(buf.last_code_position(), Some(1));
    }
}
