//! Label resolution for labeled `break`/`continue`.
//!
//! A labeled statement pushes an entry here before compiling its body so
//! that a `break label;`/`continue label;` anywhere inside — however
//! deeply nested in further loops or blocks — can find the right jump
//! list without threading the label through every intermediate call.

use escargot_bytecode::buffer::CodePosition;

use crate::ast::SourceIndex;
use crate::error::{CompileError, CompileResult};

/// A labeled statement's `continue label` destination. Mirrors
/// `crate::context::LoopContinueTarget`: a labeled non-loop statement
/// rejects `continue` outright, a labeled `while`/`for`/`for-in`/`for-of`
/// knows its target up front, and a labeled `do-while` must defer until its
/// test position is known.
#[derive(Debug, Clone)]
pub enum LabelContinueTarget {
    NotIteration,
    Known(CodePosition),
    Pending(Vec<CodePosition>),
}

struct LabelFrame {
    label: String,
    continue_target: LabelContinueTarget,
    break_jumps: Vec<CodePosition>,
}

/// Stack of active label scopes for one function body.
#[derive(Default)]
pub struct LabelledJumpResolver {
    frames: Vec<LabelFrame>,
}

impl LabelledJumpResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, label: String, continue_target: LabelContinueTarget) {
        self.frames.push(LabelFrame { label, continue_target, break_jumps: Vec::new() });
    }

    /// Leaves the innermost label scope, returning the break jump sites
    /// collected for it so the caller can patch them to the statement's end.
    pub fn exit(&mut self) -> Vec<CodePosition> {
        self.frames.pop().map(|f| f.break_jumps).unwrap_or_default()
    }

    pub fn record_break(&mut self, label: &str, at: CodePosition, source: SourceIndex) -> CompileResult<()> {
        for frame in self.frames.iter_mut().rev() {
            if frame.label == label {
                frame.break_jumps.push(at);
                return Ok(());
            }
        }
        Err(CompileError::UnknownBreakLabel { label: label.to_string(), at: source })
    }

    /// Resolves a `continue label`'s jump site. Returns the target to patch
    /// to immediately if known, or `None` if the jump was recorded against a
    /// still-pending `do-while` test position.
    pub fn record_continue(&mut self, label: &str, at: CodePosition, source: SourceIndex) -> CompileResult<Option<CodePosition>> {
        for frame in self.frames.iter_mut().rev() {
            if frame.label == label {
                return match &mut frame.continue_target {
                    LabelContinueTarget::NotIteration => Err(CompileError::ContinueNotInIteration { at: source }),
                    LabelContinueTarget::Known(target) => Ok(Some(*target)),
                    LabelContinueTarget::Pending(jumps) => {
                        jumps.push(at);
                        Ok(None)
                    }
                };
            }
        }
        Err(CompileError::UnknownContinueLabel { label: label.to_string(), at: source })
    }

    /// Converts the innermost frame's pending continue target to `target`,
    /// returning every jump site recorded while it was pending.
    pub fn resolve_pending_continue(&mut self, target: CodePosition) -> Vec<CodePosition> {
        if let Some(frame) = self.frames.last_mut() {
            if let LabelContinueTarget::Pending(jumps) = &mut frame.continue_target {
                let drained = std::mem::take(jumps);
                frame.continue_target = LabelContinueTarget::Known(target);
                return drained;
            }
        }
        Vec::new()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn break_jump_recorded_against_matching_label() {
        let mut resolver = LabelledJumpResolver::new();
        resolver.enter("outer".to_string(), LabelContinueTarget::Known(0));
        resolver.record_break("outer", 42, SourceIndex(0)).unwrap();
        let jumps = resolver.exit();
        assert_eq!(jumps, vec![42]);
    }

    #[test]
    fn unknown_break_label_is_rejected() {
        let mut resolver = LabelledJumpResolver::new();
        resolver.enter("outer".to_string(), LabelContinueTarget::Known(0));
        let err = resolver.record_break("missing", 1, SourceIndex(0));
        assert!(matches!(err, Err(CompileError::UnknownBreakLabel { .. })));
    }

    #[test]
    fn continue_target_requires_a_loop_label() {
        let mut resolver = LabelledJumpResolver::new();
        resolver.enter("block_only".to_string(), LabelContinueTarget::NotIteration);
        let err = resolver.record_continue("block_only", 1, SourceIndex(0));
        assert!(matches!(err, Err(CompileError::ContinueNotInIteration { .. })));
    }

    #[test]
    fn pending_continue_is_resolved_once_target_known() {
        let mut resolver = LabelledJumpResolver::new();
        resolver.enter("outer".to_string(), LabelContinueTarget::Pending(Vec::new()));
        let deferred = resolver.record_continue("outer", 7, SourceIndex(0)).unwrap();
        assert_eq!(deferred, None);
        let drained = resolver.resolve_pending_continue(99);
        assert_eq!(drained, vec![7]);
        let resolved = resolver.record_continue("outer", 8, SourceIndex(0)).unwrap();
        assert_eq!(resolved, Some(99));
    }
}
