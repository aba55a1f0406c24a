//! The compilation context threaded through every `emit_*` call.
//!
//! Bundles the pieces a single function body's codegen needs: the
//! instruction buffer (with its push/peek/patch contract), the register
//! allocator, the scope stack, the label resolver, this function's literal
//! pools, and the "recursive statement stack" — used both to route
//! break/continue through enclosing `finally` blocks and to compute a
//! pause site's tail-data length.

use escargot_bytecode::buffer::{CodePosition, InstrBuffer};
use escargot_bytecode::literal_pool::{GlobalSlotTable, NumeralPool, StringPool, TaggedTemplateTable};
use escargot_bytecode::module::ByteCodeBlock;
use escargot_bytecode::opcode::{BinaryOp, GlobalSlotId, Instr, JumpTarget, PauseKind, Scalar, StringId};
use escargot_bytecode::pause::PauseSiteTable;
use escargot_bytecode::register::NUMERAL_CACHE_LIMIT;
use escargot_bytecode::Reg;

use crate::ast::SourceIndex;
use crate::codegen::labels::LabelledJumpResolver;
use crate::error::{CompileError, CompileResult};
use crate::functions::FunctionQueue;
use crate::register::RegisterAllocator;
use crate::scope::{ParamInitState, ScopeStack};

/// A loop's `continue` destination: known immediately for `while`/`for`/
/// `for-in`/`for-of` (the test sits before the body), deferred for
/// `do-while` (the test sits after the body, so a `continue` seen while
/// compiling the body records its jump site and waits).
#[derive(Debug, Clone)]
pub enum LoopContinueTarget {
    Known(CodePosition),
    Pending(Vec<CodePosition>),
}

/// Compile-time toggles.
#[derive(Debug, Clone, Copy)]
pub struct CodegenOptions {
    pub enable_tail_call: bool,
    pub emit_debug_line_info: bool,
    pub max_cached_numerals: u32,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            enable_tail_call: false,
            emit_debug_line_info: false,
            max_cached_numerals: NUMERAL_CACHE_LIMIT,
        }
    }
}

/// One entry on the "recursive statement stack": an enclosing construct
/// that an abrupt completion (`break`/`continue`/`return`/pause) must
/// route through before reaching its real destination.
#[derive(Debug, Clone)]
pub enum RecursiveStatement {
    Try {
        has_finalizer: bool,
        /// `true` for the compiler-synthesized `try`/`finally` wrapping a
        /// `for-of` body or a destructuring pattern's iterator consumption
        /// (see `codegen::iterator::with_iterator_close`) rather than a
        /// user-authored `try` statement. A `continue` passes straight
        /// through one of these without running its finalizer — closing
        /// the iterator is only required when the loop's iteration itself
        /// is abandoned, not when it simply moves to the next value.
        synthetic_iterator_close: bool,
        /// Jump sites recorded against this frame by a `break`/`continue`
        /// that has to run this `finally` before reaching its real target.
        pending_exits: Vec<PendingFinallyExit>,
    },
    Loop {
        continue_target: LoopContinueTarget,
        break_jumps: Vec<CodePosition>,
    },
    Switch {
        break_jumps: Vec<CodePosition>,
    },
}

/// A `break`/`continue` jump site that had to be redirected into an
/// enclosing `finally` rather than straight to its real target. `exit_id`
/// is a process-wide-unique tag (never 0, which is reserved for "this
/// finally is running because of ordinary completion") written into the
/// shared exit-selector register right before the jump; once the finally
/// has run, [`CodegenContext::dispatch_pending_exits`] compares the
/// selector against each pending exit's id and forwards the matching one
/// toward its real destination.
#[derive(Debug, Clone, Copy)]
pub struct PendingFinallyExit {
    pub jump_at: CodePosition,
    pub exit_id: i32,
    pub is_continue: bool,
    pub source: SourceIndex,
}

enum BreakRoute {
    Direct(usize),
    ThroughFinally(usize),
}

enum ContinueRoute {
    Known(CodePosition),
    Pending(usize),
    ThroughFinally(usize),
}

/// Per-function codegen state. Holds a reference to the program-wide
/// [`FunctionQueue`] so a nested `function`/method/arrow discovered mid-walk
/// can be enqueued without this function's own compilation being reentrant.
pub struct CodegenContext<'a> {
    pub options: CodegenOptions,
    pub buffer: InstrBuffer,
    pub registers: RegisterAllocator,
    pub scopes: ScopeStack,
    pub labels: LabelledJumpResolver,
    pub param_init: ParamInitState,
    pub recursive_statements: Vec<RecursiveStatement>,
    pub strings: StringPool,
    pub numerals: NumeralPool,
    pub tagged_templates: TaggedTemplateTable,
    pub global_slots: GlobalSlotTable,
    pub pause_sites: PauseSiteTable,
    pub functions: &'a mut FunctionQueue,
    pub is_generator: bool,
    pub is_async: bool,
    pub has_super: bool,
    pub in_derived_constructor: bool,
    /// Set once, right after this context is built for a program's
    /// top-level body — never for a nested function. Gates whether
    /// `pattern::bind_pattern` resolves a freshly declared binding as
    /// [`crate::scope::IdentifierResolution::Global`].
    pub is_top_level: bool,
    pub code_positions: Vec<(u32, u32)>,
    exit_selector: Option<Reg>,
    next_exit_id: i32,
}

impl<'a> CodegenContext<'a> {
    pub fn new(options: CodegenOptions, functions: &'a mut FunctionQueue) -> Self {
        let mut scopes = ScopeStack::new();
        scopes.push(crate::scope::ScopeKind::Function);
        Self {
            options,
            buffer: InstrBuffer::new(),
            registers: RegisterAllocator::new(),
            scopes,
            labels: LabelledJumpResolver::new(),
            param_init: ParamInitState::new(),
            recursive_statements: Vec::new(),
            strings: StringPool::new(),
            numerals: NumeralPool::new(),
            tagged_templates: TaggedTemplateTable::new(),
            global_slots: GlobalSlotTable::new(),
            pause_sites: PauseSiteTable::new(),
            functions,
            is_generator: false,
            is_async: false,
            has_super: false,
            in_derived_constructor: false,
            is_top_level: false,
            code_positions: Vec::new(),
            exit_selector: None,
            next_exit_id: 0,
        }
    }

    /// Returns the slot `name` is cached under, assigning a fresh one on
    /// first reference.
    pub fn global_slot(&mut self, name: &str) -> GlobalSlotId {
        self.global_slots.slot(name)
    }

    pub fn push_code(&mut self, instr: Instr) -> CodePosition {
        self.buffer.push(instr)
    }

    pub fn current_code_size(&self) -> CodePosition {
        self.buffer.current_code_size()
    }

    pub fn last_code_position(&self) -> Option<CodePosition> {
        self.buffer.last_code_position()
    }

    pub fn patch_jump_to_here(&mut self, at: CodePosition) {
        self.buffer.patch_jump_to_here(at);
    }

    pub fn patch_jump(&mut self, at: CodePosition, target: CodePosition) {
        self.buffer.patch_jump(at, target);
    }

    pub fn intern(&mut self, s: &str) -> StringId {
        self.strings.intern(s)
    }

    /// Tail-data length a pause site at the current point in compilation
    /// would need: one slot per enclosing try/finally frame on the
    /// recursive statement stack.
    pub fn current_tail_data_length(&self) -> u32 {
        self.recursive_statements
            .iter()
            .filter(|s| matches!(s, RecursiveStatement::Try { .. }))
            .count() as u32
            * 4
    }

    /// Lazily allocates the stable register that carries a pending
    /// finally-exit id across a `break`/`continue`'s jump into an enclosing
    /// finally and the dispatch code that runs once it completes. One
    /// register is shared by every `try`/`finally` in the function: ids are
    /// minted from a single monotonic counter, so a stale value left over
    /// from an unrelated `try` never collides with another's exit id.
    fn exit_selector_register(&mut self) -> CompileResult<Reg> {
        if let Some(reg) = self.exit_selector {
            return Ok(reg);
        }
        let reg = self.registers.allocate_variable()?;
        self.exit_selector = Some(reg);
        Ok(reg)
    }

    fn mint_exit_id(&mut self) -> i32 {
        self.next_exit_id += 1;
        self.next_exit_id
    }

    fn push_pending_exit(&mut self, try_index: usize, jump_at: CodePosition, exit_id: i32, is_continue: bool, source: SourceIndex) {
        if let RecursiveStatement::Try { pending_exits, .. } = &mut self.recursive_statements[try_index] {
            pending_exits.push(PendingFinallyExit { jump_at, exit_id, is_continue, source });
        }
    }

    /// Walks the recursive-statement stack looking for the nearest loop or
    /// switch frame, noting the innermost `try`-with-`finally` frame (if
    /// any) crossed along the way.
    fn scan_break_route(&self, source: SourceIndex) -> CompileResult<BreakRoute> {
        let mut crossed = None;
        for (i, frame) in self.recursive_statements.iter().enumerate().rev() {
            match frame {
                RecursiveStatement::Loop { .. } | RecursiveStatement::Switch { .. } => {
                    return Ok(match crossed {
                        Some(try_index) => BreakRoute::ThroughFinally(try_index),
                        None => BreakRoute::Direct(i),
                    });
                }
                RecursiveStatement::Try { has_finalizer: true, .. } if crossed.is_none() => crossed = Some(i),
                RecursiveStatement::Try { .. } => {}
            }
        }
        Err(CompileError::BreakNotInLoopOrSwitch { at: source })
    }

    /// Same as [`Self::scan_break_route`], but for `continue`: only `Loop`
    /// frames are targets (a `continue` passes transparently through a
    /// `switch`), and a synthetic iterator-close `try` is never counted as
    /// crossed.
    fn scan_continue_route(&self, source: SourceIndex) -> CompileResult<ContinueRoute> {
        let mut crossed = None;
        for (i, frame) in self.recursive_statements.iter().enumerate().rev() {
            match frame {
                RecursiveStatement::Loop { continue_target, .. } => {
                    return Ok(match crossed {
                        Some(try_index) => ContinueRoute::ThroughFinally(try_index),
                        None => match continue_target {
                            LoopContinueTarget::Known(target) => ContinueRoute::Known(*target),
                            LoopContinueTarget::Pending(_) => ContinueRoute::Pending(i),
                        },
                    });
                }
                RecursiveStatement::Try { has_finalizer: true, synthetic_iterator_close: false, .. } if crossed.is_none() => {
                    crossed = Some(i);
                }
                RecursiveStatement::Try { .. } | RecursiveStatement::Switch { .. } => {}
            }
        }
        Err(CompileError::ContinueNotInIteration { at: source })
    }

    pub fn record_pause(&mut self, position: CodePosition, kind: PauseKind) {
        let tail_data_length = self.current_tail_data_length();
        self.pause_sites.record(position, kind, tail_data_length);
    }

    /// Records a `(code position, source index)` pair for the debug line
    /// table. A no-op unless [`CodegenOptions::emit_debug_line_info`] is
    /// set, and skipped if `source` hasn't advanced past the last recorded
    /// entry — consecutive instructions from the same source statement
    /// collapse to a single table row.
    pub fn record_debug_position(&mut self, position: CodePosition, source: SourceIndex) {
        if !self.options.emit_debug_line_info {
            return;
        }
        if self.code_positions.last().is_some_and(|(_, s)| *s == source.0) {
            return;
        }
        self.code_positions.push((position, source.0));
    }

    /// Patches every pending break jump recorded against the innermost
    /// loop/switch frame to `target`, then pops that frame.
    pub fn patch_pending_breaks(&mut self, target: CodePosition) {
        if let Some(frame) = self.recursive_statements.pop() {
            let jumps = match &frame {
                RecursiveStatement::Loop { break_jumps, .. } => break_jumps.clone(),
                RecursiveStatement::Switch { break_jumps } => break_jumps.clone(),
                RecursiveStatement::Try { .. } => Vec::new(),
            };
            for pos in jumps {
                self.buffer.patch_jump(pos, target);
            }
        }
    }

    /// Emits an unlabeled `break`: a plain jump recorded against the
    /// target loop/switch frame directly, or — if one or more
    /// `try`-with-`finally` frames sit between here and that target — a
    /// selector-set plus a jump into the nearest one's finally, to be
    /// forwarded onward by [`Self::dispatch_pending_exits`] once it runs.
    pub fn emit_unlabeled_break(&mut self, source: SourceIndex) -> CompileResult<()> {
        match self.scan_break_route(source)? {
            BreakRoute::Direct(frame_index) => {
                let at = self.push_code(Instr::Jump(JumpTarget::Unresolved));
                match &mut self.recursive_statements[frame_index] {
                    RecursiveStatement::Loop { break_jumps, .. } | RecursiveStatement::Switch { break_jumps } => {
                        break_jumps.push(at);
                    }
                    RecursiveStatement::Try { .. } => unreachable!("scan_break_route only returns Direct for Loop/Switch"),
                }
            }
            BreakRoute::ThroughFinally(try_index) => {
                let exit_id = self.mint_exit_id();
                let selector = self.exit_selector_register()?;
                self.push_code(Instr::LoadLiteral { dst: selector, value: Scalar::I32(exit_id) });
                let at = self.push_code(Instr::Jump(JumpTarget::Unresolved));
                self.push_pending_exit(try_index, at, exit_id, false, source);
            }
        }
        Ok(())
    }

    /// Emits an unlabeled `continue`, with the same direct-vs-through-finally
    /// split as [`Self::emit_unlabeled_break`].
    pub fn emit_unlabeled_continue(&mut self, source: SourceIndex) -> CompileResult<()> {
        match self.scan_continue_route(source)? {
            ContinueRoute::Known(target) => {
                let at = self.push_code(Instr::Jump(JumpTarget::Unresolved));
                self.patch_jump(at, target);
            }
            ContinueRoute::Pending(frame_index) => {
                let at = self.push_code(Instr::Jump(JumpTarget::Unresolved));
                if let RecursiveStatement::Loop { continue_target: LoopContinueTarget::Pending(jumps), .. } =
                    &mut self.recursive_statements[frame_index]
                {
                    jumps.push(at);
                }
            }
            ContinueRoute::ThroughFinally(try_index) => {
                let exit_id = self.mint_exit_id();
                let selector = self.exit_selector_register()?;
                self.push_code(Instr::LoadLiteral { dst: selector, value: Scalar::I32(exit_id) });
                let at = self.push_code(Instr::Jump(JumpTarget::Unresolved));
                self.push_pending_exit(try_index, at, exit_id, true, source);
            }
        }
        Ok(())
    }

    /// Routes an already-emitted jump `forward` (created while dispatching
    /// a just-completed finally) toward its real destination, crossing
    /// further `try` frames if necessary. `exit_id` and `is_continue`
    /// carry over from the [`PendingFinallyExit`] being forwarded.
    fn forward_exit_jump(&mut self, forward: CodePosition, exit_id: i32, is_continue: bool, source: SourceIndex) -> CompileResult<()> {
        if is_continue {
            match self.scan_continue_route(source)? {
                ContinueRoute::Known(target) => self.patch_jump(forward, target),
                ContinueRoute::Pending(frame_index) => {
                    if let RecursiveStatement::Loop { continue_target: LoopContinueTarget::Pending(jumps), .. } =
                        &mut self.recursive_statements[frame_index]
                    {
                        jumps.push(forward);
                    }
                }
                ContinueRoute::ThroughFinally(try_index) => self.push_pending_exit(try_index, forward, exit_id, true, source),
            }
        } else {
            match self.scan_break_route(source)? {
                BreakRoute::Direct(frame_index) => match &mut self.recursive_statements[frame_index] {
                    RecursiveStatement::Loop { break_jumps, .. } | RecursiveStatement::Switch { break_jumps } => {
                        break_jumps.push(forward);
                    }
                    RecursiveStatement::Try { .. } => unreachable!("scan_break_route only returns Direct for Loop/Switch"),
                },
                BreakRoute::ThroughFinally(try_index) => self.push_pending_exit(try_index, forward, exit_id, false, source),
            }
        }
        Ok(())
    }

    /// Called once a `try`'s finalizer (real or synthetic) has finished
    /// compiling, with the `pending_exits` its own frame collected. For
    /// each one: compares the shared exit selector against its id, and on
    /// a match, resets the selector to 0 (so a later, unrelated pass
    /// through this same finally doesn't re-trigger on a stale value) and
    /// forwards the jump toward its real destination. Falls straight
    /// through to ordinary post-finally code when nothing matches.
    pub fn dispatch_pending_exits(&mut self, pending_exits: &[PendingFinallyExit]) -> CompileResult<()> {
        if pending_exits.is_empty() {
            return Ok(());
        }
        let selector = self.exit_selector_register()?;
        for exit in pending_exits {
            let expected = self.registers.push_scratch()?;
            self.push_code(Instr::LoadLiteral { dst: expected, value: Scalar::I32(exit.exit_id) });
            let matches = self.registers.push_scratch()?;
            self.push_code(Instr::BinaryOp { op: BinaryOp::StrictEqual, lhs: selector, rhs: expected, dst: matches });
            let skip = self.push_code(Instr::JumpIfFalse { cond: matches, target: JumpTarget::Unresolved });

            let reset = self.registers.push_scratch()?;
            self.push_code(Instr::LoadLiteral { dst: reset, value: Scalar::I32(0) });
            self.push_code(Instr::Move { src: reset, dst: selector });
            self.registers.pop_scratch(1);

            let forward = self.push_code(Instr::Jump(JumpTarget::Unresolved));
            self.forward_exit_jump(forward, exit.exit_id, exit.is_continue, exit.source)?;

            self.patch_jump_to_here(skip);
            self.registers.pop_scratch(2);
        }
        Ok(())
    }

    /// Converts the innermost loop frame's pending continue target to
    /// `target`, returning every jump site recorded while it was pending so
    /// the caller can patch them. Used once a `do-while`'s test position is
    /// known.
    pub fn resolve_pending_loop_continue(&mut self, target: CodePosition) -> Vec<CodePosition> {
        for frame in self.recursive_statements.iter_mut().rev() {
            if let RecursiveStatement::Loop { continue_target, .. } = frame {
                if let LoopContinueTarget::Pending(jumps) = continue_target {
                    let drained = std::mem::take(jumps);
                    *continue_target = LoopContinueTarget::Known(target);
                    return drained;
                }
                return Vec::new();
            }
        }
        Vec::new()
    }

    pub fn finish(self, name: String, param_count: u32) -> CompileResult<ByteCodeBlock> {
        let mut block = ByteCodeBlock::new(name, param_count);
        block.required_register_file_size_in_value_size = self.registers.required_register_file_size();
        block.needs_extended_execution_state = self.is_generator || self.is_async;
        block.strings = self.strings;
        block.numerals = self.numerals;
        block.tagged_templates = self.tagged_templates;
        block.global_slots = self.global_slots;
        block.pause_sites = self.pause_sites;
        block.code_positions = self.code_positions;
        block.code = self.buffer.into_vec();
        Ok(block)
    }
}
