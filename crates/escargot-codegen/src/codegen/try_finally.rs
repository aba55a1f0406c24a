//! `try`/`catch`/`finally` lowering.
//!
//! A single `TryOperation` instruction carries three independent jump
//! targets (`catch_position`, `try_catch_end_position`,
//! `finally_end_position`), unlike every other branching instruction which
//! carries exactly one. `InstrBuffer::patch_jump` patches all of an
//! instruction's targets to the same value, so the three fields here are
//! patched individually through `ctx.buffer.peek_mut` once each is known.
//!
//! A `break`/`continue` inside the try body that targets something outside
//! it can't just jump straight there — the finalizer has to run first. Those
//! get routed through `ctx.emit_unlabeled_break`/`emit_unlabeled_continue`
//! into this try's `pending_exits`, patched to land right where the
//! finalizer starts, and re-dispatched by `ctx.dispatch_pending_exits` once
//! it's compiled.

use escargot_bytecode::opcode::{Instr, JumpTarget};

use crate::ast::TryStatement;
use crate::context::{CodegenContext, RecursiveStatement};
use crate::error::CompileResult;
use crate::scope::{BindingKind, ScopeKind};

use super::pattern::bind_pattern;
use super::stmt::emit_statement;

pub fn emit_try(ctx: &mut CodegenContext<'_>, stmt: &TryStatement) -> CompileResult<()> {
    let has_catch = stmt.handler.is_some();
    let has_finalizer = stmt.finalizer.is_some();
    let catch_value_register = ctx.registers.push_scratch()?;

    let try_op_pos = ctx.push_code(Instr::TryOperation {
        has_catch,
        has_finalizer,
        catch_value_register,
        catch_position: JumpTarget::Unresolved,
        try_catch_end_position: JumpTarget::Unresolved,
        finally_end_position: JumpTarget::Unresolved,
    });

    ctx.recursive_statements.push(RecursiveStatement::Try {
        has_finalizer,
        synthetic_iterator_close: false,
        pending_exits: Vec::new(),
    });
    ctx.scopes.push(ScopeKind::Block);
    for s in &stmt.block.body {
        emit_statement(ctx, s)?;
    }
    ctx.scopes.pop();

    let to_try_catch_end = ctx.push_code(Instr::Jump(JumpTarget::Unresolved));
    let catch_position = ctx.current_code_size();

    if let Some(handler) = &stmt.handler {
        ctx.scopes.push(ScopeKind::CatchParam);
        if let Some(param) = &handler.param {
            bind_pattern(ctx, param, catch_value_register, BindingKind::CatchParam)?;
        }
        for s in &handler.body.body {
            emit_statement(ctx, s)?;
        }
        ctx.scopes.pop();
    }

    ctx.patch_jump_to_here(to_try_catch_end);
    let try_catch_end_position = ctx.current_code_size();

    // The finalizer runs outside the try frame: a `break`/`continue`/`return`
    // in its body is not itself protected by this try's catch/finally. Any
    // break/continue that had to cross *this* frame to reach its real target
    // lands here too — right where the finalizer is about to start — with
    // its exit id already parked in the selector register.
    let pending_exits = match ctx.recursive_statements.pop() {
        Some(RecursiveStatement::Try { pending_exits, .. }) => pending_exits,
        _ => unreachable!("the frame just pushed for this try is still on top"),
    };
    for exit in &pending_exits {
        ctx.patch_jump(exit.jump_at, try_catch_end_position);
    }

    if let Some(finalizer) = &stmt.finalizer {
        ctx.scopes.push(ScopeKind::Block);
        for s in &finalizer.body {
            emit_statement(ctx, s)?;
        }
        ctx.scopes.pop();
    }

    ctx.dispatch_pending_exits(&pending_exits)?;
    let finally_end_position = ctx.current_code_size();

    // Without a catch clause, an in-flight exception still has to run the
    // finalizer (if any) before propagating, so the runtime's exception
    // dispatch also lands at try_catch_end_position in that case.
    let resolved_catch_position = if has_catch { catch_position } else { try_catch_end_position };

    match ctx.buffer.peek_mut(try_op_pos) {
        Instr::TryOperation { catch_position, try_catch_end_position: tce, finally_end_position: fe, .. } => {
            *catch_position = JumpTarget::Offset(resolved_catch_position);
            *tce = JumpTarget::Offset(try_catch_end_position);
            *fe = JumpTarget::Offset(finally_end_position);
        }
        _ => unreachable!("try_op_pos was just written with a TryOperation"),
    }

    ctx.registers.pop_scratch(1);
    Ok(())
}
