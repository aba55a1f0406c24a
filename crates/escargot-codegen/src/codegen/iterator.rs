//! Iterator-protocol lowering for `for-in`/`for-of`/`for-await-of`.

use escargot_bytecode::opcode::{Instr, IterArgs, IterKind, JumpTarget};
use escargot_bytecode::Reg;

use crate::ast::{ForBinding, ForInOfStatement};
use crate::codegen::labels::LabelContinueTarget;
use crate::context::{CodegenContext, LoopContinueTarget, RecursiveStatement};
use crate::error::CompileResult;

use super::pattern::{assign_pattern, bind_pattern};
use super::stmt::emit_statement;

/// Runs `body`, then unconditionally closes `iterator_record` in a
/// synthetic `try`/`finally` so a `break`, `throw` or `return` out of
/// `body` still calls `IteratorClose` before propagating — the
/// abrupt-completion step of the iteration protocol. A `continue` is
/// exempt: see [`crate::context::RecursiveStatement::Try::synthetic_iterator_close`].
pub(crate) fn with_iterator_close(
    ctx: &mut CodegenContext<'_>,
    iterator_record: Reg,
    iterator_object: Reg,
    done: Reg,
    body: impl FnOnce(&mut CodegenContext<'_>) -> CompileResult<()>,
) -> CompileResult<()> {
    let catch_value_register = ctx.registers.push_scratch()?;
    let try_op_pos = ctx.push_code(Instr::TryOperation {
        has_catch: false,
        has_finalizer: true,
        catch_value_register,
        catch_position: JumpTarget::Unresolved,
        try_catch_end_position: JumpTarget::Unresolved,
        finally_end_position: JumpTarget::Unresolved,
    });

    ctx.recursive_statements.push(RecursiveStatement::Try {
        has_finalizer: true,
        synthetic_iterator_close: true,
        pending_exits: Vec::new(),
    });
    let body_result = body(ctx);
    let pending_exits = match ctx.recursive_statements.pop() {
        Some(RecursiveStatement::Try { pending_exits, .. }) => pending_exits,
        _ => unreachable!("the frame just pushed for this wrapper is still on top"),
    };
    body_result?;

    let to_finally = ctx.push_code(Instr::Jump(JumpTarget::Unresolved));
    let try_catch_end_position = ctx.current_code_size();
    for exit in &pending_exits {
        ctx.patch_jump(exit.jump_at, try_catch_end_position);
    }
    ctx.patch_jump_to_here(to_finally);

    let close_dst = ctx.registers.push_scratch()?;
    ctx.push_code(Instr::IteratorOperation {
        kind: IterKind::IteratorClose,
        args: IterArgs { src: iterator_record, dst: close_dst, iterator_record, iterator_object, done },
    });
    ctx.registers.pop_scratch(1);

    ctx.dispatch_pending_exits(&pending_exits)?;
    let finally_end_position = ctx.current_code_size();

    match ctx.buffer.peek_mut(try_op_pos) {
        Instr::TryOperation { catch_position, try_catch_end_position: tce, finally_end_position: fe, .. } => {
            *catch_position = JumpTarget::Offset(try_catch_end_position);
            *tce = JumpTarget::Offset(try_catch_end_position);
            *fe = JumpTarget::Offset(finally_end_position);
        }
        _ => unreachable!("try_op_pos was just written with a TryOperation"),
    }
    ctx.registers.pop_scratch(1);
    Ok(())
}

pub fn emit_for_in_of(ctx: &mut CodegenContext<'_>, stmt: &ForInOfStatement, label: Option<&str>) -> CompileResult<()> {
    if stmt.is_of {
        emit_for_of(ctx, stmt, label)
    } else {
        emit_for_in(ctx, stmt, label)
    }
}

fn bind_loop_variable(ctx: &mut CodegenContext<'_>, binding: &ForBinding, value: escargot_bytecode::Reg) -> CompileResult<()> {
    match binding {
        ForBinding::VariableDeclaration(decl) => {
            let kind = match decl.kind {
                crate::ast::VariableKind::Var => crate::scope::BindingKind::Var,
                crate::ast::VariableKind::Let => crate::scope::BindingKind::Let,
                crate::ast::VariableKind::Const => crate::scope::BindingKind::Const,
            };
            bind_pattern(ctx, &decl.declarations[0].id, value, kind)
        }
        ForBinding::Pattern(pattern) => assign_pattern(ctx, pattern, value),
    }
}

fn emit_for_of(ctx: &mut CodegenContext<'_>, stmt: &ForInOfStatement, label: Option<&str>) -> CompileResult<()> {
    let source = super::expr::emit_expression(ctx, &stmt.right)?;
    let iterator_record = ctx.registers.push_scratch()?;
    let iterator_object = ctx.registers.push_scratch()?;
    let done = ctx.registers.push_scratch()?;
    ctx.push_code(Instr::IteratorOperation {
        kind: IterKind::GetIterator { is_sync: !stmt.is_await },
        args: IterArgs { src: source, dst: iterator_record, iterator_record, iterator_object, done },
    });

    let loop_start = ctx.current_code_size();
    let result = ctx.registers.push_scratch()?;
    ctx.push_code(Instr::IteratorOperation {
        kind: IterKind::IteratorNext,
        args: IterArgs { src: iterator_record, dst: result, iterator_record, iterator_object, done },
    });
    let done_flag = ctx.registers.push_scratch()?;
    ctx.push_code(Instr::IteratorOperation {
        kind: IterKind::IteratorTestDone { is_record: true },
        args: IterArgs { src: result, dst: done_flag, iterator_record, iterator_object, done },
    });
    let exit = ctx.push_code(Instr::JumpIfTrue { cond: done_flag, target: JumpTarget::Unresolved });
    ctx.registers.pop_scratch(1);

    let value = ctx.registers.push_scratch()?;
    ctx.push_code(Instr::IteratorOperation {
        kind: IterKind::IteratorValue,
        args: IterArgs { src: result, dst: value, iterator_record, iterator_object, done },
    });
    ctx.registers.pop_scratch(1);

    ctx.scopes.push(crate::scope::ScopeKind::Block);
    bind_loop_variable(ctx, &stmt.left, value)?;

    if let Some(label) = label {
        ctx.labels.enter(label.to_string(), LabelContinueTarget::Known(loop_start));
    }
    ctx.recursive_statements
        .push(RecursiveStatement::Loop { continue_target: LoopContinueTarget::Known(loop_start), break_jumps: Vec::new() });
    with_iterator_close(ctx, iterator_record, iterator_object, done, |ctx| emit_statement(ctx, &stmt.body))?;
    ctx.scopes.pop();

    ctx.push_code(Instr::Jump(JumpTarget::Offset(loop_start)));
    let end = ctx.current_code_size();
    ctx.patch_jump_to_here(exit);
    ctx.patch_pending_breaks(end);
    if label.is_some() {
        for pos in ctx.labels.exit() {
            ctx.patch_jump(pos, end);
        }
    }

    ctx.registers.pop_scratch(4);
    Ok(())
}

fn emit_for_in(ctx: &mut CodegenContext<'_>, stmt: &ForInOfStatement, label: Option<&str>) -> CompileResult<()> {
    let source = super::expr::emit_expression(ctx, &stmt.right)?;
    let enumerator = ctx.registers.push_scratch()?;
    ctx.push_code(Instr::CreateEnumerateObject { src: source, dst: enumerator, with_rest: false });

    let loop_start = ctx.current_code_size();
    let exit = ctx.push_code(Instr::CheckLastEnumerateKey { enumerator, exit: JumpTarget::Unresolved });

    let key = ctx.registers.push_scratch()?;
    ctx.push_code(Instr::GetEnumerateKey { enumerator, dst: key });

    ctx.scopes.push(crate::scope::ScopeKind::Block);
    bind_loop_variable(ctx, &stmt.left, key)?;
    ctx.registers.pop_scratch(1);

    if let Some(label) = label {
        ctx.labels.enter(label.to_string(), LabelContinueTarget::Known(loop_start));
    }
    ctx.recursive_statements
        .push(RecursiveStatement::Loop { continue_target: LoopContinueTarget::Known(loop_start), break_jumps: Vec::new() });
    emit_statement(ctx, &stmt.body)?;
    ctx.scopes.pop();

    ctx.push_code(Instr::Jump(JumpTarget::Offset(loop_start)));
    let end = ctx.current_code_size();
    ctx.patch_jump_to_here(exit);
    ctx.patch_pending_breaks(end);
    if label.is_some() {
        for pos in ctx.labels.exit() {
            ctx.patch_jump(pos, end);
        }
    }
    ctx.registers.pop_scratch(1);
    Ok(())
}
