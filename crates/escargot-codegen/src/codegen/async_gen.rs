//! `await`/`yield`/`yield*` lowering via `ExecutionPause`.
//!
//! Each pause site suspends the running frame with a resumption-state slot
//! (`Normal`/`Throw`/`Return`) and records its tail-data length — the
//! number of enclosing `try`/`finally` frames a resume has to rewind
//! through — with [`CodegenContext::record_pause`].

use escargot_bytecode::opcode::{Instr, IterArgs, IterKind, JumpTarget, PauseKind, Scalar};
use escargot_bytecode::Reg;

use crate::ast::{AwaitExpression, YieldExpression};
use crate::context::CodegenContext;
use crate::error::{CompileError, CompileResult};

use super::expr::emit_expression;

pub fn emit_await(ctx: &mut CodegenContext<'_>, expr: &AwaitExpression) -> CompileResult<Reg> {
    if !ctx.is_async {
        return Err(CompileError::AwaitOutsideAsyncFunction { at: expr.source_index });
    }
    let value = emit_expression(ctx, &expr.argument)?;
    let dst = ctx.registers.push_scratch()?;
    let state = ctx.registers.push_scratch()?;
    let tail_data_length = ctx.current_tail_data_length();
    let position = ctx.push_code(Instr::ExecutionPause { kind: PauseKind::Await, value, dst, state: Some(state), tail_data_length });
    ctx.record_pause(position, PauseKind::Await);
    Ok(dst)
}

pub fn emit_yield(ctx: &mut CodegenContext<'_>, expr: &YieldExpression) -> CompileResult<Reg> {
    if !ctx.is_generator {
        return Err(CompileError::YieldOutsideGenerator { at: expr.source_index });
    }
    if expr.delegate {
        return emit_yield_delegate(ctx, expr);
    }
    let value = match &expr.argument {
        Some(e) => emit_expression(ctx, e)?,
        None => {
            let dst = ctx.registers.push_scratch()?;
            ctx.push_code(Instr::LoadLiteral { dst, value: Scalar::Undefined });
            dst
        }
    };
    let dst = ctx.registers.push_scratch()?;
    let state = ctx.registers.push_scratch()?;
    let tail_data_length = ctx.current_tail_data_length();
    let kind = PauseKind::Yield { wrap_with_iter_result: true };
    let position = ctx.push_code(Instr::ExecutionPause { kind, value, dst, state: Some(state), tail_data_length });
    ctx.record_pause(position, kind);
    Ok(dst)
}

/// `yield* expr` delegates to `expr`'s iterator, re-yielding each value it
/// produces until the delegate reports done. The value a caller resumes
/// with isn't threaded back into the delegate's `next()` call — this
/// crate's `IteratorOperation` family has no operand slot for it — so a
/// delegated generator only forwards values outward, never receives a
/// resumption argument back in.
fn emit_yield_delegate(ctx: &mut CodegenContext<'_>, expr: &YieldExpression) -> CompileResult<Reg> {
    let source = match &expr.argument {
        Some(e) => emit_expression(ctx, e)?,
        None => {
            let dst = ctx.registers.push_scratch()?;
            ctx.push_code(Instr::LoadLiteral { dst, value: Scalar::Undefined });
            dst
        }
    };
    let dst = ctx.registers.push_scratch()?;
    let iterator_record = ctx.registers.push_scratch()?;
    let iterator_object = ctx.registers.push_scratch()?;
    let done = ctx.registers.push_scratch()?;
    ctx.push_code(Instr::IteratorOperation {
        kind: IterKind::GetIterator { is_sync: true },
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

    let state = ctx.registers.push_scratch()?;
    let tail_data_length = ctx.current_tail_data_length();
    let kind = PauseKind::Yield { wrap_with_iter_result: false };
    let pause_pos = ctx.push_code(Instr::ExecutionPause { kind, value: result, dst: result, state: Some(state), tail_data_length });
    ctx.record_pause(pause_pos, kind);
    ctx.push_code(Instr::Jump(JumpTarget::Offset(loop_start)));

    ctx.patch_jump_to_here(exit);
    ctx.push_code(Instr::IteratorOperation {
        kind: IterKind::IteratorValue,
        args: IterArgs { src: result, dst, iterator_record, iterator_object, done },
    });
    Ok(dst)
}
