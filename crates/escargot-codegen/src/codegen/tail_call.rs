//! Tail-call detection, gated by [`CodegenOptions::enable_tail_call`].
//!
//! A `return callee(...)` in tail position can reuse the current frame
//! instead of pushing a new one. Only the operand shapes the bytecode has
//! a dedicated instruction for are optimized — a spread call, a
//! `super(...)` call, or a receiver call nested inside a `try` (no
//! instruction combines "has receiver" with "runs inside try") fall back
//! to an ordinary call followed by a normal return.

use escargot_bytecode::opcode::Instr;

use crate::ast::{Expression, MemberProperty, ReturnStatement};
use crate::context::{CodegenContext, RecursiveStatement};
use crate::error::CompileResult;

use super::expr::{emit_arguments, emit_expression};

/// Attempts to lower `stmt` as a tail call. Returns `true` if it did (the
/// caller should emit nothing further for this return), `false` if the
/// shape doesn't qualify and the caller should fall back to the ordinary
/// return path.
pub fn try_emit_tail_call(ctx: &mut CodegenContext<'_>, stmt: &ReturnStatement) -> CompileResult<bool> {
    if !ctx.options.enable_tail_call {
        return Ok(false);
    }
    let Some(argument) = &stmt.argument else {
        return Ok(false);
    };
    let Expression::Call(call) = argument.as_ref() else {
        return Ok(false);
    };
    if call.optional || call.arguments.iter().any(|a| matches!(a, crate::ast::Argument::Spread(_))) {
        return Ok(false);
    }
    let in_try = ctx.recursive_statements.iter().any(|s| matches!(s, RecursiveStatement::Try { .. }));

    if let Expression::Member(member) = call.callee.as_ref() {
        if matches!(*member.object, Expression::Super(_)) {
            return Ok(false);
        }
        if in_try {
            // TailRecursionInTry carries no receiver operand; a method tail
            // call inside a try falls back to the ordinary call+return path.
            return Ok(false);
        }
        let receiver = emit_expression(ctx, &member.object)?;
        let callee = match &member.property {
            MemberProperty::Identifier(name) | MemberProperty::PrivateIdentifier(name) => {
                let name_id = ctx.intern(name);
                let dst = ctx.registers.push_scratch()?;
                ctx.push_code(Instr::GetObjectPrecomputed { obj: receiver, name: name_id, dst });
                dst
            }
            MemberProperty::Computed(prop_expr) => {
                let prop = emit_expression(ctx, prop_expr)?;
                let dst = ctx.registers.push_scratch()?;
                ctx.push_code(Instr::GetObject { obj: receiver, prop, dst });
                dst
            }
        };
        let (args_start, argc, _) = emit_arguments(ctx, &call.arguments)?;
        ctx.push_code(Instr::TailRecursionWithReceiver { receiver, callee, args_start, argc });
        return Ok(true);
    }

    let callee = emit_expression(ctx, &call.callee)?;
    let (args_start, argc, _) = emit_arguments(ctx, &call.arguments)?;
    if in_try {
        ctx.push_code(Instr::TailRecursionInTry { callee, args_start, argc });
    } else {
        ctx.push_code(Instr::TailRecursion { callee, args_start, argc });
    }
    Ok(true)
}
