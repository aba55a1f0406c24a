//! Top-level driver: walks a [`Program`](crate::ast::Program), compiling
//! the top-level body and every function body it (transitively) discovers
//! into one [`Module`].

pub mod async_gen;
pub mod class;
pub mod debug;
pub mod expr;
pub mod iterator;
pub mod labels;
pub mod pattern;
pub mod stmt;
pub mod tail_call;
pub mod try_finally;

use escargot_bytecode::module::{flags, Module};
use escargot_bytecode::opcode::{Instr, PauseKind, Scalar};

use crate::ast::{Function, FunctionBody, Pattern, Program, Statement};
use crate::context::{CodegenContext, CodegenOptions};
use crate::error::{CompileError, CompileResult};
use crate::functions::FunctionQueue;
use crate::scope::BindingKind;

use expr::emit_expression;
use pattern::bind_pattern;
use stmt::emit_statement;

/// Compiles a complete program into a [`Module`]: the top-level body
/// becomes function id 0, and every nested function/method/closure it
/// (transitively) references is drained off the [`FunctionQueue`]
/// breadth-first and compiled in turn.
pub fn compile(program: &Program, name: String, options: CodegenOptions) -> CompileResult<Module> {
    let mut functions = FunctionQueue::new(1);

    {
        let mut ctx = CodegenContext::new(options, &mut functions);
        ctx.is_top_level = true;
        emit_function_body(&mut ctx, &[], &program.body, false, false, false)?;
        let block = ctx.finish("<top-level>".to_string(), 0)?;
        functions.complete(0, block);
    }

    while let Some(pending) = functions.pop_pending() {
        let mut ctx = CodegenContext::new(options, &mut functions);
        ctx.has_super = pending.has_super;
        let param_count = pending.function.params.len() as u32;
        compile_function(&mut ctx, &pending.function)?;
        let block = ctx.finish(pending.name.clone(), param_count)?;
        functions.complete(pending.id, block);
    }

    let (blocks, classes) = functions.into_parts();
    let mut module = Module::new(name);
    module.functions = blocks;
    module.classes = classes;
    if options.emit_debug_line_info {
        module.flags |= flags::HAS_DEBUG_INFO;
    }
    if options.enable_tail_call {
        module.flags |= flags::HAS_TAIL_CALLS;
    }
    module.validate().map_err(|e| CompileError::Internal { message: e.to_string() })?;
    Ok(module)
}

fn compile_function(ctx: &mut CodegenContext<'_>, function: &Function) -> CompileResult<()> {
    match &function.body {
        FunctionBody::Block(body) => {
            emit_function_body(ctx, &function.params, body, function.is_generator, function.is_async, function.is_arrow)
        }
        FunctionBody::Expression(expr) => {
            ctx.is_generator = function.is_generator;
            ctx.is_async = function.is_async;
            if !function.is_arrow {
                ctx.push_code(Instr::EnsureArgumentsObject);
            }
            bind_params(ctx, &function.params)?;
            let value = emit_expression(ctx, expr)?;
            ctx.push_code(Instr::End { src: value });
            Ok(())
        }
    }
}

/// Shared by the top-level program body (no params, not a generator/async
/// function, not an arrow) and a queued function's block body.
fn emit_function_body(
    ctx: &mut CodegenContext<'_>,
    params: &[Pattern],
    body: &[Statement],
    is_generator: bool,
    is_async: bool,
    is_arrow: bool,
) -> CompileResult<()> {
    ctx.is_generator = is_generator;
    ctx.is_async = is_async;
    if !is_arrow {
        ctx.push_code(Instr::EnsureArgumentsObject);
    }
    bind_params(ctx, params)?;
    if is_generator {
        emit_generator_entry_pause(ctx);
    }
    for stmt in body {
        emit_statement(ctx, stmt)?;
    }
    // Unreachable if the body's last statement already returned; cheap
    // insurance against the fall-off-the-end case otherwise.
    let undef = ctx.registers.push_scratch()?;
    ctx.push_code(Instr::LoadLiteral { dst: undef, value: Scalar::Undefined });
    ctx.push_code(Instr::End { src: undef });
    ctx.registers.pop_scratch(1);
    Ok(())
}

/// A generator's body doesn't start running on call — the call only
/// constructs the generator object, and the body runs from here up to the
/// first `yield` once the caller's first `.next()` arrives.
fn emit_generator_entry_pause(ctx: &mut CodegenContext<'_>) {
    let value = ctx.registers.push_scratch().expect("generator entry pause registers");
    ctx.push_code(Instr::LoadLiteral { dst: value, value: Scalar::Undefined });
    let dst = ctx.registers.push_scratch().expect("generator entry pause registers");
    let state = ctx.registers.push_scratch().expect("generator entry pause registers");
    let tail_data_length = ctx.current_tail_data_length();
    let position = ctx.push_code(Instr::ExecutionPause {
        kind: PauseKind::GeneratorsInitialize,
        value,
        dst,
        state: Some(state),
        tail_data_length,
    });
    ctx.record_pause(position, PauseKind::GeneratorsInitialize);
    ctx.registers.pop_scratch(3);
}

/// Binds every parameter positionally via `GetParameter`. A rest parameter
/// is only supported as the sole parameter (`function(...args)`) — lowered
/// by reading the frame's `arguments` object whole, since this bytecode has
/// no primitive for slicing an arbitrary-position tail of the argument
/// list. A rest parameter anywhere else is rejected at compile time.
fn bind_params(ctx: &mut CodegenContext<'_>, params: &[Pattern]) -> CompileResult<()> {
    for (index, pattern) in params.iter().enumerate() {
        if let Pattern::Rest(inner, at) = pattern {
            if index != 0 {
                return Err(CompileError::UnsupportedFeature {
                    feature: "rest parameter after other parameters".to_string(),
                    at: *at,
                });
            }
            let args_name = ctx.intern("arguments");
            let args_reg = ctx.registers.push_scratch()?;
            ctx.push_code(Instr::LoadByName { dst: args_reg, name: args_name });
            let rest_reg = ctx.registers.push_scratch()?;
            ctx.push_code(Instr::CreateSpreadArrayObject { src: args_reg, dst: rest_reg });
            bind_pattern(ctx, inner, rest_reg, BindingKind::Param)?;
            ctx.registers.pop_scratch(2);
            continue;
        }
        let value = ctx.registers.push_scratch()?;
        ctx.push_code(Instr::GetParameter { dst: value, index: index as u32 });
        bind_pattern(ctx, pattern, value, BindingKind::Param)?;
        ctx.registers.pop_scratch(1);
    }
    Ok(())
}
