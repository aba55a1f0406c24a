//! Statement emission: walks a [`Statement`] tree, threading loop/switch
//! labels down to the constructs that can carry a `break`/`continue`
//! target and discarding any scratch registers a statement's expressions
//! leave behind once the statement itself completes.

use escargot_bytecode::opcode::{Instr, JumpTarget, Scalar};

use crate::ast::{
    BlockStatement, BreakStatement, ContinueStatement, DoWhileStatement, ForInit, ForStatement, IfStatement,
    ReturnStatement, Statement, SwitchStatement, ThrowStatement, VariableKind, WhileStatement, WithStatement,
};
use crate::codegen::labels::LabelContinueTarget;
use crate::context::{CodegenContext, LoopContinueTarget, RecursiveStatement};
use crate::error::{CompileError, CompileResult};
use crate::scope::BindingKind;

use super::expr::emit_expression;
use super::pattern::bind_pattern;

pub fn emit_statement(ctx: &mut CodegenContext<'_>, stmt: &Statement) -> CompileResult<()> {
    super::debug::record_statement_position(ctx, stmt);
    emit_statement_labeled(ctx, stmt, None)
}

fn emit_statement_labeled(ctx: &mut CodegenContext<'_>, stmt: &Statement, label: Option<&str>) -> CompileResult<()> {
    match stmt {
        Statement::Labeled(labeled) => return emit_statement_labeled(ctx, &labeled.body, Some(labeled.label.as_str())),
        Statement::While(w) => return emit_while(ctx, w, label),
        Statement::DoWhile(w) => return emit_do_while(ctx, w, label),
        Statement::For(f) => return emit_for(ctx, f, label),
        Statement::ForIn(f) | Statement::ForOf(f) => return super::iterator::emit_for_in_of(ctx, f, label),
        Statement::Switch(s) => return emit_switch(ctx, s, label),
        _ => {}
    }

    match label {
        None => emit_statement_unlabeled(ctx, stmt),
        Some(label) => {
            ctx.labels.enter(label.to_string(), LabelContinueTarget::NotIteration);
            emit_statement_unlabeled(ctx, stmt)?;
            let end = ctx.current_code_size();
            for pos in ctx.labels.exit() {
                ctx.patch_jump(pos, end);
            }
            Ok(())
        }
    }
}

fn emit_statement_unlabeled(ctx: &mut CodegenContext<'_>, stmt: &Statement) -> CompileResult<()> {
    match stmt {
        Statement::Expression(expr_stmt) => {
            let depth = ctx.registers.scratch_depth();
            emit_expression(ctx, &expr_stmt.expression)?;
            ctx.registers.reset_scratch_to(depth);
            Ok(())
        }
        Statement::Block(block) => emit_block(ctx, block),
        Statement::Empty(_) | Statement::Module(_) => Ok(()),
        Statement::VariableDeclaration(decl) => emit_variable_declaration(ctx, decl),
        Statement::FunctionDeclaration(decl) => emit_function_declaration(ctx, decl),
        Statement::ClassDeclaration(decl) => super::class::emit_class_declaration(ctx, decl),
        Statement::If(if_stmt) => emit_if(ctx, if_stmt),
        Statement::Return(ret) => emit_return(ctx, ret),
        Statement::Break(brk) => emit_break(ctx, brk),
        Statement::Continue(cont) => emit_continue(ctx, cont),
        Statement::Throw(throw_stmt) => emit_throw(ctx, throw_stmt),
        Statement::Try(try_stmt) => super::try_finally::emit_try(ctx, try_stmt),
        Statement::With(with_stmt) => emit_with(ctx, with_stmt),
        Statement::Directive(_) => Ok(()),
        Statement::Labeled(_) | Statement::While(_) | Statement::DoWhile(_) | Statement::For(_) | Statement::ForIn(_)
        | Statement::ForOf(_) | Statement::Switch(_) => {
            unreachable!("handled by emit_statement_labeled before dispatching here")
        }
    }
}

fn emit_block(ctx: &mut CodegenContext<'_>, block: &BlockStatement) -> CompileResult<()> {
    ctx.scopes.push(crate::scope::ScopeKind::Block);
    for stmt in &block.body {
        emit_statement(ctx, stmt)?;
    }
    ctx.scopes.pop();
    Ok(())
}

fn emit_variable_declaration(ctx: &mut CodegenContext<'_>, decl: &crate::ast::VariableDeclaration) -> CompileResult<()> {
    let kind = match decl.kind {
        VariableKind::Var => BindingKind::Var,
        VariableKind::Let => BindingKind::Let,
        VariableKind::Const => BindingKind::Const,
    };
    for declarator in &decl.declarations {
        let depth = ctx.registers.scratch_depth();
        let value = match &declarator.init {
            Some(init) => emit_expression(ctx, init)?,
            None => {
                let dst = ctx.registers.push_scratch()?;
                ctx.push_code(Instr::LoadLiteral { dst, value: Scalar::Undefined });
                dst
            }
        };
        bind_pattern(ctx, &declarator.id, value, kind)?;
        ctx.registers.reset_scratch_to(depth);
    }
    Ok(())
}

fn emit_function_declaration(ctx: &mut CodegenContext<'_>, decl: &crate::ast::FunctionDeclaration) -> CompileResult<()> {
    let name = decl
        .function
        .name
        .clone()
        .ok_or_else(|| CompileError::Internal { message: "function declaration without a name".to_string() })?;
    let depth = ctx.registers.scratch_depth();
    let fn_reg = super::expr::emit_function_value(ctx, &decl.function, Some(name.clone()), ctx.has_super)?;
    let pattern = crate::ast::Pattern::Identifier(crate::ast::IdentifierPattern { name, source_index: decl.source_index });
    bind_pattern(ctx, &pattern, fn_reg, BindingKind::FunctionName)?;
    ctx.registers.reset_scratch_to(depth);
    Ok(())
}

fn emit_if(ctx: &mut CodegenContext<'_>, stmt: &IfStatement) -> CompileResult<()> {
    let depth = ctx.registers.scratch_depth();
    let test = emit_expression(ctx, &stmt.test)?;
    let to_else = ctx.push_code(Instr::JumpIfFalse { cond: test, target: JumpTarget::Unresolved });
    ctx.registers.reset_scratch_to(depth);

    emit_statement(ctx, &stmt.consequent)?;
    match &stmt.alternate {
        Some(alternate) => {
            let to_end = ctx.push_code(Instr::Jump(JumpTarget::Unresolved));
            ctx.patch_jump_to_here(to_else);
            emit_statement(ctx, alternate)?;
            ctx.patch_jump_to_here(to_end);
        }
        None => ctx.patch_jump_to_here(to_else),
    }
    Ok(())
}

fn emit_while(ctx: &mut CodegenContext<'_>, stmt: &WhileStatement, label: Option<&str>) -> CompileResult<()> {
    let loop_start = ctx.current_code_size();
    let depth = ctx.registers.scratch_depth();
    let test = emit_expression(ctx, &stmt.test)?;
    let exit = ctx.push_code(Instr::JumpIfFalse { cond: test, target: JumpTarget::Unresolved });
    ctx.registers.reset_scratch_to(depth);

    if let Some(label) = label {
        ctx.labels.enter(label.to_string(), LabelContinueTarget::Known(loop_start));
    }
    ctx.recursive_statements
        .push(RecursiveStatement::Loop { continue_target: LoopContinueTarget::Known(loop_start), break_jumps: Vec::new() });
    emit_statement(ctx, &stmt.body)?;
    ctx.push_code(Instr::Jump(JumpTarget::Offset(loop_start)));

    let end = ctx.current_code_size();
    ctx.patch_jump_to_here(exit);
    ctx.patch_pending_breaks(end);
    if label.is_some() {
        for pos in ctx.labels.exit() {
            ctx.patch_jump(pos, end);
        }
    }
    Ok(())
}

fn emit_do_while(ctx: &mut CodegenContext<'_>, stmt: &DoWhileStatement, label: Option<&str>) -> CompileResult<()> {
    let body_start = ctx.current_code_size();

    if let Some(label) = label {
        ctx.labels.enter(label.to_string(), LabelContinueTarget::Pending(Vec::new()));
    }
    ctx.recursive_statements
        .push(RecursiveStatement::Loop { continue_target: LoopContinueTarget::Pending(Vec::new()), break_jumps: Vec::new() });
    emit_statement(ctx, &stmt.body)?;

    let test_start = ctx.current_code_size();
    let pending_loop = ctx.resolve_pending_loop_continue(test_start);
    for pos in pending_loop {
        ctx.patch_jump(pos, test_start);
    }
    if label.is_some() {
        let pending_label = ctx.labels.resolve_pending_continue(test_start);
        for pos in pending_label {
            ctx.patch_jump(pos, test_start);
        }
    }

    let depth = ctx.registers.scratch_depth();
    let test = emit_expression(ctx, &stmt.test)?;
    ctx.push_code(Instr::JumpIfTrue { cond: test, target: JumpTarget::Offset(body_start) });
    ctx.registers.reset_scratch_to(depth);

    let end = ctx.current_code_size();
    ctx.patch_pending_breaks(end);
    if label.is_some() {
        for pos in ctx.labels.exit() {
            ctx.patch_jump(pos, end);
        }
    }
    Ok(())
}

fn emit_for(ctx: &mut CodegenContext<'_>, stmt: &ForStatement, label: Option<&str>) -> CompileResult<()> {
    ctx.scopes.push(crate::scope::ScopeKind::Block);
    if let Some(init) = &stmt.init {
        let depth = ctx.registers.scratch_depth();
        match init {
            ForInit::VariableDeclaration(decl) => emit_variable_declaration(ctx, decl)?,
            ForInit::Expression(expr) => {
                emit_expression(ctx, expr)?;
            }
        }
        ctx.registers.reset_scratch_to(depth);
    }

    let test_start = ctx.current_code_size();
    let exit = match &stmt.test {
        Some(test_expr) => {
            let depth = ctx.registers.scratch_depth();
            let test = emit_expression(ctx, test_expr)?;
            let exit = ctx.push_code(Instr::JumpIfFalse { cond: test, target: JumpTarget::Unresolved });
            ctx.registers.reset_scratch_to(depth);
            Some(exit)
        }
        None => None,
    };

    if let Some(label) = label {
        ctx.labels.enter(label.to_string(), LabelContinueTarget::Pending(Vec::new()));
    }
    ctx.recursive_statements
        .push(RecursiveStatement::Loop { continue_target: LoopContinueTarget::Pending(Vec::new()), break_jumps: Vec::new() });
    emit_statement(ctx, &stmt.body)?;

    let update_start = ctx.current_code_size();
    let pending_loop = ctx.resolve_pending_loop_continue(update_start);
    for pos in pending_loop {
        ctx.patch_jump(pos, update_start);
    }
    if label.is_some() {
        let pending_label = ctx.labels.resolve_pending_continue(update_start);
        for pos in pending_label {
            ctx.patch_jump(pos, update_start);
        }
    }

    if let Some(update) = &stmt.update {
        let depth = ctx.registers.scratch_depth();
        emit_expression(ctx, update)?;
        ctx.registers.reset_scratch_to(depth);
    }
    ctx.push_code(Instr::Jump(JumpTarget::Offset(test_start)));

    let end = ctx.current_code_size();
    if let Some(exit) = exit {
        ctx.patch_jump_to_here(exit);
    }
    ctx.patch_pending_breaks(end);
    if label.is_some() {
        for pos in ctx.labels.exit() {
            ctx.patch_jump(pos, end);
        }
    }
    ctx.scopes.pop();
    Ok(())
}

fn emit_return(ctx: &mut CodegenContext<'_>, stmt: &ReturnStatement) -> CompileResult<()> {
    let depth = ctx.registers.scratch_depth();
    if super::tail_call::try_emit_tail_call(ctx, stmt)? {
        ctx.registers.reset_scratch_to(depth);
        return Ok(());
    }
    let value = match &stmt.argument {
        Some(expr) => emit_expression(ctx, expr)?,
        None => {
            let dst = ctx.registers.push_scratch()?;
            ctx.push_code(Instr::LoadLiteral { dst, value: Scalar::Undefined });
            dst
        }
    };
    let in_try = ctx.recursive_statements.iter().any(|s| matches!(s, RecursiveStatement::Try { .. }));
    if in_try {
        ctx.push_code(Instr::ReturnFunctionSlowCase { src: value });
    } else {
        ctx.push_code(Instr::End { src: value });
    }
    ctx.registers.reset_scratch_to(depth);
    Ok(())
}

fn emit_break(ctx: &mut CodegenContext<'_>, stmt: &BreakStatement) -> CompileResult<()> {
    match &stmt.label {
        Some(label) => {
            let at = ctx.push_code(Instr::Jump(JumpTarget::Unresolved));
            ctx.labels.record_break(label, at, stmt.source_index)?;
        }
        None => ctx.emit_unlabeled_break(stmt.source_index)?,
    }
    Ok(())
}

fn emit_continue(ctx: &mut CodegenContext<'_>, stmt: &ContinueStatement) -> CompileResult<()> {
    match &stmt.label {
        Some(label) => {
            let at = ctx.push_code(Instr::Jump(JumpTarget::Unresolved));
            if let Some(target) = ctx.labels.record_continue(label, at, stmt.source_index)? {
                ctx.patch_jump(at, target);
            }
        }
        None => ctx.emit_unlabeled_continue(stmt.source_index)?,
    }
    Ok(())
}

fn emit_throw(ctx: &mut CodegenContext<'_>, stmt: &ThrowStatement) -> CompileResult<()> {
    let depth = ctx.registers.scratch_depth();
    let value = emit_expression(ctx, &stmt.argument)?;
    ctx.push_code(Instr::Throw { src: value });
    ctx.registers.reset_scratch_to(depth);
    Ok(())
}

fn emit_switch(ctx: &mut CodegenContext<'_>, stmt: &SwitchStatement, label: Option<&str>) -> CompileResult<()> {
    let depth = ctx.registers.scratch_depth();
    let discriminant = emit_expression(ctx, &stmt.discriminant)?;

    ctx.scopes.push(crate::scope::ScopeKind::Block);
    let mut case_jumps = Vec::with_capacity(stmt.cases.len());
    let mut default_index = None;
    for (i, case) in stmt.cases.iter().enumerate() {
        match &case.test {
            Some(test_expr) => {
                let test_depth = ctx.registers.scratch_depth();
                let test_value = emit_expression(ctx, test_expr)?;
                let matches = ctx.registers.push_scratch()?;
                ctx.push_code(Instr::BinaryOp {
                    op: escargot_bytecode::opcode::BinaryOp::StrictEqual,
                    lhs: discriminant,
                    rhs: test_value,
                    dst: matches,
                });
                let jump = ctx.push_code(Instr::JumpIfTrue { cond: matches, target: JumpTarget::Unresolved });
                case_jumps.push(jump);
                ctx.registers.reset_scratch_to(test_depth);
            }
            None => default_index = Some(i),
        }
    }
    ctx.registers.reset_scratch_to(depth);

    let to_default_or_end = ctx.push_code(Instr::Jump(JumpTarget::Unresolved));

    if let Some(label) = label {
        ctx.labels.enter(label.to_string(), LabelContinueTarget::NotIteration);
    }
    ctx.recursive_statements.push(RecursiveStatement::Switch { break_jumps: Vec::new() });

    let mut body_starts = Vec::with_capacity(stmt.cases.len());
    let mut matching_jump_index = 0;
    for case in &stmt.cases {
        body_starts.push(ctx.current_code_size());
        if case.test.is_some() {
            ctx.patch_jump_to_here(case_jumps[matching_jump_index]);
            matching_jump_index += 1;
        }
        for inner in &case.consequent {
            emit_statement(ctx, inner)?;
        }
    }

    if let Some(i) = default_index {
        ctx.patch_jump(to_default_or_end, body_starts[i]);
    }

    let end = ctx.current_code_size();
    if default_index.is_none() {
        ctx.patch_jump_to_here(to_default_or_end);
    }
    ctx.patch_pending_breaks(end);
    if label.is_some() {
        for pos in ctx.labels.exit() {
            ctx.patch_jump(pos, end);
        }
    }
    ctx.scopes.pop();
    Ok(())
}

fn emit_with(ctx: &mut CodegenContext<'_>, stmt: &WithStatement) -> CompileResult<()> {
    let depth = ctx.registers.scratch_depth();
    let obj = emit_expression(ctx, &stmt.object)?;
    let close = ctx.push_code(Instr::OpenLexicalEnvironment {
        kind: escargot_bytecode::opcode::EnvKind::With,
        obj: Some(obj),
        close_position: JumpTarget::Unresolved,
    });
    ctx.registers.reset_scratch_to(depth);

    ctx.scopes.push(crate::scope::ScopeKind::With);
    emit_statement(ctx, &stmt.body)?;
    ctx.scopes.pop();

    ctx.push_code(Instr::CloseLexicalEnvironment);
    ctx.patch_jump_to_here(close);
    Ok(())
}
