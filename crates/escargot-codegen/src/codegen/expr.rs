//! Expression emission: walks an [`Expression`] tree and emits the
//! instructions that leave its value in a freshly allocated scratch
//! register, which is returned to the caller.

use escargot_bytecode::opcode::{
    BinaryOp as BcBinaryOp, CallMode, Instr, JumpTarget, PropertyKeyRef, Scalar, UnaryOp as BcUnaryOp,
};
use escargot_bytecode::Reg;

use crate::ast::{
    Argument, ArrayElement, AssignmentOperator, AssignmentTarget, BinaryOperator, Expression,
    LiteralValue, LogicalOperator, MemberProperty, ObjectProperty, PropertyKey, SourceIndex, TemplatePart,
    UnaryOperator, UpdateOperator,
};
use crate::context::CodegenContext;
use crate::error::{CompileError, CompileResult};
use crate::scope::IdentifierResolution;

use super::pattern::assign_pattern;

pub fn emit_expression(ctx: &mut CodegenContext<'_>, expr: &Expression) -> CompileResult<Reg> {
    match expr {
        Expression::Literal(lit) => emit_literal(ctx, &lit.value),
        Expression::Identifier(id) => emit_identifier_load(ctx, &id.name, id.source_index),
        Expression::This(_) => {
            let dst = ctx.registers.push_scratch()?;
            ctx.push_code(Instr::LoadThisBinding { dst });
            Ok(dst)
        }
        Expression::Super(at) => Err(CompileError::UnsupportedFeature {
            feature: "bare `super` reference outside a call or member expression".to_string(),
            at: *at,
        }),
        Expression::Array(array) => emit_array(ctx, array),
        Expression::Object(object) => emit_object(ctx, object),
        Expression::Function(function) => emit_function_expression(ctx, function),
        Expression::Class(class) => super::class::emit_class_expression(ctx, class),
        Expression::Unary(unary) => emit_unary(ctx, unary),
        Expression::Update(update) => emit_update(ctx, update),
        Expression::Binary(binary) => emit_binary(ctx, binary),
        Expression::Logical(logical) => emit_logical(ctx, logical),
        Expression::Assignment(assignment) => emit_assignment(ctx, assignment),
        Expression::Conditional(cond) => emit_conditional(ctx, cond),
        Expression::Call(call) => emit_call(ctx, call),
        Expression::New(new_expr) => emit_new(ctx, new_expr),
        Expression::Member(member) => emit_member(ctx, member),
        Expression::Sequence(seq) => emit_sequence(ctx, seq),
        Expression::TaggedTemplate(tagged) => emit_tagged_template(ctx, tagged),
        Expression::Template(template) => emit_template(ctx, template),
        Expression::Spread(spread) => Err(CompileError::UnsupportedFeature {
            feature: "spread element outside an array/call argument list".to_string(),
            at: spread.source_index,
        }),
        Expression::Yield(yield_expr) => super::async_gen::emit_yield(ctx, yield_expr),
        Expression::Await(await_expr) => super::async_gen::emit_await(ctx, await_expr),
        Expression::MetaProperty(meta) => emit_meta_property(ctx, meta),
        Expression::RegExp(regexp) => {
            let dst = ctx.registers.push_scratch()?;
            let body = ctx.intern(&regexp.pattern);
            let flags = ctx.intern(&regexp.flags);
            ctx.push_code(Instr::LoadRegExp { dst, body, flags });
            Ok(dst)
        }
        Expression::RegisterReference(reg, _) => Ok(*reg),
    }
}

fn emit_literal(ctx: &mut CodegenContext<'_>, value: &LiteralValue) -> CompileResult<Reg> {
    let dst = ctx.registers.push_scratch()?;
    match value {
        LiteralValue::Null => ctx.push_code(Instr::LoadLiteral { dst, value: Scalar::Null }),
        LiteralValue::Boolean(b) => ctx.push_code(Instr::LoadLiteral { dst, value: Scalar::Boolean(*b) }),
        LiteralValue::Number(n) => {
            if let Some(cached) = ctx.registers.cache_numeral(*n, ctx.options.max_cached_numerals) {
                ctx.registers.pop_scratch(1);
                ctx.push_code(Instr::LoadLiteral { dst: cached, value: Scalar::F64(*n) });
                return Ok(cached);
            }
            ctx.push_code(Instr::LoadLiteral { dst, value: Scalar::F64(*n) })
        }
        LiteralValue::String(s) => {
            let id = ctx.intern(s);
            ctx.push_code(Instr::LoadStringLiteral { dst, value: id })
        }
    };
    Ok(dst)
}

pub fn emit_identifier_load(ctx: &mut CodegenContext<'_>, name: &str, at: SourceIndex) -> CompileResult<Reg> {
    if let Some(crate::scope::TdzState::InTdz) = ctx.scopes.tdz_state(name) {
        return Err(CompileError::DefaultArgumentForwardReference { name: name.to_string(), at });
    }
    let dst = ctx.registers.push_scratch()?;
    match ctx.scopes.resolve(name) {
        IdentifierResolution::StackSlot(reg) => {
            ctx.registers.pop_scratch(1);
            return Ok(reg);
        }
        IdentifierResolution::HeapIndex { upper, index } => {
            ctx.push_code(Instr::LoadByHeapIndex { upper, index, dst });
        }
        IdentifierResolution::Global => {
            let slot = ctx.global_slot(name);
            ctx.push_code(Instr::GetGlobalVariable { dst, slot });
        }
        IdentifierResolution::Dynamic => {
            let name_id = ctx.intern(name);
            ctx.push_code(Instr::LoadByName { dst, name: name_id });
        }
    };
    Ok(dst)
}

pub fn emit_identifier_store(ctx: &mut CodegenContext<'_>, name: &str, value: Reg, at: SourceIndex) -> CompileResult<()> {
    if let Some(kind) = ctx.scopes.binding_kind(name) {
        if kind == crate::scope::BindingKind::Const {
            return Err(CompileError::AssignmentToConst { name: name.to_string(), at });
        }
    }
    match ctx.scopes.resolve(name) {
        IdentifierResolution::StackSlot(reg) => {
            ctx.push_code(Instr::Move { src: value, dst: reg });
        }
        IdentifierResolution::HeapIndex { upper, index } => {
            ctx.push_code(Instr::StoreByHeapIndex { src: value, upper, index });
        }
        IdentifierResolution::Global => {
            let slot = ctx.global_slot(name);
            ctx.push_code(Instr::SetGlobalVariable { src: value, slot });
        }
        IdentifierResolution::Dynamic => {
            let name_id = ctx.intern(name);
            ctx.push_code(Instr::StoreByName { src: value, name: name_id });
        }
    };
    Ok(())
}

pub fn emit_assignment_target_store(ctx: &mut CodegenContext<'_>, target: &Expression, value: Reg) -> CompileResult<()> {
    match target {
        Expression::Identifier(id) => emit_identifier_store(ctx, &id.name, value, id.source_index),
        Expression::Member(member) => {
            let obj = emit_expression(ctx, &member.object)?;
            match &member.property {
                MemberProperty::Identifier(name) | MemberProperty::PrivateIdentifier(name) => {
                    let name_id = ctx.intern(name);
                    ctx.push_code(Instr::SetObjectPrecomputed { obj, name: name_id, src: value });
                }
                MemberProperty::Computed(prop_expr) => {
                    let prop = emit_expression(ctx, prop_expr)?;
                    ctx.push_code(Instr::SetObject { obj, prop, src: value });
                    ctx.registers.pop_scratch(1);
                }
            }
            ctx.registers.pop_scratch(1);
            Ok(())
        }
        _ => Err(CompileError::UnsupportedFeature {
            feature: "non-identifier, non-member assignment target".to_string(),
            at: target.source_index(),
        }),
    }
}

fn emit_array(ctx: &mut CodegenContext<'_>, array: &crate::ast::ArrayExpression) -> CompileResult<Reg> {
    let dst = ctx.registers.push_scratch()?;
    ctx.push_code(Instr::CreateArray { dst });

    let has_spread = array.elements.iter().any(|e| matches!(e, Some(ArrayElement::Spread(_))));
    if has_spread {
        let mut regs = Vec::new();
        for element in &array.elements {
            match element {
                Some(ArrayElement::Expression(e)) => regs.push(emit_expression(ctx, e)?),
                Some(ArrayElement::Spread(e)) => regs.push(emit_expression(ctx, e)?),
                None => {
                    let hole = ctx.registers.push_scratch()?;
                    ctx.push_code(Instr::LoadLiteral { dst: hole, value: Scalar::Undefined });
                    regs.push(hole);
                }
            }
        }
        ctx.push_code(Instr::ArrayDefineOwnPropertyBySpread { dst, regs: regs.clone() });
        ctx.registers.pop_scratch(regs.len() as Reg);
    } else {
        let mut regs = Vec::new();
        for element in &array.elements {
            match element {
                Some(ArrayElement::Expression(e)) => regs.push(emit_expression(ctx, e)?),
                Some(ArrayElement::Spread(_)) => unreachable!("handled by has_spread branch"),
                None => {
                    let hole = ctx.registers.push_scratch()?;
                    ctx.push_code(Instr::LoadLiteral { dst: hole, value: Scalar::Undefined });
                    regs.push(hole);
                }
            }
        }
        if !regs.is_empty() {
            ctx.push_code(Instr::ArrayDefineOwnProperty { dst, start_index: 0, regs: regs.clone() });
            ctx.registers.pop_scratch(regs.len() as Reg);
        }
    }
    Ok(dst)
}

fn emit_object(ctx: &mut CodegenContext<'_>, object: &crate::ast::ObjectExpression) -> CompileResult<Reg> {
    let dst = ctx.registers.push_scratch()?;
    ctx.push_code(Instr::CreateObject { dst });

    for prop in &object.properties {
        match prop {
            ObjectProperty::KeyValue { key, value, .. } => {
                let key_ref = emit_property_key(ctx, key)?;
                let value_reg = emit_expression(ctx, value)?;
                match key_ref {
                    PropertyKeyRef::Name(name) => { ctx.push_code(Instr::ObjectDefineOwnPropertyWithName { dst, name, value: value_reg }); }
                    PropertyKeyRef::Computed(key_reg) => {
                        ctx.push_code(Instr::ObjectDefineOwnProperty { dst, key: key_reg, value: value_reg });
                        ctx.registers.pop_scratch(1);
                    }
                };
                ctx.registers.pop_scratch(1);
            }
            ObjectProperty::Method { key, body, .. } => {
                let key_ref = emit_property_key(ctx, key)?;
                let method_reg = emit_function_value(ctx, body, property_key_name(key), false)?;
                match key_ref {
                    PropertyKeyRef::Name(name) => { ctx.push_code(Instr::ObjectDefineOwnPropertyWithName { dst, name, value: method_reg }); }
                    PropertyKeyRef::Computed(key_reg) => {
                        ctx.push_code(Instr::ObjectDefineOwnProperty { dst, key: key_reg, value: method_reg });
                        ctx.registers.pop_scratch(1);
                    }
                };
                ctx.registers.pop_scratch(1);
            }
            ObjectProperty::Getter { key, body, .. } => {
                let key_ref = emit_property_key(ctx, key)?;
                let getter_reg = emit_function_value(ctx, body, property_key_name(key), false)?;
                ctx.push_code(Instr::ObjectDefineGetterSetter { dst, name_or_key: key_ref, getter: Some(getter_reg), setter: None });
                ctx.registers.pop_scratch(1);
            }
            ObjectProperty::Setter { key, body, .. } => {
                let key_ref = emit_property_key(ctx, key)?;
                let setter_reg = emit_function_value(ctx, body, property_key_name(key), false)?;
                ctx.push_code(Instr::ObjectDefineGetterSetter { dst, name_or_key: key_ref, getter: None, setter: Some(setter_reg) });
                ctx.registers.pop_scratch(1);
            }
            ObjectProperty::Spread(expr) => {
                let src = emit_expression(ctx, expr)?;
                let spread = ctx.registers.push_scratch()?;
                ctx.push_code(Instr::CreateSpreadArrayObject { src, dst: spread });
                ctx.push_code(Instr::ArrayDefineOwnPropertyBySpread { dst, regs: vec![spread] });
                ctx.registers.pop_scratch(2);
            }
        }
    }
    Ok(dst)
}

pub(crate) fn property_key_name(key: &PropertyKey) -> Option<String> {
    match key {
        PropertyKey::Identifier(n) | PropertyKey::StringLiteral(n) | PropertyKey::PrivateIdentifier(n) => Some(n.clone()),
        _ => None,
    }
}

pub(crate) fn emit_property_key(ctx: &mut CodegenContext<'_>, key: &PropertyKey) -> CompileResult<PropertyKeyRef> {
    match key {
        PropertyKey::Identifier(n) | PropertyKey::StringLiteral(n) | PropertyKey::PrivateIdentifier(n) => {
            Ok(PropertyKeyRef::Name(ctx.intern(n)))
        }
        PropertyKey::NumberLiteral(n) => Ok(PropertyKeyRef::Name(ctx.intern(&n.to_string()))),
        PropertyKey::Computed(expr) => Ok(PropertyKeyRef::Computed(emit_expression(ctx, expr)?)),
    }
}

/// Enqueues `function` for later compilation and emits a `CreateFunction`
/// that materializes it into a fresh register.
pub fn emit_function_value(ctx: &mut CodegenContext<'_>, function: &crate::ast::Function, name: Option<String>, has_super: bool) -> CompileResult<Reg> {
    emit_function_value_with_id(ctx, function, name, has_super).map(|(reg, _)| reg)
}

/// Like [`emit_function_value`] but also returns the `FunctionId` reserved
/// for it, for callers (class lowering) that need to record it in a
/// module-level table rather than just embedding it in this instruction.
pub(crate) fn emit_function_value_with_id(
    ctx: &mut CodegenContext<'_>,
    function: &crate::ast::Function,
    name: Option<String>,
    has_super: bool,
) -> CompileResult<(Reg, escargot_bytecode::opcode::FunctionId)> {
    let display_name = name.clone().or_else(|| function.name.clone()).unwrap_or_default();
    let function_id = ctx.functions.enqueue(function.clone(), display_name, has_super);
    let dst = ctx.registers.push_scratch()?;
    let name_id = name.map(|n| ctx.intern(&n));
    ctx.push_code(Instr::CreateFunction { dst, function_id, name: name_id });
    Ok((dst, function_id))
}

fn emit_function_expression(ctx: &mut CodegenContext<'_>, function: &crate::ast::Function) -> CompileResult<Reg> {
    emit_function_value(ctx, function, function.name.clone(), ctx.has_super)
}

fn emit_unary(ctx: &mut CodegenContext<'_>, unary: &crate::ast::UnaryExpression) -> CompileResult<Reg> {
    if unary.operator == UnaryOperator::Delete {
        return emit_delete(ctx, &unary.argument);
    }
    let src = emit_expression(ctx, &unary.argument)?;
    if unary.operator == UnaryOperator::Plus {
        let dst = ctx.registers.push_scratch()?;
        ctx.push_code(Instr::ToNumber { src, dst });
        return Ok(dst);
    }
    let op = match unary.operator {
        UnaryOperator::Minus => BcUnaryOp::Minus,
        UnaryOperator::BitwiseNot => BcUnaryOp::BitwiseNot,
        UnaryOperator::LogicalNot => BcUnaryOp::LogicalNot,
        UnaryOperator::Typeof => BcUnaryOp::Typeof,
        UnaryOperator::Void => BcUnaryOp::Void,
        UnaryOperator::Plus | UnaryOperator::Delete => unreachable!(),
    };
    let dst = ctx.registers.push_scratch()?;
    ctx.push_code(Instr::UnaryOp { op, src, dst });
    Ok(dst)
}

fn emit_delete(ctx: &mut CodegenContext<'_>, argument: &Expression) -> CompileResult<Reg> {
    let dst = ctx.registers.push_scratch()?;
    match argument {
        Expression::Member(member) => {
            let has_super = matches!(*member.object, Expression::Super(_));
            if has_super {
                ctx.push_code(Instr::UnaryDelete { name: None, obj: None, prop: None, has_super: true, dst });
                return Ok(dst);
            }
            let obj = emit_expression(ctx, &member.object)?;
            match &member.property {
                MemberProperty::Identifier(name) | MemberProperty::PrivateIdentifier(name) => {
                    let name_id = ctx.intern(name);
                    let prop_reg = ctx.registers.push_scratch()?;
                    ctx.push_code(Instr::LoadStringLiteral { dst: prop_reg, value: name_id });
                    ctx.push_code(Instr::UnaryDelete { name: Some(name_id), obj: Some(obj), prop: Some(prop_reg), has_super: false, dst });
                    ctx.registers.pop_scratch(1);
                }
                MemberProperty::Computed(prop_expr) => {
                    let prop = emit_expression(ctx, prop_expr)?;
                    ctx.push_code(Instr::UnaryDelete { name: None, obj: Some(obj), prop: Some(prop), has_super: false, dst });
                    ctx.registers.pop_scratch(1);
                }
            }
            ctx.registers.pop_scratch(1);
        }
        Expression::Identifier(id) => {
            let name_id = ctx.intern(&id.name);
            ctx.push_code(Instr::UnaryDelete { name: Some(name_id), obj: None, prop: None, has_super: false, dst });
        }
        _ => {
            let _ = emit_expression(ctx, argument)?;
            ctx.push_code(Instr::LoadLiteral { dst, value: Scalar::Boolean(true) });
        }
    }
    Ok(dst)
}

fn emit_update(ctx: &mut CodegenContext<'_>, update: &crate::ast::UpdateExpression) -> CompileResult<Reg> {
    let old = emit_expression(ctx, &update.argument)?;
    let new_value = ctx.registers.push_scratch()?;
    match update.operator {
        UpdateOperator::Increment => ctx.push_code(Instr::Increment { src: old, dst: new_value }),
        UpdateOperator::Decrement => ctx.push_code(Instr::Decrement { src: old, dst: new_value }),
    };
    assign_expression_target(ctx, &update.argument, new_value)?;
    if update.prefix {
        ctx.registers.pop_scratch(1);
        Ok(new_value)
    } else {
        Ok(old)
    }
}

fn assign_expression_target(ctx: &mut CodegenContext<'_>, target: &Expression, value: Reg) -> CompileResult<()> {
    emit_assignment_target_store(ctx, target, value)
}

fn emit_binary(ctx: &mut CodegenContext<'_>, binary: &crate::ast::BinaryExpression) -> CompileResult<Reg> {
    let lhs = emit_expression(ctx, &binary.left)?;
    let rhs = emit_expression(ctx, &binary.right)?;
    let op = map_binary_op(binary.operator);
    let dst = ctx.registers.push_scratch()?;
    ctx.push_code(Instr::BinaryOp { op, lhs, rhs, dst });
    Ok(dst)
}

fn map_binary_op(op: BinaryOperator) -> BcBinaryOp {
    match op {
        BinaryOperator::Add => BcBinaryOp::Add,
        BinaryOperator::Sub => BcBinaryOp::Sub,
        BinaryOperator::Mul => BcBinaryOp::Mul,
        BinaryOperator::Div => BcBinaryOp::Div,
        BinaryOperator::Mod => BcBinaryOp::Mod,
        BinaryOperator::Exp => BcBinaryOp::Exp,
        BinaryOperator::Equal => BcBinaryOp::Equal,
        BinaryOperator::NotEqual => BcBinaryOp::NotEqual,
        BinaryOperator::StrictEqual => BcBinaryOp::StrictEqual,
        BinaryOperator::StrictNotEqual => BcBinaryOp::StrictNotEqual,
        BinaryOperator::LessThan => BcBinaryOp::LessThan,
        BinaryOperator::LessThanOrEqual => BcBinaryOp::LessThanOrEqual,
        BinaryOperator::GreaterThan => BcBinaryOp::GreaterThan,
        BinaryOperator::GreaterThanOrEqual => BcBinaryOp::GreaterThanOrEqual,
        BinaryOperator::LeftShift => BcBinaryOp::LeftShift,
        BinaryOperator::SignedRightShift => BcBinaryOp::SignedRightShift,
        BinaryOperator::UnsignedRightShift => BcBinaryOp::UnsignedRightShift,
        BinaryOperator::BitAnd => BcBinaryOp::BitAnd,
        BinaryOperator::BitOr => BcBinaryOp::BitOr,
        BinaryOperator::BitXor => BcBinaryOp::BitXor,
        BinaryOperator::In => BcBinaryOp::In,
        BinaryOperator::InstanceOf => BcBinaryOp::InstanceOf,
    }
}

fn emit_logical(ctx: &mut CodegenContext<'_>, logical: &crate::ast::LogicalExpression) -> CompileResult<Reg> {
    let lhs = emit_expression(ctx, &logical.left)?;
    let short_circuit = match logical.operator {
        LogicalOperator::And => ctx.push_code(Instr::JumpIfFalse { cond: lhs, target: JumpTarget::Unresolved }),
        LogicalOperator::Or => ctx.push_code(Instr::JumpIfTrue { cond: lhs, target: JumpTarget::Unresolved }),
        LogicalOperator::NullishCoalescing => {
            ctx.push_code(Instr::JumpIfUndefinedOrNull { src: lhs, target: JumpTarget::Unresolved })
        }
    };
    let skip_rhs = ctx.push_code(Instr::Jump(JumpTarget::Unresolved));
    ctx.patch_jump_to_here(short_circuit);
    let rhs = emit_expression(ctx, &logical.right)?;
    ctx.push_code(Instr::Move { src: rhs, dst: lhs });
    if rhs != lhs {
        ctx.registers.pop_scratch(1);
    }
    ctx.patch_jump_to_here(skip_rhs);
    Ok(lhs)
}

fn emit_assignment(ctx: &mut CodegenContext<'_>, assignment: &crate::ast::AssignmentExpression) -> CompileResult<Reg> {
    if assignment.operator == AssignmentOperator::Assign {
        let value = emit_expression(ctx, &assignment.value)?;
        match &assignment.target {
            AssignmentTarget::Pattern(pattern) => assign_pattern(ctx, pattern, value)?,
            AssignmentTarget::Expression(expr) => emit_assignment_target_store(ctx, expr, value)?,
        }
        return Ok(value);
    }

    let target_expr = match &assignment.target {
        AssignmentTarget::Expression(expr) => expr.as_ref(),
        AssignmentTarget::Pattern(_) => {
            return Err(CompileError::UnsupportedFeature {
                feature: "compound assignment to a destructuring pattern".to_string(),
                at: assignment.source_index,
            })
        }
    };
    if matches!(
        assignment.operator,
        AssignmentOperator::LogicalAndAssign | AssignmentOperator::LogicalOrAssign | AssignmentOperator::NullishAssign
    ) {
        let current = emit_expression(ctx, target_expr)?;
        let short_circuit = match assignment.operator {
            AssignmentOperator::LogicalAndAssign => ctx.push_code(Instr::JumpIfFalse { cond: current, target: JumpTarget::Unresolved }),
            AssignmentOperator::LogicalOrAssign => ctx.push_code(Instr::JumpIfTrue { cond: current, target: JumpTarget::Unresolved }),
            AssignmentOperator::NullishAssign => ctx.push_code(Instr::JumpIfUndefinedOrNull { src: current, target: JumpTarget::Unresolved }),
            _ => unreachable!(),
        };
        let skip = ctx.push_code(Instr::Jump(JumpTarget::Unresolved));
        ctx.patch_jump_to_here(short_circuit);
        let rhs = emit_expression(ctx, &assignment.value)?;
        ctx.push_code(Instr::Move { src: rhs, dst: current });
        emit_assignment_target_store(ctx, target_expr, current)?;
        ctx.patch_jump_to_here(skip);
        return Ok(current);
    }

    let current = emit_expression(ctx, target_expr)?;
    let rhs = emit_expression(ctx, &assignment.value)?;
    let op = map_compound_op(assignment.operator);
    let dst = ctx.registers.push_scratch()?;
    ctx.push_code(Instr::BinaryOp { op, lhs: current, rhs, dst });
    emit_assignment_target_store(ctx, target_expr, dst)?;
    Ok(dst)
}

fn map_compound_op(op: AssignmentOperator) -> BcBinaryOp {
    match op {
        AssignmentOperator::AddAssign => BcBinaryOp::Add,
        AssignmentOperator::SubAssign => BcBinaryOp::Sub,
        AssignmentOperator::MulAssign => BcBinaryOp::Mul,
        AssignmentOperator::DivAssign => BcBinaryOp::Div,
        AssignmentOperator::ModAssign => BcBinaryOp::Mod,
        AssignmentOperator::ExpAssign => BcBinaryOp::Exp,
        AssignmentOperator::LeftShiftAssign => BcBinaryOp::LeftShift,
        AssignmentOperator::SignedRightShiftAssign => BcBinaryOp::SignedRightShift,
        AssignmentOperator::UnsignedRightShiftAssign => BcBinaryOp::UnsignedRightShift,
        AssignmentOperator::BitAndAssign => BcBinaryOp::BitAnd,
        AssignmentOperator::BitOrAssign => BcBinaryOp::BitOr,
        AssignmentOperator::BitXorAssign => BcBinaryOp::BitXor,
        AssignmentOperator::Assign
        | AssignmentOperator::LogicalAndAssign
        | AssignmentOperator::LogicalOrAssign
        | AssignmentOperator::NullishAssign => unreachable!("handled by emit_logical_assign"),
    }
}

fn emit_conditional(ctx: &mut CodegenContext<'_>, cond: &crate::ast::ConditionalExpression) -> CompileResult<Reg> {
    let test = emit_expression(ctx, &cond.test)?;
    let dst = ctx.registers.push_scratch()?;
    let to_alternate = ctx.push_code(Instr::JumpIfFalse { cond: test, target: JumpTarget::Unresolved });
    let consequent = emit_expression(ctx, &cond.consequent)?;
    ctx.push_code(Instr::Move { src: consequent, dst });
    let to_end = ctx.push_code(Instr::Jump(JumpTarget::Unresolved));
    ctx.patch_jump_to_here(to_alternate);
    let alternate = emit_expression(ctx, &cond.alternate)?;
    ctx.push_code(Instr::Move { src: alternate, dst });
    ctx.patch_jump_to_here(to_end);
    Ok(dst)
}

/// Emits every argument expression into consecutive scratch registers and
/// returns `(first register, count, has_spread)`. An empty argument list
/// still allocates one placeholder register so `args_start` is always valid.
pub(crate) fn emit_arguments(ctx: &mut CodegenContext<'_>, arguments: &[Argument]) -> CompileResult<(Reg, u32, bool)> {
    let has_spread = arguments.iter().any(|a| matches!(a, Argument::Spread(_)));
    if arguments.is_empty() {
        return Ok((ctx.registers.push_scratch()?, 0, false));
    }
    let mut regs = Vec::new();
    for arg in arguments {
        let reg = match arg {
            Argument::Expression(e) | Argument::Spread(e) => emit_expression(ctx, e)?,
        };
        regs.push(reg);
    }
    Ok((regs[0], regs.len() as u32, has_spread))
}

fn emit_call(ctx: &mut CodegenContext<'_>, call: &crate::ast::CallExpression) -> CompileResult<Reg> {
    if let Expression::Member(member) = call.callee.as_ref() {
        let is_super = matches!(*member.object, Expression::Super(_));
        if is_super {
            if !ctx.in_derived_constructor {
                return Err(CompileError::SuperCallOutsideDerivedConstructor { at: call.source_index });
            }
            let dst = ctx.registers.push_scratch()?;
            let callee = ctx.registers.push_scratch()?;
            ctx.push_code(Instr::SuperReference { dst: callee, is_call: true });
            let (args_start, argc, has_spread) = emit_arguments(ctx, &call.arguments)?;
            let mode = if has_spread { CallMode::WithSpreadElement } else { CallMode::Super };
            ctx.push_code(Instr::CallComplex { mode, callee, args_start, argc, dst, optional: false });
            ctx.registers.pop_scratch(argc as Reg + 1);
            return Ok(dst);
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
                ctx.registers.pop_scratch(1);
                dst
            }
        };
        let (args_start, argc, has_spread) = emit_arguments(ctx, &call.arguments)?;
        let dst = ctx.registers.push_scratch()?;
        if has_spread {
            ctx.push_code(Instr::CallComplex { mode: CallMode::WithSpreadElement, callee, args_start, argc, dst, optional: call.optional });
        } else {
            ctx.push_code(Instr::CallWithReceiver { receiver, callee, args_start, argc, dst });
        }
        ctx.registers.pop_scratch(argc as Reg + 2);
        return Ok(dst);
    }

    let callee = emit_expression(ctx, &call.callee)?;
    let (args_start, argc, has_spread) = emit_arguments(ctx, &call.arguments)?;
    let dst = ctx.registers.push_scratch()?;
    if has_spread {
        ctx.push_code(Instr::CallComplex { mode: CallMode::WithSpreadElement, callee, args_start, argc, dst, optional: call.optional });
    } else {
        ctx.push_code(Instr::Call { callee, args_start, argc, dst });
    }
    ctx.registers.pop_scratch(argc as Reg + 1);
    Ok(dst)
}

fn emit_new(ctx: &mut CodegenContext<'_>, new_expr: &crate::ast::NewExpression) -> CompileResult<Reg> {
    let callee = emit_expression(ctx, &new_expr.callee)?;
    let (args_start, argc, has_spread) = emit_arguments(ctx, &new_expr.arguments)?;
    let dst = ctx.registers.push_scratch()?;
    if has_spread {
        ctx.push_code(Instr::NewOperationWithSpread { callee, args_start, argc, dst });
    } else {
        ctx.push_code(Instr::NewOperation { callee, args_start, argc, dst });
    }
    ctx.registers.pop_scratch(argc as Reg + 1);
    Ok(dst)
}

fn emit_member(ctx: &mut CodegenContext<'_>, member: &crate::ast::MemberExpression) -> CompileResult<Reg> {
    if matches!(*member.object, Expression::Super(_)) {
        if !ctx.has_super {
            return Err(CompileError::SuperOutsideMethod { at: member.source_index });
        }
        let prop = match &member.property {
            MemberProperty::Identifier(name) | MemberProperty::PrivateIdentifier(name) => PropertyKeyRef::Name(ctx.intern(name)),
            MemberProperty::Computed(prop_expr) => PropertyKeyRef::Computed(emit_expression(ctx, prop_expr)?),
        };
        let dst = ctx.registers.push_scratch()?;
        ctx.push_code(Instr::SuperGetObject { prop, dst });
        return Ok(dst);
    }

    let obj = emit_expression(ctx, &member.object)?;
    let dst = ctx.registers.push_scratch()?;
    match &member.property {
        MemberProperty::Identifier(name) | MemberProperty::PrivateIdentifier(name) => {
            let name_id = ctx.intern(name);
            ctx.push_code(Instr::GetObjectPrecomputed { obj, name: name_id, dst });
        }
        MemberProperty::Computed(prop_expr) => {
            let prop = emit_expression(ctx, prop_expr)?;
            ctx.push_code(Instr::GetObject { obj, prop, dst });
            ctx.registers.pop_scratch(1);
        }
    }
    Ok(dst)
}

fn emit_sequence(ctx: &mut CodegenContext<'_>, seq: &crate::ast::SequenceExpression) -> CompileResult<Reg> {
    let mut last = None;
    for (i, expr) in seq.expressions.iter().enumerate() {
        let reg = emit_expression(ctx, expr)?;
        if i > 0 {
            ctx.registers.pop_scratch(1);
        }
        last = Some(reg);
    }
    last.ok_or(CompileError::Internal { message: "empty sequence expression".to_string() })
}

fn emit_template(ctx: &mut CodegenContext<'_>, template: &crate::ast::TemplateLiteral) -> CompileResult<Reg> {
    let dst = ctx.registers.push_scratch()?;
    let empty_str = ctx.intern("");
    ctx.push_code(Instr::LoadStringLiteral { dst, value: empty_str });
    for part in &template.parts {
        match part {
            TemplatePart::Cooked { cooked, .. } => {
                let part_id = ctx.intern(cooked);
                let part_reg = ctx.registers.push_scratch()?;
                ctx.push_code(Instr::LoadStringLiteral { dst: part_reg, value: part_id });
                ctx.push_code(Instr::TemplateOperation { dst, expr: part_reg, out: dst });
                ctx.registers.pop_scratch(1);
            }
            TemplatePart::Expression(expr) => {
                let value = emit_expression(ctx, expr)?;
                ctx.push_code(Instr::TemplateOperation { dst, expr: value, out: dst });
                ctx.registers.pop_scratch(1);
            }
        }
    }
    Ok(dst)
}

fn emit_tagged_template(ctx: &mut CodegenContext<'_>, tagged: &crate::ast::TaggedTemplateExpression) -> CompileResult<Reg> {
    let quasi_cooked: Vec<_> = tagged
        .quasi
        .parts
        .iter()
        .filter_map(|p| match p {
            TemplatePart::Cooked { cooked, .. } => Some(ctx.intern(cooked)),
            _ => None,
        })
        .collect();
    let quasi_raw: Vec<_> = tagged
        .quasi
        .parts
        .iter()
        .filter_map(|p| match p {
            TemplatePart::Cooked { raw, .. } => Some(ctx.intern(raw)),
            _ => None,
        })
        .collect();
    let cache_slot = ctx.tagged_templates.add(quasi_cooked, quasi_raw);

    let dst = ctx.registers.push_scratch()?;
    let hit = ctx.push_code(Instr::TaggedTemplateTestCache { cache_slot, dst, jump_if_hit: JumpTarget::Unresolved });
    ctx.push_code(Instr::TaggedTemplateFillCache { cache_slot, quasi_cooked: vec![], quasi_raw: vec![] });
    ctx.patch_jump_to_here(hit);

    let callee = emit_expression(ctx, &tagged.tag)?;
    let mut arg_regs = vec![dst];
    for part in &tagged.quasi.parts {
        if let TemplatePart::Expression(expr) = part {
            arg_regs.push(emit_expression(ctx, expr)?);
        }
    }
    let argc = arg_regs.len() as u32;
    let args_start = arg_regs[0];
    let result = ctx.registers.push_scratch()?;
    ctx.push_code(Instr::Call { callee, args_start, argc, dst: result });
    ctx.registers.pop_scratch(argc as Reg + 1);
    Ok(result)
}

fn emit_meta_property(ctx: &mut CodegenContext<'_>, meta: &crate::ast::MetaPropertyExpression) -> CompileResult<Reg> {
    let dst = ctx.registers.push_scratch()?;
    if meta.meta == "new" && meta.property == "target" {
        ctx.push_code(Instr::NewTargetOperation { dst });
        Ok(dst)
    } else {
        Err(CompileError::UnsupportedFeature {
            feature: format!("{}.{} meta property", meta.meta, meta.property),
            at: meta.source_index,
        })
    }
}
