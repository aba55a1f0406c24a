//! Destructuring pattern lowering, shared by variable declarations,
//! assignment expressions, parameter binding and catch clauses.

use escargot_bytecode::opcode::{BinaryOp, IterArgs, IterKind, Instr, PropertyKeyRef, Scalar};
use escargot_bytecode::Reg;

use crate::ast::{ArrayPattern, AssignmentPattern, IdentifierPattern, ObjectPattern, Pattern, PropertyKey, SourceIndex};
use crate::context::CodegenContext;
use crate::error::{CompileError, CompileResult};
use crate::scope::{BindingKind, IdentifierResolution};

use super::expr::emit_expression;
use super::iterator::with_iterator_close;

/// Binds a fresh local from `pattern`, allocating new stack-slot registers
/// for every identifier the pattern introduces and assigning `value` into
/// them. Used by `var`/`let`/`const` declarators, catch parameters and
/// function parameters.
pub fn bind_pattern(ctx: &mut CodegenContext<'_>, pattern: &Pattern, value: Reg, kind: BindingKind) -> CompileResult<()> {
    match pattern {
        Pattern::Identifier(IdentifierPattern { name, source_index }) => {
            if ctx.is_top_level && ctx.scopes.depth() == 1 {
                let slot = ctx.global_slot(name);
                ctx.scopes.declare(name, kind, IdentifierResolution::Global, *source_index)?;
                ctx.push_code(Instr::InitializeGlobalVariable { src: value, slot });
                ctx.scopes.initialize(name);
                if kind == BindingKind::Param {
                    ctx.param_init.mark_initialized(name);
                }
                return Ok(());
            }
            let reg = ctx.registers.allocate_variable()?;
            ctx.scopes.declare(name, kind, IdentifierResolution::StackSlot(reg), *source_index)?;
            ctx.push_code(Instr::Move { src: value, dst: reg });
            ctx.scopes.initialize(name);
            if kind == BindingKind::Param {
                ctx.param_init.mark_initialized(name);
            }
            Ok(())
        }
        Pattern::Assignment(AssignmentPattern { left, right, source_index }) => {
            let default_value = emit_default_if_undefined(ctx, value, right, *source_index)?;
            bind_pattern(ctx, left, default_value, kind)
        }
        Pattern::Array(array) => bind_array_pattern(ctx, array, value, kind),
        Pattern::Object(object) => bind_object_pattern(ctx, object, value, kind),
        Pattern::Rest(inner, _) => bind_pattern(ctx, inner, value, kind),
        Pattern::MemberTarget(_) => Err(CompileError::UnsupportedFeature {
            feature: "member expression target in a binding position".to_string(),
            at: pattern.source_index(),
        }),
    }
}

/// Assigns `value` into an already-bound pattern (an assignment
/// expression's left-hand side, not a fresh declaration).
pub fn assign_pattern(ctx: &mut CodegenContext<'_>, pattern: &Pattern, value: Reg) -> CompileResult<()> {
    match pattern {
        Pattern::Identifier(IdentifierPattern { name, source_index }) => {
            super::expr::emit_identifier_store(ctx, name, value, *source_index)
        }
        Pattern::Assignment(AssignmentPattern { left, right, source_index }) => {
            let default_value = emit_default_if_undefined(ctx, value, right, *source_index)?;
            assign_pattern(ctx, left, default_value)
        }
        Pattern::Array(array) => assign_array_pattern(ctx, array, value),
        Pattern::Object(object) => assign_object_pattern(ctx, object, value),
        Pattern::Rest(inner, _) => assign_pattern(ctx, inner, value),
        Pattern::MemberTarget(target) => super::expr::emit_assignment_target_store(ctx, target, value),
    }
}

fn emit_default_if_undefined(ctx: &mut CodegenContext<'_>, value: Reg, default: &crate::ast::Expression, _at: SourceIndex) -> CompileResult<Reg> {
    let undef = ctx.registers.push_scratch()?;
    ctx.push_code(Instr::LoadLiteral { dst: undef, value: Scalar::Undefined });
    let is_undef = ctx.registers.push_scratch()?;
    ctx.push_code(Instr::BinaryOp { op: BinaryOp::StrictEqual, lhs: value, rhs: undef, dst: is_undef });
    let skip = ctx.push_code(Instr::JumpIfFalse { cond: is_undef, target: escargot_bytecode::opcode::JumpTarget::Unresolved });
    let default_value = emit_expression(ctx, default)?;
    ctx.push_code(Instr::Move { src: default_value, dst: value });
    ctx.patch_jump_to_here(skip);
    ctx.registers.pop_scratch(2);
    Ok(value)
}

fn bind_array_pattern(ctx: &mut CodegenContext<'_>, array: &ArrayPattern, value: Reg, kind: BindingKind) -> CompileResult<()> {
    let iterator_record = ctx.registers.push_scratch()?;
    let iterator_object = ctx.registers.push_scratch()?;
    let done = ctx.registers.push_scratch()?;
    ctx.push_code(Instr::IteratorOperation {
        kind: IterKind::GetIterator { is_sync: true },
        args: IterArgs { src: value, dst: iterator_record, iterator_record, iterator_object, done },
    });

    with_iterator_close(ctx, iterator_record, iterator_object, done, |ctx| {
        for element in &array.elements {
            let item = ctx.registers.push_scratch()?;
            ctx.push_code(Instr::IteratorOperation {
                kind: IterKind::IteratorNext,
                args: IterArgs { src: iterator_record, dst: item, iterator_record, iterator_object, done },
            });
            ctx.push_code(Instr::IteratorOperation {
                kind: IterKind::IteratorValue,
                args: IterArgs { src: item, dst: item, iterator_record, iterator_object, done },
            });
            if let Some(element_pattern) = element {
                if let Pattern::Rest(inner, _) = element_pattern {
                    let rest = ctx.registers.push_scratch()?;
                    ctx.push_code(Instr::BindingRestElement { iterator_record, dst: rest });
                    bind_pattern(ctx, inner, rest, kind)?;
                    ctx.registers.pop_scratch(1);
                } else {
                    bind_pattern(ctx, element_pattern, item, kind)?;
                }
            }
            ctx.registers.pop_scratch(1);
        }
        Ok(())
    })?;

    ctx.registers.pop_scratch(3);
    Ok(())
}

fn assign_array_pattern(ctx: &mut CodegenContext<'_>, array: &ArrayPattern, value: Reg) -> CompileResult<()> {
    let iterator_record = ctx.registers.push_scratch()?;
    let iterator_object = ctx.registers.push_scratch()?;
    let done = ctx.registers.push_scratch()?;
    ctx.push_code(Instr::IteratorOperation {
        kind: IterKind::GetIterator { is_sync: true },
        args: IterArgs { src: value, dst: iterator_record, iterator_record, iterator_object, done },
    });

    with_iterator_close(ctx, iterator_record, iterator_object, done, |ctx| {
        for element in &array.elements {
            let item = ctx.registers.push_scratch()?;
            ctx.push_code(Instr::IteratorOperation {
                kind: IterKind::IteratorNext,
                args: IterArgs { src: iterator_record, dst: item, iterator_record, iterator_object, done },
            });
            ctx.push_code(Instr::IteratorOperation {
                kind: IterKind::IteratorValue,
                args: IterArgs { src: item, dst: item, iterator_record, iterator_object, done },
            });
            if let Some(element_pattern) = element {
                if let Pattern::Rest(inner, _) = element_pattern {
                    let rest = ctx.registers.push_scratch()?;
                    ctx.push_code(Instr::BindingRestElement { iterator_record, dst: rest });
                    assign_pattern(ctx, inner, rest)?;
                    ctx.registers.pop_scratch(1);
                } else {
                    assign_pattern(ctx, element_pattern, item)?;
                }
            }
            ctx.registers.pop_scratch(1);
        }
        Ok(())
    })?;

    ctx.registers.pop_scratch(3);
    Ok(())
}

fn property_key_ref(ctx: &mut CodegenContext<'_>, key: &PropertyKey) -> CompileResult<PropertyKeyRef> {
    match key {
        PropertyKey::Identifier(name) | PropertyKey::StringLiteral(name) => Ok(PropertyKeyRef::Name(ctx.intern(name))),
        PropertyKey::NumberLiteral(n) => Ok(PropertyKeyRef::Name(ctx.intern(&n.to_string()))),
        PropertyKey::PrivateIdentifier(name) => Ok(PropertyKeyRef::Name(ctx.intern(name))),
        PropertyKey::Computed(expr) => {
            let reg = emit_expression(ctx, expr)?;
            Ok(PropertyKeyRef::Computed(reg))
        }
    }
}

fn get_property(ctx: &mut CodegenContext<'_>, obj: Reg, key_ref: PropertyKeyRef) -> CompileResult<Reg> {
    let dst = ctx.registers.push_scratch()?;
    match key_ref {
        PropertyKeyRef::Name(name) => ctx.push_code(Instr::GetObjectPrecomputed { obj, name, dst }),
        PropertyKeyRef::Computed(prop) => ctx.push_code(Instr::GetObject { obj, prop, dst }),
    };
    Ok(dst)
}

fn bind_object_pattern(ctx: &mut CodegenContext<'_>, object: &ObjectPattern, value: Reg, kind: BindingKind) -> CompileResult<()> {
    for prop in &object.properties {
        let key_ref = property_key_ref(ctx, &prop.key)?;
        let item = get_property(ctx, value, key_ref)?;
        bind_pattern(ctx, &prop.value, item, kind)?;
        ctx.registers.pop_scratch(1);
    }
    if let Some(rest) = &object.rest {
        let rest_obj = bind_object_rest(ctx, value, object)?;
        bind_pattern(ctx, rest, rest_obj, kind)?;
        ctx.registers.pop_scratch(1);
    }
    Ok(())
}

fn assign_object_pattern(ctx: &mut CodegenContext<'_>, object: &ObjectPattern, value: Reg) -> CompileResult<()> {
    for prop in &object.properties {
        let key_ref = property_key_ref(ctx, &prop.key)?;
        let item = get_property(ctx, value, key_ref)?;
        assign_pattern(ctx, &prop.value, item)?;
        ctx.registers.pop_scratch(1);
    }
    if let Some(rest) = &object.rest {
        let rest_obj = bind_object_rest(ctx, value, object)?;
        assign_pattern(ctx, rest, rest_obj)?;
        ctx.registers.pop_scratch(1);
    }
    Ok(())
}

/// Builds the `{...rest}` object: every own enumerable key of `value` not
/// named by one of `object`'s non-computed properties.
fn bind_object_rest(ctx: &mut CodegenContext<'_>, value: Reg, object: &ObjectPattern) -> CompileResult<Reg> {
    let excluded: Vec<String> = object
        .properties
        .iter()
        .filter_map(|p| match &p.key {
            PropertyKey::Identifier(n) | PropertyKey::StringLiteral(n) => Some(n.clone()),
            _ => None,
        })
        .collect();

    let rest_obj = ctx.registers.push_scratch()?;
    ctx.push_code(Instr::CreateObject { dst: rest_obj });

    let enumerator = ctx.registers.push_scratch()?;
    ctx.push_code(Instr::CreateEnumerateObject { src: value, dst: enumerator, with_rest: true });

    let loop_start = ctx.current_code_size();
    let exit = ctx.push_code(Instr::CheckLastEnumerateKey {
        enumerator,
        exit: escargot_bytecode::opcode::JumpTarget::Unresolved,
    });

    let key = ctx.registers.push_scratch()?;
    ctx.push_code(Instr::GetEnumerateKey { enumerator, dst: key });

    let mut skip_jumps = Vec::new();
    for excluded_name in &excluded {
        let excluded_reg = ctx.registers.push_scratch()?;
        let name_id = ctx.intern(excluded_name);
        ctx.push_code(Instr::LoadStringLiteral { dst: excluded_reg, value: name_id });
        let matches = ctx.registers.push_scratch()?;
        ctx.push_code(Instr::BinaryOp { op: BinaryOp::StrictEqual, lhs: key, rhs: excluded_reg, dst: matches });
        skip_jumps.push(ctx.push_code(Instr::JumpIfTrue {
            cond: matches,
            target: escargot_bytecode::opcode::JumpTarget::Unresolved,
        }));
        ctx.registers.pop_scratch(2);
    }

    let copy_value = get_property(ctx, value, PropertyKeyRef::Computed(key))?;
    ctx.push_code(Instr::ObjectDefineOwnProperty { dst: rest_obj, key, value: copy_value });
    ctx.registers.pop_scratch(1);

    for skip in skip_jumps {
        ctx.patch_jump_to_here(skip);
    }
    ctx.registers.pop_scratch(1); // key
    ctx.push_code(Instr::Jump(escargot_bytecode::opcode::JumpTarget::Offset(loop_start)));
    ctx.patch_jump_to_here(exit);
    ctx.registers.pop_scratch(1); // enumerator

    Ok(rest_obj)
}
