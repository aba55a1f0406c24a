//! Class lowering: constructor/prototype wiring, instance and static field
//! initializers, methods/accessors, private members and static
//! initialization blocks.

use escargot_bytecode::module::{ClassDef, Method};
use escargot_bytecode::opcode::{BinaryOp, ClassInitMode, ErrorKind, Instr, JumpTarget, PropertyKeyRef, Scalar, StaticErrorTemplate};
use escargot_bytecode::Reg;

use crate::ast::{
    Argument, CallExpression, ClassDeclaration, ClassElement, ClassElementKind, ClassNode, Expression,
    ExpressionStatement, Function, FunctionBody, IdentifierExpression, IdentifierPattern, LiteralValue, Pattern,
    PropertyKey, SourceIndex, Statement,
};
use crate::context::CodegenContext;
use crate::error::{CompileError, CompileResult};
use crate::scope::BindingKind;

use super::expr::{emit_expression, emit_function_value, emit_function_value_with_id, emit_property_key, property_key_name};
use super::pattern::bind_pattern;
use super::stmt::emit_statement;

pub fn emit_class_expression(ctx: &mut CodegenContext<'_>, class: &ClassNode) -> CompileResult<Reg> {
    emit_class(ctx, class, None)
}

pub fn emit_class_declaration(ctx: &mut CodegenContext<'_>, decl: &ClassDeclaration) -> CompileResult<()> {
    let name = decl
        .class
        .name
        .clone()
        .ok_or_else(|| crate::error::CompileError::Internal { message: "class declaration without a name".to_string() })?;
    let ctor_reg = emit_class(ctx, &decl.class, Some(name.clone()))?;
    let pattern = Pattern::Identifier(IdentifierPattern { name, source_index: decl.source_index });
    bind_pattern(ctx, &pattern, ctor_reg, BindingKind::Let)?;
    ctx.registers.pop_scratch(1);
    Ok(())
}

fn is_constructor_key(key: &PropertyKey) -> bool {
    matches!(key, PropertyKey::Identifier(n) | PropertyKey::StringLiteral(n) if n == "constructor")
}

fn is_private_key(key: &PropertyKey) -> bool {
    matches!(key, PropertyKey::PrivateIdentifier(_))
}

/// The element name for a key that's statically known at compile time —
/// `PropertyKey::Identifier`/`StringLiteral`, or a computed key that's
/// syntactically a string literal. A non-literal computed key (`static
/// [expr]`) returns `None`: its name can't be known until it runs.
fn static_key_name(key: &PropertyKey) -> Option<&str> {
    match key {
        PropertyKey::Identifier(n) | PropertyKey::StringLiteral(n) => Some(n.as_str()),
        PropertyKey::Computed(expr) => match expr.as_ref() {
            Expression::Literal(lit) => match &lit.value {
                LiteralValue::String(s) => Some(s.as_str()),
                _ => None,
            },
            _ => None,
        },
        PropertyKey::NumberLiteral(_) | PropertyKey::PrivateIdentifier(_) => None,
    }
}

/// A static class element may not be named `prototype` — rejected at
/// compile time when the name is statically known.
fn reject_static_prototype_name(key: &PropertyKey, at: SourceIndex) -> CompileResult<()> {
    if static_key_name(key) == Some("prototype") {
        return Err(CompileError::StaticPrototypeClassElement { at });
    }
    Ok(())
}

/// For a static method/accessor whose key is a genuinely dynamic computed
/// expression, `static_key_name` can't catch a `prototype` collision at
/// compile time — this emits the runtime check the spec requires instead.
fn guard_static_prototype_computed(ctx: &mut CodegenContext<'_>, key_ref: PropertyKeyRef) -> CompileResult<()> {
    if let PropertyKeyRef::Computed(key_reg) = key_ref {
        let prototype = ctx.intern("prototype");
        let prototype_reg = ctx.registers.push_scratch()?;
        ctx.push_code(Instr::LoadStringLiteral { dst: prototype_reg, value: prototype });
        let matches = ctx.registers.push_scratch()?;
        ctx.push_code(Instr::BinaryOp { op: BinaryOp::StrictEqual, lhs: key_reg, rhs: prototype_reg, dst: matches });
        let skip = ctx.push_code(Instr::JumpIfFalse { cond: matches, target: JumpTarget::Unresolved });
        let message = ctx.intern("Classes may not have a static property named 'prototype'");
        ctx.push_code(Instr::ThrowStaticErrorOperation(StaticErrorTemplate { kind: ErrorKind::TypeError, template: message, arg: None }));
        ctx.patch_jump_to_here(skip);
        ctx.registers.pop_scratch(2);
    }
    Ok(())
}

/// A class with no explicit `constructor` method gets a synthetic one: a
/// derived class forwards every argument to `super(...)`, a base class does
/// nothing.
fn synthesize_default_constructor(source_index: SourceIndex, has_super: bool) -> Function {
    if !has_super {
        return Function {
            name: None,
            params: Vec::new(),
            body: FunctionBody::Block(Vec::new()),
            is_generator: false,
            is_async: false,
            is_arrow: false,
            is_strict: true,
            source_index,
        };
    }
    let rest_name = "arguments".to_string();
    let params = vec![Pattern::Rest(
        Box::new(Pattern::Identifier(IdentifierPattern { name: rest_name.clone(), source_index })),
        source_index,
    )];
    let body = vec![Statement::Expression(ExpressionStatement {
        expression: Box::new(Expression::Call(CallExpression {
            callee: Box::new(Expression::Super(source_index)),
            arguments: vec![Argument::Spread(Box::new(Expression::Identifier(IdentifierExpression {
                name: rest_name,
                source_index,
            })))],
            optional: false,
            source_index,
        })),
        source_index,
    })];
    Function {
        name: None,
        params,
        body: FunctionBody::Block(body),
        is_generator: false,
        is_async: false,
        is_arrow: false,
        is_strict: true,
        source_index,
    }
}

/// Wraps a field initializer expression in a zero-argument function so it
/// can be re-evaluated with `this` bound to each new instance, the way a
/// per-instance field initializer needs to be.
fn field_initializer_function(initializer: &Option<Box<Expression>>, source_index: SourceIndex) -> Function {
    let body = match initializer {
        Some(expr) => vec![Statement::Return(crate::ast::ReturnStatement { argument: Some(expr.clone()), source_index })],
        None => Vec::new(),
    };
    Function {
        name: None,
        params: Vec::new(),
        body: FunctionBody::Block(body),
        is_generator: false,
        is_async: false,
        is_arrow: false,
        is_strict: true,
        source_index,
    }
}

/// Emits a public (non-private) method definition and returns its entry for
/// the class's method table. Entries for a computed key carry no name — the
/// table is a best-effort catalog for tooling, not something execution
/// consults.
fn add_public_method(
    ctx: &mut CodegenContext<'_>,
    target: Reg,
    element: &ClassElement,
    function: &Function,
    has_super: bool,
    is_static: bool,
) -> CompileResult<Method> {
    if is_static {
        reject_static_prototype_name(&element.key, element.source_index)?;
    }
    let key_ref = emit_property_key(ctx, &element.key)?;
    if is_static {
        guard_static_prototype_computed(ctx, key_ref)?;
    }
    let name = property_key_name(&element.key);
    let (method_reg, function_id) = emit_function_value_with_id(ctx, function, name.clone(), has_super)?;
    match key_ref {
        PropertyKeyRef::Name(name_id) => { ctx.push_code(Instr::ObjectDefineOwnPropertyWithName { dst: target, name: name_id, value: method_reg }); }
        PropertyKeyRef::Computed(key_reg) => {
            ctx.push_code(Instr::ObjectDefineOwnProperty { dst: target, key: key_reg, value: method_reg });
            ctx.registers.pop_scratch(1);
        }
    };
    ctx.registers.pop_scratch(1);
    Ok(Method { name: name.unwrap_or_default(), function_id, is_static, is_getter: false, is_setter: false })
}

fn add_public_accessor(
    ctx: &mut CodegenContext<'_>,
    target: Reg,
    element: &ClassElement,
    getter: Option<&Function>,
    setter: Option<&Function>,
    has_super: bool,
    is_static: bool,
) -> CompileResult<Vec<Method>> {
    if is_static {
        reject_static_prototype_name(&element.key, element.source_index)?;
    }
    let key_ref = emit_property_key(ctx, &element.key)?;
    if is_static {
        guard_static_prototype_computed(ctx, key_ref)?;
    }
    let name = property_key_name(&element.key);
    let getter_with_id = getter.map(|f| emit_function_value_with_id(ctx, f, name.clone(), has_super)).transpose()?;
    let setter_with_id = setter.map(|f| emit_function_value_with_id(ctx, f, name.clone(), has_super)).transpose()?;
    let getter_reg = getter_with_id.map(|(reg, _)| reg);
    let setter_reg = setter_with_id.map(|(reg, _)| reg);
    ctx.push_code(Instr::ObjectDefineGetterSetter { dst: target, name_or_key: key_ref, getter: getter_reg, setter: setter_reg });
    if let PropertyKeyRef::Computed(_) = key_ref {
        ctx.registers.pop_scratch(1);
    }
    ctx.registers.pop_scratch(getter_reg.is_some() as Reg + setter_reg.is_some() as Reg);

    let mut methods = Vec::new();
    if let Some((_, function_id)) = getter_with_id {
        methods.push(Method { name: name.clone().unwrap_or_default(), function_id, is_static, is_getter: true, is_setter: false });
    }
    if let Some((_, function_id)) = setter_with_id {
        methods.push(Method { name: name.unwrap_or_default(), function_id, is_static, is_getter: false, is_setter: true });
    }
    Ok(methods)
}

fn emit_class(ctx: &mut CodegenContext<'_>, class: &ClassNode, declaration_name: Option<String>) -> CompileResult<Reg> {
    let has_super = class.super_class.is_some();
    let name = class.name.clone().or(declaration_name);

    let explicit_ctor = class.elements.iter().find_map(|el| match &el.kind {
        ClassElementKind::Method(f) if !el.is_static && is_constructor_key(&el.key) => Some(f.as_ref().clone()),
        _ => None,
    });
    let ctor_function = explicit_ctor.unwrap_or_else(|| synthesize_default_constructor(class.source_index, has_super));
    let (ctor_reg, ctor_function_id) = emit_function_value_with_id(ctx, &ctor_function, name.clone(), has_super)?;

    let proto_reg = ctx.registers.push_scratch()?;
    ctx.push_code(Instr::CreateObject { dst: proto_reg });

    let super_reg = match &class.super_class {
        Some(expr) => Some(emit_expression(ctx, expr)?),
        None => None,
    };

    let name_id = name.as_deref().map(|n| ctx.intern(n));
    let source_text_id = ctx.intern(name.as_deref().unwrap_or("anonymous"));
    ctx.push_code(Instr::CreateClass { ctor: ctor_reg, proto: proto_reg, super_class: super_reg, name: name_id, source_text: source_text_id });

    let instance_fields: Vec<&ClassElement> = class
        .elements
        .iter()
        .filter(|e| matches!(e.kind, ClassElementKind::Field(_)) && !e.is_static && !is_private_key(&e.key))
        .collect();
    let static_fields: Vec<&ClassElement> = class
        .elements
        .iter()
        .filter(|e| matches!(e.kind, ClassElementKind::Field(_)) && e.is_static && !is_private_key(&e.key))
        .collect();

    ctx.push_code(Instr::InitializeClass {
        ctor: ctor_reg,
        mode: ClassInitMode::InitField,
        field_count: instance_fields.len() as u32,
        static_field_count: 0,
    });
    ctx.push_code(Instr::InitializeClass {
        ctor: ctor_reg,
        mode: ClassInitMode::InitStaticField,
        field_count: 0,
        static_field_count: static_fields.len() as u32,
    });

    for (index, element) in instance_fields.iter().enumerate() {
        if let ClassElementKind::Field(init) = &element.kind {
            let initializer_fn = field_initializer_function(init, element.source_index);
            let init_reg = emit_function_value(ctx, &initializer_fn, None, false)?;
            ctx.push_code(Instr::SetFieldData { ctor: ctor_reg, index: index as u32, value: init_reg });
            ctx.registers.pop_scratch(1);
        }
    }

    for (index, element) in static_fields.iter().enumerate() {
        reject_static_prototype_name(&element.key, element.source_index)?;
        if let ClassElementKind::Field(init) = &element.kind {
            let value = match init {
                Some(expr) => emit_expression(ctx, expr)?,
                None => {
                    let dst = ctx.registers.push_scratch()?;
                    ctx.push_code(Instr::LoadLiteral { dst, value: Scalar::Undefined });
                    dst
                }
            };
            ctx.push_code(Instr::SetStaticFieldData { ctor: ctor_reg, index: index as u32, value });
            ctx.registers.pop_scratch(1);
        }
    }

    let mut private_index = 0u32;
    for element in &class.elements {
        if !is_private_key(&element.key) {
            continue;
        }
        let (is_method, is_getter, is_setter) = match &element.kind {
            ClassElementKind::Method(_) => (true, false, false),
            ClassElementKind::Getter(_) => (false, true, false),
            ClassElementKind::Setter(_) => (false, false, true),
            ClassElementKind::Field(_) => (false, false, false),
            ClassElementKind::StaticBlock(_) => continue,
        };
        ctx.push_code(Instr::InitializeClass {
            ctor: ctor_reg,
            mode: ClassInitMode::InitPrivateField { is_method, is_getter, is_setter },
            field_count: private_index,
            static_field_count: 0,
        });
        let value_reg = match &element.kind {
            ClassElementKind::Field(init) => match init {
                Some(expr) => emit_expression(ctx, expr)?,
                None => {
                    let dst = ctx.registers.push_scratch()?;
                    ctx.push_code(Instr::LoadLiteral { dst, value: Scalar::Undefined });
                    dst
                }
            },
            ClassElementKind::Method(f) | ClassElementKind::Getter(f) | ClassElementKind::Setter(f) => {
                emit_function_value(ctx, f, None, has_super)?
            }
            ClassElementKind::StaticBlock(_) => unreachable!(),
        };
        ctx.push_code(Instr::SetPrivateFieldData { ctor: ctor_reg, index: private_index, value: value_reg });
        ctx.registers.pop_scratch(1);
        private_index += 1;
    }

    let mut methods = Vec::new();
    for element in &class.elements {
        if is_private_key(&element.key) {
            continue;
        }
        match &element.kind {
            ClassElementKind::Method(f) if !element.is_static && !is_constructor_key(&element.key) => {
                methods.push(add_public_method(ctx, proto_reg, element, f, has_super, false)?);
            }
            ClassElementKind::Method(f) if element.is_static => {
                methods.push(add_public_method(ctx, ctor_reg, element, f, has_super, true)?);
            }
            ClassElementKind::Method(_) => {}
            ClassElementKind::Getter(f) => {
                let target = if element.is_static { ctor_reg } else { proto_reg };
                methods.extend(add_public_accessor(ctx, target, element, Some(f), None, has_super, element.is_static)?);
            }
            ClassElementKind::Setter(f) => {
                let target = if element.is_static { ctor_reg } else { proto_reg };
                methods.extend(add_public_accessor(ctx, target, element, None, Some(f), has_super, element.is_static)?);
            }
            ClassElementKind::Field(_) => {}
            ClassElementKind::StaticBlock(body) => {
                for stmt in body {
                    emit_statement(ctx, stmt)?;
                }
            }
        }
    }

    ctx.push_code(Instr::InitializeClass { ctor: ctor_reg, mode: ClassInitMode::RunStaticInitializers, field_count: 0, static_field_count: 0 });

    ctx.functions.record_class(ClassDef {
        name,
        constructor_function_id: ctor_function_id,
        field_count: instance_fields.len() as u32,
        static_field_count: static_fields.len() as u32,
        methods,
    });

    ctx.registers.pop_scratch(1);
    Ok(ctor_reg)
}
