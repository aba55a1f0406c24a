//! Post-hoc structural verification of a compiled [`Module`].
//!
//! Codegen is trusted to emit well-formed bytecode, but a module that
//! crossed a process boundary (loaded from disk, deserialized from a
//! cache) has not — `verify_module` re-checks the invariants codegen always
//! upholds, so a corrupted or hand-crafted module is rejected before it
//! ever reaches the interpreter.

use thiserror::Error;

use crate::module::{ByteCodeBlock, Module};
use crate::opcode::Instr;
use crate::register::REGISTER_LIMIT;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("module validation error: {0}")]
    ModuleValidation(#[from] crate::module::ModuleError),

    #[error("function `{function}`: unresolved jump target at instruction {position}")]
    UnresolvedJump { function: String, position: u32 },

    #[error("function `{function}`: jump at instruction {position} targets {target}, past end of code ({len})")]
    JumpOutOfRange { function: String, position: u32, target: u32, len: u32 },

    #[error("function `{function}`: register {register} at instruction {position} exceeds register file limit ({limit})")]
    RegisterOutOfRange { function: String, position: u32, register: u32, limit: u32 },

    #[error("function `{function}`: string literal reference {index} at instruction {position} has no matching pool entry")]
    InvalidStringRef { function: String, position: u32, index: u32 },

    #[error("function `{function}`: body does not end in a terminator instruction")]
    FallOffEnd { function: String },

    #[error("class `{class:?}` references function id {function_id} but the module only has {function_count} functions")]
    InvalidFunctionRef { class: Option<String>, function_id: u32, function_count: u32 },
}

/// Verifies every invariant a compiled module is required to uphold: the module header is well-formed, every jump target in every
/// function is resolved and in range, every register reference fits the
/// register file, every string reference resolves, and every function body
/// ends in a terminator (unless empty).
pub fn verify_module(module: &Module) -> Result<(), VerifyError> {
    module.validate()?;

    for block in &module.functions {
        verify_function(block)?;
    }

    for class in &module.classes {
        if class.constructor_function_id as usize >= module.functions.len() {
            return Err(VerifyError::InvalidFunctionRef {
                class: class.name.clone(),
                function_id: class.constructor_function_id,
                function_count: module.functions.len() as u32,
            });
        }
        for method in &class.methods {
            if method.function_id as usize >= module.functions.len() {
                return Err(VerifyError::InvalidFunctionRef {
                    class: class.name.clone(),
                    function_id: method.function_id,
                    function_count: module.functions.len() as u32,
                });
            }
        }
    }

    Ok(())
}

fn verify_function(block: &ByteCodeBlock) -> Result<(), VerifyError> {
    if block.code.is_empty() {
        return Ok(());
    }

    let len = block.code.len() as u32;

    for (i, instr) in block.code.iter().enumerate() {
        let position = i as u32;
        check_jump_targets(block, instr, position, len)?;
        check_registers(block, instr, position)?;
        check_string_refs(block, instr, position)?;
    }

    if !block.code.last().unwrap().is_terminator() {
        return Err(VerifyError::FallOffEnd { function: block.name.clone() });
    }

    Ok(())
}

fn check_jump_targets(block: &ByteCodeBlock, instr: &Instr, position: u32, len: u32) -> Result<(), VerifyError> {
    let mut result = Ok(());
    let mut clone = instr.clone();
    clone.for_each_jump_target_mut(|t| {
        if result.is_err() {
            return;
        }
        match t.offset() {
            None => {
                result = Err(VerifyError::UnresolvedJump { function: block.name.clone(), position });
            }
            Some(target) if target > len => {
                result = Err(VerifyError::JumpOutOfRange { function: block.name.clone(), position, target, len });
            }
            Some(_) => {}
        }
    });
    result
}

fn check_registers(block: &ByteCodeBlock, instr: &Instr, position: u32) -> Result<(), VerifyError> {
    for reg in instr_registers(instr) {
        if reg > REGISTER_LIMIT {
            return Err(VerifyError::RegisterOutOfRange {
                function: block.name.clone(),
                position,
                register: reg,
                limit: REGISTER_LIMIT,
            });
        }
    }
    Ok(())
}

fn check_string_refs(block: &ByteCodeBlock, instr: &Instr, position: u32) -> Result<(), VerifyError> {
    for string_id in instr_string_refs(instr) {
        if block.strings.get(string_id).is_none() {
            return Err(VerifyError::InvalidStringRef { function: block.name.clone(), position, index: string_id });
        }
    }
    Ok(())
}

/// Every register operand an instruction reads or writes. `NO_REGISTER`
/// (equal to `REGISTER_LIMIT`) is a valid "no value" sentinel, so the bound
/// check in [`check_registers`] is `>`, not `>=`.
fn instr_registers(instr: &Instr) -> Vec<u32> {
    use Instr::*;
    match instr {
        LoadLiteral { dst, .. }
        | LoadStringLiteral { dst, .. }
        | LoadByName { dst, .. }
        | LoadByHeapIndex { dst, .. }
        | GetGlobalVariable { dst, .. }
        | ResolveNameAddress { dst, .. }
        | GetParameter { dst, .. }
        | LoadThisBinding { dst }
        | NewTargetOperation { dst }
        | ToNumber { dst, .. }
        | Increment { dst, .. }
        | Decrement { dst, .. }
        | CreateObject { dst }
        | CreateArray { dst }
        | GetObject { dst, .. }
        | GetObjectPrecomputed { dst, .. }
        | SuperGetObject { dst, .. }
        | SuperReference { dst, .. }
        | CreateEnumerateObject { dst, .. }
        | GetEnumerateKey { dst, .. }
        | Call { dst, .. }
        | CallWithReceiver { dst, .. }
        | CallComplex { dst, .. }
        | NewOperation { dst, .. }
        | NewOperationWithSpread { dst, .. }
        | CreateSpreadArrayObject { dst, .. }
        | BindingRestElement { dst, .. }
        | CreateRestElement { dst, .. }
        | LoadRegExp { dst, .. }
        | CreateFunction { dst, .. }
        | TaggedTemplateTestCache { dst, .. } => vec![*dst],

        StoreByName { src, .. }
        | InitializeByName { src, .. }
        | StoreByHeapIndex { src, .. }
        | InitializeByHeapIndex { src, .. }
        | SetGlobalVariable { src, .. }
        | InitializeGlobalVariable { src, .. }
        | SuperSetObject { src, .. }
        | Throw { src }
        | End { src }
        | ReturnFunctionSlowCase { src } => vec![*src],

        Move { src, dst } => vec![*src, *dst],
        StoreByNameWithAddress { addr, src } => vec![*addr, *src],
        UnaryOp { src, dst, .. } => vec![*src, *dst],
        BinaryOp { lhs, rhs, dst, .. } => vec![*lhs, *rhs, *dst],
        UnaryDelete { obj, prop, dst, .. } => {
            let mut v = vec![*dst];
            if let Some(o) = obj {
                v.push(*o);
            }
            if let Some(p) = prop {
                v.push(*p);
            }
            v
        }
        JumpIfTrue { cond, .. } | JumpIfFalse { cond, .. } => vec![*cond],
        JumpIfEqual { a, b, .. } => vec![*a, *b],
        JumpIfUndefinedOrNull { src, .. } => vec![*src],
        ArrayDefineOwnProperty { dst, regs, .. } => {
            let mut v = vec![*dst];
            v.extend(regs.iter().copied());
            v
        }
        ArrayDefineOwnPropertyBySpread { dst, regs } => {
            let mut v = vec![*dst];
            v.extend(regs.iter().copied());
            v
        }
        ObjectDefineOwnProperty { dst, key, value } => vec![*dst, *key, *value],
        ObjectDefineOwnPropertyWithName { dst, value, .. } => vec![*dst, *value],
        ObjectDefineGetterSetter { dst, getter, setter, .. } => {
            let mut v = vec![*dst];
            if let Some(g) = getter {
                v.push(*g);
            }
            if let Some(s) = setter {
                v.push(*s);
            }
            v
        }
        SetObject { obj, prop, src } => vec![*obj, *prop, *src],
        SetObjectPrecomputed { obj, src, .. } => vec![*obj, *src],
        CheckLastEnumerateKey { enumerator, .. } => vec![*enumerator],
        CallReturn { callee, args_start, .. } => vec![*callee, *args_start],
        CallReturnWithReceiver { receiver, callee, args_start, .. } => vec![*receiver, *callee, *args_start],
        TailRecursion { callee, args_start, .. } => vec![*callee, *args_start],
        TailRecursionWithReceiver { receiver, callee, args_start, .. } => vec![*receiver, *callee, *args_start],
        TailRecursionInTry { callee, args_start, .. } => vec![*callee, *args_start],
        IteratorOperation { args, .. } => vec![args.src, args.dst, args.iterator_record, args.iterator_object, args.done],
        TemplateOperation { dst, expr, out } => vec![*dst, *expr, *out],
        CreateClass { ctor, proto, super_class, .. } => {
            let mut v = vec![*ctor, *proto];
            if let Some(s) = super_class {
                v.push(*s);
            }
            v
        }
        InitializeClass { ctor, .. } => vec![*ctor],
        SetFieldData { ctor, value, .. } | SetStaticFieldData { ctor, value, .. } | SetPrivateFieldData { ctor, value, .. } => {
            vec![*ctor, *value]
        }
        ExecutionPause { value, dst, state, .. } => {
            let mut v = vec![*value, *dst];
            if let Some(s) = state {
                v.push(*s);
            }
            v
        }
        OpenLexicalEnvironment { obj, .. } => obj.iter().copied().collect(),
        TryOperation { catch_value_register, .. } => vec![*catch_value_register],
        CloseLexicalEnvironment
        | ReplaceBlockLexicalEnvironment { .. }
        | EnsureArgumentsObject
        | ThrowStaticError(_)
        | ThrowStaticErrorOperation(_)
        | Jump(_)
        | TaggedTemplateFillCache { .. }
        | GeneratorComplete
        | Nop => vec![],
    }
}

/// Every string-pool reference an instruction carries.
fn instr_string_refs(instr: &Instr) -> Vec<u32> {
    use Instr::*;
    match instr {
        LoadStringLiteral { value, .. } => vec![*value],
        LoadByName { name, .. }
        | StoreByName { name, .. }
        | InitializeByName { name, .. }
        | ResolveNameAddress { name, .. }
        | GetObjectPrecomputed { name, .. }
        | SetObjectPrecomputed { name, .. }
        | ObjectDefineOwnPropertyWithName { name, .. } => vec![*name],
        LoadRegExp { body, flags, .. } => vec![*body, *flags],
        CreateFunction { name: Some(name), .. } => vec![*name],
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ByteCodeBlock;
    use crate::opcode::{JumpTarget, Scalar};

    fn module_with(block: ByteCodeBlock) -> Module {
        let mut m = Module::new("test".to_string());
        m.functions.push(block);
        m
    }

    #[test]
    fn empty_function_is_valid() {
        let block = ByteCodeBlock::new("f".to_string(), 0);
        assert!(verify_module(&module_with(block)).is_ok());
    }

    #[test]
    fn well_formed_function_is_valid() {
        let mut block = ByteCodeBlock::new("f".to_string(), 0);
        block.code.push(Instr::LoadLiteral { dst: 0, value: Scalar::Undefined });
        block.code.push(Instr::End { src: 0 });
        assert!(verify_module(&module_with(block)).is_ok());
    }

    #[test]
    fn unresolved_jump_is_rejected() {
        let mut block = ByteCodeBlock::new("f".to_string(), 0);
        block.code.push(Instr::Jump(JumpTarget::Unresolved));
        let err = verify_module(&module_with(block)).unwrap_err();
        assert!(matches!(err, VerifyError::UnresolvedJump { .. }));
    }

    #[test]
    fn out_of_range_jump_is_rejected() {
        let mut block = ByteCodeBlock::new("f".to_string(), 0);
        block.code.push(Instr::Jump(JumpTarget::Offset(99)));
        let err = verify_module(&module_with(block)).unwrap_err();
        assert!(matches!(err, VerifyError::JumpOutOfRange { .. }));
    }

    #[test]
    fn missing_terminator_is_rejected() {
        let mut block = ByteCodeBlock::new("f".to_string(), 0);
        block.code.push(Instr::LoadLiteral { dst: 0, value: Scalar::Null });
        let err = verify_module(&module_with(block)).unwrap_err();
        assert!(matches!(err, VerifyError::FallOffEnd { .. }));
    }

    #[test]
    fn dangling_string_ref_is_rejected() {
        let mut block = ByteCodeBlock::new("f".to_string(), 0);
        block.code.push(Instr::LoadStringLiteral { dst: 0, value: 7 });
        block.code.push(Instr::End { src: 0 });
        let err = verify_module(&module_with(block)).unwrap_err();
        assert!(matches!(err, VerifyError::InvalidStringRef { .. }));
    }

    #[test]
    fn dangling_class_function_ref_is_rejected() {
        let block = ByteCodeBlock::new("f".to_string(), 0);
        let mut module = module_with(block);
        module.classes.push(crate::module::ClassDef {
            name: None,
            constructor_function_id: 5,
            field_count: 0,
            static_field_count: 0,
            methods: vec![],
        });
        let err = verify_module(&module).unwrap_err();
        assert!(matches!(err, VerifyError::InvalidFunctionRef { .. }));
    }
}
