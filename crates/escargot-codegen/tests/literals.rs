#[path = "harness.rs"]
mod harness;
use harness::*;

use escargot_bytecode::opcode::{Instr, Scalar};

#[test]
fn number_literal_loads_as_scalar() {
    let module = compile(vec![expr_stmt(num(42.0))]);
    let main = &module.functions[0];
    assert!(main.code.iter().any(|i| matches!(i, Instr::LoadLiteral { value: Scalar::F64(n), .. } if *n == 42.0)));
}

#[test]
fn string_literal_interns_into_string_pool() {
    let module = compile(vec![expr_stmt(string("hello"))]);
    let main = &module.functions[0];
    assert!(main.code.iter().any(|i| matches!(i, Instr::LoadStringLiteral { .. })));
    assert!(main.strings.len() > 0);
}

#[test]
fn boolean_literals_load_as_booleans() {
    let module = compile(vec![expr_stmt(boolean(true)), expr_stmt(boolean(false))]);
    let main = &module.functions[0];
    assert!(main.code.iter().any(|i| matches!(i, Instr::LoadLiteral { value: Scalar::Boolean(true), .. })));
    assert!(main.code.iter().any(|i| matches!(i, Instr::LoadLiteral { value: Scalar::Boolean(false), .. })));
}

#[test]
fn program_ends_with_end_instruction() {
    let module = compile(vec![expr_stmt(num(1.0))]);
    let main = &module.functions[0];
    assert!(matches!(main.code.last(), Some(Instr::End { .. })));
}
