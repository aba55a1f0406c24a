#[path = "harness.rs"]
mod harness;
use harness::*;

use escargot_bytecode::opcode::Instr;

#[test]
fn throw_emits_throw_instruction() {
    let module = compile(vec![throw_stmt(string("boom"))]);
    let main = &module.functions[0];
    assert!(main.code.iter().any(|i| matches!(i, Instr::Throw { .. })));
}

#[test]
fn try_catch_opens_a_try_operation() {
    let handler = CatchClause { param: Some(ident_pattern("e")), body: block_stmt(vec![expr_stmt(ident("e"))]) };
    let module = compile(vec![try_stmt(block_stmt(vec![throw_stmt(string("boom"))]), Some(handler), None)]);
    let main = &module.functions[0];
    assert!(main.code.iter().any(|i| matches!(i, Instr::TryOperation { .. })));
}

#[test]
fn try_finally_without_catch_still_compiles() {
    let module = compile(vec![try_stmt(
        block_stmt(vec![expr_stmt(num(1.0))]),
        None,
        Some(block_stmt(vec![expr_stmt(num(2.0))])),
    )]);
    let main = &module.functions[0];
    assert!(main.code.iter().any(|i| matches!(i, Instr::TryOperation { .. })));
}

#[test]
fn break_out_of_a_try_finally_still_runs_the_finalizer() {
    let body = while_stmt(
        boolean(true),
        block(vec![try_stmt(
            block_stmt(vec![Statement::Break(BreakStatement { label: None, source_index: si(0) })]),
            None,
            Some(block_stmt(vec![expr_stmt(num(99.0))])),
        )]),
    );
    let module = compile(vec![body]);
    let main = &module.functions[0];
    // The finalizer's own code (LoadLiteral 99.0) must run on the path out of
    // the loop, not just on ordinary fall-through.
    assert!(main
        .code
        .iter()
        .any(|i| matches!(i, Instr::LoadLiteral { value: escargot_bytecode::opcode::Scalar::F64(n), .. } if *n == 99.0)));
    assert!(main.code.iter().any(|i| matches!(i, Instr::TryOperation { .. })));
}
