#[path = "harness.rs"]
mod harness;
use harness::*;

use escargot_bytecode::opcode::Instr;

#[test]
fn if_without_else_emits_one_conditional_jump() {
    let module = compile(vec![if_stmt(boolean(true), expr_stmt(num(1.0)), None)]);
    let main = &module.functions[0];
    let jumps = main.code.iter().filter(|i| matches!(i, Instr::JumpIfFalse { .. })).count();
    assert_eq!(jumps, 1);
}

#[test]
fn if_with_else_emits_a_jump_around_the_alternate() {
    let module = compile(vec![if_stmt(boolean(true), expr_stmt(num(1.0)), Some(expr_stmt(num(2.0))))]);
    let main = &module.functions[0];
    assert!(main.code.iter().any(|i| matches!(i, Instr::JumpIfFalse { .. })));
    assert!(main.code.iter().any(|i| matches!(i, Instr::Jump(_))));
}

#[test]
fn while_loop_jumps_back_to_its_test() {
    let module = compile(vec![while_stmt(boolean(true), expr_stmt(num(1.0)))]);
    let main = &module.functions[0];
    assert!(main.code.iter().any(|i| matches!(i, Instr::JumpIfFalse { .. })));
    assert!(main.code.iter().any(|i| matches!(i, Instr::Jump(_))));
}

#[test]
fn nested_block_scopes_compile() {
    let module = compile(vec![block(vec![let_decl("x", Some(num(1.0))), expr_stmt(ident("x"))])]);
    assert_eq!(module.functions.len(), 1);
}

#[test]
fn for_of_closes_the_iterator_on_break() {
    use escargot_bytecode::opcode::IterKind;

    let for_of = Statement::ForOf(ForInOfStatement {
        left: ForBinding::Pattern(ident_pattern("x")),
        right: Box::new(ident("iterable")),
        body: Box::new(block(vec![Statement::Break(BreakStatement { label: None, source_index: si(0) })])),
        is_of: true,
        is_await: false,
        source_index: si(0),
    });
    let module = compile(vec![let_decl("iterable", Some(num(0.0))), for_of]);
    let main = &module.functions[0];
    assert!(main.code.iter().any(|i| matches!(i, Instr::IteratorOperation { kind: IterKind::IteratorClose, .. })));
}
