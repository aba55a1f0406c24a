#[path = "harness.rs"]
mod harness;
use harness::*;

use escargot_bytecode::opcode::{BinaryOp, Instr};

#[test]
fn let_declaration_with_initializer_compiles() {
    let module = compile(vec![let_decl("x", Some(num(42.0)))]);
    let main = &module.functions[0];
    assert!(!main.code.is_empty());
}

#[test]
fn reading_a_declared_variable_resolves_as_a_stack_slot() {
    let module = compile(vec![function_decl(
        "f",
        vec![],
        vec![let_decl("x", Some(num(1.0))), expr_stmt(ident("x"))],
    )]);
    let f = &module.functions[1];
    // A local declared inside a function body never needs
    // LoadByName/GetGlobalVariable — only a top-level binding does.
    assert!(!f.code.iter().any(|i| matches!(i, Instr::LoadByName { .. })));
    assert!(!f.code.iter().any(|i| matches!(i, Instr::GetGlobalVariable { .. })));
}

#[test]
fn assignment_to_a_declared_variable_compiles() {
    let module = compile(vec![function_decl(
        "f",
        vec![],
        vec![let_decl("x", Some(num(1.0))), expr_stmt(assign("x", num(2.0)))],
    )]);
    let f = &module.functions[1];
    assert!(f.code.iter().any(|i| matches!(i, Instr::Move { .. })));
}

#[test]
fn top_level_declaration_resolves_through_the_global_slot_table() {
    let module = compile(vec![let_decl("x", Some(num(1.0))), expr_stmt(assign("x", num(2.0))), expr_stmt(ident("x"))]);
    let main = &module.functions[0];
    assert!(main.code.iter().any(|i| matches!(i, Instr::InitializeGlobalVariable { .. })));
    assert!(main.code.iter().any(|i| matches!(i, Instr::SetGlobalVariable { .. })));
    assert!(main.code.iter().any(|i| matches!(i, Instr::GetGlobalVariable { .. })));
    assert_eq!(main.global_slots.len(), 1);
}

#[test]
fn const_declaration_compiles() {
    let module = compile(vec![const_decl("x", num(1.0))]);
    assert_eq!(module.functions.len(), 1);
}

#[test]
fn binary_addition_emits_add_op() {
    let module = compile(vec![expr_stmt(binary(BinaryOperator::Add, num(1.0), num(2.0)))]);
    let main = &module.functions[0];
    assert!(main.code.iter().any(|i| matches!(i, Instr::BinaryOp { op: BinaryOp::Add, .. })));
}

#[test]
fn comparison_emits_less_than_op() {
    let module = compile(vec![expr_stmt(binary(BinaryOperator::LessThan, num(1.0), num(2.0)))]);
    let main = &module.functions[0];
    assert!(main.code.iter().any(|i| matches!(i, Instr::BinaryOp { op: BinaryOp::LessThan, .. })));
}

#[test]
fn unary_negation_emits_unary_op() {
    use escargot_bytecode::opcode::UnaryOp;
    let module = compile(vec![expr_stmt(unary(UnaryOperator::Minus, num(5.0)))]);
    let main = &module.functions[0];
    assert!(main.code.iter().any(|i| matches!(i, Instr::UnaryOp { op: UnaryOp::Minus, .. })));
}

#[test]
fn multiple_declarations_each_get_a_stable_register() {
    let module = compile(vec![function_decl("f", vec![], vec![let_decl("x", Some(num(1.0))), let_decl("y", Some(num(2.0)))])]);
    let f = &module.functions[1];
    assert!(f.required_register_file_size_in_value_size >= 2);
}
