#[path = "harness.rs"]
mod harness;
use harness::*;

use escargot_bytecode::opcode::Instr;
use escargot_codegen::ast::{BinaryOperator, Pattern};
use escargot_codegen::context::CodegenOptions;

#[test]
fn function_declaration_enqueues_a_second_function() {
    let module = compile(vec![function_decl("f", vec![], vec![return_stmt(Some(num(1.0)))])]);
    assert_eq!(module.functions.len(), 2);
    assert_eq!(module.functions[1].name, "f");
}

#[test]
fn top_level_references_the_function_via_create_function() {
    let module = compile(vec![function_decl("f", vec![], vec![return_stmt(Some(num(1.0)))]), expr_stmt(call(ident("f"), vec![]))]);
    let main = &module.functions[0];
    assert!(main.code.iter().any(|i| matches!(i, Instr::CreateFunction { .. })));
    assert!(main.code.iter().any(|i| matches!(i, Instr::Call { .. })));
}

#[test]
fn function_body_binds_its_parameters() {
    let module = compile(vec![function_decl("add", vec![ident_pattern("a"), ident_pattern("b")], vec![return_stmt(Some(binary(BinaryOperator::Add, ident("a"), ident("b"))))])]);
    let added = &module.functions[1];
    assert_eq!(added.param_count, 2);
    let get_parameter_count = added.code.iter().filter(|i| matches!(i, Instr::GetParameter { .. })).count();
    assert_eq!(get_parameter_count, 2);
}

#[test]
fn sole_rest_parameter_reads_the_arguments_object() {
    let rest = Pattern::Rest(Box::new(ident_pattern("rest")), si(0));
    let module = compile(vec![function_decl("f", vec![rest], vec![return_stmt(Some(ident("rest")))])]);
    let f = &module.functions[1];
    assert!(f.code.iter().any(|i| matches!(i, Instr::EnsureArgumentsObject)));
    assert!(f.code.iter().any(|i| matches!(i, Instr::LoadByName { .. })));
    assert!(f.code.iter().any(|i| matches!(i, Instr::CreateSpreadArrayObject { .. })));
}

#[test]
fn rest_parameter_after_another_parameter_is_rejected() {
    let rest = Pattern::Rest(Box::new(ident_pattern("rest")), si(0));
    let result = escargot_codegen::compile(
        &program(vec![function_decl("f", vec![ident_pattern("a"), rest], vec![return_stmt(None)])]),
        "test".to_string(),
        CodegenOptions::default(),
    );
    assert!(matches!(result, Err(escargot_codegen::CompileError::UnsupportedFeature { .. })));
}

#[test]
fn every_function_falls_back_to_an_implicit_undefined_return() {
    let module = compile(vec![function_decl("f", vec![], vec![expr_stmt(num(1.0))])]);
    let f = &module.functions[1];
    assert!(matches!(f.code.last(), Some(Instr::End { .. })));
}

fn yield_expr() -> Expression {
    Expression::Yield(YieldExpression { argument: None, delegate: false, source_index: si(0) })
}

fn await_expr() -> Expression {
    Expression::Await(AwaitExpression { argument: Box::new(num(1.0)), source_index: si(0) })
}

fn non_generator_function_decl(name: &str, body: Vec<Statement>) -> Statement {
    Statement::FunctionDeclaration(FunctionDeclaration {
        function: Function {
            name: Some(name.to_string()),
            params: vec![],
            body: FunctionBody::Block(body),
            is_generator: false,
            is_async: false,
            is_arrow: false,
            is_strict: false,
            source_index: si(0),
        },
        source_index: si(0),
    })
}

#[test]
fn yield_outside_a_generator_is_rejected() {
    let decl = non_generator_function_decl("f", vec![expr_stmt(yield_expr())]);
    let result = escargot_codegen::compile(&program(vec![decl]), "test".to_string(), CodegenOptions::default());
    assert!(matches!(result, Err(escargot_codegen::CompileError::YieldOutsideGenerator { .. })));
}

#[test]
fn await_outside_an_async_function_is_rejected() {
    let decl = non_generator_function_decl("f", vec![expr_stmt(await_expr())]);
    let result = escargot_codegen::compile(&program(vec![decl]), "test".to_string(), CodegenOptions::default());
    assert!(matches!(result, Err(escargot_codegen::CompileError::AwaitOutsideAsyncFunction { .. })));
}

#[test]
fn duplicate_parameter_names_are_rejected() {
    let decl = function_decl("f", vec![ident_pattern("a"), ident_pattern("a")], vec![return_stmt(None)]);
    let result = escargot_codegen::compile(&program(vec![decl]), "test".to_string(), CodegenOptions::default());
    assert!(matches!(result, Err(escargot_codegen::CompileError::DuplicateParameterName { .. })));
}
