#[path = "harness.rs"]
mod harness;
use harness::*;

use escargot_bytecode::opcode::Instr;

fn class_with_one_method() -> Statement {
    let method = ClassElement {
        key: PropertyKey::Identifier("greet".to_string()),
        is_static: false,
        computed: false,
        kind: ClassElementKind::Method(Box::new(Function {
            name: None,
            params: vec![],
            body: FunctionBody::Block(vec![return_stmt(Some(string("hi")))]),
            is_generator: false,
            is_async: false,
            is_arrow: false,
            is_strict: false,
            source_index: si(0),
        })),
        source_index: si(0),
    };
    Statement::ClassDeclaration(ClassDeclaration {
        class: ClassNode { name: Some("Greeter".to_string()), super_class: None, elements: vec![method], source_index: si(0) },
        source_index: si(0),
    })
}

#[test]
fn class_declaration_records_a_class_def() {
    let module = compile(vec![class_with_one_method()]);
    assert_eq!(module.classes.len(), 1);
    let class = &module.classes[0];
    assert_eq!(class.name.as_deref(), Some("Greeter"));
    assert_eq!(class.methods.len(), 1);
    assert_eq!(class.methods[0].name, "greet");
}

#[test]
fn class_constructor_gets_its_own_function_body() {
    let module = compile(vec![class_with_one_method()]);
    let class = &module.classes[0];
    let ctor = &module.functions[class.constructor_function_id as usize];
    assert!(!ctor.code.is_empty());
}

#[test]
fn class_declaration_emits_create_class_and_initialize_class() {
    let module = compile(vec![class_with_one_method()]);
    let main = &module.functions[0];
    assert!(main.code.iter().any(|i| matches!(i, Instr::CreateClass { .. })));
    assert!(main.code.iter().any(|i| matches!(i, Instr::InitializeClass { .. })));
}

#[test]
fn static_method_named_prototype_is_rejected() {
    let method = ClassElement {
        key: PropertyKey::Identifier("prototype".to_string()),
        is_static: true,
        computed: false,
        kind: ClassElementKind::Method(Box::new(Function {
            name: None,
            params: vec![],
            body: FunctionBody::Block(vec![]),
            is_generator: false,
            is_async: false,
            is_arrow: false,
            is_strict: false,
            source_index: si(0),
        })),
        source_index: si(0),
    };
    let decl = Statement::ClassDeclaration(ClassDeclaration {
        class: ClassNode { name: Some("C".to_string()), super_class: None, elements: vec![method], source_index: si(0) },
        source_index: si(0),
    });
    let result = escargot_codegen::compile(&program(vec![decl]), "test".to_string(), CodegenOptions::default());
    assert!(matches!(result, Err(escargot_codegen::CompileError::StaticPrototypeClassElement { .. })));
}

#[test]
fn instance_method_named_prototype_is_allowed() {
    let method = ClassElement {
        key: PropertyKey::Identifier("prototype".to_string()),
        is_static: false,
        computed: false,
        kind: ClassElementKind::Method(Box::new(Function {
            name: None,
            params: vec![],
            body: FunctionBody::Block(vec![]),
            is_generator: false,
            is_async: false,
            is_arrow: false,
            is_strict: false,
            source_index: si(0),
        })),
        source_index: si(0),
    };
    let decl = Statement::ClassDeclaration(ClassDeclaration {
        class: ClassNode { name: Some("C".to_string()), super_class: None, elements: vec![method], source_index: si(0) },
        source_index: si(0),
    });
    let module = compile(vec![decl]);
    assert_eq!(module.classes[0].methods[0].name, "prototype");
}
