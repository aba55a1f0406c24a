//! Declaration and class node set.

use super::{Expression, Function, Pattern, PropertyKey, SourceIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone)]
pub struct VariableDeclarator {
    pub id: Pattern,
    pub init: Option<Box<Expression>>,
    pub source_index: SourceIndex,
}

#[derive(Debug, Clone)]
pub struct VariableDeclaration {
    pub kind: VariableKind,
    pub declarations: Vec<VariableDeclarator>,
    pub source_index: SourceIndex,
}

#[derive(Debug, Clone)]
pub struct FunctionDeclaration {
    pub function: Function,
    pub source_index: SourceIndex,
}

#[derive(Debug, Clone)]
pub struct ClassElement {
    pub key: PropertyKey,
    pub is_static: bool,
    pub computed: bool,
    pub kind: ClassElementKind,
    pub source_index: SourceIndex,
}

#[derive(Debug, Clone)]
pub enum ClassElementKind {
    Method(Box<Function>),
    Getter(Box<Function>),
    Setter(Box<Function>),
    Field(Option<Box<Expression>>),
    StaticBlock(Vec<super::Statement>),
}

#[derive(Debug, Clone)]
pub struct ClassNode {
    pub name: Option<String>,
    pub super_class: Option<Box<Expression>>,
    pub elements: Vec<ClassElement>,
    pub source_index: SourceIndex,
}

#[derive(Debug, Clone)]
pub struct ClassDeclaration {
    pub class: ClassNode,
    pub source_index: SourceIndex,
}

/// Import/export node shapes exist so a `Program`'s body can be iterated
/// uniformly; `emit_statement` treats all variants here as no-ops, since
/// module loader wiring lives outside the compiler core.
#[derive(Debug, Clone)]
pub enum ModuleDeclaration {
    Import { specifiers: Vec<ImportSpecifier>, source: String, source_index: SourceIndex },
    ExportNamed { specifiers: Vec<ExportSpecifier>, source: Option<String>, source_index: SourceIndex },
    ExportDefault { declaration: Box<Expression>, source_index: SourceIndex },
    ExportAll { source: String, source_index: SourceIndex },
}

impl ModuleDeclaration {
    pub fn source_index(&self) -> SourceIndex {
        match self {
            ModuleDeclaration::Import { source_index, .. } => *source_index,
            ModuleDeclaration::ExportNamed { source_index, .. } => *source_index,
            ModuleDeclaration::ExportDefault { source_index, .. } => *source_index,
            ModuleDeclaration::ExportAll { source_index, .. } => *source_index,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ImportSpecifier {
    Named { imported: String, local: String },
    Default { local: String },
    Namespace { local: String },
}

#[derive(Debug, Clone)]
pub struct ExportSpecifier {
    pub local: String,
    pub exported: String,
}
