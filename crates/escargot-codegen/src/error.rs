//! Static compile-time errors.
//!
//! These are the errors a spec-conforming engine raises *before* running
//! anything — early `SyntaxError`/`ReferenceError` detection during
//! codegen, not runtime faults (those are lowered into
//! `ThrowStaticError`/`ThrowStaticErrorOperation` instructions instead and
//! never reach this type). Internal invariant violations that indicate a
//! compiler bug, rather than a malformed program, use `debug_assert!` at
//! the call site instead of a `CompileError` variant.

use thiserror::Error;

use crate::ast::SourceIndex;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("duplicate lexical declaration of `{name}` at {at}")]
    DuplicateLexicalDeclaration { name: String, at: SourceIndex },

    #[error("`{name}` has already been declared at {at}")]
    DuplicateParameterName { name: String, at: SourceIndex },

    #[error("assignment to const binding `{name}` at {at}")]
    AssignmentToConst { name: String, at: SourceIndex },

    #[error("`break` targets unknown label `{label}` at {at}")]
    UnknownBreakLabel { label: String, at: SourceIndex },

    #[error("`continue` targets unknown label `{label}` at {at}")]
    UnknownContinueLabel { label: String, at: SourceIndex },

    #[error("`continue` at {at} does not target an iteration statement")]
    ContinueNotInIteration { at: SourceIndex },

    #[error("`break` at {at} is not inside a loop or switch")]
    BreakNotInLoopOrSwitch { at: SourceIndex },

    #[error("`return` at {at} is not inside a function body")]
    ReturnOutsideFunction { at: SourceIndex },

    #[error("`yield` at {at} is not inside a generator function")]
    YieldOutsideGenerator { at: SourceIndex },

    #[error("`await` at {at} is not inside an async function")]
    AwaitOutsideAsyncFunction { at: SourceIndex },

    #[error("`super` property reference at {at} is not inside a method")]
    SuperOutsideMethod { at: SourceIndex },

    #[error("`super` call at {at} is not inside a derived constructor")]
    SuperCallOutsideDerivedConstructor { at: SourceIndex },

    #[error("rest parameter at {at} cannot have a default initializer")]
    RestParameterWithDefault { at: SourceIndex },

    #[error("a default-argument initializer at {at} references parameter `{name}`, which is not yet initialized")]
    DefaultArgumentForwardReference { name: String, at: SourceIndex },

    #[error("more than 65535 string literals in a single function")]
    TooManyStringLiterals,

    #[error("more than 16384 named locals in a single function")]
    TooManyVariables,

    #[error("jump distance exceeds the maximum encodable offset")]
    JumpTooLarge,

    #[error("unsupported syntax: {feature} at {at}")]
    UnsupportedFeature { feature: String, at: SourceIndex },

    #[error("class static element at {at} may not be named `prototype`")]
    StaticPrototypeClassElement { at: SourceIndex },

    #[error("internal codegen error: {message}")]
    Internal { message: String },
}
