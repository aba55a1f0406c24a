//! Register-based bytecode wire format for the Escargot codegen core.
//!
//! This crate owns everything downstream of the AST: the instruction set
//! ([`opcode`]), the append-only buffer with forward-jump patching
//! ([`buffer`]), the virtual register space layout ([`register`]), the
//! string/numeral/tagged-template pools ([`literal_pool`]), the
//! generator/async pause-site table ([`pause`]), the compiled
//! `ByteCodeBlock`/`Module` output types with their binary format
//! ([`module`]), and a post-hoc structural verifier ([`verify`]).

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod buffer;
pub mod literal_pool;
pub mod module;
pub mod opcode;
pub mod pause;
pub mod register;
pub mod verify;

pub use buffer::{CodePosition, InstrBuffer};
pub use literal_pool::{GlobalSlotTable, NumeralPool, StringPool, TaggedTemplateSlot, TaggedTemplateTable};
pub use module::{ByteCodeBlock, ClassDef, Metadata, Method, Module, ModuleError};
pub use opcode::{
    BinaryOp, CallMode, ClassInitMode, EnvKind, ErrorKind, FunctionId, GlobalSlotId, Instr,
    IterArgs, IterKind, JumpTarget, NumeralId, PauseKind, PropertyKeyRef, ResumeState, Scalar,
    StaticErrorTemplate, StringId, UnaryOp,
};
pub use pause::{PauseSite, PauseSiteTable};
pub use register::Reg;
pub use verify::{verify_module, VerifyError};
