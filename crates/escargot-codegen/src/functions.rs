//! Worklist of nested function bodies discovered mid-compile.
//!
//! `escargot_bytecode::Module` addresses nested functions by a flat
//! `FunctionId` index, but codegen discovers them depth-first while walking
//! an enclosing function's body (a `function` expression, a method, an
//! arrow). Rather than recursing into a nested function's codegen
//! immediately — which would require `CodegenContext` to be reentrant —
//! each discovery reserves a stable id and queues the function body for
//! compilation once the current one finishes, breadth-first.

use std::collections::VecDeque;

use escargot_bytecode::module::{ByteCodeBlock, ClassDef};
use escargot_bytecode::opcode::FunctionId;

use crate::ast::Function;

/// One function body still waiting to be compiled, with the `FunctionId`
/// already reserved for it.
pub struct PendingFunction {
    pub id: FunctionId,
    pub function: Function,
    pub name: String,
    /// True if this function's home object has a `super` binding available
    /// (a derived class constructor or a class method), needed to emit
    /// `SuperReference`/`SuperGetObject` correctly.
    pub has_super: bool,
}

/// Shared, program-wide queue of pending and completed function bodies,
/// plus the flat class table every `class` lowered along the way is
/// recorded into.
pub struct FunctionQueue {
    pending: VecDeque<PendingFunction>,
    next_id: FunctionId,
    compiled: Vec<Option<ByteCodeBlock>>,
    classes: Vec<ClassDef>,
}

impl FunctionQueue {
    /// `start_id` is the first id this queue will hand out; the caller
    /// typically reserves id `0` for the top-level program body itself.
    pub fn new(start_id: FunctionId) -> Self {
        Self { pending: VecDeque::new(), next_id: start_id, compiled: vec![None; start_id as usize], classes: Vec::new() }
    }

    /// Appends a compiled class to the module-wide class table. This table
    /// is a side catalog for tooling (disassemblers, debuggers) — execution
    /// itself doesn't consult it, since a class's constructor, fields and
    /// methods are all reachable through ordinary bytecode the constructor's
    /// own `ByteCodeBlock` runs.
    pub fn record_class(&mut self, class: ClassDef) {
        self.classes.push(class);
    }

    /// Reserves the next id and queues `function` for compilation, returning
    /// the id so the enclosing function can embed it in a `CreateFunction`
    /// instruction immediately.
    pub fn enqueue(&mut self, function: Function, name: String, has_super: bool) -> FunctionId {
        let id = self.next_id;
        self.next_id += 1;
        self.compiled.push(None);
        self.pending.push_back(PendingFunction { id, function, name, has_super });
        id
    }

    pub fn pop_pending(&mut self) -> Option<PendingFunction> {
        self.pending.pop_front()
    }

    /// Records the compiled block for `id`, reserved earlier by [`enqueue`]
    /// or by the caller directly for the top-level program.
    pub fn complete(&mut self, id: FunctionId, block: ByteCodeBlock) {
        self.compiled[id as usize] = Some(block);
    }

    /// Consumes the queue, returning every compiled function body in id
    /// order alongside the recorded class table.
    pub fn into_parts(self) -> (Vec<ByteCodeBlock>, Vec<ClassDef>) {
        let blocks = self
            .compiled
            .into_iter()
            .enumerate()
            .map(|(id, block)| block.unwrap_or_else(|| panic!("function id {id} was reserved but never compiled")))
            .collect();
        (blocks, self.classes)
    }
}
