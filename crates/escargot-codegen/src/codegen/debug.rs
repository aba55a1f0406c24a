//! Debug line-table hook, gated by [`crate::context::CodegenOptions::emit_debug_line_info`].
//!
//! One row per statement boundary is enough for a debugger to map a code
//! position back to a source offset and single-step statement by statement;
//! it doesn't need a row per instruction.

use crate::ast::Statement;
use crate::context::CodegenContext;

/// Records the current code position against `stmt`'s source index, if
/// debug line info is enabled. Call once at the top of statement dispatch,
/// before any of the statement's own instructions are emitted.
pub fn record_statement_position(ctx: &mut CodegenContext<'_>, stmt: &Statement) {
    let position = ctx.current_code_size();
    ctx.record_debug_position(position, stmt.source_index());
}
