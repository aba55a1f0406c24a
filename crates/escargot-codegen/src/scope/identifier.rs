//! The identifier-resolution sum type.

use escargot_bytecode::Reg;

/// How a name reference compiles, decided once during scope analysis and
/// reused for every read/write of that name within its scope's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierResolution {
    /// A stack-resident named local — compiles to `LoadByName`-free
    /// register reads (`Move`) once the register is known.
    StackSlot(Reg),
    /// A binding captured by a nested closure, stored in a heap
    /// environment reached by `(upper, index)` — `upper` counts how many
    /// enclosing heap environments to walk out through.
    HeapIndex { upper: u32, index: u32 },
    /// A global binding reached through a cached access slot.
    Global,
    /// No static binding is safe to assume — resolved by name at runtime
    /// every time (e.g. anything below an active `with`, or a free
    /// variable in non-strict sloppy-mode global code).
    Dynamic,
}

impl IdentifierResolution {
    pub fn is_static(self) -> bool {
        !matches!(self, IdentifierResolution::Dynamic)
    }
}

/// Temporal-dead-zone state for a `let`/`const`/catch-parameter binding
/// (a reference before its declaration runs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TdzState {
    InTdz,
    Initialized,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_resolution_is_not_static() {
        assert!(!IdentifierResolution::Dynamic.is_static());
        assert!(IdentifierResolution::Global.is_static());
        assert!(IdentifierResolution::StackSlot(0).is_static());
    }
}
