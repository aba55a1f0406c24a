//! Virtual register space layout.
//!
//! The codegen core never deals in physical machine registers; it deals in
//! indices into a single flat register file that the interpreter allocates
//! once per activation record. The layout is fixed so that a register index
//! alone (no separate tag) tells the interpreter which storage class it
//! addresses.

/// An index into the per-activation virtual register file.
pub type Reg = u32;

/// `[0, REGULAR_REGISTER_LIMIT)` — scratch/temporary registers, allocated
/// and freed in LIFO order by the codegen-time register stack.
pub const REGULAR_REGISTER_LIMIT: Reg = 1 << 14;

/// Width of the named-local range that follows the scratch range.
pub const VARIABLE_LIMIT: Reg = 1 << 14;

/// Width of the cached-numeral range that follows the named-local range.
pub const NUMERAL_CACHE_LIMIT: Reg = 512;

/// `[REGULAR_REGISTER_LIMIT, REGULAR_REGISTER_LIMIT + VARIABLE_LIMIT)` —
/// stack-resident named locals (parameters and `let`/`const`/`var` bindings
/// that don't escape into a heap environment).
pub const VARIABLE_REGISTER_START: Reg = REGULAR_REGISTER_LIMIT;

/// `[VARIABLE_REGISTER_START + VARIABLE_LIMIT, REGISTER_LIMIT)` — numeral
/// literals preloaded into high registers at function entry so that a read
/// compiles to a register reference instead of a `LoadLiteral`.
pub const NUMERAL_REGISTER_START: Reg = VARIABLE_REGISTER_START + VARIABLE_LIMIT;

/// One past the last valid register index.
pub const REGISTER_LIMIT: Reg = NUMERAL_REGISTER_START + NUMERAL_CACHE_LIMIT;

/// Sentinel meaning "no register" (e.g. a statement that produces no value).
pub const NO_REGISTER: Reg = REGISTER_LIMIT;

/// The stack slot conventionally reserved for a function's `this` binding
/// when the function needs `this` resident on the stack rather than
/// resolved dynamically every read.
pub const THIS_REGISTER: Reg = VARIABLE_REGISTER_START;

/// True if `r` falls in the scratch/temporary range.
#[inline]
pub fn is_scratch(r: Reg) -> bool {
    r < REGULAR_REGISTER_LIMIT
}

/// True if `r` falls in the named-local range.
#[inline]
pub fn is_variable(r: Reg) -> bool {
    (VARIABLE_REGISTER_START..NUMERAL_REGISTER_START).contains(&r)
}

/// True if `r` falls in the cached-numeral range.
#[inline]
pub fn is_numeral_cache(r: Reg) -> bool {
    (NUMERAL_REGISTER_START..REGISTER_LIMIT).contains(&r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_disjoint_and_contiguous() {
        assert_eq!(VARIABLE_REGISTER_START, REGULAR_REGISTER_LIMIT);
        assert_eq!(NUMERAL_REGISTER_START, VARIABLE_REGISTER_START + VARIABLE_LIMIT);
        assert_eq!(REGISTER_LIMIT, NUMERAL_REGISTER_START + NUMERAL_CACHE_LIMIT);
        assert_eq!(NO_REGISTER, REGISTER_LIMIT);
    }

    #[test]
    fn classification_matches_ranges() {
        assert!(is_scratch(0));
        assert!(is_scratch(REGULAR_REGISTER_LIMIT - 1));
        assert!(!is_scratch(REGULAR_REGISTER_LIMIT));

        assert!(is_variable(THIS_REGISTER));
        assert!(!is_variable(NUMERAL_REGISTER_START));

        assert!(is_numeral_cache(NUMERAL_REGISTER_START));
        assert!(!is_numeral_cache(REGISTER_LIMIT));
    }
}
