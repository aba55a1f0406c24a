//! Register allocator.
//!
//! Scratch registers are allocated and freed in LIFO order as codegen
//! walks an expression tree — a `push`/`pop` stack made explicit here so
//! register lifetime follows expression-tree shape rather than being
//! inferred after the fact. Named locals and cached numerals get a
//! *stable* register for the whole function, assigned once up front.

use rustc_hash::FxHashMap;

use escargot_bytecode::register::{
    NUMERAL_REGISTER_START, REGULAR_REGISTER_LIMIT, VARIABLE_REGISTER_START,
};
use escargot_bytecode::Reg;

use crate::error::{CompileError, CompileResult};
use crate::scope::numeral_cache_key;

/// LIFO scratch-register stack plus the stable variable/numeral
/// assignments for one function body.
#[derive(Debug)]
pub struct RegisterAllocator {
    next_scratch: Reg,
    high_water_mark: Reg,
    next_variable: Reg,
    next_numeral: Reg,
    numeral_cache: FxHashMap<u64, Reg>,
}

impl RegisterAllocator {
    pub fn new() -> Self {
        Self {
            next_scratch: 0,
            high_water_mark: 0,
            next_variable: VARIABLE_REGISTER_START,
            next_numeral: NUMERAL_REGISTER_START,
            numeral_cache: FxHashMap::default(),
        }
    }

    /// Allocates the next free scratch register.
    pub fn push_scratch(&mut self) -> CompileResult<Reg> {
        if self.next_scratch >= REGULAR_REGISTER_LIMIT {
            return Err(CompileError::Internal {
                message: "scratch register file exhausted".to_string(),
            });
        }
        let reg = self.next_scratch;
        self.next_scratch += 1;
        self.high_water_mark = self.high_water_mark.max(self.next_scratch);
        Ok(reg)
    }

    /// Frees the most recently allocated `count` scratch registers. Must be
    /// called in exact LIFO order with `push_scratch`; a mismatch is a
    /// compiler bug, not a user-facing error.
    pub fn pop_scratch(&mut self, count: Reg) {
        debug_assert!(self.next_scratch >= count, "scratch register stack underflow");
        self.next_scratch -= count;
    }

    /// Current scratch stack depth, useful for saving/restoring around a
    /// sub-expression that must not leak registers into its surroundings.
    pub fn scratch_depth(&self) -> Reg {
        self.next_scratch
    }

    pub fn reset_scratch_to(&mut self, depth: Reg) {
        debug_assert!(depth <= self.next_scratch);
        self.next_scratch = depth;
    }

    /// Assigns the next stable register for a named local (parameter or
    /// `var`/`let`/`const` binding).
    pub fn allocate_variable(&mut self) -> CompileResult<Reg> {
        if self.next_variable >= NUMERAL_REGISTER_START {
            return Err(CompileError::TooManyVariables);
        }
        let reg = self.next_variable;
        self.next_variable += 1;
        Ok(reg)
    }

    /// Returns the register a numeral literal is cached in, assigning a
    /// fresh one on first request and reusing it on every later occurrence
    /// of the same value.
    pub fn cache_numeral(&mut self, value: f64, max_cached: Reg) -> Option<Reg> {
        let key = numeral_cache_key(value);
        if let Some(&reg) = self.numeral_cache.get(&key) {
            return Some(reg);
        }
        let used = self.numeral_cache.len() as Reg;
        if used >= max_cached {
            return None;
        }
        let reg = self.next_numeral;
        self.next_numeral += 1;
        self.numeral_cache.insert(key, reg);
        Some(reg)
    }

    /// Total register file size the function needs: the scratch high-water
    /// mark, the variable range actually used, and the numeral cache slots
    /// actually used.
    pub fn required_register_file_size(&self) -> Reg {
        self.next_numeral.max(self.next_variable).max(self.high_water_mark)
    }
}

impl Default for RegisterAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_registers_are_lifo() {
        let mut alloc = RegisterAllocator::new();
        let a = alloc.push_scratch().unwrap();
        let b = alloc.push_scratch().unwrap();
        assert_eq!((a, b), (0, 1));
        alloc.pop_scratch(1);
        let c = alloc.push_scratch().unwrap();
        assert_eq!(c, b);
    }

    #[test]
    fn variables_get_stable_increasing_registers() {
        let mut alloc = RegisterAllocator::new();
        let a = alloc.allocate_variable().unwrap();
        let b = alloc.allocate_variable().unwrap();
        assert_eq!(a, VARIABLE_REGISTER_START);
        assert_eq!(b, VARIABLE_REGISTER_START + 1);
    }

    #[test]
    fn numeral_cache_reuses_register_for_same_value() {
        let mut alloc = RegisterAllocator::new();
        let a = alloc.cache_numeral(1.5, 4).unwrap();
        let b = alloc.cache_numeral(1.5, 4).unwrap();
        let c = alloc.cache_numeral(2.5, 4).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn numeral_cache_respects_max_cached_limit() {
        let mut alloc = RegisterAllocator::new();
        assert!(alloc.cache_numeral(1.0, 1).is_some());
        assert!(alloc.cache_numeral(2.0, 1).is_none());
    }

    #[test]
    fn required_register_file_size_tracks_high_water_mark() {
        let mut alloc = RegisterAllocator::new();
        alloc.push_scratch().unwrap();
        alloc.push_scratch().unwrap();
        alloc.pop_scratch(2);
        assert_eq!(alloc.required_register_file_size(), 2);
    }
}
