//! String and numeral literal pools, plus the tagged-template cache-slot
//! table.
//!
//! Strings are deduplicated the way a module builder's `add_string` typically
//! deduplicates constants (a side `FxHashMap` from value to index), since a
//! source file routinely repeats the same property name or string literal
//! many times and the codegen core should not emit it twice. Numerals are
//! *not* deduplicated against each other by value identity beyond what the
//! register-cache assignment in `escargot-codegen::register` already does;
//! this pool just stores whichever numerals the codegen decided were worth
//! caching.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::opcode::{GlobalSlotId, StringId};

/// Deduplicated string literal table for one `ByteCodeBlock`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StringPool {
    strings: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, StringId>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `s`, returning its (possibly pre-existing) id.
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.index.get(s) {
            return id;
        }
        let id = self.strings.len() as StringId;
        self.strings.push(s.to_owned());
        self.index.insert(s.to_owned(), id);
        id
    }

    pub fn get(&self, id: StringId) -> Option<&str> {
        self.strings.get(id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(String::as_str)
    }
}

/// Numeral literals a function decided to cache into the register file's
/// numeral range, in cache-slot order.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct NumeralPool {
    values: Vec<f64>,
}

impl NumeralPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` as the next cache slot and returns its index.
    /// Unlike [`StringPool::intern`] this does not deduplicate: the caller
    /// (`escargot-codegen::register`) already decides which numeral
    /// occurrences share a slot before calling this.
    pub fn push(&mut self, value: f64) -> u32 {
        let id = self.values.len() as u32;
        self.values.push(value);
        id
    }

    pub fn get(&self, id: u32) -> Option<f64> {
        self.values.get(id as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Per-`ByteCodeBlock` table of global-variable access-cache slots,
/// deduplicated by name the same way [`StringPool`] deduplicates strings:
/// every reference to a given top-level binding across the whole function
/// shares one slot, so the host `Context`'s cache for that slot only ever
/// needs warming once.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct GlobalSlotTable {
    names: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, GlobalSlotId>,
}

impl GlobalSlotTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the slot for `name`, assigning a fresh one on first request.
    pub fn slot(&mut self, name: &str) -> GlobalSlotId {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = self.names.len() as GlobalSlotId;
        self.names.push(name.to_owned());
        self.index.insert(name.to_owned(), id);
        id
    }

    pub fn get(&self, id: GlobalSlotId) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// One call-site's tagged-template cache slot: the frozen cooked/raw quasi
/// arrays, filled in on first evaluation. `filled` is a codegen-time
/// bookkeeping flag only —
/// interpretation of whether the *runtime* cache has been populated belongs
/// to the VM, not this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggedTemplateSlot {
    pub quasi_cooked: Vec<StringId>,
    pub quasi_raw: Vec<StringId>,
}

/// Per-`ByteCodeBlock` table of tagged-template cache slots, addressed by
/// the `cache_slot` operand on `TaggedTemplateTestCache`/`TaggedTemplateFillCache`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TaggedTemplateTable {
    slots: Vec<TaggedTemplateSlot>,
}

impl TaggedTemplateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a new cache slot for one tagged-template call site and
    /// returns its index.
    pub fn add(&mut self, quasi_cooked: Vec<StringId>, quasi_raw: Vec<StringId>) -> u32 {
        let id = self.slots.len() as u32;
        self.slots.push(TaggedTemplateSlot { quasi_cooked, quasi_raw });
        id
    }

    pub fn get(&self, id: u32) -> Option<&TaggedTemplateSlot> {
        self.slots.get(id as usize)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_pool_deduplicates() {
        let mut pool = StringPool::new();
        let a = pool.intern("foo");
        let b = pool.intern("bar");
        let c = pool.intern("foo");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get(a), Some("foo"));
    }

    #[test]
    fn numeral_pool_does_not_deduplicate() {
        let mut pool = NumeralPool::new();
        let a = pool.push(1.5);
        let b = pool.push(1.5);
        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get(a), Some(1.5));
    }

    #[test]
    fn global_slot_table_deduplicates_by_name() {
        let mut table = GlobalSlotTable::new();
        let a = table.slot("x");
        let b = table.slot("y");
        let c = table.slot("x");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(a), Some("x"));
    }

    #[test]
    fn tagged_template_table_assigns_sequential_slots() {
        let mut table = TaggedTemplateTable::new();
        let slot0 = table.add(vec![0, 1], vec![0, 1]);
        let slot1 = table.add(vec![2], vec![2]);
        assert_eq!(slot0, 0);
        assert_eq!(slot1, 1);
        assert_eq!(table.get(slot0).unwrap().quasi_cooked, vec![0, 1]);
    }
}
