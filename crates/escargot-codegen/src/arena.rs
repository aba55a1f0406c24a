//! Page-growing bump arena for AST nodes.
//!
//! The source allocator (`ASTAllocator`) hands out raw pointers into
//! geometrically-growing pages and relies on the AST never outliving the
//! allocator. The idiomatic Rust analogue keeps the "allocate once, never
//! individually free, grow in pages" shape but swaps pointers for stable
//! indices: `Arena<T>` stores `T` in `Vec<T>` pages and hands back a
//! [`NodeId<T>`] rather than a reference, so there is no lifetime to thread
//! through the rest of the codegen core and no unsafe code.
//!
//! Two arenas are kept per compilation, matching the source's two
//! allocation channels: [`Arena`] for plain nodes, and
//! [`DestructibleArena`] for node payloads that own a `Vec`/`String`/`Box`
//! and so need to be considered when estimating an AST's live memory
//! (the channel split governs accounting, not destruction — `Drop` in Rust
//! already runs automatically for both).

use std::marker::PhantomData;

/// First page holds 4KiB worth of `T`; pages after that grow 16KiB, then
/// 128KiB, then stay at 128KiB, mirroring `ASTAllocator`'s growth curve.
const PAGE_BYTES: [usize; 4] = [4 * 1024, 16 * 1024, 128 * 1024, 128 * 1024];

fn page_capacity<T>(page_index: usize) -> usize {
    let bytes = PAGE_BYTES[page_index.min(PAGE_BYTES.len() - 1)];
    (bytes / std::mem::size_of::<T>().max(1)).max(1)
}

/// A stable index into an [`Arena<T>`]. Cheap to copy, never invalidated by
/// further allocation (pages never move or shrink once created).
pub struct NodeId<T> {
    page: u32,
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for NodeId<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for NodeId<T> {}
impl<T> PartialEq for NodeId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.page == other.page && self.index == other.index
    }
}
impl<T> Eq for NodeId<T> {}
impl<T> std::fmt::Debug for NodeId<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeId({}:{})", self.page, self.index)
    }
}

/// A page-growing bump arena for values of type `T`.
pub struct Arena<T> {
    pages: Vec<Vec<T>>,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self { pages: vec![Vec::with_capacity(page_capacity::<T>(0))] }
    }

    /// Allocates `value` and returns a stable id for it.
    pub fn alloc(&mut self, value: T) -> NodeId<T> {
        let mut page = self.pages.len() - 1;
        if self.pages[page].len() == self.pages[page].capacity() {
            self.pages.push(Vec::with_capacity(page_capacity::<T>(self.pages.len())));
            page = self.pages.len() - 1;
        }
        let index = self.pages[page].len();
        self.pages[page].push(value);
        NodeId { page: page as u32, index: index as u32, _marker: PhantomData }
    }

    pub fn get(&self, id: NodeId<T>) -> &T {
        &self.pages[id.page as usize][id.index as usize]
    }

    pub fn get_mut(&mut self, id: NodeId<T>) -> &mut T {
        &mut self.pages[id.page as usize][id.index as usize]
    }

    pub fn len(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The second allocation channel: nodes whose payload owns heap storage
/// (`Vec`, `String`, `Box<[_]>`) and is therefore worth tracking separately
/// when a caller wants to know how much of an AST's footprint is "heavy"
/// nodes versus plain ones. Functionally identical to [`Arena`]; kept as a
/// distinct type so the two channels can't be accidentally mixed up by id.
pub struct DestructibleArena<T> {
    inner: Arena<T>,
}

impl<T> DestructibleArena<T> {
    pub fn new() -> Self {
        Self { inner: Arena::new() }
    }

    pub fn alloc(&mut self, value: T) -> NodeId<T> {
        self.inner.alloc(value)
    }

    pub fn get(&self, id: NodeId<T>) -> &T {
        self.inner.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId<T>) -> &mut T {
        self.inner.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<T> Default for DestructibleArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_returns_distinct_ids() {
        let mut arena: Arena<i32> = Arena::new();
        let a = arena.alloc(1);
        let b = arena.alloc(2);
        assert_ne!(a, b);
        assert_eq!(*arena.get(a), 1);
        assert_eq!(*arena.get(b), 2);
    }

    #[test]
    fn grows_past_first_page() {
        let mut arena: Arena<u8> = Arena::new();
        let first_page_capacity = page_capacity::<u8>(0);
        let mut last = None;
        for i in 0..(first_page_capacity + 10) {
            last = Some(arena.alloc((i % 256) as u8));
        }
        assert_eq!(arena.len(), first_page_capacity + 10);
        assert!(last.is_some());
    }

    #[test]
    fn get_mut_allows_in_place_updates() {
        let mut arena: Arena<i32> = Arena::new();
        let id = arena.alloc(10);
        *arena.get_mut(id) += 5;
        assert_eq!(*arena.get(id), 15);
    }

    #[test]
    fn destructible_arena_behaves_like_arena() {
        let mut arena: DestructibleArena<String> = DestructibleArena::new();
        let id = arena.alloc("hello".to_string());
        assert_eq!(arena.get(id), "hello");
        assert_eq!(arena.len(), 1);
    }
}
